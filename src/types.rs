//! Core identifier types for the messaging framework.
//!
//! Identifiers are small unsigned integers assigned by the integrating
//! application at compile time, typically collected in one module per
//! firmware image. Each namespace (channel, service, port) is independent:
//! channel 3 and service 3 are unrelated.

/// Unique identifier for a broadcast channel.
///
/// Channels are created on first use; the same identifier always resolves
/// to the same channel instance for the lifetime of the registry.
pub type ChannelId = u32;

/// Unique identifier for a request/response service.
pub type ServiceId = u32;

/// Unique identifier for a data port.
///
/// Port identifiers are carried for diagnostics; the transport a port is
/// wired to is named by its own channel or service identifier.
pub type PortId = u32;

/// Sentinel channel identifier that can never be bound.
pub const NO_CHANNEL: ChannelId = ChannelId::MAX;

/// Sentinel service identifier that can never be bound.
pub const NO_SERVICE: ServiceId = ServiceId::MAX;

/// Sentinel port identifier that can never be bound.
pub const NO_PORT: PortId = PortId::MAX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinct_from_small_ids() {
        let channel: ChannelId = 1;
        let service: ServiceId = 1;
        let port: PortId = 11;

        assert_ne!(channel, NO_CHANNEL);
        assert_ne!(service, NO_SERVICE);
        assert_ne!(port, NO_PORT);
    }
}
