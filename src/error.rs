//! Error taxonomy for the messaging core.
//!
//! Every failure mode is a typed result returned from the call that detected
//! it; nothing in the core panics on an invalid identifier, and handler
//! failures pass through `request()` unchanged. The caller decides whether a
//! failure is fatal, retried, or surfaced.

use thiserror::Error;

use crate::types::ServiceId;

/// Errors reported by the messaging core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A request was issued against an identifier with no registered service.
    #[error("no service is registered under id {0}")]
    ServiceNotFound(ServiceId),

    /// The identifier exists but was registered with a different payload
    /// (or request/response) type.
    #[error("identifier {id} is bound to `{registered}`, not `{requested}`")]
    TypeMismatch {
        /// The identifier that was looked up
        id: u32,
        /// Type the identifier was first registered with
        registered: &'static str,
        /// Type the caller asked for
        requested: &'static str,
    },

    /// The service exists but no handler has been bound to it yet.
    #[error("service {0} has no handler bound")]
    NotInitialized(ServiceId),

    /// The caller violated a precondition (sentinel identifier, virtual time
    /// moved backward, clock not running).
    #[error("invalid parameter: {0}")]
    ParameterInvalid(String),

    /// Failure reported by a bound service handler (e.g. a bus transaction
    /// against absent hardware). Handlers may also return any other variant;
    /// whatever they report is propagated unchanged.
    #[error("handler failure: {0}")]
    Handler(String),
}

/// Result type for messaging-core operations.
pub type BusResult<T> = Result<T, BusError>;
