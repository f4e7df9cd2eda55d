//! The message bus: process-wide channel and service registries.
//!
//! A [`MessageBus`] owns the two identifier namespaces and hands out typed
//! [`Channel`] and [`Service`] handles. Entries are keyed by identifier and
//! tagged with the payload type at first registration; a later lookup under
//! the same identifier with a different type is a [`BusError::TypeMismatch`],
//! never a wrongly-typed callback invocation.
//!
//! The bus is an explicit value, owned by the application's startup sequence
//! (or a test fixture) and passed by reference to whatever registers or
//! looks up endpoints. Registry mutation (create/remove) is serialized by a
//! mutex per namespace; the steady-state `publish`/`request` path goes
//! through a handle and takes no registry lock at all.
//!
//! # Example
//!
//! ```
//! use firmbus::{BusError, MessageBus};
//!
//! let bus = MessageBus::new();
//!
//! // Create on first use; same id + type returns the same instance.
//! let a = bus.channel::<u32>(1).unwrap();
//! let b = bus.channel::<u32>(1).unwrap();
//! a.subscribe(|_| {});
//! assert_eq!(b.subscriber_count(), 1);
//!
//! // Same id under a different payload type is an error.
//! assert!(matches!(
//!     bus.channel::<f64>(1),
//!     Err(BusError::TypeMismatch { .. })
//! ));
//! ```

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{Channel, ChannelCore};
use crate::error::{BusError, BusResult};
use crate::service::{Service, ServiceCore};
use crate::types::{ChannelId, ServiceId, NO_CHANNEL, NO_SERVICE};

struct RegistryEntry {
    /// Payload type the identifier was first registered with
    type_name: &'static str,
    /// Type-erased primitive; the concrete type is the type tag
    slot: Arc<dyn Any + Send + Sync>,
    /// Typed stats reporter captured at registration
    stats: Arc<dyn Fn() -> serde_json::Value + Send + Sync>,
}

/// Registry of broadcast channels and request/response services.
#[derive(Default)]
pub struct MessageBus {
    channels: Mutex<HashMap<ChannelId, RegistryEntry>>,
    services: Mutex<HashMap<ServiceId, RegistryEntry>>,
}

impl MessageBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel registered under `id`, creating it if absent.
    ///
    /// Fails with [`BusError::TypeMismatch`] if `id` was first registered
    /// with a different payload type, and with [`BusError::ParameterInvalid`]
    /// for the [`NO_CHANNEL`] sentinel.
    pub fn channel<T: 'static>(&self, id: ChannelId) -> BusResult<Channel<T>> {
        if id == NO_CHANNEL {
            return Err(BusError::ParameterInvalid(
                "the none channel id cannot be bound".into(),
            ));
        }

        let mut channels = self.channels.lock();
        match channels.entry(id) {
            Entry::Occupied(occupied) => {
                let entry = occupied.get();
                match entry.slot.clone().downcast::<ChannelCore<T>>() {
                    Ok(core) => Ok(Channel::from_core(core)),
                    Err(_) => Err(BusError::TypeMismatch {
                        id,
                        registered: entry.type_name,
                        requested: std::any::type_name::<T>(),
                    }),
                }
            }
            Entry::Vacant(vacant) => {
                let core = Arc::new(ChannelCore::new(id));
                let type_name = std::any::type_name::<T>();
                let handle = Channel::from_core(core.clone());
                let stats = Arc::new(move || {
                    serde_json::json!({
                        "type": type_name,
                        "subscribers": handle.subscriber_count(),
                        "published": handle.publish_count(),
                    })
                });
                vacant.insert(RegistryEntry {
                    type_name,
                    slot: core.clone(),
                    stats,
                });
                tracing::debug!(id, payload = type_name, "channel created");
                Ok(Channel::from_core(core))
            }
        }
    }

    /// Returns the service registered under `id`, creating it if absent.
    ///
    /// The type tag is the request/response pair; the same error discipline
    /// as [`channel`](Self::channel) applies.
    pub fn service<Q: 'static, R: 'static>(&self, id: ServiceId) -> BusResult<Service<Q, R>> {
        if id == NO_SERVICE {
            return Err(BusError::ParameterInvalid(
                "the none service id cannot be bound".into(),
            ));
        }

        let mut services = self.services.lock();
        match services.entry(id) {
            Entry::Occupied(occupied) => {
                let entry = occupied.get();
                match entry.slot.clone().downcast::<ServiceCore<Q, R>>() {
                    Ok(core) => Ok(Service::from_core(core)),
                    Err(_) => Err(BusError::TypeMismatch {
                        id,
                        registered: entry.type_name,
                        requested: std::any::type_name::<(Q, R)>(),
                    }),
                }
            }
            Entry::Vacant(vacant) => {
                let core = Arc::new(ServiceCore::new(id));
                let type_name = std::any::type_name::<(Q, R)>();
                let handle = Service::from_core(core.clone());
                let stats = Arc::new(move || {
                    serde_json::json!({
                        "type": type_name,
                        "bound": handle.is_bound(),
                        "served": handle.request_count(),
                    })
                });
                vacant.insert(RegistryEntry {
                    type_name,
                    slot: core.clone(),
                    stats,
                });
                tracing::debug!(id, pair = type_name, "service created");
                Ok(Service::from_core(core))
            }
        }
    }

    /// Publishes `value` on channel `id`, creating the channel if absent.
    ///
    /// A missing channel is never an error on the publish side; the only
    /// failure modes are the sentinel id and a payload type mismatch.
    pub fn publish<T: 'static>(&self, id: ChannelId, value: &T) -> BusResult<()> {
        self.channel::<T>(id)?.publish(value);
        Ok(())
    }

    /// Issues `request` against the service registered under `id`.
    ///
    /// Unlike the channel side this is lookup-only: an identifier with no
    /// registered service fails with [`BusError::ServiceNotFound`]. A bound
    /// handler runs synchronously and its result is returned unchanged.
    pub fn request<Q: 'static, R: 'static>(&self, id: ServiceId, request: &Q) -> BusResult<R> {
        self.lookup_service::<Q, R>(id)?.request(request)
    }

    /// Looks up an existing service without creating one.
    pub fn lookup_service<Q: 'static, R: 'static>(&self, id: ServiceId) -> BusResult<Service<Q, R>> {
        let services = self.services.lock();
        let entry = services.get(&id).ok_or(BusError::ServiceNotFound(id))?;
        match entry.slot.clone().downcast::<ServiceCore<Q, R>>() {
            Ok(core) => Ok(Service::from_core(core)),
            Err(_) => Err(BusError::TypeMismatch {
                id,
                registered: entry.type_name,
                requested: std::any::type_name::<(Q, R)>(),
            }),
        }
    }

    /// Deregisters the channel under `id`. Returns `false` if absent.
    ///
    /// Live handles keep the detached channel working; the identifier
    /// becomes available for re-registration.
    pub fn remove_channel(&self, id: ChannelId) -> bool {
        self.channels.lock().remove(&id).is_some()
    }

    /// Deregisters the service under `id`. Returns `false` if absent.
    pub fn remove_service(&self, id: ServiceId) -> bool {
        self.services.lock().remove(&id).is_some()
    }

    /// Returns the number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Returns the number of registered services.
    pub fn service_count(&self) -> usize {
        self.services.lock().len()
    }

    /// Exports a snapshot of the registry state.
    pub fn export_stats(&self) -> serde_json::Value {
        let channels: serde_json::Map<String, serde_json::Value> = self
            .channels
            .lock()
            .iter()
            .map(|(id, entry)| (id.to_string(), (entry.stats)()))
            .collect();
        let services: serde_json::Map<String, serde_json::Value> = self
            .services
            .lock()
            .iter()
            .map(|(id, entry)| (id.to_string(), (entry.stats)()))
            .collect();

        serde_json::json!({
            "bus": {
                "channel_count": channels.len(),
                "service_count": services.len(),
            },
            "channels": channels,
            "services": services,
        })
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("channels", &self.channel_count())
            .field("services", &self.service_count())
            .finish()
    }
}
