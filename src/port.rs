//! Data ports: a uniform read/write surface over channels and services.
//!
//! A port hides which transport feeds it. The access mode is the type,
//! chosen at construction, and determines the wiring:
//!
//! - [`PushPort`] subscribes to a channel and caches the latest sample;
//!   reads never block and never touch the producer.
//! - [`PullPort`] issues a synchronous service request on every read; no
//!   caching.
//! - [`ReadWritePort`] composes a pull-style read with a second service
//!   for writes.
//!
//! A port never falls back to a different transport than the one it was
//! constructed with.
//!
//! # Example
//!
//! ```
//! use firmbus::{MessageBus, PushPort};
//!
//! let bus = MessageBus::new();
//! let channel = bus.channel::<u32>(1).unwrap();
//! let port = PushPort::<u32>::attach(&bus, 11, 1).unwrap();
//!
//! channel.publish(&42);
//! channel.publish(&42);
//! channel.publish(&93);
//!
//! assert_eq!(port.read(), 93);
//! assert_eq!(port.updated_count(), 3);
//! assert_eq!(port.changed_count(), 2);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::MessageBus;
use crate::channel::{Channel, SubscriberFn, SubscriptionToken};
use crate::error::{BusError, BusResult};
use crate::service::Service;
use crate::types::{ChannelId, PortId, ServiceId, NO_PORT};

fn check_port_id(id: PortId) -> BusResult<()> {
    if id == NO_PORT {
        return Err(BusError::ParameterInvalid(
            "the none port id cannot be bound".into(),
        ));
    }
    Ok(())
}

struct PushInner<T> {
    value: T,
    enabled: bool,
    updated_count: u64,
    changed_count: u64,
    on_updated: Vec<SubscriberFn<T>>,
    on_changed: Vec<SubscriberFn<T>>,
}

struct PushState<T> {
    inner: Mutex<PushInner<T>>,
}

impl<T: Clone + PartialEq> PushState<T> {
    /// Runs on the publisher's context for every channel delivery.
    fn deliver(state: &Arc<Self>, sample: &T) {
        let (updated, changed) = {
            let mut inner = state.inner.lock();
            if !inner.enabled {
                return;
            }
            let value_changed = inner.value != *sample;
            inner.value = sample.clone();
            inner.updated_count += 1;
            let updated = inner.on_updated.clone();
            let changed = if value_changed {
                inner.changed_count += 1;
                inner.on_changed.clone()
            } else {
                Vec::new()
            };
            (updated, changed)
        };
        for callback in updated {
            callback(sample);
        }
        for callback in changed {
            callback(sample);
        }
    }
}

/// A push-readable data port: subscribes to a channel and caches the most
/// recent sample.
///
/// "Updated" notifications fire on every accepted delivery; "changed"
/// notifications fire only when the newly cached value differs from the
/// previous one. While disabled, incoming samples are dropped outright:
/// the cache keeps its value, no notification fires, and re-enabling does
/// not replay what was missed.
pub struct PushPort<T> {
    id: PortId,
    channel: Channel<T>,
    state: Arc<PushState<T>>,
    token: Option<SubscriptionToken>,
}

impl<T> PushPort<T>
where
    T: Clone + Default + PartialEq + Send + 'static,
{
    /// Wires a push-readable port to the channel registered under
    /// `channel_id`, creating the channel if absent.
    ///
    /// The port starts enabled with the payload's default value cached.
    pub fn attach(bus: &MessageBus, id: PortId, channel_id: ChannelId) -> BusResult<Self> {
        check_port_id(id)?;
        let channel = bus.channel::<T>(channel_id)?;
        let state = Arc::new(PushState {
            inner: Mutex::new(PushInner {
                value: T::default(),
                enabled: true,
                updated_count: 0,
                changed_count: 0,
                on_updated: Vec::new(),
                on_changed: Vec::new(),
            }),
        });
        let delivery = state.clone();
        let token = channel.subscribe(move |sample: &T| PushState::deliver(&delivery, sample));
        Ok(Self {
            id,
            channel,
            state,
            token: Some(token),
        })
    }

    /// Returns the last cached sample (the default value before any
    /// delivery has been accepted).
    pub fn read(&self) -> T {
        self.state.inner.lock().value.clone()
    }

    /// Resumes cache updates and notifications for samples published from
    /// now on. Nothing missed while disabled is replayed.
    pub fn enable(&self) {
        self.state.inner.lock().enabled = true;
    }

    /// Drops incoming samples: no cache update, no notifications.
    pub fn disable(&self) {
        self.state.inner.lock().enabled = false;
    }

    /// Returns true while incoming samples are being accepted.
    pub fn is_enabled(&self) -> bool {
        self.state.inner.lock().enabled
    }

    /// Registers a callback fired on every accepted delivery.
    pub fn on_updated<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.state.inner.lock().on_updated.push(Arc::new(callback));
    }

    /// Registers a callback fired only when an accepted delivery differs
    /// from the cached value.
    pub fn on_changed<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.state.inner.lock().on_changed.push(Arc::new(callback));
    }

    /// Number of accepted deliveries.
    pub fn updated_count(&self) -> u64 {
        self.state.inner.lock().updated_count
    }

    /// Number of accepted deliveries that changed the cached value.
    pub fn changed_count(&self) -> u64 {
        self.state.inner.lock().changed_count
    }
}

impl<T> PushPort<T> {
    /// Returns this port's identifier.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Unsubscribes from the channel; further publishes no longer reach
    /// this port. Also happens on drop.
    pub fn detach(&mut self) {
        if let Some(token) = self.token.take() {
            self.channel.unsubscribe(token);
        }
    }
}

impl<T> Drop for PushPort<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A pull-readable data port: every read is a synchronous request against
/// a service, with no caching in between.
pub struct PullPort<T> {
    id: PortId,
    service: Service<(), T>,
}

impl<T: 'static> PullPort<T> {
    /// Wires a pull-readable port to the service registered under
    /// `service_id`, creating the service entry if absent.
    ///
    /// The service may be bound before or after the port is constructed;
    /// reads before binding fail with [`BusError::NotInitialized`].
    pub fn attach(bus: &MessageBus, id: PortId, service_id: ServiceId) -> BusResult<Self> {
        check_port_id(id)?;
        let service = bus.service::<(), T>(service_id)?;
        Ok(Self { id, service })
    }

    /// Returns this port's identifier.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Requests a fresh value from the backing service.
    pub fn read(&self) -> BusResult<T> {
        self.service.request(&())
    }
}

/// A read-write data port over a pair of services: reads pull from one,
/// writes push through the other.
///
/// The write response is discarded; its effect is whatever the write
/// handler does, observable through the next read.
pub struct ReadWritePort<T> {
    id: PortId,
    reader: Service<(), T>,
    writer: Service<T, ()>,
}

impl<T: 'static> ReadWritePort<T> {
    /// Wires a read-write port to `read_service_id` for reads and
    /// `write_service_id` for writes.
    pub fn attach(
        bus: &MessageBus,
        id: PortId,
        read_service_id: ServiceId,
        write_service_id: ServiceId,
    ) -> BusResult<Self> {
        check_port_id(id)?;
        let reader = bus.service::<(), T>(read_service_id)?;
        let writer = bus.service::<T, ()>(write_service_id)?;
        Ok(Self { id, reader, writer })
    }

    /// Returns this port's identifier.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Requests a fresh value from the read service.
    pub fn read(&self) -> BusResult<T> {
        self.reader.request(&())
    }

    /// Sends `value` to the write service, discarding the response.
    pub fn write(&self, value: &T) -> BusResult<()> {
        self.writer.request(value)
    }
}
