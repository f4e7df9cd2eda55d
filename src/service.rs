//! Request/response services: one bound handler per identifier.
//!
//! A [`Service`] pairs a [`ServiceId`] with at most one handler mapping a
//! request to a fallible response. Callers invoke the handler synchronously
//! through [`Service::request`]; a service with no handler bound reports
//! [`BusError::NotInitialized`] instead of blocking or panicking, and
//! whatever error a handler returns propagates unchanged.
//!
//! # Example
//!
//! ```
//! use firmbus::MessageBus;
//!
//! let bus = MessageBus::new();
//! let service = bus.service::<u32, u32>(5).unwrap();
//! service.bind(|request| Ok(request * 2));
//!
//! assert_eq!(bus.request::<u32, u32>(5, &21).unwrap(), 42);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BusError, BusResult};
use crate::types::ServiceId;

/// Type alias for shared request handlers.
pub type HandlerFn<Q, R> = Arc<dyn Fn(&Q) -> BusResult<R> + Send + Sync>;

pub(crate) struct ServiceCore<Q, R> {
    id: ServiceId,
    handler: Mutex<Option<HandlerFn<Q, R>>>,
    served: AtomicU64,
}

impl<Q, R> ServiceCore<Q, R> {
    pub(crate) fn new(id: ServiceId) -> Self {
        Self {
            id,
            handler: Mutex::new(None),
            served: AtomicU64::new(0),
        }
    }
}

/// A request/response binding identified by a [`ServiceId`], a request
/// type, and a response type.
///
/// Handles are obtained from [`MessageBus::service`](crate::MessageBus::service)
/// and are cheap to clone; every clone refers to the same handler slot.
pub struct Service<Q, R> {
    core: Arc<ServiceCore<Q, R>>,
}

impl<Q, R> Clone for Service<Q, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<Q, R> Service<Q, R> {
    pub(crate) fn from_core(core: Arc<ServiceCore<Q, R>>) -> Self {
        Self { core }
    }

    /// Returns this service's identifier.
    pub fn id(&self) -> ServiceId {
        self.core.id
    }

    /// Binds `handler`, replacing any previously bound handler.
    ///
    /// Rebinding never creates a duplicate registry entry; the identifier
    /// keeps referring to this same service.
    pub fn bind<F>(&self, handler: F)
    where
        F: Fn(&Q) -> BusResult<R> + Send + Sync + 'static,
    {
        *self.core.handler.lock() = Some(Arc::new(handler));
    }

    /// Clears the bound handler. Returns `false` if none was bound.
    pub fn unbind(&self) -> bool {
        self.core.handler.lock().take().is_some()
    }

    /// Returns true if a handler is currently bound.
    pub fn is_bound(&self) -> bool {
        self.core.handler.lock().is_some()
    }

    /// Invokes the bound handler synchronously with `request`.
    ///
    /// Fails with [`BusError::NotInitialized`] if no handler is bound.
    /// The handler's own error, if any, is returned unchanged.
    pub fn request(&self, request: &Q) -> BusResult<R> {
        let handler = self.core.handler.lock().clone();
        match handler {
            Some(handler) => {
                self.core.served.fetch_add(1, Ordering::Relaxed);
                handler(request)
            }
            None => Err(BusError::NotInitialized(self.core.id)),
        }
    }

    /// Returns how many requests have reached a bound handler.
    pub fn request_count(&self) -> u64 {
        self.core.served.load(Ordering::Relaxed)
    }
}

impl<Q, R> std::fmt::Debug for Service<Q, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.core.id)
            .field("bound", &self.is_bound())
            .finish()
    }
}
