//! # Firmbus Messaging Core
//!
//! An in-process messaging core for embedded firmware: named broadcast
//! channels and named request/response services behind one registry, a
//! uniform data-port abstraction over both, and a deterministic
//! simulated-time driver for reproducible concurrency in tests.
//!
//! ## Design Principles
//!
//! - **One registry, typed handles**: endpoints live in a [`MessageBus`]
//!   keyed by small integer identifiers; lookups return typed handles, and
//!   an identifier reused under a different payload type is a typed error,
//!   never a mistyped callback.
//! - **Synchronous delivery**: `publish` and `request` run subscriber and
//!   handler code to completion on the caller's context. No queues, no
//!   consumer threads, no backpressure.
//! - **Transport-hiding ports**: a data port is wired at construction to a
//!   channel (push) or services (pull/write) and never falls back to a
//!   different transport.
//! - **Deterministic tests**: the [`SimulatedClock`] is the only
//!   multi-thread coordination point; `advance` returns once every
//!   simulated worker has processed the tick.
//!
//! ## Quick Start
//!
//! ```rust
//! use firmbus::{MessageBus, PushPort};
//!
//! let bus = MessageBus::new();
//!
//! // A producer publishes accelerometer samples on channel 1.
//! let accel = bus.channel::<f32>(1).unwrap();
//!
//! // A consumer watches the latest sample through a push port.
//! let latest = PushPort::<f32>::attach(&bus, 11, 1).unwrap();
//!
//! accel.publish(&9.81);
//! assert_eq!(latest.read(), 9.81);
//! assert_eq!(latest.updated_count(), 1);
//! ```
//!
//! ## Virtual Time
//!
//! ```rust
//! use firmbus::{MessageBus, SimWorker, SimulatedClock, TimeValue};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let bus = MessageBus::new();
//! let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();
//!
//! let polls = Arc::new(AtomicU64::new(0));
//! let counter = polls.clone();
//! let sampler = SimWorker::spawn(&clock, "sampler", move |_now| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! clock.start().unwrap();
//! clock.run_until(TimeValue::from_millis(30)).unwrap();
//! assert_eq!(polls.load(Ordering::SeqCst), 3);
//!
//! clock.stop();
//! sampler.join();
//! ```

pub mod bus;
pub mod channel;
pub mod clock;
pub mod config;
pub mod downsample;
pub mod error;
pub mod port;
pub mod service;
pub mod time;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use bus::MessageBus;
pub use channel::{Channel, SubscriberFn, SubscriptionToken};
pub use clock::{SimulatedClock, TickWaiter};
pub use config::{ConfigError, ConfigResult, PortDef, PortMode, Topology};
pub use downsample::DecimatedSubscription;
pub use error::{BusError, BusResult};
pub use port::{PullPort, PushPort, ReadWritePort};
pub use service::{HandlerFn, Service};
pub use time::{TimeValue, NANOS_PER_SEC};
pub use types::{ChannelId, PortId, ServiceId, NO_CHANNEL, NO_PORT, NO_SERVICE};
pub use worker::SimWorker;

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// firmbus::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
