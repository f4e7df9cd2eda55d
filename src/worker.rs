//! Simulated worker threads driven by the clock barrier.
//!
//! A [`SimWorker`] runs the canonical tick loop on its own thread: wait
//! for the next tick, run the work closure with the tick's time, signal
//! completion, repeat. The thread exits when the clock is stopped.
//!
//! # Example
//!
//! ```
//! use firmbus::{MessageBus, SimWorker, SimulatedClock, TimeValue};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let bus = MessageBus::new();
//! let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();
//!
//! let ticks = Arc::new(AtomicU64::new(0));
//! let counter = ticks.clone();
//! let worker = SimWorker::spawn(&clock, "sampler", move |_now| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! clock.start().unwrap();
//! clock.step().unwrap();
//! clock.step().unwrap();
//! // advance() returned, so both ticks are fully processed.
//! assert_eq!(ticks.load(Ordering::SeqCst), 2);
//!
//! clock.stop();
//! worker.join();
//! ```

use std::thread::JoinHandle;

use crate::clock::SimulatedClock;
use crate::time::TimeValue;

/// A worker thread registered with a [`SimulatedClock`].
///
/// Joining (explicitly or on drop) blocks until the worker thread exits,
/// which it only does once the clock is stopped — stop the clock before
/// dropping its workers.
pub struct SimWorker {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl SimWorker {
    /// Registers with `clock` and spawns a thread running `work` once per
    /// tick.
    ///
    /// The clock's `advance` does not return for a tick until `work` has
    /// completed for it.
    pub fn spawn<F>(clock: &SimulatedClock, name: impl Into<String>, mut work: F) -> Self
    where
        F: FnMut(TimeValue) + Send + 'static,
    {
        let mut waiter = clock.waiter();
        let handle = std::thread::spawn(move || {
            while let Some(now) = waiter.wait_tick() {
                work(now);
                waiter.tick_done();
            }
        });
        Self {
            name: name.into(),
            handle: Some(handle),
        }
    }

    /// Returns the worker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the worker thread to exit.
    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimWorker {
    fn drop(&mut self) {
        self.join_inner();
    }
}

impl std::fmt::Debug for SimWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWorker").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_worker_processes_each_tick_before_advance_returns() {
        let bus = MessageBus::new();
        let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();

        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let worker = SimWorker::spawn(&clock, "counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        clock.start().unwrap();
        for expected in 1..=5u64 {
            clock.step().unwrap();
            assert_eq!(ticks.load(Ordering::SeqCst), expected);
        }

        clock.stop();
        worker.join();
    }

    #[test]
    fn test_worker_sees_tick_times() {
        let bus = MessageBus::new();
        let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();

        let last_nanos = Arc::new(AtomicU64::new(0));
        let sink = last_nanos.clone();
        let worker = SimWorker::spawn(&clock, "timestamper", move |now| {
            sink.store(now.as_nanos() as u64, Ordering::SeqCst);
        });

        clock.start().unwrap();
        clock.advance(TimeValue::from_millis(25)).unwrap();
        assert_eq!(
            last_nanos.load(Ordering::SeqCst),
            TimeValue::from_millis(25).as_nanos() as u64
        );

        clock.stop();
        worker.join();
    }

    #[test]
    fn test_multiple_workers_all_quiesce() {
        let bus = MessageBus::new();
        let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();

        let total = Arc::new(AtomicU64::new(0));
        let workers: Vec<SimWorker> = (0..4)
            .map(|i| {
                let counter = total.clone();
                SimWorker::spawn(&clock, format!("worker-{i}"), move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        assert_eq!(clock.worker_count(), 4);

        clock.start().unwrap();
        clock.step().unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 4);
        clock.step().unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 8);

        clock.stop();
        for worker in workers {
            worker.join();
        }
    }
}
