//! Deterministic virtual time for tests and simulation.
//!
//! A [`SimulatedClock`] owns the virtual timeline. Production deployments
//! advance time from a free-running hardware counter and never block; this
//! driver exists so tests can single-step virtual time and assert on a
//! fully-settled system after each tick.
//!
//! [`advance`](SimulatedClock::advance) sets the new time, publishes a
//! [`TimeValue`] tick on the configured channel (synchronously, on the
//! advancing thread), then blocks until every registered worker has
//! signaled completion of that tick. All effects of tick N by all workers
//! are complete before `advance` returns; ordering *among* workers within
//! a tick is unspecified. That barrier is the only ordering contract.
//!
//! The advancing side is expected to be a single thread; workers interact
//! with the clock only through their [`TickWaiter`].
//!
//! # Example
//!
//! ```
//! use firmbus::{MessageBus, SimulatedClock, TimeValue};
//!
//! let bus = MessageBus::new();
//! let clock = SimulatedClock::new(&bus, 100, TimeValue::from_millis(10)).unwrap();
//! clock.start().unwrap();
//!
//! clock.step().unwrap();
//! assert_eq!(clock.current_time(), TimeValue::from_millis(10));
//!
//! clock.run_until(TimeValue::from_millis(50)).unwrap();
//! assert_eq!(clock.current_time(), TimeValue::from_millis(50));
//! clock.stop();
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::bus::MessageBus;
use crate::channel::Channel;
use crate::error::{BusError, BusResult};
use crate::time::TimeValue;
use crate::types::ChannelId;

struct ClockState {
    running: bool,
    stopped: bool,
    current: TimeValue,
    /// Bumped once per published tick; waiters compare against it
    tick_seq: u64,
    /// Registered simulated workers
    workers: usize,
    /// Completion countdown for the in-flight tick
    outstanding: usize,
}

pub(crate) struct ClockShared {
    state: Mutex<ClockState>,
    tick_cv: Condvar,
    done_cv: Condvar,
}

impl ClockShared {
    /// Counts one completion toward the in-flight tick.
    fn release_one(&self, state: &mut ClockState) {
        if state.outstanding > 0 {
            state.outstanding -= 1;
            if state.outstanding == 0 {
                self.done_cv.notify_all();
            }
        }
    }
}

/// A deterministic virtual-time driver that barrier-synchronizes
/// simulated workers per time step.
pub struct SimulatedClock {
    tick_channel: Channel<TimeValue>,
    step: TimeValue,
    shared: Arc<ClockShared>,
}

impl SimulatedClock {
    /// Creates a clock publishing ticks on the channel registered under
    /// `tick_channel_id`, with the given step size for [`step`](Self::step)
    /// and [`run_until`](Self::run_until).
    ///
    /// Fails if the tick channel id is unusable, already bound to a
    /// non-[`TimeValue`] payload, or the step is not positive.
    pub fn new(bus: &MessageBus, tick_channel_id: ChannelId, step: TimeValue) -> BusResult<Self> {
        if !step.is_positive() {
            return Err(BusError::ParameterInvalid(format!(
                "clock step must be positive, got {}",
                step
            )));
        }
        let tick_channel = bus.channel::<TimeValue>(tick_channel_id)?;
        Ok(Self {
            tick_channel,
            step,
            shared: Arc::new(ClockShared {
                state: Mutex::new(ClockState {
                    running: false,
                    stopped: false,
                    current: TimeValue::ZERO,
                    tick_seq: 0,
                    workers: 0,
                    outstanding: 0,
                }),
                tick_cv: Condvar::new(),
                done_cv: Condvar::new(),
            }),
        })
    }

    /// Resets virtual time to zero and marks the clock running.
    ///
    /// Fails once the clock has been stopped.
    pub fn start(&self) -> BusResult<()> {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return Err(BusError::ParameterInvalid(
                "clock has already been stopped".into(),
            ));
        }
        state.running = true;
        state.current = TimeValue::ZERO;
        Ok(())
    }

    /// Moves virtual time to `to`, publishes the tick, and waits for every
    /// registered worker to finish processing it.
    ///
    /// Fails with [`BusError::ParameterInvalid`] — leaving the current time
    /// unchanged — if the clock is not running or `to` is earlier than the
    /// current time. Advancing to the current time again is allowed and
    /// republishes a tick at the same instant.
    pub fn advance(&self, to: TimeValue) -> BusResult<()> {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(BusError::ParameterInvalid("clock is not running".into()));
            }
            if to < state.current {
                return Err(BusError::ParameterInvalid(format!(
                    "cannot move virtual time backward: {} is before {}",
                    to, state.current
                )));
            }
            state.current = to;
        }

        // Tick subscribers run here, on the advancing thread, before any
        // worker is released.
        self.tick_channel.publish(&to);

        let mut state = self.shared.state.lock();
        if state.stopped {
            return Ok(());
        }
        state.outstanding = state.workers;
        state.tick_seq += 1;
        self.shared.tick_cv.notify_all();
        while state.outstanding > 0 && !state.stopped {
            self.shared.done_cv.wait(&mut state);
        }
        Ok(())
    }

    /// Advances by the configured step size.
    pub fn step(&self) -> BusResult<()> {
        let next = {
            let state = self.shared.state.lock();
            state.current + self.step
        };
        self.advance(next)
    }

    /// Steps repeatedly while the next tick still lands at or before
    /// `target`.
    pub fn run_until(&self, target: TimeValue) -> BusResult<()> {
        loop {
            let next = {
                let state = self.shared.state.lock();
                state.current + self.step
            };
            if next > target {
                return Ok(());
            }
            self.advance(next)?;
        }
    }

    /// Marks the clock stopped and releases every waiter, so no worker is
    /// left blocked at shutdown. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        state.running = false;
        state.outstanding = 0;
        tracing::debug!(workers = state.workers, "simulated clock stopped");
        self.shared.tick_cv.notify_all();
        self.shared.done_cv.notify_all();
    }

    /// Registers a simulated worker and returns its wait handle.
    ///
    /// A waiter registered while an advance is in flight first observes
    /// the *next* tick.
    pub fn waiter(&self) -> TickWaiter {
        let mut state = self.shared.state.lock();
        state.workers += 1;
        TickWaiter {
            shared: self.shared.clone(),
            last_seen: state.tick_seq,
            owes_signal: false,
        }
    }

    /// Returns the current virtual time.
    pub fn current_time(&self) -> TimeValue {
        self.shared.state.lock().current
    }

    /// Returns the configured step size.
    pub fn step_size(&self) -> TimeValue {
        self.step
    }

    /// Returns true between [`start`](Self::start) and [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Returns the number of registered simulated workers.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Returns a handle to the tick channel.
    pub fn tick_channel(&self) -> Channel<TimeValue> {
        self.tick_channel.clone()
    }
}

impl Drop for SimulatedClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A simulated worker's handle onto the clock barrier.
///
/// The canonical run loop is: [`wait_tick`](Self::wait_tick), do the
/// periodic work, [`tick_done`](Self::tick_done), repeat. Re-entering
/// `wait_tick` with an unsignaled tick signals it implicitly, so a loop
/// that forgets `tick_done` cannot deadlock the advancing thread.
///
/// Dropping the waiter deregisters the worker and releases any signal it
/// still owed.
pub struct TickWaiter {
    shared: Arc<ClockShared>,
    last_seen: u64,
    owes_signal: bool,
}

impl TickWaiter {
    /// Blocks until a tick this waiter has not yet observed is published,
    /// returning its time. Returns `None` once the clock is stopped.
    pub fn wait_tick(&mut self) -> Option<TimeValue> {
        let mut state = self.shared.state.lock();
        if self.owes_signal {
            self.owes_signal = false;
            self.shared.release_one(&mut state);
        }
        while state.tick_seq == self.last_seen && !state.stopped {
            self.shared.tick_cv.wait(&mut state);
        }
        if state.stopped {
            return None;
        }
        self.last_seen = state.tick_seq;
        self.owes_signal = true;
        Some(state.current)
    }

    /// Signals that this worker has finished processing the tick returned
    /// by the last [`wait_tick`](Self::wait_tick). No-op if already
    /// signaled.
    pub fn tick_done(&mut self) {
        if !self.owes_signal {
            return;
        }
        self.owes_signal = false;
        let mut state = self.shared.state.lock();
        self.shared.release_one(&mut state);
    }

    /// Returns the clock's current virtual time.
    pub fn current_time(&self) -> TimeValue {
        self.shared.state.lock().current
    }
}

impl Drop for TickWaiter {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.workers = state.workers.saturating_sub(1);
        // Release the in-flight tick if this waiter consumed it without
        // signaling, or never got around to consuming it at all.
        if self.owes_signal || self.last_seen < state.tick_seq {
            self.shared.release_one(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;

    fn clock_at_10ms(bus: &MessageBus) -> SimulatedClock {
        SimulatedClock::new(bus, 100, TimeValue::from_millis(10)).unwrap()
    }

    #[test]
    fn test_new_rejects_nonpositive_step() {
        let bus = MessageBus::new();
        assert!(matches!(
            SimulatedClock::new(&bus, 100, TimeValue::ZERO),
            Err(BusError::ParameterInvalid(_))
        ));
        assert!(matches!(
            SimulatedClock::new(&bus, 100, TimeValue::from_millis(-10)),
            Err(BusError::ParameterInvalid(_))
        ));
    }

    #[test]
    fn test_advance_requires_start() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        assert!(matches!(
            clock.advance(TimeValue::from_millis(10)),
            Err(BusError::ParameterInvalid(_))
        ));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        clock.start().unwrap();

        clock.advance(TimeValue::from_millis(30)).unwrap();
        let err = clock.advance(TimeValue::from_millis(20)).unwrap_err();
        assert!(matches!(err, BusError::ParameterInvalid(_)));

        // The failed call left the time alone.
        assert_eq!(clock.current_time(), TimeValue::from_millis(30));

        // Equal time is allowed.
        clock.advance(TimeValue::from_millis(30)).unwrap();
    }

    #[test]
    fn test_ticks_reach_channel_subscribers() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);

        let ticks = Arc::new(PlMutex::new(Vec::new()));
        let sink = ticks.clone();
        bus.channel::<TimeValue>(100)
            .unwrap()
            .subscribe(move |t| sink.lock().push(*t));

        clock.start().unwrap();
        clock.step().unwrap();
        clock.step().unwrap();

        assert_eq!(
            *ticks.lock(),
            vec![TimeValue::from_millis(10), TimeValue::from_millis(20)]
        );
    }

    #[test]
    fn test_run_until_lands_on_step_boundaries() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        clock.start().unwrap();

        // 45ms is not a boundary; the clock stops at 40ms.
        clock.run_until(TimeValue::from_millis(45)).unwrap();
        assert_eq!(clock.current_time(), TimeValue::from_millis(40));
    }

    #[test]
    fn test_stop_releases_blocked_waiter() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        clock.start().unwrap();

        let mut waiter = clock.waiter();
        assert_eq!(clock.worker_count(), 1);

        let handle = std::thread::spawn(move || waiter.wait_tick());
        // Give the worker a moment to block.
        std::thread::sleep(std::time::Duration::from_millis(20));

        clock.stop();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_waiter_drop_deregisters() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        {
            let _waiter = clock.waiter();
            assert_eq!(clock.worker_count(), 1);
        }
        assert_eq!(clock.worker_count(), 0);

        // With no workers left, advance returns immediately.
        clock.start().unwrap();
        clock.step().unwrap();
    }

    #[test]
    fn test_start_after_stop_fails() {
        let bus = MessageBus::new();
        let clock = clock_at_10ms(&bus);
        clock.stop();
        assert!(matches!(
            clock.start(),
            Err(BusError::ParameterInvalid(_))
        ));
    }
}
