//! Downsampling subscriptions: deliver only every Nth sample.
//!
//! A [`DecimatedSubscription`] owns a subscription on a [`Channel`] and a
//! target callback, forwarding the k-th sample and every k-th thereafter
//! (1-indexed): with factor 3, samples 3, 6, 9, ... reach the target. Out
//! of M delivered samples exactly `M / k` are forwarded.
//!
//! The counter and factor live only as long as the wrapper; dropping it
//! detaches from the channel.
//!
//! # Example
//!
//! ```
//! use firmbus::{DecimatedSubscription, MessageBus};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let bus = MessageBus::new();
//! let channel = bus.channel::<u32>(1).unwrap();
//!
//! let forwarded = Arc::new(AtomicU32::new(0));
//! let sink = forwarded.clone();
//! let _sub = DecimatedSubscription::attach(&channel, 3, move |_: &u32| {
//!     sink.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! for sample in 0..10u32 {
//!     channel.publish(&sample);
//! }
//! assert_eq!(forwarded.load(Ordering::SeqCst), 3);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{Channel, SubscriberFn, SubscriptionToken};

struct DecimState<T> {
    target: SubscriberFn<T>,
    inner: Mutex<DecimInner>,
}

struct DecimInner {
    factor: u32,
    counter: u32,
}

/// A decorator around a channel subscription that forwards only every
/// k-th delivered sample to its target callback.
pub struct DecimatedSubscription<T> {
    channel: Channel<T>,
    state: Arc<DecimState<T>>,
    token: Option<SubscriptionToken>,
}

impl<T: 'static> DecimatedSubscription<T> {
    /// Subscribes to `channel` with downsample factor `factor`.
    ///
    /// A factor of 0 is coerced to 1 (every sample forwarded). The counter
    /// starts at 1, so the first forwarded sample is the `factor`-th one.
    pub fn attach<F>(channel: &Channel<T>, factor: u32, target: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let state = Arc::new(DecimState {
            target: Arc::new(target),
            inner: Mutex::new(DecimInner {
                factor: factor.max(1),
                counter: 1,
            }),
        });
        let token = Self::register(channel, &state);
        Self {
            channel: channel.clone(),
            state,
            token: Some(token),
        }
    }

    fn register(channel: &Channel<T>, state: &Arc<DecimState<T>>) -> SubscriptionToken {
        let state = state.clone();
        channel.subscribe(move |sample: &T| {
            let forward = {
                let mut inner = state.inner.lock();
                if inner.counter >= inner.factor {
                    inner.counter = 1;
                    true
                } else {
                    inner.counter += 1;
                    false
                }
            };
            if forward {
                (state.target)(sample);
            }
        })
    }

    /// Returns the configured downsample factor.
    pub fn factor(&self) -> u32 {
        self.state.inner.lock().factor
    }

    /// Sets a new downsample factor (0 coerced to 1) and restarts the
    /// counter at 1.
    pub fn set_factor(&self, factor: u32) {
        let mut inner = self.state.inner.lock();
        inner.factor = factor.max(1);
        inner.counter = 1;
    }

    /// Removes the underlying channel subscription.
    ///
    /// No-op if already detached.
    pub fn detach(&mut self) {
        if let Some(token) = self.token.take() {
            self.channel.unsubscribe(token);
        }
    }

    /// Returns true while the underlying subscription is registered.
    pub fn is_attached(&self) -> bool {
        self.token.is_some()
    }

    /// Re-registers at the tail of the channel's subscriber list.
    ///
    /// The counter restarts at 1; the configured factor is preserved, so a
    /// re-subscribed wrapper keeps downsampling at the same rate.
    pub fn resubscribe(&mut self) {
        self.detach();
        self.state.inner.lock().counter = 1;
        self.token = Some(Self::register(&self.channel, &self.state));
    }
}

impl<T> Drop for DecimatedSubscription<T> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.channel.unsubscribe(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;

    fn collect_forwarded(
        channel: &Channel<u32>,
        factor: u32,
    ) -> (DecimatedSubscription<u32>, Arc<PlMutex<Vec<u32>>>) {
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = DecimatedSubscription::attach(channel, factor, move |sample: &u32| {
            sink.lock().push(*sample);
        });
        (sub, seen)
    }

    #[test]
    fn test_forwards_every_kth_sample() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (_sub, seen) = collect_forwarded(&channel, 3);

        for sample in 1..=10u32 {
            channel.publish(&sample);
        }

        // Samples 3, 6, 9 of 10: floor(10 / 3) forwarded.
        assert_eq!(*seen.lock(), vec![3, 6, 9]);
    }

    #[test]
    fn test_factor_one_forwards_everything() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (_sub, seen) = collect_forwarded(&channel, 1);

        for sample in 1..=4u32 {
            channel.publish(&sample);
        }
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_factor_zero_coerced_to_one() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (sub, seen) = collect_forwarded(&channel, 0);

        assert_eq!(sub.factor(), 1);
        channel.publish(&7);
        assert_eq!(*seen.lock(), vec![7]);
    }

    #[test]
    fn test_detach_stops_forwarding() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (mut sub, seen) = collect_forwarded(&channel, 1);

        channel.publish(&1);
        sub.detach();
        assert!(!sub.is_attached());
        channel.publish(&2);

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        {
            let (_sub, _seen) = collect_forwarded(&channel, 1);
            assert_eq!(channel.subscriber_count(), 1);
        }
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_resubscribe_preserves_factor_and_resets_counter() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (mut sub, seen) = collect_forwarded(&channel, 3);

        // Two samples in: counter mid-cycle.
        channel.publish(&1);
        channel.publish(&2);

        sub.resubscribe();
        assert_eq!(sub.factor(), 3);

        // Counting restarts: the next forwarded sample is the 3rd after
        // re-subscription, not the 3rd overall.
        for sample in 3..=8u32 {
            channel.publish(&sample);
        }
        assert_eq!(*seen.lock(), vec![5, 8]);
    }

    #[test]
    fn test_set_factor_restarts_cycle() {
        let bus = MessageBus::new();
        let channel = bus.channel::<u32>(1).unwrap();
        let (sub, seen) = collect_forwarded(&channel, 4);

        channel.publish(&1);
        sub.set_factor(2);

        channel.publish(&2);
        channel.publish(&3);
        channel.publish(&4);
        // Counting under the new factor began at sample 2.
        assert_eq!(*seen.lock(), vec![3]);
    }
}
