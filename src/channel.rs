//! Broadcast channels: one publish call fans out to every subscriber.
//!
//! A [`Channel`] is a cheaply clonable handle to a shared subscriber list.
//! Publishing invokes every registered callback synchronously, in
//! subscription order, on the publisher's own execution context; the call
//! returns only after all subscribers have returned. There is no queue and
//! no consumer thread.
//!
//! # Delivery policy
//!
//! `publish` snapshots the subscriber list before iterating. A callback
//! that subscribes or unsubscribes during delivery never changes the set
//! being delivered to; the mutation takes effect from the next publish.
//! The list is kept copy-on-write (mutations clone it, publish only clones
//! an `Arc`), so the publish path performs no heap allocation.
//!
//! # Example
//!
//! ```
//! use firmbus::MessageBus;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let bus = MessageBus::new();
//! let channel = bus.channel::<u32>(1).unwrap();
//!
//! let seen = Arc::new(AtomicU32::new(0));
//! let sink = seen.clone();
//! channel.subscribe(move |sample| {
//!     sink.store(*sample, Ordering::SeqCst);
//! });
//!
//! channel.publish(&42);
//! assert_eq!(seen.load(Ordering::SeqCst), 42);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::ChannelId;

/// Type alias for shared subscriber callbacks.
pub type SubscriberFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Opaque handle identifying one subscription on one channel.
///
/// Returned by [`Channel::subscribe`] and consumed by
/// [`Channel::unsubscribe`]. Tokens are unique per channel for the life of
/// the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Subscriber<T> {
    token: SubscriptionToken,
    callback: SubscriberFn<T>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            callback: self.callback.clone(),
        }
    }
}

pub(crate) struct ChannelCore<T> {
    id: ChannelId,
    /// Copy-on-write: publish clones the Arc, mutation clones the Vec
    subscribers: Mutex<Arc<Vec<Subscriber<T>>>>,
    next_token: AtomicU64,
    published: AtomicU64,
}

impl<T> ChannelCore<T> {
    pub(crate) fn new(id: ChannelId) -> Self {
        Self {
            id,
            subscribers: Mutex::new(Arc::new(Vec::new())),
            next_token: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }
}

/// A broadcast publish/subscribe primitive identified by a [`ChannelId`]
/// and a payload type.
///
/// Handles are obtained from [`MessageBus::channel`](crate::MessageBus::channel)
/// and are cheap to clone; every clone refers to the same subscriber list.
pub struct Channel<T> {
    core: Arc<ChannelCore<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> Channel<T> {
    pub(crate) fn from_core(core: Arc<ChannelCore<T>>) -> Self {
        Self { core }
    }

    /// Returns this channel's identifier.
    pub fn id(&self) -> ChannelId {
        self.core.id
    }

    /// Appends a subscriber callback to the channel.
    ///
    /// Callbacks are invoked in subscription order. The channel does not
    /// own the subscribing component; drop the interest explicitly with
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Appends an already-shared subscriber callback.
    pub fn subscribe_arc(&self, callback: SubscriberFn<T>) -> SubscriptionToken {
        let token = SubscriptionToken(self.core.next_token.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.core.subscribers.lock();
        let mut list = Vec::with_capacity(subscribers.len() + 1);
        list.extend(subscribers.iter().cloned());
        list.push(Subscriber { token, callback });
        *subscribers = Arc::new(list);
        token
    }

    /// Removes the subscription identified by `token`.
    ///
    /// Returns `false` (and does nothing) if the token is not registered,
    /// e.g. because it was already removed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.core.subscribers.lock();
        match subscribers.iter().position(|s| s.token == token) {
            Some(index) => {
                let mut list = (**subscribers).clone();
                list.remove(index);
                *subscribers = Arc::new(list);
                true
            }
            None => false,
        }
    }

    /// Delivers `value` to every currently-registered subscriber.
    ///
    /// Runs synchronously on the caller's context and returns after the
    /// last subscriber returns. The subscriber list is snapshotted first,
    /// so subscriptions added or removed by a callback apply from the next
    /// publish onward.
    pub fn publish(&self, value: &T) {
        let snapshot = self.core.subscribers.lock().clone();
        self.core.published.fetch_add(1, Ordering::Relaxed);
        for subscriber in snapshot.iter() {
            (subscriber.callback)(value);
        }
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.subscribers.lock().len()
    }

    /// Returns how many samples have been published on this channel.
    pub fn publish_count(&self) -> u64 {
        self.core.published.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.core.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn test_channel<T>() -> Channel<T> {
        Channel::from_core(Arc::new(ChannelCore::new(1)))
    }

    #[test]
    fn test_fanout_order_and_values() {
        let channel = test_channel::<u32>();
        let log: Arc<Mutex<Vec<(u8, u32)>>> = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3u8 {
            let log = log.clone();
            channel.subscribe(move |sample: &u32| {
                log.lock().push((tag, *sample));
            });
        }

        channel.publish(&7);
        channel.publish(&9);

        let log = log.lock();
        assert_eq!(
            *log,
            vec![(0, 7), (1, 7), (2, 7), (0, 9), (1, 9), (2, 9)]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let channel = test_channel::<u32>();
        let count = Arc::new(Mutex::new(0u32));

        let sink = count.clone();
        let token = channel.subscribe(move |_| {
            *sink.lock() += 1;
        });

        channel.publish(&1);
        assert!(channel.unsubscribe(token));
        channel.publish(&2);

        assert_eq!(*count.lock(), 1);
        assert_eq!(channel.subscriber_count(), 0);

        // Second removal is a no-op
        assert!(!channel.unsubscribe(token));
    }

    #[test]
    fn test_publish_with_no_subscribers() {
        let channel = test_channel::<u32>();
        channel.publish(&1);
        assert_eq!(channel.publish_count(), 1);
    }

    #[test]
    fn test_subscribe_during_publish_applies_next_time() {
        let channel = test_channel::<u32>();
        let late_calls = Arc::new(Mutex::new(0u32));

        let chan = channel.clone();
        let late = late_calls.clone();
        channel.subscribe(move |_| {
            let late = late.clone();
            chan.subscribe(move |_| {
                *late.lock() += 1;
            });
        });

        // The subscription added during this publish must not run for it.
        channel.publish(&1);
        assert_eq!(*late_calls.lock(), 0);
        assert_eq!(channel.subscriber_count(), 2);

        // It does run for the next one (and a third is appended).
        channel.publish(&2);
        assert_eq!(*late_calls.lock(), 1);
        assert_eq!(channel.subscriber_count(), 3);
    }

    #[test]
    fn test_unsubscribe_during_publish_applies_next_time() {
        let channel = test_channel::<u32>();
        let second_calls = Arc::new(Mutex::new(0u32));

        let chan = channel.clone();
        let sink = second_calls.clone();
        let second = channel.subscribe(move |_| {
            *sink.lock() += 1;
        });
        // The remover sits after `second` in subscription order, so the
        // snapshot guarantees `second` still saw this sample.
        channel.subscribe(move |_| {
            chan.unsubscribe(second);
        });

        channel.publish(&1);
        assert_eq!(*second_calls.lock(), 1);

        channel.publish(&2);
        assert_eq!(*second_calls.lock(), 1);
    }

    #[test]
    fn test_clone_shares_subscriber_list() {
        let channel = test_channel::<u32>();
        let other = channel.clone();

        let count = Arc::new(Mutex::new(0u32));
        let sink = count.clone();
        other.subscribe(move |_| {
            *sink.lock() += 1;
        });

        channel.publish(&1);
        assert_eq!(*count.lock(), 1);
        assert_eq!(channel.subscriber_count(), 1);
    }
}
