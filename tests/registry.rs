//! Integration tests for the channel and service registries.

use firmbus::{BusError, MessageBus, NO_CHANNEL, NO_SERVICE};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_channel_uniqueness_per_identifier() {
    let bus = MessageBus::new();

    let first = bus.channel::<u32>(1).unwrap();
    let second = bus.channel::<u32>(1).unwrap();

    // Both handles refer to the same instance: a subscriber registered
    // through one is visible (and invoked) through the other.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    first.subscribe(move |v: &u32| sink.lock().push(*v));

    second.publish(&5);
    assert_eq!(*seen.lock(), vec![5]);
    assert_eq!(bus.channel_count(), 1);
}

#[test]
fn test_identifier_namespaces_are_independent() {
    let bus = MessageBus::new();

    // The same small integer may name a channel and a service.
    bus.channel::<u32>(3).unwrap();
    let service = bus.service::<u32, u32>(3).unwrap();
    service.bind(|q| Ok(*q));

    assert_eq!(bus.channel_count(), 1);
    assert_eq!(bus.service_count(), 1);
    assert_eq!(bus.request::<u32, u32>(3, &8).unwrap(), 8);
}

#[test]
fn test_type_mismatch_never_invokes_callbacks() {
    let bus = MessageBus::new();

    let typed = bus.channel::<u32>(1).unwrap();
    let invoked = Arc::new(Mutex::new(0u32));
    let sink = invoked.clone();
    typed.subscribe(move |_| *sink.lock() += 1);

    // The mistyped lookup fails before anything can be published.
    assert!(matches!(
        bus.channel::<String>(1),
        Err(BusError::TypeMismatch { .. })
    ));
    assert!(matches!(
        bus.publish::<String>(1, &"x".to_string()),
        Err(BusError::TypeMismatch { .. })
    ));
    assert_eq!(*invoked.lock(), 0);
}

#[test]
fn test_service_error_taxonomy() {
    let bus = MessageBus::new();

    // Unknown identifier
    assert_eq!(
        bus.request::<u32, u32>(5, &0),
        Err(BusError::ServiceNotFound(5))
    );

    // Known identifier, no handler
    let service = bus.service::<u32, u32>(5).unwrap();
    assert_eq!(
        bus.request::<u32, u32>(5, &0),
        Err(BusError::NotInitialized(5))
    );

    // Wrong request/response pair
    assert!(matches!(
        bus.request::<u32, f64>(5, &0),
        Err(BusError::TypeMismatch { .. })
    ));

    // Bound handler serves, handler errors pass through unchanged
    service.bind(|q| {
        if *q == 0 {
            Err(BusError::Handler("bad argument".into()))
        } else {
            Ok(q * 2)
        }
    });
    assert_eq!(bus.request::<u32, u32>(5, &21).unwrap(), 42);
    assert_eq!(
        bus.request::<u32, u32>(5, &0),
        Err(BusError::Handler("bad argument".into()))
    );
}

#[test]
fn test_rebinding_replaces_without_duplicates() {
    let bus = MessageBus::new();

    let service = bus.service::<u32, u32>(5).unwrap();
    service.bind(|_| Ok(1));
    bus.service::<u32, u32>(5).unwrap().bind(|_| Ok(2));

    assert_eq!(bus.service_count(), 1);
    assert_eq!(bus.request::<u32, u32>(5, &0).unwrap(), 2);
}

#[test]
fn test_sentinel_identifiers_never_bind() {
    let bus = MessageBus::new();

    assert!(matches!(
        bus.channel::<u32>(NO_CHANNEL),
        Err(BusError::ParameterInvalid(_))
    ));
    assert!(matches!(
        bus.service::<u32, u32>(NO_SERVICE),
        Err(BusError::ParameterInvalid(_))
    ));
    assert_eq!(bus.channel_count(), 0);
    assert_eq!(bus.service_count(), 0);
}

#[test]
fn test_broadcast_fanout_counts() {
    let bus = MessageBus::new();
    let channel = bus.channel::<u64>(1).unwrap();

    const SUBSCRIBERS: usize = 5;
    const SAMPLES: u64 = 17;

    let counters: Vec<Arc<Mutex<Vec<u64>>>> = (0..SUBSCRIBERS)
        .map(|_| {
            let log = Arc::new(Mutex::new(Vec::new()));
            let sink = log.clone();
            channel.subscribe(move |v: &u64| sink.lock().push(*v));
            log
        })
        .collect();

    for sample in 0..SAMPLES {
        channel.publish(&sample);
    }

    let expected: Vec<u64> = (0..SAMPLES).collect();
    for counter in &counters {
        // Each subscriber saw every sample exactly once, in order.
        assert_eq!(*counter.lock(), expected);
    }
}

#[test]
fn test_explicit_deregistration() {
    let bus = MessageBus::new();
    bus.channel::<u32>(1).unwrap();
    bus.service::<u32, u32>(1).unwrap();

    assert!(bus.remove_channel(1));
    assert!(bus.remove_service(1));
    assert_eq!(bus.channel_count(), 0);

    // Gone from the request path too.
    assert_eq!(
        bus.request::<u32, u32>(1, &0),
        Err(BusError::ServiceNotFound(1))
    );
}
