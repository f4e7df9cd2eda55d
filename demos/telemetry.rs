//! Telemetry Pipeline Demo
//!
//! A miniature firmware image on the simulated clock:
//! - An IMU sampler publishes accelerometer magnitudes every tick
//! - A push port caches the latest sample for the control loop
//! - A decimated subscription feeds a 5:1 downsampled log
//! - A barometer sits behind pull and read-write ports
//!
//! Run with: `cargo run --example telemetry`

use firmbus::{
    DecimatedSubscription, MessageBus, PullPort, PushPort, ReadWritePort, SimWorker,
    SimulatedClock, TimeValue, Topology,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const TOPOLOGY: &str = r#"
channels:
  - name: imu_accel
    id: 1
  - name: sim_tick
    id: 100
services:
  - name: baro_read
    id: 5
  - name: baro_config_read
    id: 6
  - name: baro_config_write
    id: 7
ports:
  - name: accel_latest
    id: 11
    mode: push
    channel: imu_accel
  - name: baro_pressure
    id: 12
    mode: pull
    read_service: baro_read
  - name: baro_config
    id: 13
    mode: read_write
    read_service: baro_config_read
    write_service: baro_config_write
"#;

fn main() {
    firmbus::init_logging("info");

    let topology = Topology::from_yaml(TOPOLOGY).expect("valid topology");
    let bus = MessageBus::new();

    // Barometer backend: a fake register file.
    let pressure = Arc::new(Mutex::new(1013.25f64));
    let oversampling = Arc::new(Mutex::new(1u8));

    let source = pressure.clone();
    bus.service::<(), f64>(topology.service_id("baro_read").unwrap())
        .unwrap()
        .bind(move |_| Ok(*source.lock()));
    let config = oversampling.clone();
    bus.service::<(), u8>(topology.service_id("baro_config_read").unwrap())
        .unwrap()
        .bind(move |_| Ok(*config.lock()));
    let config = oversampling.clone();
    bus.service::<u8, ()>(topology.service_id("baro_config_write").unwrap())
        .unwrap()
        .bind(move |value| {
            *config.lock() = *value;
            Ok(())
        });

    // Consumer side.
    let accel_channel_id = topology.channel_id("imu_accel").unwrap();
    let accel_latest = PushPort::<f32>::attach(
        &bus,
        topology.port_id("accel_latest").unwrap(),
        accel_channel_id,
    )
    .unwrap();
    let baro_pressure = PullPort::<f64>::attach(
        &bus,
        topology.port_id("baro_pressure").unwrap(),
        topology.service_id("baro_read").unwrap(),
    )
    .unwrap();
    let baro_config = ReadWritePort::<u8>::attach(
        &bus,
        topology.port_id("baro_config").unwrap(),
        topology.service_id("baro_config_read").unwrap(),
        topology.service_id("baro_config_write").unwrap(),
    )
    .unwrap();

    let accel_channel = bus.channel::<f32>(accel_channel_id).unwrap();
    let _log = DecimatedSubscription::attach(&accel_channel, 5, |sample: &f32| {
        println!("[log] accel magnitude {:.2} m/s^2", sample);
    });

    // Producer side: one sample per 10 ms tick.
    let clock = SimulatedClock::new(
        &bus,
        topology.channel_id("sim_tick").unwrap(),
        TimeValue::from_millis(10),
    )
    .unwrap();

    let producer = accel_channel.clone();
    let sequence = Arc::new(AtomicU32::new(0));
    let counter = sequence.clone();
    let sampler = SimWorker::spawn(&clock, "imu_sampler", move |now| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let magnitude = 9.81 + (n as f32 * 0.7).sin() * 0.3;
        println!("[imu] t={} sample #{}: {:.2} m/s^2", now, n, magnitude);
        producer.publish(&magnitude);
    });

    clock.start().expect("clock starts");

    // Reconfigure the barometer mid-run through the read-write port.
    clock.run_until(TimeValue::from_millis(50)).expect("advance");
    println!(
        "[ctl] pressure {:.2} hPa, oversampling x{}",
        baro_pressure.read().expect("baro read"),
        baro_config.read().expect("config read"),
    );
    baro_config.write(&16).expect("config write");
    *pressure.lock() = 995.4;

    clock.run_until(TimeValue::from_millis(100)).expect("advance");
    println!(
        "[ctl] pressure {:.2} hPa, oversampling x{}, latest accel {:.2}",
        baro_pressure.read().expect("baro read"),
        baro_config.read().expect("config read"),
        accel_latest.read(),
    );

    clock.stop();
    sampler.join();

    println!(
        "{}",
        serde_json::to_string_pretty(&bus.export_stats()).expect("stats serialize")
    );
}
