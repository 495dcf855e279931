//! Desktop battery device talking to a hub over MQTT.
//!
//! Simulates a slowly discharging battery, answers set/adjust requests on
//! `{prefix}/request`, and reports the level on `{prefix}/event`.
//!
//! # Run
//!
//! ```bash
//! # Defaults: broker on localhost:1883, device id "battery-1"
//! cargo run --bin battery_demo --features demo
//!
//! # With a JSON config file and debug logging
//! RUST_LOG=rs_sinric=debug cargo run --bin battery_demo --features demo -- battery.json
//! ```

use std::thread;
use std::time::Duration;

use anyhow::Context;
use rs_sinric::config::{Config, ControlConfig, DeviceConfig};
use rs_sinric::hal::SystemClock;
use rs_sinric::services::{MqttTransport, RumqttClient};
use rs_sinric::traits::{Clock, RangeSensor};
use rs_sinric::{Battery, ControlLoop, DeviceHandle};
use tracing_subscriber::EnvFilter;

/// Main loop interval in milliseconds
const LOOP_INTERVAL_MS: u64 = 100;

/// Simulated cell that loses one percent per minute.
struct DischargingCell {
    start_level: i32,
    clock: SystemClock,
}

impl RangeSensor for DischargingCell {
    type Error = std::convert::Infallible;

    fn read_range_value(&mut self, _instance_id: &str) -> Result<i32, Self::Error> {
        let minutes = (self.clock.now_ms() / 60_000) as i32;
        Ok((self.start_level - minutes).max(0))
    }
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path))?;
            Config::from_json(&bytes).with_context(|| format!("parsing {}", path))
        }
        None => Ok(Config::default()
            .with_device(DeviceConfig::default().with_id("battery-1"))
            .with_control(ControlConfig::default().with_poll_interval_ms(10_000))),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rs_sinric=info")),
        )
        .init();

    let config = load_config()?;
    anyhow::ensure!(!config.device.id.is_empty(), "device.id must be set");

    let applier = |instance_id: &str, value: i32| -> Result<(), std::convert::Infallible> {
        tracing::info!(instance_id, value, "charge limit applied");
        Ok(())
    };
    let mut battery = Battery::from_config(&config, applier).context("building battery device")?;

    let client = RumqttClient::connect(&config.mqtt).context("starting mqtt client")?;
    let mut transport = MqttTransport::new(client, &config.mqtt);
    transport.subscribe().context("subscribing to requests")?;

    let clock = SystemClock::new();
    let mut sensor = DischargingCell {
        start_level: 100,
        clock,
    };
    let mut control = ControlLoop::new(transport, clock, config.control.clone());

    tracing::info!(
        device_id = battery.id(),
        name = %config.device.name,
        poll_interval_ms = config.control.poll_interval_ms,
        "battery demo running"
    );

    loop {
        control.process_inbound(&mut [&mut battery as &mut dyn DeviceHandle<_>]);

        if control.poll_due() {
            let now_ms = control.now_ms();
            battery.poll_and_report(control.transport_mut(), &mut sensor, now_ms);
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
