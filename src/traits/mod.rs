//! Trait definitions for the transport boundary, hardware, and networking.
//!
//! These are the seams that let rs-sinric:
//! - Run on different hardware (ESP32, desktop mock)
//! - Talk to the hub over different transports
//! - Be tested end to end without either
//!
//! # Submodules
//!
//! - `transport`: the device-facing [`Transport`] boundary
//! - `hardware`: [`RangeApplier`], [`RangeSensor`], [`Clock`]
//! - `network`: [`MqttClient`] pub/sub client

pub mod hardware;
pub mod network;
pub mod transport;

pub use hardware::*;
pub use network::*;
pub use transport::*;
