//! Host-side services: the MQTT transport and thread-safe device sharing.
//!
//! - `json` feature: [`MqttTransport`] speaks the JSON wire format over any
//!   [`MqttClient`](crate::traits::MqttClient)
//! - `std` feature: [`SharedDevice`] wraps a device in a mutex for
//!   multi-threaded hosts
//! - `mqtt` feature: [`RumqttClient`] connects to a real broker

#[cfg(feature = "json")]
pub mod mqtt_transport;

#[cfg(feature = "std")]
pub mod shared;

#[cfg(feature = "mqtt")]
pub mod rumqtt;

#[cfg(feature = "json")]
pub use mqtt_transport::*;

#[cfg(feature = "std")]
pub use shared::*;

#[cfg(feature = "mqtt")]
pub use rumqtt::*;
