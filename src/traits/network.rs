//! Pub/sub client abstraction used by the MQTT-backed transport.
//!
//! [`MqttTransport`](crate::services::MqttTransport) layers the device
//! [`Transport`](super::Transport) on top of any [`MqttClient`]:
//!
//! ```text
//! sinric/request   - inbound capability requests (JSON)
//! sinric/response  - responses, correlated by requestId
//! sinric/event     - outbound capability events
//! ```

use alloc::string::String;
use alloc::vec::Vec;

/// MQTT client trait for pub/sub messaging.
///
/// This trait uses a **sync-first design** that works on both ESP32
/// (blocking I/O) and desktop.
///
/// # Implementation Notes
///
/// - `publish` and `subscribe` are synchronous (blocking on ESP32)
/// - `try_recv` is non-blocking for polling patterns
/// - The client should handle reconnection internally
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Publish a message to a topic (blocking).
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic (blocking).
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    ///
    /// Returns `None` if no message is available. This should never block.
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}
