//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without physical hardware.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockApplier`] | [`RangeApplier`] | Records applied values, can reject |
//! | [`MockSensor`] | [`RangeSensor`] | Scripted readings per instance |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockTransport`] | [`Transport`] | Captures events/responses, queued requests |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::{Battery, CapabilityRequest};
//! use rs_sinric::hal::{MockApplier, MockTransport};
//!
//! let mut battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let mut transport = MockTransport::new();
//!
//! let req = CapabilityRequest::set_range_value("battery-1", "", 30);
//! battery.dispatch(&mut transport, &req, 0).unwrap();
//!
//! assert_eq!(battery.range().applier().last(), Some(30));
//! ```
//!
//! [`RangeApplier`]: crate::traits::RangeApplier
//! [`RangeSensor`]: crate::traits::RangeSensor
//! [`Clock`]: crate::traits::Clock
//! [`Transport`]: crate::traits::Transport
//! [`MqttClient`]: crate::traits::MqttClient

use alloc::string::String;
use alloc::vec::Vec;

use crate::capability::{CapabilityEvent, Response};
use crate::error::DeviceError;
use crate::traits::{
    Clock, InboundRequest, MqttClient, MqttMessage, RangeApplier, RangeSensor, Transport,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock apply callback.
///
/// Records every value it accepts. Set `reject` to make it fail.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::MockApplier;
/// use rs_sinric::traits::RangeApplier;
///
/// let mut applier = MockApplier::new();
/// applier.apply_range_value("", 40).unwrap();
///
/// applier.reject = true;
/// assert!(applier.apply_range_value("", 50).is_err());
///
/// assert_eq!(applier.calls, 2);
/// assert_eq!(applier.last(), Some(40));
/// ```
#[derive(Debug, Default)]
pub struct MockApplier {
    /// Accepted (instance id, value) pairs, oldest first.
    pub applied: Vec<(String, i32)>,
    /// Reject every value while true.
    pub reject: bool,
    /// Number of times the callback ran, accepted or not.
    pub calls: usize,
}

impl MockApplier {
    /// Creates an applier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an applier that rejects everything.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Last accepted value, for any instance.
    pub fn last(&self) -> Option<i32> {
        self.applied.last().map(|(_, value)| *value)
    }
}

impl RangeApplier for MockApplier {
    type Error = ();

    fn apply_range_value(&mut self, instance_id: &str, value: i32) -> Result<(), ()> {
        self.calls += 1;
        if self.reject {
            return Err(());
        }
        self.applied.push((instance_id.into(), value));
        Ok(())
    }
}

/// Mock sensor with one scripted reading per instance.
///
/// Instances without a reading fail to read.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::MockSensor;
/// use rs_sinric::traits::RangeSensor;
///
/// let mut sensor = MockSensor::new().with_reading("", 87);
/// assert_eq!(sensor.read_range_value(""), Ok(87));
/// assert!(sensor.read_range_value("cell-2").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MockSensor {
    /// Current (instance id, reading) pairs.
    pub readings: Vec<(String, i32)>,
    /// Number of reads performed.
    pub reads: usize,
}

impl MockSensor {
    /// Creates a sensor with no readings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reading for an instance (builder form).
    pub fn with_reading(mut self, instance_id: &str, value: i32) -> Self {
        self.set(instance_id, value);
        self
    }

    /// Set the reading for an instance.
    pub fn set(&mut self, instance_id: &str, value: i32) {
        match self.readings.iter_mut().find(|(id, _)| id == instance_id) {
            Some((_, reading)) => *reading = value,
            None => self.readings.push((instance_id.into(), value)),
        }
    }

    /// Remove the reading for an instance, making reads fail.
    pub fn clear(&mut self, instance_id: &str) {
        self.readings.retain(|(id, _)| id != instance_id);
    }
}

impl RangeSensor for MockSensor {
    type Error = ();

    fn read_range_value(&mut self, instance_id: &str) -> Result<i32, ()> {
        self.reads += 1;
        self.readings
            .iter()
            .find(|(id, _)| id == instance_id)
            .map(|(_, value)| *value)
            .ok_or(())
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::MockClock;
/// use rs_sinric::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock transport for testing.
///
/// Records pushed events and sent responses, and hands out queued inbound
/// requests in FIFO order. While `connected` is false every push and send
/// fails and nothing is recorded.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::MockTransport;
/// use rs_sinric::traits::{InboundRequest, Transport};
/// use rs_sinric::CapabilityRequest;
///
/// let mut transport = MockTransport::new();
/// transport.queue_request("req-1", CapabilityRequest::set_range_value("dev", "", 5));
///
/// let inbound = transport.try_recv().unwrap();
/// assert_eq!(inbound.request_id, "req-1");
/// assert!(transport.try_recv().is_none());
/// ```
#[derive(Debug)]
pub struct MockTransport {
    /// Events accepted by `push_event`, oldest first.
    pub events: Vec<CapabilityEvent>,
    /// Responses accepted by `send_response` as (request id, result).
    pub responses: Vec<(String, Result<Response, DeviceError>)>,
    /// Inbound requests waiting to be received.
    pub incoming: Vec<InboundRequest>,
    /// Whether the session is up.
    pub connected: bool,
    /// Number of push attempts, successful or not.
    pub push_attempts: usize,
}

impl MockTransport {
    /// Creates a new mock transport in connected state.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            responses: Vec::new(),
            incoming: Vec::new(),
            connected: true,
            push_attempts: 0,
        }
    }

    /// Queue an inbound request.
    pub fn queue_request(
        &mut self,
        request_id: impl Into<String>,
        request: crate::capability::CapabilityRequest,
    ) {
        self.incoming.push(InboundRequest::new(request_id, request));
    }

    /// Response sent for a request id, if any.
    pub fn response_for(&self, request_id: &str) -> Option<&Result<Response, DeviceError>> {
        self.responses
            .iter()
            .find(|(id, _)| id == request_id)
            .map(|(_, result)| result)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn push_event(&mut self, event: &CapabilityEvent) -> Result<(), ()> {
        self.push_attempts += 1;
        if !self.connected {
            return Err(());
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn send_response(
        &mut self,
        request_id: &str,
        result: &Result<Response, DeviceError>,
    ) -> Result<(), ()> {
        if !self.connected {
            return Err(());
        }
        self.responses.push((request_id.into(), result.clone()));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<InboundRequest> {
        if self.incoming.is_empty() {
            None
        } else {
            Some(self.incoming.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations and allows injecting
/// incoming messages for testing message handling.
///
/// # Example
///
/// ```rust
/// use rs_sinric::hal::MockMqtt;
/// use rs_sinric::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
///
/// // Queue incoming message
/// mqtt.queue_message("sinric/request", b"{}".to_vec());
/// assert!(mqtt.try_recv().is_some());
///
/// // Check published messages
/// mqtt.publish("sinric/event", b"{}", false).unwrap();
/// assert_eq!(mqtt.published_to("sinric/event").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages to be returned by `try_recv()`.
    pub incoming: Vec<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ()> {
        if !self.connected {
            return Err(());
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        if self.incoming.is_empty() {
            None
        } else {
            Some(self.incoming.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
