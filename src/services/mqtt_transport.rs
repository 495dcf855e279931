//! [`Transport`] over any [`MqttClient`].
//!
//! Topics, with the default `sinric` prefix:
//!
//! - `sinric/request` - inbound requests (subscribed)
//! - `sinric/response` - responses, correlated by `requestId`
//! - `sinric/event` - outbound events
//!
//! Payloads use the JSON format in [`crate::messages`]. Inbound payloads
//! that do not parse are logged and skipped.
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::config::MqttConfig;
//! use rs_sinric::hal::MockMqtt;
//! use rs_sinric::services::MqttTransport;
//! use rs_sinric::traits::Transport;
//!
//! let mut transport = MqttTransport::new(MockMqtt::new(), &MqttConfig::default());
//! transport.subscribe().unwrap();
//!
//! transport.client_mut().queue_message("sinric/request", br#"{"requestId":"r-1","deviceId":"b",
//!     "capability":"RangeController","action":"setRangeValue","value":10}"#.to_vec());
//!
//! let inbound = transport.try_recv().unwrap();
//! assert_eq!(inbound.request.device_id, "b");
//! ```

use alloc::collections::VecDeque;
use alloc::string::String;

use crate::capability::{CapabilityEvent, Response};
use crate::config::MqttConfig;
use crate::error::DeviceError;
use crate::messages::{encode_event, encode_response, parse_request};
use crate::traits::{InboundRequest, MqttClient, Transport};

/// Requests remembered for response correlation.
const MAX_IN_FLIGHT: usize = 32;

/// Errors from the MQTT-backed transport.
#[derive(Debug, thiserror::Error)]
pub enum MqttTransportError<E: core::fmt::Debug> {
    /// The payload could not be encoded.
    #[error("encode failed: {0}")]
    Encode(DeviceError),
    /// The client refused the publish.
    #[error("publish failed: {0:?}")]
    Publish(E),
}

/// Device transport speaking JSON over MQTT topics.
pub struct MqttTransport<C: MqttClient> {
    client: C,
    request_topic: String,
    response_topic: String,
    event_topic: String,
    // request id -> device id, oldest first
    in_flight: VecDeque<(String, String)>,
}

impl<C: MqttClient> MqttTransport<C> {
    /// Wrap a client. Call [`subscribe`](Self::subscribe) before polling.
    pub fn new(client: C, config: &MqttConfig) -> Self {
        Self {
            client,
            request_topic: config.topic("request").as_str().into(),
            response_topic: config.topic("response").as_str().into(),
            event_topic: config.topic("event").as_str().into(),
            in_flight: VecDeque::new(),
        }
    }

    /// Subscribe to the request topic.
    pub fn subscribe(&mut self) -> Result<(), C::Error> {
        self.client.subscribe(&self.request_topic)?;
        tracing::info!(topic = %self.request_topic, "subscribed to requests");
        Ok(())
    }

    /// Get a reference to the MQTT client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get a mutable reference to the MQTT client.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    fn remember(&mut self, inbound: &InboundRequest) {
        if self.in_flight.len() == MAX_IN_FLIGHT {
            self.in_flight.pop_front();
        }
        self.in_flight
            .push_back((inbound.request_id.clone(), inbound.request.device_id.clone()));
    }

    fn take_device_id(&mut self, request_id: &str) -> Option<String> {
        let idx = self.in_flight.iter().position(|(id, _)| id == request_id)?;
        self.in_flight.remove(idx).map(|(_, device_id)| device_id)
    }
}

impl<C: MqttClient> Transport for MqttTransport<C> {
    type Error = MqttTransportError<C::Error>;

    fn push_event(&mut self, event: &CapabilityEvent) -> Result<(), Self::Error> {
        let payload = encode_event(event).map_err(MqttTransportError::Encode)?;
        self.client
            .publish(&self.event_topic, &payload, false)
            .map_err(MqttTransportError::Publish)
    }

    fn send_response(
        &mut self,
        request_id: &str,
        result: &Result<Response, DeviceError>,
    ) -> Result<(), Self::Error> {
        let device_id = self.take_device_id(request_id);
        let payload = encode_response(request_id, device_id.as_deref(), result)
            .map_err(MqttTransportError::Encode)?;
        self.client
            .publish(&self.response_topic, &payload, false)
            .map_err(MqttTransportError::Publish)
    }

    fn try_recv(&mut self) -> Option<InboundRequest> {
        while let Some(msg) = self.client.try_recv() {
            if msg.topic != self.request_topic {
                tracing::debug!(topic = %msg.topic, "ignoring message on foreign topic");
                continue;
            }
            match parse_request(&msg.payload) {
                Ok(inbound) => {
                    self.remember(&inbound);
                    return Some(inbound);
                }
                Err(err) => {
                    tracing::warn!(topic = %msg.topic, error = %err, "dropping malformed request");
                }
            }
        }
        None
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Cause;
    use crate::hal::MockMqtt;

    const SET_45: &[u8] = br#"{"requestId":"r-1","deviceId":"battery-1","capability":"RangeController","action":"setRangeValue","value":45}"#;

    fn transport() -> MqttTransport<MockMqtt> {
        MqttTransport::new(MockMqtt::new(), &MqttConfig::default())
    }

    #[test]
    fn subscribes_to_request_topic() {
        let mut t = transport();
        t.subscribe().unwrap();
        assert!(t.client().is_subscribed("sinric/request"));
    }

    #[test]
    fn skips_malformed_and_foreign_messages() {
        let mut t = transport();
        t.client_mut().queue_message("sinric/request", b"{oops".to_vec());
        t.client_mut().queue_message("other/topic", SET_45.to_vec());
        t.client_mut().queue_message("sinric/request", SET_45.to_vec());

        let inbound = t.try_recv().unwrap();
        assert_eq!(inbound.request_id, "r-1");
        assert!(t.try_recv().is_none());
    }

    #[test]
    fn response_carries_device_id() {
        let mut t = transport();
        t.client_mut().queue_message("sinric/request", SET_45.to_vec());
        let inbound = t.try_recv().unwrap();

        let result = Ok(Response {
            instance_id: String::new(),
            value: 45,
        });
        t.send_response(&inbound.request_id, &result).unwrap();

        let published = t.client().published_to("sinric/response");
        assert_eq!(published.len(), 1);
        let body = core::str::from_utf8(&published[0].1).unwrap();
        assert!(body.contains(r#""deviceId":"battery-1""#));
        assert!(body.contains(r#""success":true"#));
    }

    #[test]
    fn event_publish_failure_is_reported() {
        let mut t = transport();
        t.client_mut().connected = false;
        let event = CapabilityEvent {
            device_id: "battery-1".into(),
            capability: "RangeController",
            action: "setRangeValue",
            instance_id: String::new(),
            value: 10,
            cause: Cause::PhysicalInteraction,
        };
        assert!(matches!(t.push_event(&event), Err(MqttTransportError::Publish(()))));
        assert!(!t.is_connected());
    }

    #[test]
    fn in_flight_is_bounded() {
        let mut t = transport();
        for i in 0..(MAX_IN_FLIGHT + 5) {
            let body = alloc::format!(
                r#"{{"requestId":"r-{}","deviceId":"d","capability":"RangeController","action":"setRangeValue","value":1}}"#,
                i
            );
            t.client_mut().queue_message("sinric/request", body.into_bytes());
            t.try_recv().unwrap();
        }
        assert_eq!(t.in_flight.len(), MAX_IN_FLIGHT);
        assert_eq!(t.take_device_id("r-0"), None);
    }
}
