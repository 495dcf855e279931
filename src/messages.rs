//! JSON wire format for requests, responses, and events.
//!
//! Field names are camelCase. An empty instance id is omitted on output
//! and a missing one reads as `""`.
//!
//! Request (hub to device):
//! ```json
//! {"requestId": "r-1", "deviceId": "battery-1", "capability": "RangeController",
//!  "action": "adjustRangeValue", "instanceId": "", "valueDelta": -10}
//! ```
//!
//! Response (device to hub):
//! ```json
//! {"requestId": "r-1", "success": true, "deviceId": "battery-1", "value": 35}
//! ```
//!
//! Event (device to hub):
//! ```json
//! {"deviceId": "battery-1", "capability": "RangeController", "action": "setRangeValue",
//!  "value": 35, "cause": "PERIODIC_POLL"}
//! ```
//!
//! # Example
//!
//! ```
//! use rs_sinric::messages::parse_request;
//! use rs_sinric::RequestValue;
//!
//! let inbound = parse_request(br#"{
//!     "requestId": "r-1", "deviceId": "battery-1",
//!     "capability": "RangeController", "action": "setRangeValue", "value": 45
//! }"#).unwrap();
//!
//! assert_eq!(inbound.request_id, "r-1");
//! assert_eq!(inbound.request.instance_id, "");
//! assert_eq!(inbound.request.value, RequestValue::Absolute(45));
//! ```

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::capability::{CapabilityEvent, CapabilityRequest, Cause, RequestValue, Response};
use crate::error::DeviceError;
use crate::traits::InboundRequest;

fn is_empty(s: &&str) -> bool {
    s.is_empty()
}

// ============================================================================
// Request
// ============================================================================

/// Inbound request as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    /// Correlates the response.
    pub request_id: String,
    /// Target device.
    pub device_id: String,
    /// Capability tag.
    pub capability: String,
    /// Action tag.
    pub action: String,
    /// Range instance.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    /// Absolute value, for set actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    /// Signed delta, for adjust actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_delta: Option<i32>,
}

impl WireRequest {
    /// Convert to a routed request. Exactly one of `value` or
    /// `valueDelta` must be present.
    pub fn into_inbound(self) -> Result<InboundRequest, DeviceError> {
        let value = match (self.value, self.value_delta) {
            (Some(value), None) => RequestValue::Absolute(value),
            (None, Some(delta)) => RequestValue::Delta(delta),
            (Some(_), Some(_)) => {
                return Err(DeviceError::MalformedMessage(
                    "both value and valueDelta present".to_string(),
                ))
            }
            (None, None) => {
                return Err(DeviceError::MalformedMessage(
                    "missing value or valueDelta".to_string(),
                ))
            }
        };
        let request = CapabilityRequest::new(self.device_id, self.capability, self.action, value)
            .with_instance(self.instance_id);
        Ok(InboundRequest::new(self.request_id, request))
    }
}

impl From<&InboundRequest> for WireRequest {
    fn from(inbound: &InboundRequest) -> Self {
        let req = &inbound.request;
        let (value, value_delta) = match req.value {
            RequestValue::Absolute(v) => (Some(v), None),
            RequestValue::Delta(d) => (None, Some(d)),
        };
        Self {
            request_id: inbound.request_id.clone(),
            device_id: req.device_id.clone(),
            capability: req.capability.clone(),
            action: req.action.clone(),
            instance_id: req.instance_id.clone(),
            value,
            value_delta,
        }
    }
}

/// Parse an inbound request payload.
pub fn parse_request(payload: &[u8]) -> Result<InboundRequest, DeviceError> {
    let wire: WireRequest = serde_json::from_slice(payload)
        .map_err(|e| DeviceError::MalformedMessage(format!("request: {}", e)))?;
    wire.into_inbound()
}

/// Encode a request, as the hub would send it.
pub fn encode_request(inbound: &InboundRequest) -> Result<Vec<u8>, DeviceError> {
    serde_json::to_vec(&WireRequest::from(inbound))
        .map_err(|e| DeviceError::MalformedMessage(format!("request: {}", e)))
}

// ============================================================================
// Response
// ============================================================================

/// Outbound response as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    /// Request this answers.
    pub request_id: String,
    /// Whether the action was applied.
    pub success: bool,
    /// Answering device, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Range instance.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    /// Applied value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireResponse {
    /// Build from a dispatch result.
    pub fn from_result(
        request_id: &str,
        device_id: Option<&str>,
        result: &Result<Response, DeviceError>,
    ) -> Self {
        let (success, instance_id, value, error) = match result {
            Ok(resp) => (true, resp.instance_id.clone(), Some(resp.value), None),
            Err(err) => (false, String::new(), None, Some(err.to_string())),
        };
        Self {
            request_id: request_id.into(),
            success,
            device_id: device_id.map(String::from),
            instance_id,
            value,
            error,
        }
    }
}

/// Encode a response payload.
pub fn encode_response(
    request_id: &str,
    device_id: Option<&str>,
    result: &Result<Response, DeviceError>,
) -> Result<Vec<u8>, DeviceError> {
    serde_json::to_vec(&WireResponse::from_result(request_id, device_id, result))
        .map_err(|e| DeviceError::MalformedMessage(format!("response: {}", e)))
}

// ============================================================================
// Event
// ============================================================================

/// Outbound event as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent<'a> {
    /// Reporting device.
    pub device_id: &'a str,
    /// Capability tag.
    pub capability: &'a str,
    /// Action tag.
    pub action: &'a str,
    /// Range instance.
    #[serde(skip_serializing_if = "is_empty")]
    pub instance_id: &'a str,
    /// New value.
    pub value: i32,
    /// Why it changed.
    pub cause: Cause,
}

impl<'a> From<&'a CapabilityEvent> for WireEvent<'a> {
    fn from(event: &'a CapabilityEvent) -> Self {
        Self {
            device_id: &event.device_id,
            capability: event.capability,
            action: event.action,
            instance_id: &event.instance_id,
            value: event.value,
            cause: event.cause,
        }
    }
}

/// Encode an event payload.
///
/// ```
/// use rs_sinric::{CapabilityEvent, Cause};
/// use rs_sinric::messages::encode_event;
///
/// let event = CapabilityEvent {
///     device_id: "battery-1".into(),
///     capability: "RangeController",
///     action: "setRangeValue",
///     instance_id: String::new(),
///     value: 80,
///     cause: Cause::PeriodicPoll,
/// };
/// let json = String::from_utf8(encode_event(&event).unwrap()).unwrap();
/// assert!(json.contains(r#""cause":"PERIODIC_POLL""#));
/// assert!(!json.contains("instanceId"));
/// ```
pub fn encode_event(event: &CapabilityEvent) -> Result<Vec<u8>, DeviceError> {
    serde_json::to_vec(&WireEvent::from(event))
        .map_err(|e| DeviceError::MalformedMessage(format!("event: {}", e)))
}
