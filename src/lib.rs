//! # rs-sinric
//!
//! Device-side SDK for a cloud smart-home hub. A device type is a stable
//! identity plus a statically composed set of capabilities; each capability
//! answers its own inbound requests and pushes its own state changes upstream.
//!
//! ## Features
//!
//! - **Static composition**: capabilities attach through a tuple, register
//!   their (capability, action) handlers at construction, and never see each other
//! - **Range capability**: bounded integer values with clamping, step snapping,
//!   named instances, and an application-supplied apply callback
//! - **Reliable reporting**: a value stays dirty until the transport accepts
//!   its event, so a failed push is retried on the next report
//! - **Battery device**: one range instance carrying the charge level
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `capability` - Message types and the composition traits
//! - `device` - Identity, handler table, dispatch, and emission
//! - `range` - The range controller capability
//! - `battery` - The `Battery` device type
//! - `runner` - Cooperative control loop
//! - `traits` - Transport, hardware, and MQTT abstractions
//! - `hal` - Concrete implementations (mocks for testing, system clock)
//!
//! ## Example
//!
//! ```rust
//! use rs_sinric::{Battery, CapabilityRequest, Cause, ReportOutcome};
//! use rs_sinric::hal::{MockApplier, MockTransport};
//!
//! let mut battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let mut transport = MockTransport::new();
//!
//! // The hub asks for 45%
//! let req = CapabilityRequest::set_range_value("battery-1", "", 45);
//! let resp = battery.dispatch(&mut transport, &req, 0).unwrap();
//! assert_eq!(resp.value, 45);
//!
//! // The hardware reads 44%
//! let outcome = battery.report_range_value(&mut transport, "", 44, Cause::PeriodicPoll, 1000);
//! assert_eq!(outcome, Ok(ReportOutcome::Sent));
//! assert_eq!(transport.events[0].value, 44);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// The `Battery` device type.
pub mod battery;
/// Capability message types and the static composition traits.
pub mod capability;
/// Device identity, request routing, and event emission.
pub mod device;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// The bounded-range capability.
pub mod range;
/// Cooperative control loop.
pub mod runner;
/// Core traits for transport, hardware, and MQTT abstraction.
pub mod traits;

/// Shared configuration for hosted and embedded builds.
pub mod config;

/// JSON wire format for requests, responses, and events.
#[cfg(feature = "json")]
pub mod messages;

/// Host-side services: MQTT transport and thread-safe sharing (feature-gated).
#[cfg(any(feature = "std", feature = "json"))]
pub mod services;

// Re-exports for convenience
pub use battery::{Battery, BATTERY_PRODUCT_TYPE};
pub use capability::{
    Capabilities, Capability, CapabilityEvent, CapabilityRequest, Cause, HandlerSlot,
    PendingReport, RequestValue, Response,
};
pub use device::{
    Device, DeviceHandle, DeviceIdentity, Emitter, EventSink, SinkDispatch, MAX_HANDLERS,
};
pub use error::DeviceError;
pub use range::{
    normalize, PollSummary, RangeController, RangeSpec, RangeState, ReportOutcome,
    ReportStage, ADJUST_RANGE_VALUE, RANGE_CONTROLLER, SET_RANGE_VALUE,
};
pub use runner::ControlLoop;
pub use traits::{
    Clock, InboundRequest, MqttClient, MqttMessage, RangeApplier, RangeSensor, Transport,
};

// Config re-exports
pub use config::{Config, ControlConfig, DeviceConfig, MqttConfig, RangeConfig};

// Wire format re-exports
#[cfg(feature = "json")]
pub use messages::{encode_event, encode_response, parse_request};
