//! Transport boundary between devices and the cloud hub.
//!
//! The transport owns connectivity, authentication, and framing. Devices
//! only see three operations: push an event, answer a request, and pick up
//! the next inbound request. Delivery of pushed events is not guaranteed;
//! range reporting keeps a dirty flag to compensate.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use rs_sinric::traits::{InboundRequest, Transport};
//! use rs_sinric::{CapabilityEvent, DeviceError, Response};
//!
//! struct Websocket { /* session handle */ }
//!
//! impl Transport for Websocket {
//!     type Error = std::io::Error;
//!
//!     fn push_event(&mut self, event: &CapabilityEvent) -> Result<(), Self::Error> {
//!         // Frame and write the event...
//!         Ok(())
//!     }
//!
//!     fn send_response(
//!         &mut self,
//!         request_id: &str,
//!         result: &Result<Response, DeviceError>,
//!     ) -> Result<(), Self::Error> {
//!         // Frame and write the response...
//!         Ok(())
//!     }
//!
//!     fn try_recv(&mut self) -> Option<InboundRequest> {
//!         None
//!     }
//!
//!     fn is_connected(&self) -> bool {
//!         true
//!     }
//! }
//! ```

use alloc::string::String;

use crate::capability::{CapabilityEvent, CapabilityRequest, Response};
use crate::error::DeviceError;

/// Request/response plus push-event channel to the hub.
///
/// All methods are synchronous. `push_event` and `send_response` may block
/// on the network write but must return in bounded time; `try_recv` must
/// never block.
pub trait Transport {
    /// Error type for transport operations.
    type Error: core::fmt::Debug;

    /// Push a state-change event upstream.
    fn push_event(&mut self, event: &CapabilityEvent) -> Result<(), Self::Error>;

    /// Answer an inbound request.
    fn send_response(
        &mut self,
        request_id: &str,
        result: &Result<Response, DeviceError>,
    ) -> Result<(), Self::Error>;

    /// Take the next inbound request, if any (non-blocking).
    fn try_recv(&mut self) -> Option<InboundRequest>;

    /// Check whether the session is up.
    fn is_connected(&self) -> bool;
}

/// An inbound request together with the id its response must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundRequest {
    /// Correlation id assigned by the hub.
    pub request_id: String,
    /// The decoded request.
    pub request: CapabilityRequest,
}

impl InboundRequest {
    /// Pair a request with its correlation id.
    pub fn new(request_id: impl Into<String>, request: CapabilityRequest) -> Self {
        Self {
            request_id: request_id.into(),
            request,
        }
    }
}
