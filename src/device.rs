//! Device identity, request routing, and event emission.
//!
//! [`DeviceIdentity`] holds the stable id and the handler table. It routes
//! inbound [`CapabilityRequest`]s to the capability registered for their
//! (capability, action) key and forwards outbound [`CapabilityEvent`]s to
//! the transport. [`Device`] pairs an identity with a statically composed
//! capability tuple.
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::{Device, RangeController, RangeSpec, CapabilityRequest, DeviceError};
//! use rs_sinric::hal::{MockApplier, MockTransport};
//!
//! let range = RangeController::new(MockApplier::new())
//!     .with_instance(RangeSpec::new("", 0, 10))
//!     .unwrap();
//! let mut device = Device::new("dev-1", "Dimmer", (range,)).unwrap();
//! let mut transport = MockTransport::new();
//!
//! let req = CapabilityRequest::set_range_value("dev-1", "", 42);
//! let resp = device.dispatch(&mut transport, &req, 0).unwrap();
//! assert_eq!(resp.value, 10); // clamped
//!
//! let req = CapabilityRequest::new(
//!     "dev-1",
//!     "PowerController",
//!     "setPowerState",
//!     rs_sinric::RequestValue::Absolute(1),
//! );
//! assert!(matches!(
//!     device.dispatch(&mut transport, &req, 0),
//!     Err(DeviceError::UnsupportedAction { .. })
//! ));
//! ```

use alloc::string::String;

use crate::capability::{
    Capabilities, CapabilityEvent, CapabilityRequest, HandlerSlot, PendingReport, Response,
};
use crate::error::DeviceError;
use crate::traits::Transport;

/// Maximum number of (capability, action) handlers per device.
pub const MAX_HANDLERS: usize = 16;

#[derive(Clone, Copy, Debug)]
struct HandlerEntry {
    capability: &'static str,
    action: &'static str,
    slot: HandlerSlot,
}

/// Stable device identity plus its routing table.
///
/// The id never changes after construction. Handler entries are added
/// during composition and never removed.
#[derive(Debug)]
pub struct DeviceIdentity {
    id: String,
    product_type: &'static str,
    handlers: heapless::Vec<HandlerEntry, MAX_HANDLERS>,
}

impl DeviceIdentity {
    /// Create an identity with an empty handler table.
    pub fn new(id: impl Into<String>, product_type: &'static str) -> Self {
        Self {
            id: id.into(),
            product_type,
            handlers: heapless::Vec::new(),
        }
    }

    /// The externally assigned device id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Product type tag, e.g. `"Battery"`.
    pub fn product_type(&self) -> &'static str {
        self.product_type
    }

    /// Register the handler for one (capability, action) pair.
    ///
    /// Duplicates are a composition mistake and fail with
    /// [`DeviceError::DuplicateHandler`].
    pub fn register_handler(
        &mut self,
        capability: &'static str,
        action: &'static str,
        slot: HandlerSlot,
    ) -> Result<(), DeviceError> {
        if self.handler(capability, action).is_some() {
            return Err(DeviceError::DuplicateHandler { capability, action });
        }
        self.handlers
            .push(HandlerEntry {
                capability,
                action,
                slot,
            })
            .map_err(|_| DeviceError::HandlerTableFull)?;
        tracing::debug!(device_id = %self.id, capability, action, "handler registered");
        Ok(())
    }

    /// Look up the slot registered for a (capability, action) pair.
    pub fn handler(&self, capability: &str, action: &str) -> Option<HandlerSlot> {
        self.handlers
            .iter()
            .find(|entry| entry.capability == capability && entry.action == action)
            .map(|entry| entry.slot)
    }

    /// Returns true if some capability answers this pair.
    pub fn supports(&self, capability: &str, action: &str) -> bool {
        self.handler(capability, action).is_some()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Route a request to the capability that registered its key.
    ///
    /// Runs the handler synchronously and returns its result. Requests for
    /// another device id fail with [`DeviceError::UnknownDevice`], and keys
    /// nobody registered with [`DeviceError::UnsupportedAction`]; neither
    /// touches capability state.
    pub fn dispatch<C, S>(
        &self,
        capabilities: &mut C,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError>
    where
        C: Capabilities,
        S: EventSink + ?Sized,
    {
        if request.device_id != self.id {
            return Err(DeviceError::UnknownDevice(request.device_id.clone()));
        }
        let Some(slot) = self.handler(&request.capability, &request.action) else {
            tracing::warn!(
                device_id = %self.id,
                capability = %request.capability,
                action = %request.action,
                "no handler for request"
            );
            return Err(DeviceError::UnsupportedAction {
                capability: request.capability.clone(),
                action: request.action.clone(),
            });
        };
        tracing::debug!(
            device_id = %self.id,
            action = %request.action,
            instance_id = %request.instance_id,
            "dispatching request"
        );
        capabilities.handle(slot, request, sink)
    }

    /// Forward an event to the transport.
    ///
    /// Failures are reported, never retried here.
    pub fn emit<T: Transport>(
        &self,
        transport: &mut T,
        event: &CapabilityEvent,
    ) -> Result<(), DeviceError> {
        push_event(transport, event)
    }
}

/// Push an event, mapping the transport's error into
/// [`DeviceError::TransportUnavailable`].
pub(crate) fn push_event<T: Transport>(
    transport: &mut T,
    event: &CapabilityEvent,
) -> Result<(), DeviceError> {
    match transport.push_event(event) {
        Ok(()) => {
            tracing::debug!(
                device_id = %event.device_id,
                instance_id = %event.instance_id,
                value = event.value,
                cause = event.cause.as_str(),
                "event sent"
            );
            Ok(())
        }
        Err(err) => {
            let err = DeviceError::transport(err);
            tracing::warn!(device_id = %event.device_id, error = %err, "event not sent");
            Err(err)
        }
    }
}

// ============================================================================
// Event Sink
// ============================================================================

/// The surface a capability uses to reach its owning device.
///
/// Handed to capabilities for the duration of one call, so they can push
/// events without holding a reference to the identity or the transport.
pub trait EventSink {
    /// Id of the device the capability is attached to.
    fn device_id(&self) -> &str;

    /// Current time in milliseconds, for rate limiting.
    fn now_ms(&self) -> u64;

    /// Push an event upstream.
    fn emit(&mut self, event: &CapabilityEvent) -> Result<(), DeviceError>;

    /// Keep a staged report to push after the current call returns.
    ///
    /// Sinks that push immediately hand the report back, and the caller
    /// emits and settles it itself. A sink that keeps it must later pass
    /// the push result to [`Capability::settle_report`].
    ///
    /// [`Capability::settle_report`]: crate::capability::Capability::settle_report
    fn queue_report(&mut self, report: PendingReport) -> Result<(), PendingReport> {
        Err(report)
    }
}

/// [`EventSink`] bound to one identity and one transport.
pub struct Emitter<'a, T: Transport> {
    identity: &'a DeviceIdentity,
    transport: &'a mut T,
    now_ms: u64,
}

impl<'a, T: Transport> Emitter<'a, T> {
    /// Create a sink for a single call.
    pub fn new(identity: &'a DeviceIdentity, transport: &'a mut T, now_ms: u64) -> Self {
        Self {
            identity,
            transport,
            now_ms,
        }
    }
}

impl<T: Transport> EventSink for Emitter<'_, T> {
    fn device_id(&self) -> &str {
        self.identity.id()
    }

    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn emit(&mut self, event: &CapabilityEvent) -> Result<(), DeviceError> {
        self.identity.emit(self.transport, event)
    }
}

// ============================================================================
// Device
// ============================================================================

/// A device identity with a statically composed set of capabilities.
///
/// Exactly one identity backs every attached capability.
pub struct Device<C: Capabilities> {
    identity: DeviceIdentity,
    capabilities: C,
}

impl<C: Capabilities> Device<C> {
    /// Compose a device and register every capability's handlers.
    pub fn new(
        id: impl Into<String>,
        product_type: &'static str,
        capabilities: C,
    ) -> Result<Self, DeviceError> {
        let mut identity = DeviceIdentity::new(id, product_type);
        capabilities.register_into(&mut identity)?;
        Ok(Self {
            identity,
            capabilities,
        })
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Shorthand for `identity().id()`.
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    /// The attached capabilities.
    pub fn capabilities(&self) -> &C {
        &self.capabilities
    }

    /// Mutable access to the attached capabilities.
    pub fn capabilities_mut(&mut self) -> &mut C {
        &mut self.capabilities
    }

    /// Borrow the identity and the capabilities at the same time.
    pub fn split_mut(&mut self) -> (&DeviceIdentity, &mut C) {
        (&self.identity, &mut self.capabilities)
    }

    /// Dispatch an inbound request through the identity's handler table.
    pub fn dispatch<T: Transport>(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        let mut sink = Emitter::new(&self.identity, transport, now_ms);
        self.identity
            .dispatch(&mut self.capabilities, request, &mut sink)
    }
}

/// Dispatch against a sink chosen by the caller.
///
/// Used by hosts that must not push while holding a lock: they dispatch
/// into a queueing sink, push what it collected, then settle each queued
/// report.
pub trait SinkDispatch {
    /// Route `request` with events going to `sink`.
    fn dispatch_with<S: EventSink + ?Sized>(
        &mut self,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError>;

    /// Pass a queued report's push result to the capability that staged it.
    fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64);
}

impl<C: Capabilities> SinkDispatch for Device<C> {
    fn dispatch_with<S: EventSink + ?Sized>(
        &mut self,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError> {
        self.identity.dispatch(&mut self.capabilities, request, sink)
    }

    fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64) {
        self.capabilities.settle_report(report, delivered, now_ms);
    }
}

/// Object-safe view of a device for the control loop's device list.
pub trait DeviceHandle<T: Transport> {
    /// Id used to route inbound requests.
    fn device_id(&self) -> &str;

    /// Handle one inbound request.
    fn handle_request(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError>;
}

impl<T: Transport, C: Capabilities> DeviceHandle<T> for Device<C> {
    fn device_id(&self) -> &str {
        self.id()
    }

    fn handle_request(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        self.dispatch(transport, request, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Cause, RequestValue};
    use crate::hal::MockTransport;

    #[test]
    fn duplicate_registration_rejected() {
        let mut identity = DeviceIdentity::new("dev", "Battery");
        identity
            .register_handler("RangeController", "setRangeValue", HandlerSlot(0))
            .unwrap();
        let err = identity
            .register_handler("RangeController", "setRangeValue", HandlerSlot(1))
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::DuplicateHandler {
                capability: "RangeController",
                action: "setRangeValue",
            }
        );
        assert_eq!(identity.handler_count(), 1);
    }

    #[test]
    fn handler_lookup_by_key() {
        let mut identity = DeviceIdentity::new("dev", "Battery");
        identity
            .register_handler("RangeController", "adjustRangeValue", HandlerSlot(2))
            .unwrap();
        assert_eq!(
            identity.handler("RangeController", "adjustRangeValue"),
            Some(HandlerSlot(2))
        );
        assert!(!identity.supports("RangeController", "setRangeValue"));
    }

    #[test]
    fn handler_table_capacity() {
        const ACTIONS: [&str; MAX_HANDLERS + 1] = [
            "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10", "a11", "a12",
            "a13", "a14", "a15", "a16",
        ];
        let mut identity = DeviceIdentity::new("dev", "Battery");
        for action in &ACTIONS[..MAX_HANDLERS] {
            identity.register_handler("Cap", action, HandlerSlot(0)).unwrap();
        }
        assert_eq!(
            identity.register_handler("Cap", ACTIONS[MAX_HANDLERS], HandlerSlot(0)),
            Err(DeviceError::HandlerTableFull)
        );
    }

    #[test]
    fn emit_reports_transport_failure() {
        let identity = DeviceIdentity::new("dev", "Battery");
        let mut transport = MockTransport::new();
        transport.connected = false;

        let event = CapabilityEvent {
            device_id: "dev".into(),
            capability: "RangeController",
            action: "setRangeValue",
            instance_id: String::new(),
            value: 5,
            cause: Cause::PeriodicPoll,
        };
        let err = identity.emit(&mut transport, &event).unwrap_err();
        assert!(err.is_retryable());
        assert!(transport.events.is_empty());
    }

    #[test]
    fn emitter_exposes_identity_and_time() {
        let identity = DeviceIdentity::new("dev-9", "Battery");
        let mut transport = MockTransport::new();
        let sink = Emitter::new(&identity, &mut transport, 1234);
        assert_eq!(sink.device_id(), "dev-9");
        assert_eq!(sink.now_ms(), 1234);
    }

    #[test]
    fn request_for_other_device_rejected() {
        let identity = DeviceIdentity::new("dev", "Battery");
        let mut transport = MockTransport::new();
        let mut sink = Emitter::new(&identity, &mut transport, 0);
        let mut caps = (crate::RangeController::new(crate::hal::MockApplier::new()),);
        let req = CapabilityRequest::new(
            "other",
            "RangeController",
            "setRangeValue",
            RequestValue::Absolute(1),
        );
        assert_eq!(
            identity.dispatch(&mut caps, &req, &mut sink),
            Err(DeviceError::UnknownDevice("other".into()))
        );
    }
}
