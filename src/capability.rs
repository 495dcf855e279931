//! Capability messages and the static composition mechanism.
//!
//! A capability is a reusable unit of device behavior (a bounded range, a
//! power switch, ...). Each one implements [`Capability`]: it names itself,
//! lists the actions it answers, and handles requests for those actions.
//! A device type is a [`DeviceIdentity`] plus a tuple of capabilities; the
//! tuple implements [`Capabilities`], which registers every action into the
//! identity's handler table at construction and routes dispatched requests
//! to the right tuple slot. Wiring is resolved at compile time: there is no
//! runtime type discovery and no boxing.
//!
//! ```rust
//! use rs_sinric::{Device, DeviceError, RangeController};
//! use rs_sinric::hal::MockApplier;
//!
//! // Two range controllers cannot share one device: both would claim
//! // RangeController/setRangeValue. Use range instances instead.
//! let a = RangeController::new(MockApplier::new());
//! let b = RangeController::new(MockApplier::new());
//! assert!(matches!(
//!     Device::new("dev-1", "Multi", (a, b)),
//!     Err(DeviceError::DuplicateHandler { .. })
//! ));
//! ```
//!
//! [`DeviceIdentity`]: crate::device::DeviceIdentity

use alloc::string::String;

use crate::device::{DeviceIdentity, EventSink};
use crate::error::DeviceError;

// ============================================================================
// Messages
// ============================================================================

/// Why a value changed, carried on every outbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Cause {
    /// Someone touched the device (button, dial, plugging in a charger).
    PhysicalInteraction,
    /// A periodic hardware read found a new value.
    PeriodicPoll,
    /// The value changed because the app or a voice assistant asked.
    AppInteraction,
}

impl Cause {
    /// Returns the wire tag for this cause.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_sinric::Cause;
    ///
    /// assert_eq!(Cause::PeriodicPoll.as_str(), "PERIODIC_POLL");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Cause::PhysicalInteraction => "PHYSICAL_INTERACTION",
            Cause::PeriodicPoll => "PERIODIC_POLL",
            Cause::AppInteraction => "APP_INTERACTION",
        }
    }

    /// Parse a cause from its wire tag, trimmed and case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_sinric::Cause;
    ///
    /// assert_eq!(Cause::from_text("physical_interaction"), Some(Cause::PhysicalInteraction));
    /// assert_eq!(Cause::from_text(" APP_INTERACTION "), Some(Cause::AppInteraction));
    /// assert_eq!(Cause::from_text("alarm"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            Cause::PhysicalInteraction,
            Cause::PeriodicPoll,
            Cause::AppInteraction,
        ]
        .into_iter()
        .find(|cause| cause.as_str().eq_ignore_ascii_case(s))
    }
}

/// Integer payload of an inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestValue {
    /// Set to this value.
    Absolute(i32),
    /// Move by this much (may be negative).
    Delta(i32),
}

/// One inbound capability-scoped request. Lives for a single dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityRequest {
    /// Device the request is addressed to.
    pub device_id: String,
    /// Capability tag, e.g. `"RangeController"`.
    pub capability: String,
    /// Action tag, e.g. `"setRangeValue"`.
    pub action: String,
    /// Range instance; `""` for single-instance devices.
    pub instance_id: String,
    /// Requested value or delta.
    pub value: RequestValue,
}

impl CapabilityRequest {
    /// Create a request for the default (`""`) instance.
    pub fn new(
        device_id: impl Into<String>,
        capability: impl Into<String>,
        action: impl Into<String>,
        value: RequestValue,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            capability: capability.into(),
            action: action.into(),
            instance_id: String::new(),
            value,
        }
    }

    /// Address the request to a named instance.
    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }
}

/// Successful result of a dispatched request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    /// Instance the value applies to.
    pub instance_id: String,
    /// Value actually applied (after clamping).
    pub value: i32,
}

/// One outbound state-change notification. Lives for a single emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityEvent {
    /// Reporting device.
    pub device_id: String,
    /// Capability tag.
    pub capability: &'static str,
    /// Action tag the hub files the change under.
    pub action: &'static str,
    /// Range instance; `""` for single-instance devices.
    pub instance_id: String,
    /// New value.
    pub value: i32,
    /// Why it changed.
    pub cause: Cause,
}

/// An event a capability staged and has not yet seen delivered.
///
/// Whoever pushes it reports the outcome back through
/// [`Capability::settle_report`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReport {
    /// The event to push.
    pub event: CapabilityEvent,
}

// ============================================================================
// Capability Traits
// ============================================================================

/// A unit of device behavior that can be attached to any device identity.
///
/// Implementations own their local state. They never see the identity
/// directly: inbound work arrives through [`handle`](Self::handle), and
/// anything they want to push upstream goes through the [`EventSink`]
/// they are handed.
pub trait Capability {
    /// Capability tag used for routing.
    const NAME: &'static str;

    /// Actions this capability answers. Each becomes one handler-table
    /// entry keyed by `(NAME, action)`.
    const ACTIONS: &'static [&'static str];

    /// Handle a request whose action is one of [`ACTIONS`](Self::ACTIONS).
    fn handle<S: EventSink + ?Sized>(
        &mut self,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError>;

    /// Learn whether a report handed to [`EventSink::queue_report`]
    /// reached the transport.
    ///
    /// The default does nothing, for capabilities that never queue reports.
    fn settle_report(&mut self, _report: &PendingReport, _delivered: bool, _now_ms: u64) {}
}

/// Index of a capability inside a device's capability tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerSlot(pub usize);

/// A statically composed set of capabilities.
///
/// Implemented for tuples of one to four [`Capability`] types. The tuple
/// position is the handler slot; attachment order changes slot numbers
/// but never behavior, since routing is keyed by (capability, action).
pub trait Capabilities {
    /// Register every action of every member into `identity`.
    fn register_into(&self, identity: &mut DeviceIdentity) -> Result<(), DeviceError>;

    /// Invoke the member at `slot`.
    fn handle<S: EventSink + ?Sized>(
        &mut self,
        slot: HandlerSlot,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError>;

    /// Hand a queued report's outcome to the member named by its event.
    fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64);
}

macro_rules! impl_capabilities_for_tuple {
    ($($cap:ident => $idx:tt),+) => {
        impl<$($cap: Capability),+> Capabilities for ($($cap,)+) {
            fn register_into(&self, identity: &mut DeviceIdentity) -> Result<(), DeviceError> {
                $(
                    for &action in <$cap as Capability>::ACTIONS {
                        identity.register_handler(
                            <$cap as Capability>::NAME,
                            action,
                            HandlerSlot($idx),
                        )?;
                    }
                )+
                Ok(())
            }

            fn handle<S: EventSink + ?Sized>(
                &mut self,
                slot: HandlerSlot,
                request: &CapabilityRequest,
                sink: &mut S,
            ) -> Result<Response, DeviceError> {
                match slot.0 {
                    $($idx => self.$idx.handle(request, sink),)+
                    _ => Err(DeviceError::UnsupportedAction {
                        capability: request.capability.clone(),
                        action: request.action.clone(),
                    }),
                }
            }

            fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64) {
                $(
                    if <$cap as Capability>::NAME == report.event.capability {
                        self.$idx.settle_report(report, delivered, now_ms);
                        return;
                    }
                )+
            }
        }
    };
}

impl_capabilities_for_tuple!(A => 0);
impl_capabilities_for_tuple!(A => 0, B => 1);
impl_capabilities_for_tuple!(A => 0, B => 1, C => 2);
impl_capabilities_for_tuple!(A => 0, B => 1, C => 2, D => 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_round_trips_through_text() {
        for cause in [
            Cause::PhysicalInteraction,
            Cause::PeriodicPoll,
            Cause::AppInteraction,
        ] {
            assert_eq!(Cause::from_text(cause.as_str()), Some(cause));
        }
    }

    #[test]
    fn request_defaults_to_unnamed_instance() {
        let req = CapabilityRequest::new("dev", "RangeController", "setRangeValue", RequestValue::Absolute(3));
        assert_eq!(req.instance_id, "");

        let req = req.with_instance("cell-2");
        assert_eq!(req.instance_id, "cell-2");
    }

    #[cfg(feature = "json")]
    #[test]
    fn cause_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Cause::PhysicalInteraction).unwrap();
        assert_eq!(json, "\"PHYSICAL_INTERACTION\"");
    }
}
