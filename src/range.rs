//! Bounded-range capability: get, set, adjust, and report an integer value.
//!
//! A [`RangeController`] owns one [`RangeState`] per range instance. What
//! the number means (battery percent, fan speed, blind position) is up to
//! the device type it is attached to.
//!
//! # Value normalization
//!
//! Every incoming value, whether requested by the hub or reported by
//! hardware, is clamped to `[min, max]` and snapped to the nearest
//! `min + k * step`. Clamping is silent and never an error.
//!
//! # Reporting and the dirty flag
//!
//! An instance is *dirty* while its value differs from the last value
//! successfully pushed upstream. [`report_range_value`] emits only when
//! dirty, and only marks the value as reported after the transport accepts
//! the event. A failed emit leaves the instance dirty, so the next report
//! retries even if the value did not change.
//!
//! ```rust
//! use rs_sinric::{Battery, Cause, ReportOutcome};
//! use rs_sinric::hal::{MockApplier, MockTransport};
//!
//! let mut battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let mut transport = MockTransport::new();
//!
//! transport.connected = false;
//! assert!(battery.report_range_value(&mut transport, "", 80, Cause::PeriodicPoll, 0).is_err());
//!
//! transport.connected = true;
//! let outcome = battery.report_range_value(&mut transport, "", 80, Cause::PeriodicPoll, 1000);
//! assert_eq!(outcome, Ok(ReportOutcome::Sent));
//! assert_eq!(transport.events.len(), 1);
//! ```
//!
//! [`report_range_value`]: RangeController::report_range_value

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::capability::{
    Capability, CapabilityEvent, CapabilityRequest, Cause, PendingReport, RequestValue, Response,
};
use crate::device::EventSink;
use crate::error::DeviceError;
use crate::traits::{RangeApplier, RangeSensor};

/// Capability tag for bounded ranges.
pub const RANGE_CONTROLLER: &str = "RangeController";
/// Action: set to an absolute value.
pub const SET_RANGE_VALUE: &str = "setRangeValue";
/// Action: move by a signed delta.
pub const ADJUST_RANGE_VALUE: &str = "adjustRangeValue";

// ============================================================================
// Construction
// ============================================================================

/// Construction parameters for one range instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeSpec {
    /// Instance id; `""` for single-range devices.
    pub instance_id: String,
    /// Lower bound (inclusive).
    pub min: i32,
    /// Upper bound (inclusive).
    pub max: i32,
    /// Granularity, at least 1.
    pub step: u32,
    /// Starting value; `None` starts at `min`.
    pub initial: Option<i32>,
    /// Minimum spacing between emitted events (0 = no limit).
    pub min_event_interval_ms: u64,
}

impl RangeSpec {
    /// A range `[min, max]` with step 1.
    pub fn new(instance_id: impl Into<String>, min: i32, max: i32) -> Self {
        Self {
            instance_id: instance_id.into(),
            min,
            max,
            step: 1,
            initial: None,
            min_event_interval_ms: 0,
        }
    }

    /// A 0-100 percentage range.
    pub fn percentage(instance_id: impl Into<String>) -> Self {
        Self::new(instance_id, 0, 100)
    }

    /// Set the step.
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// Set the starting value.
    pub fn with_initial(mut self, value: i32) -> Self {
        self.initial = Some(value);
        self
    }

    /// Set the minimum spacing between emitted events.
    pub fn with_min_event_interval_ms(mut self, ms: u64) -> Self {
        self.min_event_interval_ms = ms;
        self
    }
}

// ============================================================================
// State
// ============================================================================

/// Local state of one range instance.
///
/// Invariants: `min <= value <= max`, and `value - min` is a multiple of
/// `step`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeState {
    instance_id: String,
    value: i32,
    min: i32,
    max: i32,
    step: u32,
    last_reported: Option<i32>,
    // Staged and not yet committed or aborted
    in_flight: Option<i32>,
    min_event_interval_ms: u64,
    last_emit_ms: Option<u64>,
}

impl RangeState {
    fn from_spec(spec: RangeSpec) -> Result<Self, DeviceError> {
        if spec.step == 0 {
            return Err(DeviceError::InvalidRange {
                instance_id: spec.instance_id,
                reason: "step must be at least 1",
            });
        }
        if spec.min > spec.max {
            return Err(DeviceError::InvalidRange {
                instance_id: spec.instance_id,
                reason: "min is greater than max",
            });
        }
        let value = normalize(spec.initial.unwrap_or(spec.min), spec.min, spec.max, spec.step);
        Ok(Self {
            instance_id: spec.instance_id,
            value,
            min: spec.min,
            max: spec.max,
            step: spec.step,
            last_reported: None,
            in_flight: None,
            min_event_interval_ms: spec.min_event_interval_ms,
            last_emit_ms: None,
        })
    }

    /// Instance id.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Current value.
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Lower bound.
    pub fn min(&self) -> i32 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Step.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Last value the transport accepted, if any.
    pub fn last_reported(&self) -> Option<i32> {
        self.last_reported
    }

    /// True while the current value has not been reported upstream.
    pub fn is_dirty(&self) -> bool {
        self.last_reported != Some(self.value)
    }

    /// True while a staged report of the current value awaits its push.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight == Some(self.value)
    }

    /// True for a fixed range (`min == max`).
    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    /// Clamp and snap `requested` into this range.
    pub fn normalize(&self, requested: i32) -> i32 {
        normalize(requested, self.min, self.max, self.step)
    }

    fn clear_in_flight(&mut self, value: i32) {
        if self.in_flight == Some(value) {
            self.in_flight = None;
        }
    }

    fn retry_in_ms(&self, now_ms: u64) -> Option<u64> {
        if self.min_event_interval_ms == 0 {
            return None;
        }
        let elapsed = now_ms.saturating_sub(self.last_emit_ms?);
        (elapsed < self.min_event_interval_ms).then(|| self.min_event_interval_ms - elapsed)
    }
}

/// Clamp to `[min, max]`, then snap to the nearest `min + k * step`
/// (ties round up), stepping back once if that overshoots `max`.
///
/// ```
/// use rs_sinric::normalize;
///
/// assert_eq!(normalize(150, 0, 100, 1), 100);
/// assert_eq!(normalize(7, 0, 10, 4), 8);
/// assert_eq!(normalize(10, 0, 10, 4), 8); // 12 would overshoot
/// ```
///
/// # Panics
///
/// Panics if `min > max`, like [`i32::clamp`].
pub fn normalize(requested: i32, min: i32, max: i32, step: u32) -> i32 {
    let clamped = i64::from(requested.clamp(min, max));
    let (min, max, step) = (i64::from(min), i64::from(max), i64::from(step.max(1)));
    let mut snapped = min + (clamped - min + step / 2) / step * step;
    if snapped > max {
        snapped -= step;
    }
    // min <= snapped <= max, so the narrowing is lossless
    snapped as i32
}

// ============================================================================
// Reporting
// ============================================================================

/// What a report did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    /// An event was pushed and the value is now marked reported.
    Sent,
    /// The value matches the last reported value; nothing to send.
    Unchanged,
    /// Too soon after the previous event. The instance stays dirty.
    Deferred {
        /// Milliseconds until an event may be sent again.
        retry_in_ms: u64,
    },
    /// Handed to a sink that pushes after the call returns. The instance
    /// stays dirty until that push is settled.
    Queued,
}

/// Result of staging a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportStage {
    /// Push this event, then call [`RangeController::commit_report`].
    Emit(PendingReport),
    /// Nothing to push.
    Settled(ReportOutcome),
}

/// Tally of one polling pass over all instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Events pushed.
    pub sent: usize,
    /// Instances whose value was already reported.
    pub unchanged: usize,
    /// Instances held back by rate limiting.
    pub deferred: usize,
    /// Events left with a queueing sink.
    pub queued: usize,
    /// Sensor reads or emits that failed.
    pub failed: usize,
}

impl PollSummary {
    pub(crate) fn record(&mut self, result: &Result<ReportOutcome, DeviceError>) {
        match result {
            Ok(ReportOutcome::Sent) => self.sent += 1,
            Ok(ReportOutcome::Unchanged) => self.unchanged += 1,
            Ok(ReportOutcome::Deferred { .. }) => self.deferred += 1,
            Ok(ReportOutcome::Queued) => self.queued += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Read each instance from `sensor` and tally what `report` does with
    /// the reading. A failed read counts as failed and the pass goes on.
    pub(crate) fn collect<S, F>(
        device_id: &str,
        instance_ids: &[String],
        sensor: &mut S,
        mut report: F,
    ) -> Self
    where
        S: RangeSensor,
        F: FnMut(&str, i32) -> Result<ReportOutcome, DeviceError>,
    {
        let mut summary = Self::default();
        for instance_id in instance_ids {
            match sensor.read_range_value(instance_id) {
                Ok(reading) => summary.record(&report(instance_id, reading)),
                Err(err) => {
                    tracing::warn!(device_id, instance_id = %instance_id, error = ?err, "sensor read failed");
                    summary.failed += 1;
                }
            }
        }
        tracing::debug!(
            device_id,
            sent = summary.sent,
            unchanged = summary.unchanged,
            deferred = summary.deferred,
            queued = summary.queued,
            failed = summary.failed,
            "poll complete"
        );
        summary
    }
}

// ============================================================================
// Range Controller
// ============================================================================

/// Bounded-numeric-value capability.
///
/// Attach to a device by putting it in the device's capability tuple. Every
/// instance shares the controller's apply callback, which receives the
/// instance id along with the value.
///
/// # Example
///
/// ```rust
/// use rs_sinric::{RangeController, RangeSpec};
/// use rs_sinric::hal::MockApplier;
///
/// let mut range = RangeController::new(MockApplier::new())
///     .with_instance(RangeSpec::new("fan", 0, 10).with_step(2))
///     .unwrap();
///
/// assert_eq!(range.set_range_value("fan", 5), Ok(6)); // snapped to step
/// assert_eq!(range.adjust_range_value("fan", -20), Ok(0)); // clamped
/// assert_eq!(range.applier().applied.len(), 2);
/// ```
pub struct RangeController<A: RangeApplier> {
    applier: A,
    instances: Vec<RangeState>,
    echo_app_changes: bool,
}

impl<A: RangeApplier> RangeController<A> {
    /// Create a controller with no instances.
    pub fn new(applier: A) -> Self {
        Self {
            applier,
            instances: Vec::new(),
            echo_app_changes: false,
        }
    }

    /// Add an instance (builder form).
    pub fn with_instance(mut self, spec: RangeSpec) -> Result<Self, DeviceError> {
        self.add_instance(spec)?;
        Ok(self)
    }

    /// Add an instance.
    ///
    /// Fails on invalid bounds or a duplicate instance id.
    pub fn add_instance(&mut self, spec: RangeSpec) -> Result<(), DeviceError> {
        if self.state(&spec.instance_id).is_some() {
            return Err(DeviceError::DuplicateInstance(spec.instance_id));
        }
        self.instances.push(RangeState::from_spec(spec)?);
        Ok(())
    }

    /// Also emit an `APP_INTERACTION` event after each successful inbound
    /// set/adjust. Off by default: the requester already has the new
    /// value from the response.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_app_changes = echo;
        self
    }

    /// Whether inbound changes are echoed as events.
    pub fn echoes_app_changes(&self) -> bool {
        self.echo_app_changes
    }

    /// The apply callback.
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Mutable access to the apply callback.
    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }

    /// All instances, in the order they were added.
    pub fn instances(&self) -> &[RangeState] {
        &self.instances
    }

    /// Ids of all instances, in the order they were added.
    pub fn instance_ids(&self) -> Vec<String> {
        self.instances.iter().map(|s| s.instance_id.clone()).collect()
    }

    /// State of one instance.
    pub fn state(&self, instance_id: &str) -> Option<&RangeState> {
        self.instances.iter().find(|s| s.instance_id == instance_id)
    }

    /// Current value of one instance.
    pub fn range_value(&self, instance_id: &str) -> Result<i32, DeviceError> {
        self.state(instance_id)
            .map(RangeState::value)
            .ok_or_else(|| DeviceError::UnknownInstance(instance_id.into()))
    }

    /// True while the instance holds an unreported value.
    ///
    /// Unknown instances are never dirty.
    pub fn is_dirty(&self, instance_id: &str) -> bool {
        self.state(instance_id).is_some_and(RangeState::is_dirty)
    }

    /// Set an absolute value.
    ///
    /// Clamps and snaps the request, runs the apply callback, and only then
    /// stores the value. Returns the value actually applied. Does not emit.
    pub fn set_range_value(&mut self, instance_id: &str, requested: i32) -> Result<i32, DeviceError> {
        let idx = self.index_of(instance_id)?;
        let target = self.instances[idx].normalize(requested);
        self.apply(idx, requested, target)
    }

    /// Move the value by `delta` from where it is now.
    ///
    /// Same clamp-and-apply path as [`set_range_value`](Self::set_range_value).
    /// A sequence of adjusts clamps at every step: `50 - 70 + 30` on a
    /// `[0, 100]` range ends at 30, not 10.
    pub fn adjust_range_value(&mut self, instance_id: &str, delta: i32) -> Result<i32, DeviceError> {
        let idx = self.index_of(instance_id)?;
        let requested = self.instances[idx].value.saturating_add(delta);
        let target = self.instances[idx].normalize(requested);
        self.apply(idx, requested, target)
    }

    /// Record a hardware-observed value and push it upstream if needed.
    ///
    /// Clamps `new_value` and stores it. If it differs from the last
    /// reported value (or the previous push failed), emits an event with
    /// `cause`; the value counts as reported only once the emit succeeds.
    pub fn report_range_value<S: EventSink + ?Sized>(
        &mut self,
        sink: &mut S,
        instance_id: &str,
        new_value: i32,
        cause: Cause,
    ) -> Result<ReportOutcome, DeviceError> {
        let now_ms = sink.now_ms();
        let stage = self.stage_report(sink.device_id(), instance_id, new_value, cause, now_ms)?;
        match stage {
            ReportStage::Settled(outcome) => Ok(outcome),
            ReportStage::Emit(pending) => {
                let pending = match sink.queue_report(pending) {
                    Ok(()) => return Ok(ReportOutcome::Queued),
                    Err(pending) => pending,
                };
                if let Err(err) = sink.emit(&pending.event) {
                    self.abort_report(&pending);
                    return Err(err);
                }
                self.commit_report(&pending, now_ms);
                Ok(ReportOutcome::Sent)
            }
        }
    }

    /// First half of a report: store the value and decide whether to emit.
    ///
    /// Does not touch the transport. Pair with
    /// [`commit_report`](Self::commit_report) after a successful push, or
    /// [`abort_report`](Self::abort_report) after a failed one. Until then
    /// the value is in flight, and staging the same value again settles as
    /// [`ReportOutcome::Unchanged`] so concurrent reporters send it once.
    pub fn stage_report(
        &mut self,
        device_id: &str,
        instance_id: &str,
        new_value: i32,
        cause: Cause,
        now_ms: u64,
    ) -> Result<ReportStage, DeviceError> {
        let idx = self.index_of(instance_id)?;
        let state = &mut self.instances[idx];
        let value = state.normalize(new_value);
        if value != new_value {
            tracing::debug!(instance_id, requested = new_value, value, "reported value clamped");
        }
        state.value = value;

        if !state.is_dirty() {
            return Ok(ReportStage::Settled(ReportOutcome::Unchanged));
        }
        if state.in_flight == Some(value) {
            tracing::debug!(instance_id, value, "report already in flight");
            return Ok(ReportStage::Settled(ReportOutcome::Unchanged));
        }
        if let Some(retry_in_ms) = state.retry_in_ms(now_ms) {
            tracing::debug!(instance_id, value, retry_in_ms, "event rate limited");
            return Ok(ReportStage::Settled(ReportOutcome::Deferred { retry_in_ms }));
        }
        state.in_flight = Some(value);
        Ok(ReportStage::Emit(PendingReport {
            event: CapabilityEvent {
                device_id: device_id.into(),
                capability: RANGE_CONTROLLER,
                action: SET_RANGE_VALUE,
                instance_id: state.instance_id.clone(),
                value,
                cause,
            },
        }))
    }

    /// Second half of a report: mark the staged value as reported.
    ///
    /// Call only after the transport accepted `report.event`.
    pub fn commit_report(&mut self, report: &PendingReport, now_ms: u64) {
        if let Ok(idx) = self.index_of(&report.event.instance_id) {
            let state = &mut self.instances[idx];
            state.last_reported = Some(report.event.value);
            state.last_emit_ms = Some(now_ms);
            state.clear_in_flight(report.event.value);
        }
    }

    /// Drop a staged report whose push failed. The value stays dirty.
    pub fn abort_report(&mut self, report: &PendingReport) {
        if let Ok(idx) = self.index_of(&report.event.instance_id) {
            self.instances[idx].clear_in_flight(report.event.value);
        }
    }

    fn index_of(&self, instance_id: &str) -> Result<usize, DeviceError> {
        self.instances
            .iter()
            .position(|s| s.instance_id == instance_id)
            .ok_or_else(|| DeviceError::UnknownInstance(instance_id.into()))
    }

    fn apply(&mut self, idx: usize, requested: i32, target: i32) -> Result<i32, DeviceError> {
        let state = &mut self.instances[idx];
        if target != requested {
            tracing::debug!(instance_id = %state.instance_id, requested, value = target, "value clamped");
        }
        if let Err(err) = self.applier.apply_range_value(&state.instance_id, target) {
            let err = DeviceError::ApplyFailed {
                instance_id: state.instance_id.clone(),
                reason: format!("{:?}", err),
            };
            tracing::warn!(instance_id = %state.instance_id, value = target, error = %err, "apply rejected");
            return Err(err);
        }
        state.value = target;
        Ok(target)
    }

    fn echo<S: EventSink + ?Sized>(&mut self, sink: &mut S, instance_id: &str, value: i32) {
        if let Err(err) = self.report_range_value(sink, instance_id, value, Cause::AppInteraction) {
            tracing::warn!(instance_id, value, error = %err, "echo of app change not sent");
        }
    }
}

impl<A: RangeApplier> Capability for RangeController<A> {
    const NAME: &'static str = RANGE_CONTROLLER;
    const ACTIONS: &'static [&'static str] = &[SET_RANGE_VALUE, ADJUST_RANGE_VALUE];

    fn handle<S: EventSink + ?Sized>(
        &mut self,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError> {
        let instance_id = request.instance_id.as_str();
        let value = match (request.action.as_str(), request.value) {
            (SET_RANGE_VALUE, RequestValue::Absolute(value)) => {
                self.set_range_value(instance_id, value)?
            }
            (ADJUST_RANGE_VALUE, RequestValue::Delta(delta)) => {
                self.adjust_range_value(instance_id, delta)?
            }
            (SET_RANGE_VALUE, RequestValue::Delta(_)) => {
                return Err(DeviceError::InvalidPayload {
                    action: request.action.clone(),
                    reason: "expected an absolute value".into(),
                })
            }
            (ADJUST_RANGE_VALUE, RequestValue::Absolute(_)) => {
                return Err(DeviceError::InvalidPayload {
                    action: request.action.clone(),
                    reason: "expected a delta".into(),
                })
            }
            _ => {
                return Err(DeviceError::UnsupportedAction {
                    capability: request.capability.clone(),
                    action: request.action.clone(),
                })
            }
        };
        if self.echo_app_changes {
            self.echo(sink, instance_id, value);
        }
        Ok(Response {
            instance_id: request.instance_id.clone(),
            value,
        })
    }

    fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64) {
        if delivered {
            self.commit_report(report, now_ms);
        } else {
            self.abort_report(report);
        }
    }
}

impl CapabilityRequest {
    /// A `RangeController/setRangeValue` request.
    pub fn set_range_value(
        device_id: impl Into<String>,
        instance_id: impl Into<String>,
        value: i32,
    ) -> Self {
        Self::new(device_id, RANGE_CONTROLLER, SET_RANGE_VALUE, RequestValue::Absolute(value))
            .with_instance(instance_id)
    }

    /// A `RangeController/adjustRangeValue` request.
    pub fn adjust_range_value(
        device_id: impl Into<String>,
        instance_id: impl Into<String>,
        delta: i32,
    ) -> Self {
        Self::new(device_id, RANGE_CONTROLLER, ADJUST_RANGE_VALUE, RequestValue::Delta(delta))
            .with_instance(instance_id)
    }
}
