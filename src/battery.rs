//! The `Battery` device type: one identity plus one [`RangeController`].
//!
//! The range instance carries the charge level. The SDK never measures
//! it; application code feeds readings in through
//! [`Battery::report_range_value`] or [`Battery::poll_and_report`].
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::{Battery, PollSummary};
//! use rs_sinric::hal::{MockApplier, MockSensor, MockTransport};
//!
//! let mut battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let mut transport = MockTransport::new();
//! let mut sensor = MockSensor::new().with_reading("", 87);
//!
//! let summary = battery.poll_and_report(&mut transport, &mut sensor, 0);
//! assert_eq!(summary, PollSummary { sent: 1, ..Default::default() });
//!
//! // Same reading again: nothing new to say
//! let summary = battery.poll_and_report(&mut transport, &mut sensor, 60_000);
//! assert_eq!(summary.unchanged, 1);
//! assert_eq!(transport.events.len(), 1);
//! ```

use alloc::string::String;

use crate::capability::{CapabilityRequest, Cause, PendingReport, Response};
use crate::config::Config;
use crate::device::{Device, DeviceHandle, DeviceIdentity, Emitter, EventSink, SinkDispatch};
use crate::error::DeviceError;
use crate::range::{PollSummary, RangeController, RangeSpec, ReportOutcome, ReportStage};
use crate::traits::{RangeApplier, RangeSensor, Transport};

/// Product type tag sent to the hub.
pub const BATTERY_PRODUCT_TYPE: &str = "Battery";

/// A battery level device.
pub struct Battery<A: RangeApplier> {
    device: Device<(RangeController<A>,)>,
}

impl<A: RangeApplier> Battery<A> {
    /// A battery with the default `""` instance spanning 0-100.
    pub fn new(device_id: impl Into<String>, applier: A) -> Result<Self, DeviceError> {
        let range = RangeController::new(applier).with_instance(RangeSpec::percentage(""))?;
        Self::with_range(device_id, range)
    }

    /// A battery over a pre-built range controller.
    pub fn with_range(
        device_id: impl Into<String>,
        range: RangeController<A>,
    ) -> Result<Self, DeviceError> {
        let device = Device::new(device_id, BATTERY_PRODUCT_TYPE, (range,))?;
        tracing::info!(device_id = device.id(), "battery device ready");
        Ok(Self { device })
    }

    /// Build from the `device` and `range` sections of a config.
    pub fn from_config(config: &Config, applier: A) -> Result<Self, DeviceError> {
        let range = RangeController::new(applier)
            .with_instance(config.range.to_spec())?
            .with_echo(config.range.echo_app_changes);
        Self::with_range(config.device.id.as_str(), range)
    }

    /// Device id.
    pub fn id(&self) -> &str {
        self.device.id()
    }

    /// Device identity and handler table.
    pub fn identity(&self) -> &DeviceIdentity {
        self.device.identity()
    }

    /// The range capability.
    pub fn range(&self) -> &RangeController<A> {
        &self.device.capabilities().0
    }

    /// Mutable access to the range capability.
    pub fn range_mut(&mut self) -> &mut RangeController<A> {
        &mut self.device.capabilities_mut().0
    }

    /// Handle an inbound request.
    pub fn dispatch<T: Transport>(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        self.device.dispatch(transport, request, now_ms)
    }

    /// Set a value locally, as if the hub had asked. No event is sent.
    pub fn set_range_value(&mut self, instance_id: &str, value: i32) -> Result<i32, DeviceError> {
        self.range_mut().set_range_value(instance_id, value)
    }

    /// Adjust a value locally. No event is sent.
    pub fn adjust_range_value(&mut self, instance_id: &str, delta: i32) -> Result<i32, DeviceError> {
        self.range_mut().adjust_range_value(instance_id, delta)
    }

    /// Current value of an instance.
    pub fn range_value(&self, instance_id: &str) -> Result<i32, DeviceError> {
        self.range().range_value(instance_id)
    }

    /// Record a hardware reading and push it upstream if it changed.
    pub fn report_range_value<T: Transport>(
        &mut self,
        transport: &mut T,
        instance_id: &str,
        value: i32,
        cause: Cause,
        now_ms: u64,
    ) -> Result<ReportOutcome, DeviceError> {
        let (identity, (range,)) = self.device.split_mut();
        let mut sink = Emitter::new(identity, transport, now_ms);
        range.report_range_value(&mut sink, instance_id, value, cause)
    }

    /// See [`RangeController::stage_report`].
    pub fn stage_report(
        &mut self,
        instance_id: &str,
        value: i32,
        cause: Cause,
        now_ms: u64,
    ) -> Result<ReportStage, DeviceError> {
        let (identity, (range,)) = self.device.split_mut();
        range.stage_report(identity.id(), instance_id, value, cause, now_ms)
    }

    /// See [`RangeController::commit_report`].
    pub fn commit_report(&mut self, report: &PendingReport, now_ms: u64) {
        self.range_mut().commit_report(report, now_ms);
    }

    /// See [`RangeController::abort_report`].
    pub fn abort_report(&mut self, report: &PendingReport) {
        self.range_mut().abort_report(report);
    }

    /// Read every instance from `sensor` and report it as a periodic poll.
    ///
    /// Failed reads and failed emits are logged and counted; the rest of
    /// the instances are still polled.
    pub fn poll_and_report<T: Transport, S: RangeSensor>(
        &mut self,
        transport: &mut T,
        sensor: &mut S,
        now_ms: u64,
    ) -> PollSummary {
        let device_id = String::from(self.id());
        let ids = self.range().instance_ids();
        PollSummary::collect(&device_id, &ids, sensor, |instance_id, reading| {
            self.report_range_value(transport, instance_id, reading, Cause::PeriodicPoll, now_ms)
        })
    }
}

impl<A: RangeApplier> SinkDispatch for Battery<A> {
    fn dispatch_with<S: EventSink + ?Sized>(
        &mut self,
        request: &CapabilityRequest,
        sink: &mut S,
    ) -> Result<Response, DeviceError> {
        self.device.dispatch_with(request, sink)
    }

    fn settle_report(&mut self, report: &PendingReport, delivered: bool, now_ms: u64) {
        self.device.settle_report(report, delivered, now_ms);
    }
}

impl<T: Transport, A: RangeApplier> DeviceHandle<T> for Battery<A> {
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
    use crate::config::{DeviceConfig, RangeConfig};
    use crate::hal::{MockApplier, MockSensor, MockTransport};
    use crate::range::{RANGE_CONTROLLER, SET_RANGE_VALUE};

    fn battery() -> Battery<MockApplier> {
        Battery::new("battery-1", MockApplier::new()).unwrap()
    }

    #[test]
    fn registers_range_handlers() {
        let b = battery();
        assert_eq!(b.identity().product_type(), BATTERY_PRODUCT_TYPE);
        assert!(b.identity().supports(RANGE_CONTROLLER, SET_RANGE_VALUE));
        assert!(b.identity().supports(RANGE_CONTROLLER, "adjustRangeValue"));
        assert_eq!(b.identity().handler_count(), 2);
    }

    #[test]
    fn starts_at_min() {
        assert_eq!(battery().range_value(""), Ok(0));
    }

    #[test]
    fn dispatch_set_applies_without_event() {
        let mut b = battery();
        let mut transport = MockTransport::new();
        let req = CapabilityRequest::set_range_value("battery-1", "", 45);

        let resp = b.dispatch(&mut transport, &req, 0).unwrap();
        assert_eq!(resp.value, 45);
        assert_eq!(b.range().applier().last(), Some(45));
        assert!(transport.events.is_empty());
        assert!(b.range().is_dirty(""));
    }

    #[test]
    fn from_config_uses_sections() {
        let config = Config::default()
            .with_device(DeviceConfig::default().with_id("battery-9"))
            .with_range(
                RangeConfig::default()
                    .with_instance_id("cell")
                    .with_initial(55)
                    .with_echo(true),
            );
        let b = Battery::from_config(&config, MockApplier::new()).unwrap();
        assert_eq!(b.id(), "battery-9");
        assert_eq!(b.range_value("cell"), Ok(55));
        assert!(b.range().echoes_app_changes());
    }

    #[test]
    fn from_config_rejects_bad_range() {
        let config = Config::default().with_range(RangeConfig::default().with_step(0));
        assert!(matches!(
            Battery::from_config(&config, MockApplier::new()),
            Err(DeviceError::InvalidRange { .. })
        ));
    }

    #[test]
    fn poll_counts_sensor_failures() {
        let mut b = battery();
        let mut transport = MockTransport::new();
        let mut sensor = MockSensor::new();

        let summary = b.poll_and_report(&mut transport, &mut sensor, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 0);
        assert!(transport.events.is_empty());
    }

    #[test]
    fn poll_retries_after_transport_failure() {
        let mut b = battery();
        let mut transport = MockTransport::new();
        let mut sensor = MockSensor::new().with_reading("", 70);

        transport.connected = false;
        let summary = b.poll_and_report(&mut transport, &mut sensor, 0);
        assert_eq!(summary.failed, 1);
        assert!(b.range().is_dirty(""));

        transport.connected = true;
        let summary = b.poll_and_report(&mut transport, &mut sensor, 60_000);
        assert_eq!(summary.sent, 1);
        assert_eq!(transport.events[0].value, 70);
        assert_eq!(transport.events[0].cause, Cause::PeriodicPoll);
        assert!(!b.range().is_dirty(""));
    }

    #[test]
    fn staged_report_uses_device_id() {
        let mut b = battery();
        let ReportStage::Emit(pending) = b.stage_report("", 20, Cause::PhysicalInteraction, 5).unwrap()
        else {
            panic!("expected an event to emit");
        };
        assert_eq!(pending.event.device_id, "battery-1");
        b.commit_report(&pending, 5);
        assert_eq!(b.range().state("").unwrap().last_reported(), Some(20));
    }
}
