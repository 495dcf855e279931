//! Thread-safe device wrapper for hosts with real threads.
//!
//! `SharedDevice` puts one `Mutex` around one device. Every
//! set/adjust/report runs under that lock, and the lock is never held while
//! the transport writes: a report stages its event under the lock, pushes
//! it with the lock released, then re-locks to commit.
//!
//! Requests handled through an `Arc<SharedDevice>` dispatch into a sink
//! that only queues events. The queue is pushed after the lock is
//! released, and each queued range report is settled under a fresh lock.
//! A push failure there is logged and cannot fail the request that
//! caused it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_sinric::{Battery, Cause, ReportOutcome};
//! use rs_sinric::hal::{MockApplier, MockTransport};
//! use rs_sinric::services::SharedDevice;
//!
//! let battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let shared = Arc::new(SharedDevice::from(battery));
//!
//! // A sensor thread reports through its own handle
//! let reporter = Arc::clone(&shared);
//! let handle = std::thread::spawn(move || {
//!     let mut transport = MockTransport::new();
//!     let outcome = reporter.report_range_value(&mut transport, "", 42, Cause::PeriodicPoll, 0);
//!     (outcome, transport.events.len())
//! });
//! assert_eq!(handle.join().unwrap(), (Ok(ReportOutcome::Sent), 1));
//!
//! assert_eq!(shared.with_device(|b| b.range_value("")), Ok(42));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::battery::Battery;
use crate::capability::{CapabilityEvent, CapabilityRequest, Cause, PendingReport, Response};
use crate::device::{push_event, DeviceHandle, EventSink, SinkDispatch};
use crate::error::DeviceError;
use crate::range::{PollSummary, ReportOutcome, ReportStage};
use crate::traits::{RangeApplier, RangeSensor, Transport};

/// One device behind one mutex.
pub struct SharedDevice<D> {
    device_id: String,
    device: Mutex<D>,
}

impl<D> SharedDevice<D> {
    /// Wrap a device. `device_id` is used for routing without locking.
    pub fn new(device_id: impl Into<String>, device: D) -> Self {
        Self {
            device_id: device_id.into(),
            device: Mutex::new(device),
        }
    }

    /// Id of the wrapped device.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Access the device with the lock held.
    ///
    /// Keep the closure short and do not touch the network inside it.
    pub fn with_device<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut D) -> R,
    {
        // A panic in another holder does not invalidate range state.
        let mut guard = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Unwrap the device.
    pub fn into_inner(self) -> D {
        self.device.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: RangeApplier> From<Battery<A>> for SharedDevice<Battery<A>> {
    fn from(battery: Battery<A>) -> Self {
        let id = String::from(battery.id());
        Self::new(id, battery)
    }
}

impl<A: RangeApplier> SharedDevice<Battery<A>> {
    /// [`Battery::report_range_value`] with the lock released during the push.
    pub fn report_range_value<T: Transport>(
        &self,
        transport: &mut T,
        instance_id: &str,
        value: i32,
        cause: Cause,
        now_ms: u64,
    ) -> Result<ReportOutcome, DeviceError> {
        let stage = self.with_device(|b| b.stage_report(instance_id, value, cause, now_ms))?;
        let pending = match stage {
            ReportStage::Settled(outcome) => return Ok(outcome),
            ReportStage::Emit(pending) => pending,
        };
        if let Err(err) = push_event(transport, &pending.event) {
            self.with_device(|b| b.abort_report(&pending));
            return Err(err);
        }
        self.with_device(|b| b.commit_report(&pending, now_ms));
        Ok(ReportOutcome::Sent)
    }

    /// [`Battery::poll_and_report`] with sensor reads and pushes done
    /// outside the lock.
    pub fn poll_and_report<T: Transport, S: RangeSensor>(
        &self,
        transport: &mut T,
        sensor: &mut S,
        now_ms: u64,
    ) -> PollSummary {
        let ids = self.with_device(|b| b.range().instance_ids());
        PollSummary::collect(&self.device_id, &ids, sensor, |instance_id, reading| {
            self.report_range_value(transport, instance_id, reading, Cause::PeriodicPoll, now_ms)
        })
    }
}

enum Queued {
    Event(CapabilityEvent),
    Report(PendingReport),
}

/// Sink that keeps everything for a push after the lock is released.
struct QueueingSink<'a> {
    device_id: &'a str,
    now_ms: u64,
    queued: Vec<Queued>,
}

impl EventSink for QueueingSink<'_> {
    fn device_id(&self) -> &str {
        self.device_id
    }

    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn emit(&mut self, event: &CapabilityEvent) -> Result<(), DeviceError> {
        self.queued.push(Queued::Event(event.clone()));
        Ok(())
    }

    fn queue_report(&mut self, report: PendingReport) -> Result<(), PendingReport> {
        self.queued.push(Queued::Report(report));
        Ok(())
    }
}

impl<D: SinkDispatch> SharedDevice<D> {
    /// Dispatch under the lock, then push what the request produced with
    /// the lock released.
    fn dispatch_unlocked_push<T: Transport>(
        &self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        let mut sink = QueueingSink {
            device_id: &self.device_id,
            now_ms,
            queued: Vec::new(),
        };
        let result = self.with_device(|d| d.dispatch_with(request, &mut sink));

        for item in sink.queued {
            match item {
                // push_event logs its own failures
                Queued::Event(event) => {
                    let _ = push_event(transport, &event);
                }
                Queued::Report(report) => {
                    let delivered = push_event(transport, &report.event).is_ok();
                    self.with_device(|d| d.settle_report(&report, delivered, now_ms));
                }
            }
        }
        result
    }
}

impl<T: Transport, D: DeviceHandle<T>> DeviceHandle<T> for SharedDevice<D> {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn handle_request(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        // Exclusive access already, no need to lock.
        self.device
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_request(transport, request, now_ms)
    }
}

impl<T: Transport, D: SinkDispatch> DeviceHandle<T> for Arc<SharedDevice<D>> {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn handle_request(
        &mut self,
        transport: &mut T,
        request: &CapabilityRequest,
        now_ms: u64,
    ) -> Result<Response, DeviceError> {
        self.dispatch_unlocked_push(transport, request, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockApplier, MockSensor, MockTransport};
    use crate::range::{RangeController, RangeSpec};
    use crate::traits::InboundRequest;

    type SharedBattery = SharedDevice<Battery<MockApplier>>;

    fn shared() -> SharedBattery {
        SharedDevice::from(Battery::new("battery-1", MockApplier::new()).unwrap())
    }

    fn echoing() -> Arc<SharedBattery> {
        let range = RangeController::new(MockApplier::new())
            .with_instance(RangeSpec::percentage(""))
            .unwrap()
            .with_echo(true);
        Arc::new(SharedDevice::from(Battery::with_range("battery-1", range).unwrap()))
    }

    /// Transport that records whether the device lock was held during each push.
    struct LockCheckingTransport {
        shared: Arc<SharedBattery>,
        locked_during_push: Vec<bool>,
        events: Vec<CapabilityEvent>,
    }

    impl LockCheckingTransport {
        fn new(shared: &Arc<SharedBattery>) -> Self {
            Self {
                shared: Arc::clone(shared),
                locked_during_push: Vec::new(),
                events: Vec::new(),
            }
        }
    }

    impl Transport for LockCheckingTransport {
        type Error = ();

        fn push_event(&mut self, event: &CapabilityEvent) -> Result<(), ()> {
            self.locked_during_push
                .push(self.shared.device.try_lock().is_err());
            self.events.push(event.clone());
            Ok(())
        }

        fn send_response(
            &mut self,
            _request_id: &str,
            _result: &Result<Response, DeviceError>,
        ) -> Result<(), ()> {
            Ok(())
        }

        fn try_recv(&mut self) -> Option<InboundRequest> {
            None
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn id_is_taken_from_battery() {
        assert_eq!(shared().device_id(), "battery-1");
    }

    #[test]
    fn report_failure_leaves_dirty() {
        let shared = shared();
        let mut transport = MockTransport::new();
        transport.connected = false;

        let result = shared.report_range_value(&mut transport, "", 30, Cause::PhysicalInteraction, 0);
        assert!(matches!(result, Err(DeviceError::TransportUnavailable(_))));
        assert!(shared.with_device(|b| b.range().is_dirty("")));

        transport.connected = true;
        let result = shared.report_range_value(&mut transport, "", 30, Cause::PhysicalInteraction, 10);
        assert_eq!(result, Ok(ReportOutcome::Sent));
        assert!(!shared.with_device(|b| b.range().is_dirty("")));
    }

    #[test]
    fn newer_value_stays_dirty_after_commit() {
        let shared = shared();
        let ReportStage::Emit(pending) = shared
            .with_device(|b| b.stage_report("", 30, Cause::PeriodicPoll, 0))
            .unwrap()
        else {
            panic!("expected an event to emit");
        };
        // Another thread moves the value before the first push lands
        shared
            .with_device(|b| b.stage_report("", 40, Cause::PeriodicPoll, 0))
            .unwrap();
        shared.with_device(|b| b.commit_report(&pending, 0));

        assert!(shared.with_device(|b| b.range().is_dirty("")));
    }

    #[test]
    fn poll_through_shared() {
        let shared = shared();
        let mut transport = MockTransport::new();
        let mut sensor = MockSensor::new().with_reading("", 55);

        let summary = shared.poll_and_report(&mut transport, &mut sensor, 0);
        assert_eq!(summary.sent, 1);
        assert_eq!(transport.events[0].value, 55);
    }

    #[test]
    fn arc_handle_dispatches() {
        let mut handle = Arc::new(shared());
        let mut transport = MockTransport::new();
        let req = CapabilityRequest::set_range_value("battery-1", "", 70);

        let resp = handle.handle_request(&mut transport, &req, 0).unwrap();
        assert_eq!(resp.value, 70);
        assert_eq!(handle.with_device(|b| b.range_value("")), Ok(70));
    }

    #[test]
    fn arc_handle_pushes_echo_with_lock_released() {
        let mut handle = echoing();
        let mut transport = LockCheckingTransport::new(&handle);
        let req = CapabilityRequest::set_range_value("battery-1", "", 40);

        let resp = handle.handle_request(&mut transport, &req, 0).unwrap();
        assert_eq!(resp.value, 40);
        assert_eq!(transport.locked_during_push, [false]);
        assert_eq!(transport.events[0].cause, Cause::AppInteraction);
        // Settled after the push
        assert!(!handle.with_device(|b| b.range().is_dirty("")));
    }

    #[test]
    fn report_pushes_with_lock_released() {
        let handle = echoing();
        let mut transport = LockCheckingTransport::new(&handle);

        let outcome = handle.report_range_value(&mut transport, "", 25, Cause::PeriodicPoll, 0);
        assert_eq!(outcome, Ok(ReportOutcome::Sent));
        assert_eq!(transport.locked_during_push, [false]);
    }

    #[test]
    fn arc_handle_echo_failure_keeps_request_and_dirty() {
        let mut handle = echoing();
        let mut transport = MockTransport::new();
        transport.connected = false;

        let req = CapabilityRequest::set_range_value("battery-1", "", 60);
        assert_eq!(handle.handle_request(&mut transport, &req, 0).map(|r| r.value), Ok(60));
        assert!(handle.with_device(|b| b.range().is_dirty("")));
        assert!(!handle.with_device(|b| b.range().state("").unwrap().is_in_flight()));

        // The failed echo does not block the next report of the same value
        transport.connected = true;
        let outcome = handle.report_range_value(&mut transport, "", 60, Cause::PeriodicPoll, 10);
        assert_eq!(outcome, Ok(ReportOutcome::Sent));
        assert_eq!(transport.events.len(), 1);
    }

    #[test]
    fn same_value_staged_twice_is_sent_once() {
        let shared = shared();
        let first = shared
            .with_device(|b| b.stage_report("", 30, Cause::PeriodicPoll, 0))
            .unwrap();
        // Second reporter arrives before the first push completes
        let second = shared
            .with_device(|b| b.stage_report("", 30, Cause::PeriodicPoll, 0))
            .unwrap();

        assert!(matches!(first, ReportStage::Emit(_)));
        assert_eq!(second, ReportStage::Settled(ReportOutcome::Unchanged));
    }

    #[test]
    fn failed_push_releases_in_flight_value() {
        let shared = shared();
        let mut transport = MockTransport::new();
        transport.connected = false;

        assert!(shared
            .report_range_value(&mut transport, "", 30, Cause::PeriodicPoll, 0)
            .is_err());
        assert!(!shared.with_device(|b| b.range().state("").unwrap().is_in_flight()));

        transport.connected = true;
        let outcome = shared.report_range_value(&mut transport, "", 30, Cause::PeriodicPoll, 0);
        assert_eq!(outcome, Ok(ReportOutcome::Sent));
    }
}
