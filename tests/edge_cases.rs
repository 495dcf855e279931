//! Edge case and boundary condition tests for range devices

use rs_sinric::{
    hal::{MockApplier, MockSensor, MockTransport},
    Battery, CapabilityRequest, Cause, DeviceError, RangeController, RangeSpec, ReportOutcome,
    RequestValue,
};

fn battery_with(spec: RangeSpec) -> Battery<MockApplier> {
    let range = RangeController::new(MockApplier::new())
        .with_instance(spec)
        .unwrap();
    Battery::with_range("battery-1", range).unwrap()
}

// ============================================================================
// Boundary Value Tests
// ============================================================================

#[test]
fn fixed_range_always_returns_min_and_applies() {
    let mut battery = battery_with(RangeSpec::new("", 42, 42));

    assert_eq!(battery.set_range_value("", 0), Ok(42));
    assert_eq!(battery.set_range_value("", 100), Ok(42));
    assert_eq!(battery.adjust_range_value("", -5), Ok(42));
    assert_eq!(battery.adjust_range_value("", 5), Ok(42));

    // Every call still reached the hardware
    assert_eq!(battery.range().applier().calls, 4);
    assert!(battery.range().state("").unwrap().is_fixed());
}

#[test]
fn negative_bounds_clamp() {
    let mut battery = battery_with(RangeSpec::new("", -40, -10));
    assert_eq!(battery.range_value(""), Ok(-40));
    assert_eq!(battery.set_range_value("", 0), Ok(-10));
    assert_eq!(battery.set_range_value("", -100), Ok(-40));
}

#[test]
fn adjust_saturates_instead_of_overflowing() {
    let mut battery = battery_with(RangeSpec::new("", i32::MIN, i32::MAX).with_initial(i32::MAX - 1));
    assert_eq!(battery.adjust_range_value("", i32::MAX), Ok(i32::MAX));

    assert_eq!(battery.adjust_range_value("", i32::MIN), Ok(-1));
    assert_eq!(battery.adjust_range_value("", i32::MIN), Ok(i32::MIN));
}

#[test]
fn full_i32_span_with_step() {
    let mut battery = battery_with(RangeSpec::new("", i32::MIN, i32::MAX).with_step(1_000_000));
    let value = battery.set_range_value("", i32::MAX).unwrap();
    assert!(value <= i32::MAX);
    assert_eq!((i64::from(value) - i64::from(i32::MIN)) % 1_000_000, 0);
}

#[test]
fn initial_value_is_normalized() {
    let battery = battery_with(RangeSpec::new("", 0, 100).with_step(10).with_initial(104));
    assert_eq!(battery.range_value(""), Ok(100));

    let battery = battery_with(RangeSpec::new("", 0, 100).with_step(10).with_initial(15));
    assert_eq!(battery.range_value(""), Ok(20));
}

#[test]
fn step_that_does_not_divide_span() {
    // Reachable values: 0, 30, 60, 90
    let mut battery = battery_with(RangeSpec::new("", 0, 100).with_step(30));
    assert_eq!(battery.set_range_value("", 100), Ok(90));
    assert_eq!(battery.set_range_value("", 96), Ok(90));
    assert_eq!(battery.set_range_value("", 45), Ok(60));
    assert_eq!(battery.set_range_value("", 44), Ok(30));
}

// ============================================================================
// Construction Errors
// ============================================================================

#[test]
fn zero_step_rejected() {
    let result = RangeController::new(MockApplier::new()).with_instance(RangeSpec::new("", 0, 10).with_step(0));
    assert!(matches!(result, Err(DeviceError::InvalidRange { .. })));
}

#[test]
fn inverted_bounds_rejected() {
    let result = RangeController::new(MockApplier::new()).with_instance(RangeSpec::new("x", 10, 0));
    assert!(matches!(result, Err(DeviceError::InvalidRange { instance_id, .. }) if instance_id == "x"));
}

// ============================================================================
// Unknown Targets
// ============================================================================

#[test]
fn unknown_instance_touches_nothing() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    let req = CapabilityRequest::set_range_value("battery-1", "cell-7", 50);
    assert_eq!(
        battery.dispatch(&mut transport, &req, 0),
        Err(DeviceError::UnknownInstance("cell-7".into()))
    );
    assert_eq!(
        battery.report_range_value(&mut transport, "cell-7", 50, Cause::PeriodicPoll, 0),
        Err(DeviceError::UnknownInstance("cell-7".into()))
    );
    assert_eq!(battery.range().applier().calls, 0);
    assert!(transport.events.is_empty());
    assert_eq!(transport.push_attempts, 0);
}

#[test]
fn request_for_other_device_rejected() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    let req = CapabilityRequest::set_range_value("battery-2", "", 50);
    assert_eq!(
        battery.dispatch(&mut transport, &req, 0),
        Err(DeviceError::UnknownDevice("battery-2".into()))
    );
    assert_eq!(battery.range_value(""), Ok(0));
}

#[test]
fn wrong_payload_shape_rejected() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    let req = CapabilityRequest::new("battery-1", "RangeController", "adjustRangeValue", RequestValue::Absolute(5));
    assert!(matches!(
        battery.dispatch(&mut transport, &req, 0),
        Err(DeviceError::InvalidPayload { .. })
    ));
    assert_eq!(battery.range().applier().calls, 0);
}

// ============================================================================
// Reporting Edge Cases
// ============================================================================

#[test]
fn first_report_of_initial_value_still_emits() {
    // Nothing has been reported yet, so even the starting value is news
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    assert_eq!(
        battery.report_range_value(&mut transport, "", 0, Cause::PeriodicPoll, 0),
        Ok(ReportOutcome::Sent)
    );
}

#[test]
fn out_of_range_report_is_clamped_before_compare() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    battery
        .report_range_value(&mut transport, "", 100, Cause::PeriodicPoll, 0)
        .unwrap();
    // 130 clamps to 100, which was already reported
    assert_eq!(
        battery.report_range_value(&mut transport, "", 130, Cause::PeriodicPoll, 1),
        Ok(ReportOutcome::Unchanged)
    );
    assert_eq!(transport.events.len(), 1);
}

#[test]
fn value_returning_to_reported_clears_dirty() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();

    battery
        .report_range_value(&mut transport, "", 50, Cause::PeriodicPoll, 0)
        .unwrap();
    battery.set_range_value("", 60).unwrap();
    assert!(battery.range().is_dirty(""));

    battery.set_range_value("", 50).unwrap();
    assert!(!battery.range().is_dirty(""));
}

#[test]
fn poll_with_flapping_connection() {
    let mut battery = battery_with(RangeSpec::percentage(""));
    let mut transport = MockTransport::new();
    let mut sensor = MockSensor::new().with_reading("", 90);

    for tick in 0..5u64 {
        transport.connected = tick % 2 == 1;
        battery.poll_and_report(&mut transport, &mut sensor, tick * 1000);
    }
    // Sent at tick 1, unchanged afterwards
    assert_eq!(transport.events.len(), 1);
    assert_eq!(transport.push_attempts, 2);
}
