//! Cooperative control loop.
//!
//! One loop owns the transport and the clock. Each iteration drains inbound
//! requests, routes them to devices by id, and sends the responses back.
//! [`ControlLoop::poll_due`] tells the caller when to read sensors.
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::{Battery, CapabilityRequest, ControlLoop, DeviceHandle};
//! use rs_sinric::config::ControlConfig;
//! use rs_sinric::hal::{MockApplier, MockClock, MockSensor, MockTransport};
//!
//! let mut battery = Battery::new("battery-1", MockApplier::new()).unwrap();
//! let mut sensor = MockSensor::new().with_reading("", 64);
//! let mut control = ControlLoop::new(MockTransport::new(), MockClock::new(), ControlConfig::default());
//!
//! control
//!     .transport_mut()
//!     .queue_request("req-1", CapabilityRequest::set_range_value("battery-1", "", 45));
//!
//! // One iteration of the main loop
//! let handled = control.process_inbound(&mut [&mut battery as &mut dyn DeviceHandle<_>]);
//! assert_eq!(handled, 1);
//! if control.poll_due() {
//!     let now = control.now_ms();
//!     battery.poll_and_report(control.transport_mut(), &mut sensor, now);
//! }
//!
//! assert!(control.transport().response_for("req-1").unwrap().is_ok());
//! assert_eq!(control.transport().events.len(), 1);
//! ```

use crate::config::ControlConfig;
use crate::device::DeviceHandle;
use crate::error::DeviceError;
use crate::traits::{Clock, Transport};

/// Main loop state: transport, clock, and poll timing.
pub struct ControlLoop<T: Transport, K: Clock> {
    transport: T,
    clock: K,
    config: ControlConfig,
    last_poll_ms: Option<u64>,
}

impl<T: Transport, K: Clock> ControlLoop<T, K> {
    /// Create a loop. The first [`poll_due`](Self::poll_due) returns true.
    pub fn new(transport: T, clock: K, config: ControlConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            last_poll_ms: None,
        }
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport, for reports outside dispatch.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Mutable access to the clock.
    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// Current time from the loop's clock.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Drain every pending inbound request and answer it.
    ///
    /// Returns the number of requests handled. A request for an id no
    /// device claims is answered with [`DeviceError::UnknownDevice`].
    pub fn process_inbound(&mut self, devices: &mut [&mut dyn DeviceHandle<T>]) -> usize {
        let mut handled = 0;
        while let Some(inbound) = self.transport.try_recv() {
            let now_ms = self.clock.now_ms();
            let request = &inbound.request;
            let result = match devices
                .iter_mut()
                .find(|d| d.device_id() == request.device_id)
            {
                Some(device) => device.handle_request(&mut self.transport, request, now_ms),
                None => {
                    tracing::warn!(device_id = %request.device_id, request_id = %inbound.request_id, "request for unknown device");
                    Err(DeviceError::UnknownDevice(request.device_id.clone()))
                }
            };

            if let Err(err) = self.transport.send_response(&inbound.request_id, &result) {
                tracing::warn!(request_id = %inbound.request_id, error = ?err, "response not sent");
            }
            handled += 1;
        }
        handled
    }

    /// True once per poll interval. Marks the poll as taken.
    pub fn poll_due(&mut self) -> bool {
        let now_ms = self.clock.now_ms();
        let due = match self.last_poll_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.poll_interval_ms,
        };
        if due {
            self.last_poll_ms = Some(now_ms);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::Battery;
    use crate::capability::CapabilityRequest;
    use crate::hal::{MockApplier, MockClock, MockTransport};

    fn control() -> ControlLoop<MockTransport, MockClock> {
        ControlLoop::new(
            MockTransport::new(),
            MockClock::new(),
            ControlConfig::default().with_poll_interval_ms(1000),
        )
    }

    #[test]
    fn poll_due_respects_interval() {
        let mut control = control();
        assert!(control.poll_due());
        assert!(!control.poll_due());

        control.clock_mut().advance(999);
        assert!(!control.poll_due());

        control.clock_mut().advance(1);
        assert!(control.poll_due());
        assert!(!control.poll_due());
    }

    #[test]
    fn routes_by_device_id() {
        let mut a = Battery::new("a", MockApplier::new()).unwrap();
        let mut b = Battery::new("b", MockApplier::new()).unwrap();
        let mut control = control();
        control
            .transport_mut()
            .queue_request("1", CapabilityRequest::set_range_value("b", "", 30));

        let handled = control.process_inbound(&mut [&mut a, &mut b]);
        assert_eq!(handled, 1);
        assert_eq!(a.range_value(""), Ok(0));
        assert_eq!(b.range_value(""), Ok(30));
        assert_eq!(control.transport().response_for("1").unwrap().as_ref().unwrap().value, 30);
    }

    #[test]
    fn unknown_device_gets_error_response() {
        let mut a = Battery::new("a", MockApplier::new()).unwrap();
        let mut control = control();
        control
            .transport_mut()
            .queue_request("1", CapabilityRequest::set_range_value("zzz", "", 30));

        control.process_inbound(&mut [&mut a]);
        assert_eq!(
            control.transport().response_for("1"),
            Some(&Err(DeviceError::UnknownDevice("zzz".into())))
        );
    }

    #[test]
    fn failed_response_is_dropped() {
        let mut a = Battery::new("a", MockApplier::new()).unwrap();
        let mut control = control();
        control
            .transport_mut()
            .queue_request("1", CapabilityRequest::set_range_value("a", "", 30));
        control.transport_mut().connected = false;

        assert_eq!(control.process_inbound(&mut [&mut a]), 1);
        assert!(control.transport().responses.is_empty());
        // The request itself still took effect
        assert_eq!(a.range_value(""), Ok(30));
    }

    #[test]
    fn empty_queue_handles_nothing() {
        let mut control = control();
        assert_eq!(control.process_inbound(&mut []), 0);
    }
}
