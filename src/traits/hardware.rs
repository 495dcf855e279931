//! Hardware abstraction traits for applying and measuring range values.
//!
//! The crate never touches hardware itself. Applications hand it:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RangeApplier`] | Make hardware follow a newly set range value |
//! | [`RangeSensor`] | Read the current value during periodic polls |
//! | [`Clock`] | Time source for `no_std` environments |
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`].
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::traits::RangeApplier;
//!
//! // Any closure with the right shape is an applier.
//! let mut last = None;
//! let mut applier = |_instance: &str, value: i32| -> Result<(), ()> {
//!     last = Some(value);
//!     Ok(())
//! };
//! applier.apply_range_value("", 40).unwrap();
//! assert_eq!(last, Some(40));
//! ```

/// Apply callback for range values.
///
/// Called once per successful set/adjust, after clamping, before local
/// state changes. Returning an error aborts the whole operation: the
/// controller keeps its previous value.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_sinric::traits::RangeApplier;
///
/// struct ChargeLimiter { /* charger handle */ }
///
/// impl RangeApplier for ChargeLimiter {
///     type Error = ChargerError;
///
///     fn apply_range_value(&mut self, _instance_id: &str, value: i32) -> Result<(), ChargerError> {
///         self.charger.set_limit_percent(value as u8)
///     }
/// }
/// ```
pub trait RangeApplier {
    /// Error type for hardware rejections.
    type Error: core::fmt::Debug;

    /// Make the hardware reflect `value` for `instance_id`.
    ///
    /// Must return promptly; it runs inside request handling.
    fn apply_range_value(&mut self, instance_id: &str, value: i32) -> Result<(), Self::Error>;
}

impl<F, E> RangeApplier for F
where
    F: FnMut(&str, i32) -> Result<(), E>,
    E: core::fmt::Debug,
{
    type Error = E;

    fn apply_range_value(&mut self, instance_id: &str, value: i32) -> Result<(), E> {
        self(instance_id, value)
    }
}

/// Reads the current value of a range from hardware.
///
/// Used by periodic polling (e.g. a battery gauge). Values outside the
/// configured bounds are clamped by the controller, not rejected.
pub trait RangeSensor {
    /// Error type for failed reads.
    type Error: core::fmt::Debug;

    /// Read the current value for `instance_id`.
    fn read_range_value(&mut self, instance_id: &str) -> Result<i32, Self::Error>;
}

/// Monotonic time source for `no_std` environments.
///
/// Provides milliseconds since boot (or any fixed epoch). Used for event
/// rate limiting and poll scheduling.
pub trait Clock {
    /// Returns milliseconds since an arbitrary fixed point.
    ///
    /// Must be monotonically increasing (never go backwards).
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec::Vec;

    struct FixedSensor(i32);

    impl RangeSensor for FixedSensor {
        type Error = ();

        fn read_range_value(&mut self, _instance_id: &str) -> Result<i32, ()> {
            Ok(self.0)
        }
    }

    #[test]
    fn closure_applier_sees_instance_and_value() {
        let mut seen: Vec<(String, i32)> = Vec::new();
        {
            let mut applier = |instance: &str, value: i32| -> Result<(), ()> {
                seen.push((instance.into(), value));
                Ok(())
            };
            applier.apply_range_value("cell-1", 12).unwrap();
        }
        assert_eq!(seen, [(String::from("cell-1"), 12)]);
    }

    #[test]
    fn closure_applier_error_passes_through() {
        let mut applier = |_: &str, _: i32| -> Result<(), &'static str> { Err("busy") };
        assert_eq!(applier.apply_range_value("", 1), Err("busy"));
    }

    #[test]
    fn sensor_reads_fixed_value() {
        let mut sensor = FixedSensor(77);
        assert_eq!(sensor.read_range_value(""), Ok(77));
    }
}
