//! Error taxonomy shared by devices, capabilities, and transports.
//!
//! No error in this crate is fatal: the control loop logs the failure,
//! reports it back to the requester where there is one, and keeps going.
//! Clamping an out-of-range value is never an error.

use alloc::string::String;

/// Errors produced while composing devices, dispatching requests, or
/// emitting events.
///
/// `Clone + PartialEq` so a failed result can be handed to
/// [`Transport::send_response`](crate::traits::Transport::send_response)
/// by reference and compared in tests.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// No handler is registered for this (capability, action) pair.
    #[error("unsupported action {action} for capability {capability}")]
    UnsupportedAction {
        /// Capability tag from the request.
        capability: String,
        /// Action tag from the request.
        action: String,
    },

    /// The request is addressed to a device id nobody owns.
    #[error("unknown device {0}")]
    UnknownDevice(String),

    /// The range instance id is not attached to this controller.
    #[error("unknown range instance {0:?}")]
    UnknownInstance(String),

    /// The request carried the wrong kind of payload for its action.
    #[error("invalid payload for {action}: {reason}")]
    InvalidPayload {
        /// Action tag from the request.
        action: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The application apply callback rejected the value.
    ///
    /// Local state is left untouched when this is returned.
    #[error("apply failed for instance {instance_id:?}: {reason}")]
    ApplyFailed {
        /// Instance the value was meant for.
        instance_id: String,
        /// Debug rendering of the hardware error.
        reason: String,
    },

    /// The transport could not push an event or send a response.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Two capabilities tried to claim the same (capability, action) pair.
    #[error("duplicate handler for {capability}/{action}")]
    DuplicateHandler {
        /// Capability tag.
        capability: &'static str,
        /// Action tag.
        action: &'static str,
    },

    /// The device handler table has no free slots.
    #[error("handler table full")]
    HandlerTableFull,

    /// Range bounds or step are not usable.
    #[error("invalid range {instance_id:?}: {reason}")]
    InvalidRange {
        /// Instance being constructed.
        instance_id: String,
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// The same instance id was attached twice to one controller.
    #[error("duplicate range instance {0:?}")]
    DuplicateInstance(String),

    /// An inbound wire message could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl DeviceError {
    /// Returns true when retrying the same operation later may succeed.
    ///
    /// Only transport failures qualify; everything else is a property of
    /// the request or the device composition.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_sinric::DeviceError;
    ///
    /// assert!(DeviceError::TransportUnavailable("offline".into()).is_retryable());
    /// assert!(!DeviceError::UnknownInstance("x".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::TransportUnavailable(_))
    }

    pub(crate) fn transport<E: core::fmt::Debug>(err: E) -> Self {
        DeviceError::TransportUnavailable(alloc::format!("{:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn unsupported_action_message() {
        let err = DeviceError::UnsupportedAction {
            capability: "RangeController".into(),
            action: "setPowerState".into(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported action setPowerState for capability RangeController"
        );
    }

    #[test]
    fn transport_helper_uses_debug_rendering() {
        let err = DeviceError::transport(());
        assert_eq!(err, DeviceError::TransportUnavailable("()".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn apply_failed_is_not_retryable() {
        let err = DeviceError::ApplyFailed {
            instance_id: String::new(),
            reason: "rejected".into(),
        };
        assert!(!err.is_retryable());
    }
}
