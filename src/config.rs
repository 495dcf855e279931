//! Shared configuration for hosted and embedded builds.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_sinric::config::{Config, DeviceConfig, MqttConfig, RangeConfig};
//!
//! // Use defaults
//! let config = Config::default();
//!
//! // Or customize
//! let config = Config::default()
//!     .with_device(DeviceConfig::default().with_id("battery-1"))
//!     .with_range(RangeConfig::default().with_min_event_interval_ms(10_000))
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"));
//! ```

use heapless::String as HString;

use crate::range::RangeSpec;

/// Maximum length for short config strings (hostnames, ids)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topic names)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncate<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating on a char boundary if too long
pub fn short_string(s: &str) -> ShortString {
    truncate(s)
}

/// Create a LongString from a &str, truncating on a char boundary if too long
pub fn long_string(s: &str) -> LongString {
    truncate(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct Config {
    /// Device identification
    pub device: DeviceConfig,
    /// The battery level range instance
    pub range: RangeConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// Main loop timing
    pub control: ControlConfig,
}

impl Config {
    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set range configuration
    pub fn with_range(mut self, range: RangeConfig) -> Self {
        self.range = range;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set control loop configuration
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.control = control;
        self
    }

    /// Load a JSON config document. Missing fields keep their defaults.
    ///
    /// ```rust
    /// use rs_sinric::config::Config;
    ///
    /// let config = Config::from_json(br#"{"device":{"id":"battery-1"},"range":{"step":5}}"#).unwrap();
    /// assert_eq!(config.device.id.as_str(), "battery-1");
    /// assert_eq!(config.range.step, 5);
    /// assert_eq!(config.mqtt.port, 1883);
    /// ```
    #[cfg(feature = "json")]
    pub fn from_json(bytes: &[u8]) -> Result<Self, crate::error::DeviceError> {
        serde_json::from_slice(bytes)
            .map_err(|e| crate::error::DeviceError::MalformedMessage(alloc::format!("config: {}", e)))
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct DeviceConfig {
    /// Id assigned by the hub
    pub id: ShortString,
    /// Human-readable device name
    pub name: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: ShortString::new(),
            name: short_string("Battery"),
        }
    }
}

impl DeviceConfig {
    /// Set the device ID
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = short_string(id);
        self
    }

    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }
}

// ============================================================================
// Range Config
// ============================================================================

/// One range instance
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct RangeConfig {
    /// Instance id; empty for the default instance
    pub instance_id: ShortString,
    /// Lowest value
    pub min: i32,
    /// Highest value
    pub max: i32,
    /// Granularity from `min`
    pub step: u32,
    /// Starting value (defaults to `min`)
    pub initial: Option<i32>,
    /// Minimum gap between events in milliseconds (0 = no limit)
    pub min_event_interval_ms: u64,
    /// Push an event after every app-driven change
    pub echo_app_changes: bool,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            instance_id: ShortString::new(),
            min: 0,
            max: 100,
            step: 1,
            initial: None,
            min_event_interval_ms: 0,
            echo_app_changes: false,
        }
    }
}

impl RangeConfig {
    /// Set the instance id
    pub fn with_instance_id(mut self, id: &str) -> Self {
        self.instance_id = short_string(id);
        self
    }

    /// Set the bounds
    pub fn with_bounds(mut self, min: i32, max: i32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the step
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// Set the starting value
    pub fn with_initial(mut self, value: i32) -> Self {
        self.initial = Some(value);
        self
    }

    /// Set the minimum gap between events
    pub fn with_min_event_interval_ms(mut self, ms: u64) -> Self {
        self.min_event_interval_ms = ms;
        self
    }

    /// Enable or disable echoing app-driven changes
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_app_changes = echo;
        self
    }

    /// Build the instance spec. Validation happens when it is attached.
    pub fn to_spec(&self) -> RangeSpec {
        let spec = RangeSpec::new(self.instance_id.as_str(), self.min, self.max)
            .with_step(self.step)
            .with_min_event_interval_ms(self.min_event_interval_ms);
        match self.initial {
            Some(value) => spec.with_initial(value),
            None => spec,
        }
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Topic prefix (e.g., "sinric" -> "sinric/request")
    pub topic_prefix: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string("rs-sinric"),
            topic_prefix: short_string("sinric"),
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 30,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = short_string(prefix);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Build a topic string with the configured prefix
    pub fn topic(&self, suffix: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str(self.topic_prefix.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(suffix);
        topic
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// Control Config
// ============================================================================

/// Main loop timing
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ControlConfig {
    /// How often to read sensors and report, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
        }
    }
}

impl ControlConfig {
    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
