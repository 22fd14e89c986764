// src/config/constants.rs
//! System-wide configuration constants

/// Broker connection constants
pub mod mqtt {
    pub const DEFAULT_URI: &str = "test.mosquitto.org";
    pub const DEFAULT_PORT: u16 = 1883;
    pub const DEFAULT_TOPIC_PREFIX: &str = "iot/demo";
    pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
    pub const DEFAULT_CONNECT_RETRIES: u32 = 3;
    pub const MAX_CONNECT_RETRIES: u32 = 10;

    pub const CONNECT_TIMEOUT_MS: u64 = 5000;
    pub const DISCONNECT_GRACE_MS: u64 = 1000;
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
    pub const RETRY_MAX_DELAY_MS: u64 = 10_000;

    /// Capacity of the request channel between client handle and event loop
    pub const EVENT_LOOP_CAPACITY: usize = 64;
    pub const EVENT_LOOP_ERROR_PAUSE_MS: u64 = 1000;

    /// Characters that carry meaning inside an MQTT topic filter
    pub const RESERVED_TOPIC_CHARS: &[char] = &['/', '+', '#'];
}

/// Waveform defaults and output precision
pub mod waveform {
    pub const DEFAULT_AMPLITUDE: f64 = 1.0;
    pub const DEFAULT_FREQUENCY: f64 = 1.0;
    pub const DEFAULT_START: f64 = 0.0;
    pub const DEFAULT_SLOPE: f64 = 1.0;
    pub const DEFAULT_MEAN: f64 = 0.0;
    pub const DEFAULT_STDDEV: f64 = 1.0;

    pub const LINEAR_PRECISION: u32 = 2;
    pub const DEFAULT_PRECISION: u32 = 3;

    /// |sin| below this is treated as an exact zero crossing
    pub const SQUARE_ZERO_EPSILON: f64 = 1e-9;
}

/// Publishing cadence constants
pub mod publish {
    pub const DEFAULT_PUBLISH_INTERVAL_SECS: f64 = 2.0;
    pub const MAX_PUBLISH_INTERVAL_SECS: f64 = 86_400.0;
    pub const CLIENT_ID_SUFFIX_LEN: usize = 8;
    /// How long an in-flight publish may keep running after cancellation
    /// (capped at the publish interval)
    pub const CANCEL_GRACE_MS: u64 = 500;
    /// Upper bound on closing a session before it is dropped
    pub const SESSION_CLOSE_TIMEOUT_MS: u64 = 2_000;
}

/// File system paths
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "config.json";
}
