// src/config/mod.rs
//! Simulator configuration: schema, defaults and validation

pub mod constants;
pub mod device_config;
pub mod loader;

pub use constants::*;
pub use device_config::{validate_device_model, DeviceModel, ParameterMap};
pub use loader::{ConfigFormat, ConfigLoader};

use crate::error::{SimError, SimResult};
use crate::simulation::{WaveformKind, WaveformSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Complete simulator configuration
///
/// Scalar fields come first so the struct also serializes cleanly as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Seconds between ticks of every device
    #[serde(default = "defaults::publish_interval")]
    pub publish_interval: f64,

    /// Echo every publish and connection event
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub mqtt: MqttSettings,

    /// Device id to parameter map
    #[serde(default)]
    pub devices: BTreeMap<String, ParameterMap>,
}

/// Broker target shared by every device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    #[serde(default = "defaults::uri")]
    pub uri: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Credentials are only sent when non-empty
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Empty means one id is derived per device
    #[serde(default)]
    pub client_id: String,

    #[serde(default = "defaults::topic_prefix")]
    pub topic_prefix: String,

    #[serde(default = "defaults::keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "defaults::connect_retries")]
    pub connect_retries: u32,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn publish_interval() -> f64 { publish::DEFAULT_PUBLISH_INTERVAL_SECS }

    pub fn uri() -> String { mqtt::DEFAULT_URI.to_string() }
    pub fn port() -> u16 { mqtt::DEFAULT_PORT }
    pub fn topic_prefix() -> String { mqtt::DEFAULT_TOPIC_PREFIX.to_string() }
    pub fn keep_alive_secs() -> u64 { mqtt::DEFAULT_KEEP_ALIVE_SECS }
    pub fn connect_retries() -> u32 { mqtt::DEFAULT_CONNECT_RETRIES }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            uri: defaults::uri(),
            port: defaults::port(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            topic_prefix: defaults::topic_prefix(),
            keep_alive_secs: defaults::keep_alive_secs(),
            connect_retries: defaults::connect_retries(),
        }
    }
}

impl Default for SimulatorConfig {
    /// Starter configuration: one device exercising every waveform kind
    fn default() -> Self {
        let parameters: ParameterMap = [
            ("Temperature1", WaveformSpec::linear(20.0, 0.1)),
            ("Voltage1", WaveformSpec::noise(3.3, 0.05)),
            ("Sin1", WaveformSpec::periodic(WaveformKind::Sine, 1.0, 0.1)),
            ("Square1", WaveformSpec::periodic(WaveformKind::Square, 1.0, 0.2)),
            ("Saw1", WaveformSpec::periodic(WaveformKind::Sawtooth, 1.0, 0.2)),
            ("Tri1", WaveformSpec::periodic(WaveformKind::Triangle, 1.0, 0.2)),
        ]
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect();

        Self {
            publish_interval: defaults::publish_interval(),
            verbose: true,
            mqtt: MqttSettings::default(),
            devices: BTreeMap::from([("device1".to_string(), parameters)]),
        }
    }
}

impl SimulatorConfig {
    /// Check everything that must hold before any publisher starts
    pub fn validate(&self) -> SimResult<()> {
        self.mqtt.validate()?;

        let interval = self.publish_interval;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(SimError::config(
                "publish_interval",
                format!("must be a positive number of seconds, got {}", interval),
            ));
        }
        if interval > publish::MAX_PUBLISH_INTERVAL_SECS {
            return Err(SimError::config(
                "publish_interval",
                format!(
                    "must not exceed {} seconds, got {}",
                    publish::MAX_PUBLISH_INTERVAL_SECS,
                    interval
                ),
            ));
        }

        if self.devices.is_empty() {
            return Err(SimError::config("devices", "at least one device is required"));
        }

        for model in self.device_models() {
            validate_device_model(&model)?;
        }

        Ok(())
    }

    /// Tick interval; only meaningful on a validated config
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.publish_interval)
    }

    /// Devices in stable id order
    pub fn device_models(&self) -> Vec<DeviceModel> {
        self.devices
            .iter()
            .map(|(id, parameters)| DeviceModel::new(id.clone(), parameters.clone()))
            .collect()
    }

    /// Replace or add one device
    pub fn with_device(mut self, model: DeviceModel) -> Self {
        self.devices.insert(model.id, model.parameters);
        self
    }

    /// Total number of parameters across all devices
    pub fn parameter_count(&self) -> usize {
        self.devices.values().map(|params| params.len()).sum()
    }

    /// The configured client id when several devices will connect with it
    ///
    /// Most brokers drop the older connection when a client id is reused.
    pub fn shared_client_id(&self) -> Option<&str> {
        let client_id = self.mqtt.client_id.as_str();
        (!client_id.is_empty() && self.devices.len() > 1).then_some(client_id)
    }
}

impl MqttSettings {
    pub fn validate(&self) -> SimResult<()> {
        if self.uri.trim().is_empty() {
            return Err(SimError::config("mqtt.uri", "broker host cannot be empty"));
        }
        if self.port == 0 {
            return Err(SimError::config("mqtt.port", "port must be non-zero"));
        }
        if self.topic_prefix.is_empty() {
            return Err(SimError::config("mqtt.topic_prefix", "topic prefix cannot be empty"));
        }
        if self.topic_prefix.contains(&['+', '#'][..]) {
            return Err(SimError::config(
                "mqtt.topic_prefix",
                "topic prefix cannot contain wildcards",
            ));
        }
        if self.connect_retries > mqtt::MAX_CONNECT_RETRIES {
            return Err(SimError::config(
                "mqtt.connect_retries",
                format!("must be at most {}", mqtt::MAX_CONNECT_RETRIES),
            ));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}
