//! iot-sim: synthetic multi-device sensor simulator
//!
//! Simulates a fleet of IoT devices. Every device owns a set of named
//! parameters, each driven by a deterministic or stochastic waveform, and
//! publishes one JSON reading per parameter to an MQTT broker on a fixed
//! interval. It features:
//!
//! - Stateful waveform generators (linear, gaussian noise, sine, square, sawtooth, triangle)
//! - One independent publisher task per device with cooperative cancellation
//! - Connect retry with exponential backoff and per-device failure isolation
//! - JSON/TOML configuration with defaults and validation
//! - A pluggable transport: rumqttc for real brokers, an in-memory recorder for tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use iot_sim::config::SimulatorConfig;
//! use iot_sim::scheduler::SimulationScheduler;
//! use iot_sim::transport::MemoryTransport;
//! use iot_sim::utils::shared_rng;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SimulatorConfig::default();
//!     let transport = Arc::new(MemoryTransport::new());
//!     let scheduler =
//!         SimulationScheduler::strict(&config, transport.clone(), shared_rng(Some(42)))?;
//!
//!     let report = scheduler.run_ticks(3, CancellationToken::new()).await;
//!     println!("published {} readings", report.published());
//!     for message in transport.messages() {
//!         println!("{} {:?}", message.topic, message.reading()?);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod publisher;
pub mod scheduler;
pub mod simulation;
pub mod transport;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, DeviceModel, MqttSettings, SimulatorConfig};
pub use error::{SimError, SimResult};
pub use publisher::{DevicePublisher, PublisherState, PublisherStats, RetryPolicy, SensorReading};
pub use scheduler::{DeviceOutcome, SimulationReport, SimulationScheduler};
pub use simulation::{GeneratorRegistry, WaveformGenerator, WaveformKind, WaveformSpec};
pub use transport::{MemoryTransport, Session, Transport};

#[cfg(feature = "mqtt")]
pub use transport::MqttTransport;

pub use utils::{
    random::{shared_rng, SharedRng},
    time::{current_timestamp_secs, TimeProvider},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Synthetic multi-device sensor simulator".to_string(),
        waveforms: WaveformKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
        mqtt: cfg!(feature = "mqtt"),
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// Supported waveform kinds
    pub waveforms: Vec<String>,
    /// Built with the rumqttc transport
    pub mqtt: bool,
}
