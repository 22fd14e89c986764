// src/error.rs
//! Unified error handling for the simulator
//!
//! Every fallible operation in the crate returns [`SimResult`]. The variants
//! follow the lifecycle of a run: configuration is checked first, then each
//! device builds its generators, connects and publishes. Only configuration and
//! waveform errors are fatal for a whole run; connect and publish errors stay
//! local to the device that raised them.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type SimResult<T> = Result<T, SimError>;

/// Error type for every stage of a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed or missing configuration field
    #[error("configuration error in `{field}`: {reason}")]
    Config { field: String, reason: String },

    /// Configuration file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file exists but is not valid JSON/TOML for the schema
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Waveform `type` that no generator implements
    #[error("unsupported waveform type `{kind}`")]
    UnsupportedWaveform { kind: String },

    /// A parameter of a device could not be turned into a generator
    #[error("device `{device}` parameter `{parameter}`: {source}")]
    InvalidParameter {
        device: String,
        parameter: String,
        #[source]
        source: Box<SimError>,
    },

    /// Transport refused or timed out the connection
    #[error("failed to connect client `{client_id}`: {reason}")]
    Connect { client_id: String, reason: String },

    /// A single publish call failed
    #[error("failed to publish to `{topic}`: {reason}")]
    Publish { topic: String, reason: String },

    /// Payload could not be encoded or decoded
    #[error("payload encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Cancellation was requested while the operation was pending
    #[error("operation cancelled")]
    Cancelled,

    /// A device task ended without reporting (panic or abort)
    #[error("device task `{device}` ended abnormally: {reason}")]
    Task { device: String, reason: String },
}

impl SimError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn connect(client_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            client_id: client_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn publish(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must stop the run before any device starts
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config { .. }
            | Self::Io { .. }
            | Self::Parse { .. }
            | Self::UnsupportedWaveform { .. } => true,
            Self::InvalidParameter { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Innermost error, unwrapping parameter context
    pub fn root(&self) -> &SimError {
        match self {
            Self::InvalidParameter { source, .. } => source.root(),
            other => other,
        }
    }
}
