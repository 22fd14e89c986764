// src/config/loader.rs
//! Configuration file loading with default-file creation

use crate::config::SimulatorConfig;
use crate::error::{SimError, SimResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk encoding of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// `.toml` selects TOML; anything else is read as JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Loads a [`SimulatorConfig`] from one file
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    format: ConfigFormat,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ConfigFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Write the default configuration if the file does not exist yet
    ///
    /// Returns `true` when a file was created.
    pub fn ensure_exists(&self) -> SimResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        info!(path = %self.path.display(), "Config file not found, creating default");
        self.save(&SimulatorConfig::default())?;
        Ok(true)
    }

    /// Read, parse and validate the configuration, creating a default first if needed
    pub fn load(&self) -> SimResult<SimulatorConfig> {
        self.ensure_exists()?;

        let content = std::fs::read_to_string(&self.path).map_err(|source| SimError::Io {
            path: self.path.clone(),
            source,
        })?;

        let config = self.parse(&content)?;
        config.validate()?;

        debug!(
            path = %self.path.display(),
            devices = config.devices.len(),
            parameters = config.parameter_count(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Serialize `config` to this loader's path in its format
    pub fn save(&self, config: &SimulatorConfig) -> SimResult<()> {
        let content = match self.format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| SimError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?,
        };

        std::fs::write(&self.path, content).map_err(|source| SimError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn parse(&self, content: &str) -> SimResult<SimulatorConfig> {
        let parsed: Result<SimulatorConfig, String> = match self.format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|reason| SimError::Parse {
            path: self.path.clone(),
            reason,
        })
    }

    /// Parse and validate a JSON document held in memory
    pub fn from_str_json(content: &str) -> SimResult<SimulatorConfig> {
        let config: SimulatorConfig = serde_json::from_str(content).map_err(|e| SimError::Parse {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document held in memory
    pub fn from_str_toml(content: &str) -> SimResult<SimulatorConfig> {
        let config: SimulatorConfig = toml::from_str(content).map_err(|e| SimError::Parse {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
