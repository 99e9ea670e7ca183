//! Configuration loading traits and types.
//!
//! Every sf-daq binary reads one TOML file. The sections shared by all of
//! them live here; binaries embed them in their own config struct and load
//! it through [`ConfigLoader`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use sfdaq_common::config::{ConfigError, ConfigLoader, DetectorConfig, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     detector: DetectorConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("detector.toml"))?;
//!     config.detector.validate()?;
//!     println!("Detector: {}", config.detector.detector_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{MAX_MODULES, RAM_BUFFER_N_SLOTS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Common configuration fields shared across all sf-daq applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "jf-udp-recv-M03"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_n_slots() -> usize {
    RAM_BUFFER_N_SLOTS
}

/// Detector geometry and ring buffer identity.
///
/// # TOML Example
///
/// ```toml
/// [detector]
/// detector_name = "JF07T32V01"
/// n_modules = 32
/// n_slots = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Detector name; also names the shared ring buffer.
    pub detector_name: String,

    /// Number of modules writing into the ring buffer.
    pub n_modules: usize,

    /// Number of ring buffer slots.
    #[serde(default = "default_n_slots")]
    pub n_slots: usize,
}

impl DetectorConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `detector_name` is empty or contains `/`
    /// - `n_modules` is 0 or above `MAX_MODULES`
    /// - `n_slots` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detector_name.is_empty() || self.detector_name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "invalid detector_name '{}'",
                self.detector_name
            )));
        }
        if self.n_modules == 0 || self.n_modules > MAX_MODULES {
            return Err(ConfigError::ValidationError(format!(
                "n_modules must be in 1..={MAX_MODULES}, got {}",
                self.n_modules
            )));
        }
        if self.n_slots == 0 {
            return Err(ConfigError::ValidationError(
                "n_slots cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any deserializable struct can be loaded.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
