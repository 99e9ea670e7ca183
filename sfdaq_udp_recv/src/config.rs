//! Receiver configuration

use serde::{Deserialize, Serialize};
use sfdaq_common::config::{ConfigError, DetectorConfig, SharedConfig};
use sfdaq_common::consts::BUFFER_UDP_RCVBUF_BYTES;

fn default_stats_time_s() -> u64 {
    10
}

fn default_rcvbuf_bytes() -> usize {
    BUFFER_UDP_RCVBUF_BYTES
}

/// Receiver-specific settings.
///
/// # TOML Example
///
/// ```toml
/// [receiver]
/// start_udp_port = 50020
/// stats_time_s = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverSettings {
    /// UDP port of module 0; module `n` listens on `start_udp_port + n`.
    pub start_udp_port: u16,

    /// Seconds between statistics reports.
    #[serde(default = "default_stats_time_s")]
    pub stats_time_s: u64,

    /// Requested kernel receive buffer per socket.
    #[serde(default = "default_rcvbuf_bytes")]
    pub rcvbuf_bytes: usize,
}

impl ReceiverSettings {
    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_udp_port == 0 {
            return Err(ConfigError::ValidationError(
                "start_udp_port cannot be 0".to_string(),
            ));
        }
        if self.stats_time_s == 0 {
            return Err(ConfigError::ValidationError(
                "stats_time_s cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file of `sfdaq_udp_recv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    /// Common settings
    pub shared: SharedConfig,
    /// Detector geometry and buffer name
    pub detector: DetectorConfig,
    /// Receiver settings
    pub receiver: ReceiverSettings,
}

impl ReceiverConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.detector.validate()?;
        self.receiver.validate()
    }

    /// UDP port of `module_id`, checked against the detector geometry.
    pub fn udp_port(&self, module_id: u64) -> Result<u16, ConfigError> {
        if module_id >= self.detector.n_modules as u64 {
            return Err(ConfigError::ValidationError(format!(
                "module_id {module_id} out of range for {} modules",
                self.detector.n_modules
            )));
        }
        u16::try_from(module_id)
            .ok()
            .and_then(|offset| self.receiver.start_udp_port.checked_add(offset))
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "UDP port {} + {module_id} exceeds 65535",
                    self.receiver.start_udp_port
                ))
            })
    }
}
