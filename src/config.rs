//! Configuration management for governor tuning
//!
//! This module provides runtime configuration loading from JSON files, so
//! buffer limits, assumed bitrates, and recovery constants can be adjusted
//! per deployment without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::GovernorError;

/// One mebibyte, the unit every byte threshold is expressed in.
pub const MIB: u64 = 1024 * 1024;

/// Complete governor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Network-class-to-limits mapping and track size tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Hard buffer limit on Wi-Fi-equivalent networks
    pub wifi_buffer_limit_bytes: u64,
    /// Prefetch cutoff on Wi-Fi-equivalent networks
    pub wifi_prefetch_limit_bytes: u64,
    /// Hard buffer limit on cellular networks
    pub cellular_buffer_limit_bytes: u64,
    /// Prefetch cutoff on cellular networks
    pub cellular_prefetch_limit_bytes: u64,
    /// Tracks strictly above this size are classified large
    pub large_track_bytes: u64,
    /// Tracks strictly above this size are classified very large
    pub very_large_track_bytes: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            // Native ceiling sits around 22-23MB; keep well clear of it
            wifi_buffer_limit_bytes: 15 * MIB,
            wifi_prefetch_limit_bytes: 10 * MIB,
            cellular_buffer_limit_bytes: 12 * MIB,
            cellular_prefetch_limit_bytes: 8 * MIB,
            large_track_bytes: 25 * MIB,
            very_large_track_bytes: 40 * MIB,
        }
    }
}

/// Assumed bitrates for the time-range byte estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Bitrate assumed for normal tracks (bits/second)
    pub normal_bitrate_bps: u32,
    /// Bitrate assumed once a track is classified large (bits/second)
    pub large_bitrate_bps: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            normal_bitrate_bps: 128_000,
            large_bitrate_bps: 192_000,
        }
    }
}

/// Monitoring loop and hysteresis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll interval for the monitoring task
    pub poll_interval_ms: u64,
    /// Buffer ratio above which throttling starts
    pub throttle_start_ratio: f64,
    /// Buffer ratio below which throttling ends
    pub throttle_end_ratio: f64,
    /// Minimum spacing between repetitive throttle log lines
    pub log_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            throttle_start_ratio: 0.9,
            throttle_end_ratio: 0.7,
            log_interval_ms: 5_000,
        }
    }
}

/// Recovery state machine constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Attempts allowed per track before exhaustion
    pub max_attempts: u32,
    /// Recovery is refused when the last good position is below this
    pub min_position_secs: f64,
    /// Backward offset applied to the resume position
    pub jitter_secs: f64,
    /// Wall-clock bound on a single recovery hook invocation
    pub attempt_timeout_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_position_secs: 5.0,
            jitter_secs: 2.0,
            attempt_timeout_ms: 10_000,
        }
    }
}

impl GovernorConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// the JSON is invalid. Missing sections and fields fall back to their
    /// defaults individually.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), GovernorError> {
        let t = &self.thresholds;
        if t.wifi_prefetch_limit_bytes >= t.wifi_buffer_limit_bytes {
            return Err(invalid("wifi prefetch limit must be below the wifi buffer limit"));
        }
        if t.cellular_prefetch_limit_bytes >= t.cellular_buffer_limit_bytes {
            return Err(invalid(
                "cellular prefetch limit must be below the cellular buffer limit",
            ));
        }
        if t.large_track_bytes >= t.very_large_track_bytes {
            return Err(invalid("large track threshold must be below the very large threshold"));
        }
        if self.estimator.normal_bitrate_bps == 0 || self.estimator.large_bitrate_bps == 0 {
            return Err(invalid("assumed bitrates must be positive"));
        }

        let m = &self.monitor;
        if m.poll_interval_ms == 0 {
            return Err(invalid("poll interval must be positive"));
        }
        if !(m.throttle_end_ratio > 0.0 && m.throttle_end_ratio < m.throttle_start_ratio) {
            return Err(invalid(
                "throttle end ratio must be positive and below the start ratio",
            ));
        }

        let r = &self.recovery;
        if !(r.min_position_secs >= 0.0 && r.jitter_secs >= 0.0) {
            return Err(invalid("recovery positions must be non-negative"));
        }
        if r.attempt_timeout_ms == 0 {
            return Err(invalid("recovery attempt timeout must be positive"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> GovernorError {
    GovernorError::InvalidConfig {
        reason: reason.to_string(),
    }
}
