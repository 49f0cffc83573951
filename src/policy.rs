// Threshold policy - buffer/prefetch limits and track size tiers
//
// Pure functions only. Limits are picked from the environment's network
// class; track size tiers come from fixed byte thresholds.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdConfig;
use crate::environment::{EnvironmentDescriptor, NetworkClass};
use crate::error::GovernorError;

/// Size tier of the current track
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackSizeClass {
    #[default]
    Normal,
    Large,
    VeryLarge,
}

impl TrackSizeClass {
    pub fn is_large(&self) -> bool {
        !matches!(self, TrackSizeClass::Normal)
    }
}

/// Buffer ceiling and prefetch cutoff for a session
///
/// Invariant: `prefetch_limit_bytes < buffer_limit_bytes`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThresholdSet {
    pub buffer_limit_bytes: u64,
    pub prefetch_limit_bytes: u64,
}

impl ThresholdSet {
    pub fn new(buffer_limit_bytes: u64, prefetch_limit_bytes: u64) -> Result<Self, GovernorError> {
        if prefetch_limit_bytes >= buffer_limit_bytes {
            return Err(GovernorError::InvalidConfig {
                reason: format!(
                    "prefetch limit {} must be below buffer limit {}",
                    prefetch_limit_bytes, buffer_limit_bytes
                ),
            });
        }
        Ok(Self {
            buffer_limit_bytes,
            prefetch_limit_bytes,
        })
    }

    /// Limits for an ungoverned session
    pub fn unbounded() -> Self {
        Self {
            buffer_limit_bytes: u64::MAX,
            prefetch_limit_bytes: u64::MAX - 1,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.buffer_limit_bytes == u64::MAX
    }

    /// Fraction of the buffer ceiling occupied by `bytes`
    pub fn ratio(&self, bytes: u64) -> f64 {
        if self.is_unbounded() || self.buffer_limit_bytes == 0 {
            return 0.0;
        }
        bytes as f64 / self.buffer_limit_bytes as f64
    }
}

/// Map the session environment to its threshold set
///
/// Non-constrained platforms are unbounded. Constrained platforms use the
/// cellular or Wi-Fi pair from `config`.
pub fn limits_for(env: &EnvironmentDescriptor, config: &ThresholdConfig) -> ThresholdSet {
    if !env.is_constrained_platform {
        return ThresholdSet::unbounded();
    }

    match env.network_class() {
        NetworkClass::Cellular => ThresholdSet {
            buffer_limit_bytes: config.cellular_buffer_limit_bytes,
            prefetch_limit_bytes: config.cellular_prefetch_limit_bytes,
        },
        NetworkClass::Wifi => ThresholdSet {
            buffer_limit_bytes: config.wifi_buffer_limit_bytes,
            prefetch_limit_bytes: config.wifi_prefetch_limit_bytes,
        },
    }
}

/// Classify a track by its (estimated) byte size
pub fn classify_track_size(size_bytes: u64, config: &ThresholdConfig) -> TrackSizeClass {
    if size_bytes > config.very_large_track_bytes {
        TrackSizeClass::VeryLarge
    } else if size_bytes > config.large_track_bytes {
        TrackSizeClass::Large
    } else {
        TrackSizeClass::Normal
    }
}
