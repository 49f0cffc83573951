// Buffer estimator - buffered bytes from time ranges
//
// The player exposes buffered time ranges, never byte counts. The estimator
// converts seconds to bytes through an assumed bitrate. Large tracks use a
// higher bitrate so the estimate errs toward over-counting.

use crate::config::EstimatorConfig;
use crate::policy::TrackSizeClass;

/// Strategy turning time-based signals into byte estimates
pub trait BufferEstimator: Send + Sync {
    /// Estimated bytes held between the play origin and `buffered_end_secs`
    fn buffered_bytes(&self, buffered_end_secs: f64, class: TrackSizeClass) -> u64;

    /// Estimated size of a whole track, `None` when the duration is unusable
    fn track_bytes(&self, duration_secs: f64, class: TrackSizeClass) -> Option<u64>;
}

/// Default estimator: `floor(seconds * bitrate / 8)`
#[derive(Debug, Clone)]
pub struct BitrateEstimator {
    normal_bitrate_bps: u32,
    large_bitrate_bps: u32,
}

impl BitrateEstimator {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            normal_bitrate_bps: config.normal_bitrate_bps,
            large_bitrate_bps: config.large_bitrate_bps,
        }
    }

    pub fn bitrate_for(&self, class: TrackSizeClass) -> u32 {
        if class.is_large() {
            self.large_bitrate_bps
        } else {
            self.normal_bitrate_bps
        }
    }
}

impl Default for BitrateEstimator {
    fn default() -> Self {
        Self::new(&EstimatorConfig::default())
    }
}

impl BufferEstimator for BitrateEstimator {
    fn buffered_bytes(&self, buffered_end_secs: f64, class: TrackSizeClass) -> u64 {
        seconds_to_bytes(buffered_end_secs, self.bitrate_for(class))
    }

    fn track_bytes(&self, duration_secs: f64, class: TrackSizeClass) -> Option<u64> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return None;
        }
        Some(seconds_to_bytes(duration_secs, self.bitrate_for(class)))
    }
}

fn seconds_to_bytes(secs: f64, bitrate_bps: u32) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * bitrate_bps as f64 / 8.0).floor() as u64
}
