//! Playback element abstraction.
//!
//! The governor never owns the player. It reads buffered ranges, position,
//! duration, and the ready/network state enumerations through
//! [`PlaybackElement`], and listens to its notifications over a broadcast
//! channel. Every read is treated as untrusted: empty ranges, NaN times and an
//! unknown duration all degrade to zero/none.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One contiguous buffered span, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Media ready state, ordered from least to most data available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether playback can proceed without stalling immediately
    pub fn can_play(&self) -> bool {
        *self >= ReadyState::HaveFutureData
    }
}

/// Media network state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    NoSource,
}

/// Notifications emitted by the element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvent {
    Waiting,
    Playing,
    Progress,
    TimeUpdate,
}

/// Preload hint applied when an element is configured for governance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PreloadHint {
    None,
    Metadata,
    Auto,
}

/// Media error category reported by the player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Unknown,
}

/// Fault reported by the player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
}

impl MediaError {
    pub fn new(code: MediaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Capability set the governor consumes from the external player.
pub trait PlaybackElement: Send + Sync {
    fn buffered(&self) -> Vec<TimeRange>;
    fn current_time(&self) -> f64;
    /// `None` while the duration is unresolved
    fn duration(&self) -> Option<f64>;
    fn ready_state(&self) -> ReadyState;
    fn network_state(&self) -> NetworkState;

    /// Subscribe to element notifications, if the element emits any
    fn subscribe(&self) -> Option<broadcast::Receiver<MediaEvent>> {
        None
    }

    fn set_preload(&self, _hint: PreloadHint) {}
}

/// Point-in-time reading of an element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BufferSample {
    pub buffered_end_secs: f64,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub ready_state: ReadyState,
    pub network_state: NetworkState,
}

impl BufferSample {
    /// Healthy playing sample at `position_secs` with data buffered to `buffered_end_secs`
    pub fn playing(position_secs: f64, buffered_end_secs: f64) -> Self {
        Self {
            buffered_end_secs,
            position_secs,
            duration_secs: None,
            ready_state: ReadyState::HaveEnoughData,
            network_state: NetworkState::Loading,
        }
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn from_element(element: &dyn PlaybackElement) -> Self {
        Self {
            buffered_end_secs: buffered_end(&element.buffered()),
            position_secs: sanitize_secs(element.current_time()),
            duration_secs: element
                .duration()
                .filter(|d| d.is_finite() && *d > 0.0),
            ready_state: element.ready_state(),
            network_state: element.network_state(),
        }
    }

    /// Ready to play, no network fault and a positive play position
    pub fn is_healthy(&self) -> bool {
        self.ready_state.can_play()
            && self.network_state != NetworkState::NoSource
            && self.position_secs > 0.0
    }
}

/// End of the furthest buffered range, or 0 when nothing is buffered
pub fn buffered_end(ranges: &[TimeRange]) -> f64 {
    ranges
        .iter()
        .map(|range| sanitize_secs(range.end))
        .fold(0.0, f64::max)
}

fn sanitize_secs(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
