// RecoveryState - fault classification and per-track recovery bookkeeping
//
// The state is reset to its zero form whenever a new track is loaded.
// `attempts` only grows on a recovery attempt and `error_kind` is cleared
// when an attempt succeeds.

use serde::{Deserialize, Serialize};

use crate::element::{MediaError, MediaErrorCode, NetworkState};
use crate::TrackRef;

/// Governance-relevant fault categories
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    None,
    BufferFailure,
    NoSource,
    NotSupported,
    NetworkError,
}

/// Coarse position in the recovery lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    Idle,
    ErrorDetected,
    Recovering,
    Exhausted,
}

/// Recovery bookkeeping for the current track
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecoveryState {
    pub error_kind: ErrorKind,
    pub attempts: u32,
    /// Checkpoint recovery resumes from
    pub last_good_position_secs: f64,
    pub last_good_buffered_bytes: u64,
    pub is_recovering: bool,
    /// Terminal for the current track
    pub exhausted: bool,
    pub track_ref: Option<TrackRef>,
}

impl RecoveryState {
    pub fn phase(&self) -> RecoveryPhase {
        if self.exhausted {
            RecoveryPhase::Exhausted
        } else if self.is_recovering {
            RecoveryPhase::Recovering
        } else if self.error_kind != ErrorKind::None {
            RecoveryPhase::ErrorDetected
        } else {
            RecoveryPhase::Idle
        }
    }

    pub fn has_fault(&self) -> bool {
        self.error_kind != ErrorKind::None
    }
}

/// Classify a player fault, or `None` when it is not governance-relevant
///
/// A "no source" or network fault counts as a buffer failure when the
/// estimated buffer exceeded half the large-track threshold at fault time.
pub fn classify_fault(
    error: &MediaError,
    network_state: NetworkState,
    estimated_buffered_bytes: u64,
    large_track_bytes: u64,
) -> Option<ErrorKind> {
    let buffer_heavy = estimated_buffered_bytes > large_track_bytes / 2;

    if network_state == NetworkState::NoSource {
        return Some(if buffer_heavy {
            ErrorKind::BufferFailure
        } else {
            ErrorKind::NoSource
        });
    }

    if error.code == MediaErrorCode::SrcNotSupported || indicates_unsupported(&error.message) {
        return Some(ErrorKind::NotSupported);
    }

    if error.code == MediaErrorCode::Network {
        return Some(if buffer_heavy {
            ErrorKind::BufferFailure
        } else {
            ErrorKind::NetworkError
        });
    }

    None
}

fn indicates_unsupported(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("not supported") || lowered.contains("unsupported")
}
