//! Governor event types published to the diagnostics history and stream.

use serde::{Deserialize, Serialize};

use crate::policy::TrackSizeClass;
use crate::recovery::{ErrorKind, RefusalReason};
use crate::TrackRef;

/// Everything observable the governor does, in the order it happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GovernorEvent {
    ThrottleStarted {
        ratio: f64,
        estimated_buffered_bytes: u64,
    },
    ThrottleEnded {
        ratio: f64,
        estimated_buffered_bytes: u64,
    },
    TrackReset {
        estimated_size_bytes: Option<u64>,
        size_class: TrackSizeClass,
    },
    TrackSizeLearned {
        size_bytes: u64,
        size_class: TrackSizeClass,
        backfilled: bool,
    },
    Stalled {
        position_secs: f64,
        estimated_buffered_bytes: u64,
    },
    FaultClassified {
        kind: ErrorKind,
        estimated_buffered_bytes: u64,
    },
    RecoveryStarted {
        attempt: u32,
        resume_position_secs: f64,
    },
    RecoveryRefused {
        reason: RefusalReason,
    },
    RecoverySucceeded {
        attempt: u32,
    },
    RecoveryFailed {
        attempt: u32,
        error_code: Option<i32>,
    },
    RecoveryExhausted {
        attempts: u32,
    },
    PrefetchRecorded {
        track_ref: TrackRef,
    },
}
