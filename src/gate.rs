// Prefetch gate - may the scheduler start downloading the next track?
//
// Decision order is fixed; the first matching rule wins.

use serde::{Deserialize, Serialize};

use crate::policy::TrackSizeClass;
use crate::TrackRef;

/// Why prefetching is currently allowed or refused
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchReason {
    UnderLimit,
    OverLimit,
    LargeTrackGuard,
    Recovering,
    Ungoverned,
}

/// Gate output plus the last prefetch the host confirmed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrefetchState {
    pub allowed: bool,
    pub reason: PrefetchReason,
    pub prefetched_track_ref: Option<TrackRef>,
}

impl PrefetchState {
    pub fn ungoverned() -> Self {
        Self {
            allowed: true,
            reason: PrefetchReason::Ungoverned,
            prefetched_track_ref: None,
        }
    }

    /// Overwrite the decision, keeping the recorded prefetch
    pub fn apply(&mut self, decision: GateDecision) {
        self.allowed = decision.allowed;
        self.reason = decision.reason;
    }
}

impl Default for PrefetchState {
    fn default() -> Self {
        Self::ungoverned()
    }
}

/// Inputs the gate reads from governor state
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    pub active: bool,
    pub is_recovering: bool,
    pub size_class: TrackSizeClass,
    pub estimated_buffered_bytes: u64,
    pub prefetch_limit_bytes: u64,
    pub is_throttling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: PrefetchReason,
}

impl GateDecision {
    fn allow(reason: PrefetchReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: PrefetchReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

pub fn evaluate(inputs: &GateInputs) -> GateDecision {
    if !inputs.active {
        return GateDecision::allow(PrefetchReason::Ungoverned);
    }
    if inputs.is_recovering {
        return GateDecision::deny(PrefetchReason::Recovering);
    }
    if inputs.size_class.is_large() && inputs.estimated_buffered_bytes > inputs.prefetch_limit_bytes
    {
        return GateDecision::deny(PrefetchReason::LargeTrackGuard);
    }
    if inputs.is_throttling {
        return GateDecision::deny(PrefetchReason::OverLimit);
    }
    GateDecision::allow(PrefetchReason::UnderLimit)
}
