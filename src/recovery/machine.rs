// RecoveryMachine - bounded-retry controller
//
// The machine is synchronous: `begin_attempt` decides whether the host's
// recovery hook may run and `finish_attempt` applies its result. The
// governor awaits the hook in between without holding any lock.

use serde::{Deserialize, Serialize};

use crate::config::RecoveryConfig;
use crate::recovery::state::{ErrorKind, RecoveryState};
use crate::TrackRef;

/// Why an attempt did not start
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefusalReason {
    NoFault,
    AlreadyRecovering,
    AlreadyExhausted,
    TooCloseToStart { position_secs: f64 },
}

/// Result of asking to start an attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptDecision {
    /// No transition, nothing counted
    Refused(RefusalReason),
    /// Attempt budget was already spent; the machine just became exhausted
    Exhausted { attempts: u32 },
    /// Invoke the recovery hook with this resume position
    Proceed {
        attempt: u32,
        resume_position_secs: f64,
    },
}

/// Result of applying the hook outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Recovered { attempt: u32 },
    RetryPending { attempt: u32 },
    Exhausted { attempts: u32 },
}

pub struct RecoveryMachine {
    state: RecoveryState,
    config: RecoveryConfig,
}

impl RecoveryMachine {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: RecoveryState::default(),
            config,
        }
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Return to the zero form for a new track
    pub fn reset(&mut self) {
        self.state = RecoveryState::default();
    }

    pub fn record_fault(&mut self, kind: ErrorKind, track_ref: Option<TrackRef>) {
        self.state.error_kind = kind;
        if track_ref.is_some() {
            self.state.track_ref = track_ref;
        }
    }

    /// Move the resume checkpoint, only while no fault is outstanding
    pub fn checkpoint(&mut self, position_secs: f64, buffered_bytes: u64) -> bool {
        if self.state.has_fault() || self.state.is_recovering || self.state.exhausted {
            return false;
        }
        self.state.last_good_position_secs = position_secs.max(0.0);
        self.state.last_good_buffered_bytes = buffered_bytes;
        true
    }

    pub fn begin_attempt(&mut self) -> AttemptDecision {
        if self.state.exhausted {
            return AttemptDecision::Refused(RefusalReason::AlreadyExhausted);
        }
        if self.state.is_recovering {
            return AttemptDecision::Refused(RefusalReason::AlreadyRecovering);
        }
        if !self.state.has_fault() {
            return AttemptDecision::Refused(RefusalReason::NoFault);
        }

        if self.state.attempts >= self.config.max_attempts {
            self.state.exhausted = true;
            return AttemptDecision::Exhausted {
                attempts: self.state.attempts,
            };
        }

        let position = self.state.last_good_position_secs;
        if position < self.config.min_position_secs {
            return AttemptDecision::Refused(RefusalReason::TooCloseToStart {
                position_secs: position,
            });
        }

        self.state.attempts += 1;
        self.state.is_recovering = true;
        AttemptDecision::Proceed {
            attempt: self.state.attempts,
            resume_position_secs: (position - self.config.jitter_secs).max(0.0),
        }
    }

    pub fn finish_attempt(&mut self, recovered: bool) -> AttemptOutcome {
        self.state.is_recovering = false;
        let attempt = self.state.attempts;

        if recovered {
            self.state.error_kind = ErrorKind::None;
            return AttemptOutcome::Recovered { attempt };
        }

        if attempt >= self.config.max_attempts {
            self.state.exhausted = true;
            AttemptOutcome::Exhausted { attempts: attempt }
        } else {
            AttemptOutcome::RetryPending { attempt }
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
