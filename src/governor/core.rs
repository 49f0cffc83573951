//! GovernorCore: the single-writer state behind [`Governor`](super::Governor).
//!
//! Every method runs to completion under the governor's lock and returns the
//! events it produced. The caller dispatches those events (diagnostics and
//! host hooks) after releasing the lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::GovernorConfig;
use crate::element::{BufferSample, MediaError, NetworkState};
use crate::environment::EnvironmentDescriptor;
use crate::error::{ErrorCode, GovernorError};
use crate::estimator::BufferEstimator;
use crate::gate::{self, GateInputs, PrefetchState};
use crate::policy::{classify_track_size, limits_for, ThresholdSet, TrackSizeClass};
use crate::recovery::{
    classify_fault, AttemptDecision, AttemptOutcome, RecoveryMachine, RecoveryPhase, RecoveryState,
};
use crate::telemetry::GovernorEvent;
use crate::TrackRef;

use super::throttle::{LogThrottle, ThrottleHysteresis, ThrottleTransition};

/// Read-only copy of the governor's aggregate state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernorState {
    pub active: bool,
    pub estimated_buffered_bytes: u64,
    pub buffer_ratio: f64,
    pub is_throttling: bool,
    pub track_size_class: TrackSizeClass,
    pub track_size_bytes: Option<u64>,
    pub thresholds: ThresholdSet,
    pub recovery: RecoveryState,
    pub recovery_phase: RecoveryPhase,
    pub prefetch: PrefetchState,
}

/// Attempt admitted by [`GovernorCore::begin_recovery`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct AdmittedAttempt {
    pub attempt: u32,
    pub resume_position_secs: f64,
    pub generation: u64,
    pub timeout: Duration,
}

pub(crate) struct GovernorCore {
    config: GovernorConfig,
    thresholds: ThresholdSet,
    estimator: Arc<dyn BufferEstimator>,
    active: bool,
    destroyed: bool,
    /// Bumped on track reset and destroy; stale recovery results are dropped
    generation: u64,
    buffered_end_secs: f64,
    estimated_buffered_bytes: u64,
    buffer_ratio: f64,
    track_size_bytes: Option<u64>,
    size_class: TrackSizeClass,
    current_track: Option<TrackRef>,
    throttle: ThrottleHysteresis,
    throttle_log: LogThrottle,
    recovery: RecoveryMachine,
    prefetch: PrefetchState,
}

impl GovernorCore {
    pub(crate) fn new(
        env: &EnvironmentDescriptor,
        config: GovernorConfig,
        estimator: Arc<dyn BufferEstimator>,
    ) -> Self {
        let thresholds = limits_for(env, &config.thresholds);
        let active = env.is_constrained_platform;
        let throttle = ThrottleHysteresis::new(
            config.monitor.throttle_start_ratio,
            config.monitor.throttle_end_ratio,
        );
        let throttle_log = LogThrottle::new(Duration::from_millis(config.monitor.log_interval_ms));
        let recovery = RecoveryMachine::new(config.recovery.clone());

        let mut core = Self {
            config,
            thresholds,
            estimator,
            active,
            destroyed: false,
            generation: 0,
            buffered_end_secs: 0.0,
            estimated_buffered_bytes: 0,
            buffer_ratio: 0.0,
            track_size_bytes: None,
            size_class: TrackSizeClass::Normal,
            current_track: None,
            throttle,
            throttle_log,
            recovery,
            prefetch: PrefetchState::ungoverned(),
        };
        core.refresh_prefetch();
        core
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub(crate) fn snapshot(&self) -> GovernorState {
        let recovery = self.recovery.state().clone();
        GovernorState {
            active: self.active,
            estimated_buffered_bytes: self.estimated_buffered_bytes,
            buffer_ratio: self.buffer_ratio,
            is_throttling: self.throttle.is_throttling(),
            track_size_class: self.size_class,
            track_size_bytes: self.track_size_bytes,
            thresholds: self.thresholds,
            recovery_phase: recovery.phase(),
            recovery,
            prefetch: self.prefetch.clone(),
        }
    }

    pub(crate) fn prefetch(&self) -> &PrefetchState {
        &self.prefetch
    }

    // ========================================================================
    // BUFFER UPDATES
    // ========================================================================

    pub(crate) fn observe(&mut self, sample: &BufferSample, now: Instant) -> Vec<GovernorEvent> {
        let mut events = Vec::new();
        if !self.active {
            return events;
        }

        if self.track_size_bytes.is_none() {
            if let Some(bytes) = sample
                .duration_secs
                .and_then(|duration| self.estimator.track_bytes(duration, self.size_class))
            {
                self.apply_track_size(bytes);
                tracing::debug!(
                    "[Governor] Back-filled track size {} bytes from duration ({:?})",
                    bytes,
                    self.size_class
                );
                events.push(GovernorEvent::TrackSizeLearned {
                    size_bytes: bytes,
                    size_class: self.size_class,
                    backfilled: true,
                });
            }
        }

        self.buffered_end_secs = sample.buffered_end_secs;
        self.refresh_estimate();

        if sample.is_healthy() {
            self.recovery
                .checkpoint(sample.position_secs, self.estimated_buffered_bytes);
        }

        self.apply_hysteresis(now, &mut events);
        self.refresh_prefetch();
        events
    }

    pub(crate) fn stalled(&self, position_secs: f64) -> Option<GovernorEvent> {
        if !self.active {
            return None;
        }
        tracing::debug!(
            "[Governor] Playback waiting at {:.1}s with ~{} bytes buffered",
            position_secs,
            self.estimated_buffered_bytes
        );
        Some(GovernorEvent::Stalled {
            position_secs,
            estimated_buffered_bytes: self.estimated_buffered_bytes,
        })
    }

    // ========================================================================
    // TRACK LIFECYCLE
    // ========================================================================

    pub(crate) fn reset_for_new_track(
        &mut self,
        estimated_size_bytes: Option<u64>,
    ) -> Vec<GovernorEvent> {
        let mut events = Vec::new();
        if !self.active {
            return events;
        }

        self.generation += 1;
        self.recovery.reset();
        self.buffered_end_secs = 0.0;
        self.estimated_buffered_bytes = 0;
        self.buffer_ratio = 0.0;
        self.prefetch.prefetched_track_ref = None;
        self.track_size_bytes = None;
        self.size_class = TrackSizeClass::Normal;
        if let Some(bytes) = estimated_size_bytes {
            self.apply_track_size(bytes);
        }

        if self.throttle.release() {
            events.push(GovernorEvent::ThrottleEnded {
                ratio: 0.0,
                estimated_buffered_bytes: 0,
            });
        }

        tracing::info!(
            "[Governor] New track: size={:?} class={:?}",
            estimated_size_bytes,
            self.size_class
        );
        events.push(GovernorEvent::TrackReset {
            estimated_size_bytes,
            size_class: self.size_class,
        });
        self.refresh_prefetch();
        events
    }

    pub(crate) fn set_track_size(&mut self, size_bytes: u64, now: Instant) -> Vec<GovernorEvent> {
        let mut events = Vec::new();
        if !self.active {
            return events;
        }

        self.apply_track_size(size_bytes);
        events.push(GovernorEvent::TrackSizeLearned {
            size_bytes,
            size_class: self.size_class,
            backfilled: false,
        });

        // Class changes the assumed bitrate, so re-estimate right away
        self.refresh_estimate();
        self.apply_hysteresis(now, &mut events);
        self.refresh_prefetch();
        events
    }

    pub(crate) fn set_current_track(&mut self, track_ref: Option<TrackRef>) {
        self.current_track = track_ref;
    }

    pub(crate) fn record_prefetch(&mut self, track_ref: TrackRef) -> Option<GovernorEvent> {
        if !self.active {
            return None;
        }
        self.prefetch.prefetched_track_ref = Some(track_ref.clone());
        Some(GovernorEvent::PrefetchRecorded { track_ref })
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
        self.active = false;
        self.generation += 1;
        self.throttle.release();
        self.refresh_prefetch();
    }

    // ========================================================================
    // FAULTS AND RECOVERY
    // ========================================================================

    pub(crate) fn handle_error(
        &mut self,
        error: &MediaError,
        network_state: NetworkState,
    ) -> Option<GovernorEvent> {
        if !self.active {
            return None;
        }

        let Some(kind) = classify_fault(
            error,
            network_state,
            self.estimated_buffered_bytes,
            self.config.thresholds.large_track_bytes,
        ) else {
            tracing::debug!(
                "[Recovery] Ignoring fault {:?} ({}) with network state {:?}",
                error.code,
                error.message,
                network_state
            );
            return None;
        };

        self.recovery.record_fault(kind, self.current_track.clone());
        tracing::warn!(
            "[Recovery] Fault classified as {:?} (~{} bytes buffered, last good {:.1}s)",
            kind,
            self.estimated_buffered_bytes,
            self.recovery.state().last_good_position_secs
        );
        self.refresh_prefetch();
        Some(GovernorEvent::FaultClassified {
            kind,
            estimated_buffered_bytes: self.estimated_buffered_bytes,
        })
    }

    pub(crate) fn begin_recovery(&mut self) -> (Option<AdmittedAttempt>, Vec<GovernorEvent>) {
        let mut events = Vec::new();
        if !self.active {
            return (None, events);
        }

        let admitted = match self.recovery.begin_attempt() {
            AttemptDecision::Refused(reason) => {
                tracing::debug!("[Recovery] Attempt refused: {:?}", reason);
                events.push(GovernorEvent::RecoveryRefused { reason });
                None
            }
            AttemptDecision::Exhausted { attempts } => {
                tracing::warn!(
                    "[Recovery] Budget spent after {} attempts, giving up on track",
                    attempts
                );
                events.push(GovernorEvent::RecoveryExhausted { attempts });
                None
            }
            AttemptDecision::Proceed {
                attempt,
                resume_position_secs,
            } => {
                tracing::info!(
                    "[Recovery] Attempt {}/{} resuming at {:.1}s",
                    attempt,
                    self.config.recovery.max_attempts,
                    resume_position_secs
                );
                events.push(GovernorEvent::RecoveryStarted {
                    attempt,
                    resume_position_secs,
                });
                Some(AdmittedAttempt {
                    attempt,
                    resume_position_secs,
                    generation: self.generation,
                    timeout: Duration::from_millis(self.config.recovery.attempt_timeout_ms),
                })
            }
        };

        self.refresh_prefetch();
        (admitted, events)
    }

    /// Apply a hook result; returns whether playback recovered
    pub(crate) fn finish_recovery(
        &mut self,
        admitted: &AdmittedAttempt,
        result: Result<bool, GovernorError>,
    ) -> (bool, Vec<GovernorEvent>) {
        let mut events = Vec::new();
        if self.destroyed || self.generation != admitted.generation {
            tracing::debug!(
                "[Recovery] Discarding result of attempt {} for a stale track",
                admitted.attempt
            );
            return (false, events);
        }

        let error_code = result.as_ref().err().map(|err| err.code());
        let recovered = matches!(result, Ok(true));

        match self.recovery.finish_attempt(recovered) {
            AttemptOutcome::Recovered { attempt } => {
                tracing::info!("[Recovery] Attempt {} restored playback", attempt);
                events.push(GovernorEvent::RecoverySucceeded { attempt });
            }
            AttemptOutcome::RetryPending { attempt } => {
                tracing::warn!("[Recovery] Attempt {} failed, retry pending", attempt);
                events.push(GovernorEvent::RecoveryFailed {
                    attempt,
                    error_code,
                });
            }
            AttemptOutcome::Exhausted { attempts } => {
                tracing::warn!(
                    "[Recovery] Attempt {} failed, recovery exhausted for track",
                    attempts
                );
                events.push(GovernorEvent::RecoveryFailed {
                    attempt: attempts,
                    error_code,
                });
                events.push(GovernorEvent::RecoveryExhausted { attempts });
            }
        }

        self.refresh_prefetch();
        (recovered, events)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn apply_track_size(&mut self, size_bytes: u64) {
        self.track_size_bytes = Some(size_bytes);
        self.size_class = classify_track_size(size_bytes, &self.config.thresholds);
    }

    fn refresh_estimate(&mut self) {
        self.estimated_buffered_bytes = self
            .estimator
            .buffered_bytes(self.buffered_end_secs, self.size_class);
        self.buffer_ratio = self.thresholds.ratio(self.estimated_buffered_bytes);
    }

    fn apply_hysteresis(&mut self, now: Instant, events: &mut Vec<GovernorEvent>) {
        let ratio = self.buffer_ratio;
        let estimated_buffered_bytes = self.estimated_buffered_bytes;

        match self.throttle.update(ratio) {
            Some(ThrottleTransition::Started) => {
                tracing::warn!(
                    "[Governor] Throttling prefetch: ratio {:.2} (~{} bytes of {})",
                    ratio,
                    estimated_buffered_bytes,
                    self.thresholds.buffer_limit_bytes
                );
                events.push(GovernorEvent::ThrottleStarted {
                    ratio,
                    estimated_buffered_bytes,
                });
            }
            Some(ThrottleTransition::Ended) => {
                tracing::info!("[Governor] Throttle released: ratio {:.2}", ratio);
                events.push(GovernorEvent::ThrottleEnded {
                    ratio,
                    estimated_buffered_bytes,
                });
            }
            None => {
                if self.throttle.is_throttling() && self.throttle_log.should_log(now) {
                    tracing::debug!(
                        "[Governor] Sustained buffer pressure: ratio {:.2}",
                        ratio
                    );
                }
            }
        }
    }

    fn refresh_prefetch(&mut self) {
        let recovery = self.recovery.state();
        let decision = gate::evaluate(&GateInputs {
            active: self.active,
            is_recovering: recovery.is_recovering,
            size_class: self.size_class,
            estimated_buffered_bytes: self.estimated_buffered_bytes,
            prefetch_limit_bytes: self.thresholds.prefetch_limit_bytes,
            is_throttling: self.throttle.is_throttling(),
        });
        self.prefetch.apply(decision);
    }
}
