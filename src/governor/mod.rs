//! Governor: buffer governance orchestration for one playback session.
//!
//! The governor ties the estimator, threshold policy, prefetch gate and
//! recovery machine together behind a single owned instance. Hosts construct
//! one per session and hand it to whatever playback component needs it.
//!
//! State lives in a `std::sync::Mutex` that is never held across an `.await`.
//! The only suspension point is the host's recovery hook; while it runs,
//! `is_recovering` keeps monitoring ticks and the prefetch gate from acting
//! on a half-recovered player.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{FutureExt, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::GovernorConfig;
use crate::element::{
    BufferSample, MediaError, NetworkState, PlaybackElement, PreloadHint,
};
use crate::environment::{EnvironmentDescriptor, EnvironmentSource};
use crate::error::{log_governor_error, GovernorError};
use crate::estimator::{BitrateEstimator, BufferEstimator};
use crate::gate::PrefetchState;
use crate::hooks::{GovernorHooks, HookSlot};
use crate::telemetry::{DiagnosticsCollector, DiagnosticsSnapshot, GovernorEvent};
use crate::TrackRef;

mod core;
mod monitor;
mod throttle;

pub use self::core::GovernorState;

use self::core::{AdmittedAttempt, GovernorCore};
use self::monitor::MonitorHandle;

/// Everything a host needs to inspect the governor after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub environment: EnvironmentDescriptor,
    pub state: GovernorState,
    pub monitoring: bool,
    pub events: DiagnosticsSnapshot,
}

/// State shared with the monitoring task.
pub(crate) struct Shared {
    core: Mutex<GovernorCore>,
    hooks: HookSlot,
    diagnostics: DiagnosticsCollector,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, GovernorCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish events, then fire the hooks they map to
    fn dispatch(&self, events: Vec<GovernorEvent>) {
        if events.is_empty() {
            return;
        }
        let hooks = self.hooks.get();
        for event in events {
            if let Some(hooks) = hooks.as_ref() {
                match &event {
                    GovernorEvent::ThrottleStarted { .. } => hooks.on_throttle_start(),
                    GovernorEvent::ThrottleEnded { .. } => hooks.on_throttle_end(),
                    GovernorEvent::RecoveryExhausted { .. } => hooks.on_recovery_exhausted(),
                    _ => {}
                }
            }
            self.diagnostics.publish(event);
        }
    }

    pub(crate) fn sample(&self, element: &dyn PlaybackElement) {
        self.observe(BufferSample::from_element(element));
    }

    pub(crate) fn observe(&self, sample: BufferSample) {
        let events = self.lock().observe(&sample, Instant::now());
        self.dispatch(events);
    }

    pub(crate) fn stalled(&self, element: &dyn PlaybackElement) {
        let position = BufferSample::from_element(element).position_secs;
        let event = self.lock().stalled(position);
        self.dispatch(event.into_iter().collect());
    }

    fn finish_recovery(
        &self,
        admitted: &AdmittedAttempt,
        result: Result<bool, GovernorError>,
    ) -> bool {
        let (recovered, events) = self.lock().finish_recovery(admitted, result);
        self.dispatch(events);
        recovered
    }

    async fn run_recovery_hook(&self, admitted: &AdmittedAttempt) -> Result<bool, GovernorError> {
        let hooks = self.hooks.get().ok_or(GovernorError::RecoveryHandlerMissing)?;
        let resume = admitted.resume_position_secs;

        let future = std::panic::catch_unwind(AssertUnwindSafe(|| {
            hooks.on_recovery_needed(resume)
        }))
        .map_err(|_| GovernorError::RecoveryHandlerPanicked)?
        .ok_or(GovernorError::RecoveryHandlerMissing)?;

        match tokio::time::timeout(admitted.timeout, AssertUnwindSafe(future).catch_unwind()).await
        {
            Err(_) => Err(GovernorError::RecoveryTimedOut {
                timeout_ms: admitted.timeout.as_millis() as u64,
            }),
            Ok(Err(_)) => Err(GovernorError::RecoveryHandlerPanicked),
            Ok(Ok(Err(err))) => Err(GovernorError::RecoveryHandlerFailed {
                details: format!("{err:#}"),
            }),
            Ok(Ok(Ok(recovered))) => Ok(recovered),
        }
    }
}

/// Admitted attempt that must be settled exactly once.
///
/// Dropped unsettled (the host dropped `attempt_recovery` mid-hook), it
/// records the attempt as cancelled so `is_recovering` never outlives it.
struct AttemptGuard<'a> {
    shared: &'a Shared,
    admitted: Option<AdmittedAttempt>,
}

impl<'a> AttemptGuard<'a> {
    fn new(shared: &'a Shared, admitted: AdmittedAttempt) -> Self {
        Self {
            shared,
            admitted: Some(admitted),
        }
    }

    fn settle(mut self, result: Result<bool, GovernorError>) -> bool {
        match self.admitted.take() {
            Some(admitted) => self.shared.finish_recovery(&admitted, result),
            None => false,
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if let Some(admitted) = self.admitted.take() {
            let err = GovernorError::RecoveryCancelled;
            log_governor_error(&err, "attempt_recovery");
            self.shared.finish_recovery(&admitted, Err(err));
        }
    }
}

/// Buffer governor for one playback session.
pub struct Governor {
    environment: EnvironmentDescriptor,
    shared: Arc<Shared>,
    element: Mutex<Option<Arc<dyn PlaybackElement>>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl Governor {
    /// Create a governor using the default bitrate estimator
    pub fn new(
        environment: EnvironmentDescriptor,
        config: GovernorConfig,
    ) -> Result<Self, GovernorError> {
        let estimator = Arc::new(BitrateEstimator::new(&config.estimator));
        Self::with_estimator(environment, config, estimator)
    }

    pub fn from_source(
        source: &dyn EnvironmentSource,
        config: GovernorConfig,
    ) -> Result<Self, GovernorError> {
        Self::new(source.descriptor(), config)
    }

    /// Create a governor with a custom estimation strategy
    pub fn with_estimator(
        environment: EnvironmentDescriptor,
        config: GovernorConfig,
        estimator: Arc<dyn BufferEstimator>,
    ) -> Result<Self, GovernorError> {
        config.validate()?;
        let core = GovernorCore::new(&environment, config, estimator);

        if core.is_active() {
            tracing::info!(
                "[Governor] Active for {} (cellular={})",
                environment.browser_label,
                environment.is_cellular
            );
        } else {
            tracing::debug!(
                "[Governor] Inactive for {}: platform not constrained",
                environment.browser_label
            );
        }

        Ok(Self {
            environment,
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                hooks: HookSlot::default(),
                diagnostics: DiagnosticsCollector::default(),
            }),
            element: Mutex::new(None),
            monitor: Mutex::new(None),
        })
    }

    /// Register host hooks; the governor keeps only a weak reference
    pub fn set_hooks(&self, hooks: &Arc<dyn GovernorHooks>) {
        self.shared.hooks.set(hooks);
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().is_active()
    }

    pub fn environment(&self) -> &EnvironmentDescriptor {
        &self.environment
    }

    // ========================================================================
    // ELEMENT AND MONITORING
    // ========================================================================

    /// Attach an element and limit its preload; no-op when inactive
    pub fn configure_element(&self, element: Arc<dyn PlaybackElement>) {
        if !self.is_active() {
            return;
        }
        element.set_preload(PreloadHint::Metadata);
        *lock(&self.element) = Some(element);
    }

    /// Start polling `element` and listening to its notifications
    ///
    /// Replaces any previous monitoring task. Inactive governors accept the
    /// call and do nothing.
    pub fn start_monitoring(&self, element: Arc<dyn PlaybackElement>) -> Result<(), GovernorError> {
        if !self.is_active() {
            return Ok(());
        }

        let poll_interval =
            Duration::from_millis(self.shared.lock().config().monitor.poll_interval_ms);
        self.configure_element(Arc::clone(&element));

        let mut monitor = lock(&self.monitor);
        // Old task must be gone before the new one samples
        monitor.take();
        *monitor = Some(monitor::spawn(
            Arc::clone(&self.shared),
            element,
            poll_interval,
        )?);
        Ok(())
    }

    /// Stop the monitoring task and release the element; idempotent
    pub fn stop_monitoring(&self) {
        if lock(&self.monitor).take().is_some() {
            tracing::debug!("[Governor] Monitoring stopped");
        }
        lock(&self.element).take();
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.monitor).is_some()
    }

    /// Take one sample from the configured element
    pub fn sample_element(&self) {
        let element = lock(&self.element).clone();
        if let Some(element) = element {
            self.shared.sample(element.as_ref());
        }
    }

    /// Feed a sample directly, for hosts without a [`PlaybackElement`]
    pub fn observe(&self, sample: BufferSample) {
        self.shared.observe(sample);
    }

    // ========================================================================
    // TRACK LIFECYCLE
    // ========================================================================

    pub fn reset_for_new_track(&self, estimated_size_bytes: Option<u64>) {
        let events = self.shared.lock().reset_for_new_track(estimated_size_bytes);
        self.shared.dispatch(events);
    }

    pub fn set_track_size(&self, size_bytes: u64) {
        let events = self.shared.lock().set_track_size(size_bytes, Instant::now());
        self.shared.dispatch(events);
    }

    /// Identify the playing track; copied into recovery state on faults
    pub fn set_current_track(&self, track_ref: Option<TrackRef>) {
        self.shared.lock().set_current_track(track_ref);
    }

    // ========================================================================
    // PREFETCH GATE
    // ========================================================================

    pub fn can_prefetch(&self) -> bool {
        self.shared.lock().prefetch().allowed
    }

    pub fn prefetch_state(&self) -> PrefetchState {
        self.shared.lock().prefetch().clone()
    }

    pub fn record_prefetch(&self, track_ref: TrackRef) {
        let event = self.shared.lock().record_prefetch(track_ref);
        self.shared.dispatch(event.into_iter().collect());
    }

    // ========================================================================
    // FAULTS AND RECOVERY
    // ========================================================================

    /// Classify a player fault; returns whether it is governance-relevant
    pub fn handle_error(&self, error: &MediaError, network_state: NetworkState) -> bool {
        let event = self.shared.lock().handle_error(error, network_state);
        let handled = event.is_some();
        self.shared.dispatch(event.into_iter().collect());
        handled
    }

    /// Run one recovery attempt through the host's recovery hook
    ///
    /// Returns `true` only when the hook reports that playback recovered.
    /// Hook errors, panics and timeouts count as failed attempts, and so does
    /// dropping this future before the hook resolves. Outside a tokio runtime
    /// the attempt is refused without being counted.
    pub async fn attempt_recovery(&self) -> bool {
        if tokio::runtime::Handle::try_current().is_err() {
            log_governor_error(&GovernorError::NoRuntime, "attempt_recovery");
            return false;
        }

        let (admitted, events) = self.shared.lock().begin_recovery();
        self.shared.dispatch(events);
        let Some(admitted) = admitted else {
            return false;
        };

        let guard = AttemptGuard::new(&self.shared, admitted);
        let result = self.shared.run_recovery_hook(&admitted).await;
        if let Err(err) = &result {
            log_governor_error(err, "attempt_recovery");
        }
        guard.settle(result)
    }

    // ========================================================================
    // INSPECTION AND TEARDOWN
    // ========================================================================

    pub fn get_state(&self) -> GovernorState {
        self.shared.lock().snapshot()
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            environment: self.environment.clone(),
            state: self.get_state(),
            monitoring: self.is_monitoring(),
            events: self.shared.diagnostics.snapshot(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GovernorEvent> {
        self.shared.diagnostics.subscribe()
    }

    pub fn event_stream(&self) -> impl Stream<Item = GovernorEvent> + Send + 'static {
        self.shared.diagnostics.stream()
    }

    /// Stop monitoring, detach hooks and go inert; idempotent
    ///
    /// An in-flight recovery hook keeps running but its result is ignored.
    pub fn destroy(&self) {
        self.stop_monitoring();
        self.shared.lock().destroy();
        self.shared.hooks.clear();
    }
}

impl Drop for Governor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "governor_tests.rs"]
mod tests;
