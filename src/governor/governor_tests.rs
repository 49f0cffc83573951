use super::*;

use std::sync::Mutex as StdMutex;

use tokio::sync::oneshot;

use crate::config::MIB;
use crate::element::{MediaErrorCode, MediaEvent};
use crate::hooks::RecoveryFuture;
use crate::gate::PrefetchReason;
use crate::policy::TrackSizeClass;
use crate::recovery::{ErrorKind, RecoveryPhase, RecoveryState};
use crate::testing::{RecordingHooks, RecoveryScript, ScriptedElement};

const NORMAL_BPS: f64 = 128_000.0;
const LARGE_BPS: f64 = 192_000.0;

fn cellular() -> EnvironmentDescriptor {
    EnvironmentDescriptor::new(true, true, "test-webview")
}

fn governor(env: EnvironmentDescriptor) -> Governor {
    Governor::new(env, GovernorConfig::default()).unwrap()
}

fn attach(governor: &Governor, hooks: RecordingHooks) -> Arc<RecordingHooks> {
    let hooks = Arc::new(hooks);
    let dyn_hooks: Arc<dyn GovernorHooks> = hooks.clone();
    governor.set_hooks(&dyn_hooks);
    hooks
}

/// Buffered end (seconds) that estimates to `ratio` of `limit` bytes
fn end_for_ratio(ratio: f64, limit: u64, bitrate: f64) -> f64 {
    ratio * limit as f64 * 8.0 / bitrate
}

fn no_source_fault() -> MediaError {
    MediaError::new(MediaErrorCode::Network, "MEDIA_ERR_SRC_NETWORK")
}

/// Large cellular track at a healthy checkpoint with a heavy buffer
fn large_track_governor(hooks: RecordingHooks) -> (Governor, Arc<RecordingHooks>) {
    let governor = governor(cellular());
    let hooks = attach(&governor, hooks);
    governor.reset_for_new_track(Some(30 * MIB));
    governor.observe(BufferSample::playing(300.0, 600.0));
    (governor, hooks)
}

// ============================================================================
// ACTIVATION AND GATING
// ============================================================================

#[tokio::test]
async fn test_unconstrained_environment_is_ungoverned() {
    let governor = governor(EnvironmentDescriptor::unconstrained("desktop"));
    let hooks = attach(&governor, RecordingHooks::with_script([RecoveryScript::Succeed]));

    assert!(!governor.is_active());
    governor.observe(BufferSample::playing(10.0, 1.0e6));
    assert!(governor.can_prefetch());
    assert_eq!(governor.prefetch_state().reason, PrefetchReason::Ungoverned);
    assert!(!governor.handle_error(&no_source_fault(), NetworkState::NoSource));
    assert!(!governor.attempt_recovery().await);
    assert_eq!(hooks.recovery_calls(), 0);
    assert_eq!(governor.get_state().estimated_buffered_bytes, 0);
}

#[test]
fn test_configure_element_is_noop_when_inactive() {
    let governor = governor(EnvironmentDescriptor::unconstrained("desktop"));
    let element = Arc::new(ScriptedElement::new());
    governor.configure_element(element.clone());
    assert_eq!(element.preload_hint(), None);
    assert!(governor.start_monitoring(element).is_ok());
    assert!(!governor.is_monitoring());
}

#[test]
fn test_configure_element_limits_preload() {
    let governor = governor(cellular());
    let element = Arc::new(ScriptedElement::new());
    governor.configure_element(element.clone());
    assert_eq!(element.preload_hint(), Some(PreloadHint::Metadata));
}

#[test]
fn test_throttle_scenario_fires_each_hook_once() {
    let governor = governor(cellular());
    let hooks = attach(&governor, RecordingHooks::new());
    let limit = 12 * MIB;

    governor.observe(BufferSample::playing(30.0, end_for_ratio(0.5, limit, NORMAL_BPS)));
    assert_eq!(hooks.throttle_starts(), 0);
    assert!(governor.can_prefetch());

    governor.observe(BufferSample::playing(31.0, end_for_ratio(0.92, limit, NORMAL_BPS)));
    assert_eq!(hooks.throttle_starts(), 1);
    assert!(governor.get_state().is_throttling);
    assert_eq!(governor.prefetch_state().reason, PrefetchReason::OverLimit);

    governor.observe(BufferSample::playing(32.0, end_for_ratio(0.95, limit, NORMAL_BPS)));
    assert_eq!(hooks.throttle_starts(), 1);
    assert_eq!(hooks.throttle_ends(), 0);

    governor.observe(BufferSample::playing(33.0, end_for_ratio(0.6, limit, NORMAL_BPS)));
    assert_eq!(hooks.throttle_starts(), 1);
    assert_eq!(hooks.throttle_ends(), 1);
    assert!(!governor.get_state().is_throttling);
    assert!(governor.can_prefetch());
}

#[test]
fn test_dead_band_holds_current_flag() {
    let governor = governor(cellular());
    let hooks = attach(&governor, RecordingHooks::new());
    let limit = 12 * MIB;

    for ratio in [0.75, 0.85, 0.72, 0.89] {
        governor.observe(BufferSample::playing(30.0, end_for_ratio(ratio, limit, NORMAL_BPS)));
    }
    assert_eq!(hooks.throttle_starts(), 0);

    governor.observe(BufferSample::playing(30.0, end_for_ratio(0.95, limit, NORMAL_BPS)));
    for ratio in [0.75, 0.85, 0.72, 0.89] {
        governor.observe(BufferSample::playing(30.0, end_for_ratio(ratio, limit, NORMAL_BPS)));
    }
    assert_eq!(hooks.throttle_starts(), 1);
    assert_eq!(hooks.throttle_ends(), 0);
    assert!(governor.get_state().is_throttling);
}

#[test]
fn test_large_track_guard_below_throttle_ratio() {
    let governor = governor(EnvironmentDescriptor::new(true, false, "wifi-webview"));
    governor.reset_for_new_track(Some(30 * MIB));
    assert_eq!(governor.get_state().track_size_class, TrackSizeClass::Large);

    // 11 MiB of a 15 MiB ceiling: above the 10 MiB prefetch cutoff, ratio ~0.73
    let end = (11 * MIB) as f64 * 8.0 / LARGE_BPS;
    governor.observe(BufferSample::playing(60.0, end));

    let state = governor.get_state();
    assert!(!state.is_throttling);
    assert!(!state.prefetch.allowed);
    assert_eq!(state.prefetch.reason, PrefetchReason::LargeTrackGuard);
}

#[test]
fn test_set_track_size_reestimates_with_large_bitrate() {
    let governor = governor(cellular());
    governor.observe(BufferSample::playing(10.0, 100.0));
    assert_eq!(governor.get_state().estimated_buffered_bytes, 1_600_000);

    governor.set_track_size(45 * MIB);
    let state = governor.get_state();
    assert_eq!(state.track_size_class, TrackSizeClass::VeryLarge);
    assert_eq!(state.estimated_buffered_bytes, 2_400_000);
}

#[test]
fn test_track_size_backfilled_from_duration() {
    let governor = governor(cellular());
    governor.reset_for_new_track(None);
    // 30 minutes at 128kbps = 28.8MB, above the 25 MiB large threshold
    governor.observe(BufferSample::playing(5.0, 20.0).with_duration(1_800.0));

    let state = governor.get_state();
    assert_eq!(state.track_size_bytes, Some(28_800_000));
    assert_eq!(state.track_size_class, TrackSizeClass::Large);
    assert_eq!(state.estimated_buffered_bytes, 480_000);

    // Already known: a later duration does not overwrite it
    governor.observe(BufferSample::playing(6.0, 20.0).with_duration(60.0));
    assert_eq!(governor.get_state().track_size_bytes, Some(28_800_000));
}

#[test]
fn test_record_prefetch_survives_recompute() {
    let governor = governor(cellular());
    governor.record_prefetch(TrackRef::new("next-track"));
    governor.observe(BufferSample::playing(10.0, 50.0));
    assert_eq!(
        governor.prefetch_state().prefetched_track_ref,
        Some(TrackRef::new("next-track"))
    );

    governor.reset_for_new_track(None);
    assert_eq!(governor.prefetch_state().prefetched_track_ref, None);
}

#[test]
fn test_reset_ends_active_throttle() {
    let governor = governor(cellular());
    let hooks = attach(&governor, RecordingHooks::new());
    governor.observe(BufferSample::playing(30.0, end_for_ratio(0.95, 12 * MIB, NORMAL_BPS)));
    assert_eq!(hooks.throttle_starts(), 1);

    governor.reset_for_new_track(None);
    assert_eq!(hooks.throttle_ends(), 1);
    assert!(!governor.get_state().is_throttling);
}

// ============================================================================
// FAULT CLASSIFICATION AND CHECKPOINTS
// ============================================================================

#[test]
fn test_handle_error_classification() {
    let governor = governor(cellular());
    governor.set_current_track(Some(TrackRef::new("episode-12")));
    governor.observe(BufferSample::playing(30.0, 60.0));

    assert!(governor.handle_error(&no_source_fault(), NetworkState::NoSource));
    let recovery = governor.get_state().recovery;
    assert_eq!(recovery.error_kind, ErrorKind::NoSource);
    assert_eq!(recovery.track_ref, Some(TrackRef::new("episode-12")));

    let decode = MediaError::new(MediaErrorCode::Decode, "corrupt frame");
    assert!(!governor.handle_error(&decode, NetworkState::Idle));
}

#[test]
fn test_checkpoint_tracks_healthy_playback_only() {
    let governor = governor(cellular());
    governor.observe(BufferSample::playing(42.0, 80.0));
    assert_eq!(governor.get_state().recovery.last_good_position_secs, 42.0);
    assert_eq!(
        governor.get_state().recovery.last_good_buffered_bytes,
        1_280_000
    );

    let mut stalled = BufferSample::playing(50.0, 80.0);
    stalled.ready_state = crate::element::ReadyState::HaveCurrentData;
    governor.observe(stalled);
    assert_eq!(governor.get_state().recovery.last_good_position_secs, 42.0);

    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    governor.observe(BufferSample::playing(55.0, 80.0));
    assert_eq!(governor.get_state().recovery.last_good_position_secs, 42.0);
}

// ============================================================================
// RECOVERY
// ============================================================================

#[tokio::test]
async fn test_three_failures_exhaust_once() {
    let (governor, hooks) = large_track_governor(RecordingHooks::new());
    let mut attempts = Vec::new();

    for _ in 0..3 {
        assert!(governor.handle_error(&no_source_fault(), NetworkState::NoSource));
        assert_eq!(
            governor.get_state().recovery.error_kind,
            ErrorKind::BufferFailure
        );
        assert!(!governor.attempt_recovery().await);
        attempts.push(governor.get_state().recovery.attempts);
        if attempts.len() < 3 {
            assert_eq!(hooks.exhaustions(), 0);
        }
    }

    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(hooks.exhaustions(), 1);
    assert_eq!(hooks.recovery_positions(), vec![298.0, 298.0, 298.0]);
    assert_eq!(governor.get_state().recovery_phase, RecoveryPhase::Exhausted);

    // Terminal: further attempts neither call the hook nor re-notify
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert_eq!(hooks.recovery_calls(), 3);
    assert_eq!(hooks.exhaustions(), 1);
}

#[tokio::test]
async fn test_success_on_second_attempt() {
    let (governor, hooks) = large_track_governor(RecordingHooks::with_script([
        RecoveryScript::Fail,
        RecoveryScript::Succeed,
    ]));

    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert!(governor.attempt_recovery().await);

    let recovery = governor.get_state().recovery;
    assert_eq!(recovery.attempts, 2);
    assert_eq!(recovery.error_kind, ErrorKind::None);
    assert!(!recovery.is_recovering);
    assert_eq!(hooks.exhaustions(), 0);
}

#[tokio::test]
async fn test_recovery_refused_near_start() {
    let governor = governor(cellular());
    let hooks = attach(&governor, RecordingHooks::with_script([RecoveryScript::Succeed]));
    governor.observe(BufferSample::playing(2.0, 30.0));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);

    assert!(!governor.attempt_recovery().await);
    assert_eq!(governor.get_state().recovery.attempts, 0);
    assert_eq!(hooks.recovery_calls(), 0);
}

#[tokio::test]
async fn test_spent_budget_exhausts_without_calling_hook() {
    let (governor, hooks) = large_track_governor(RecordingHooks::with_script([
        RecoveryScript::Succeed,
        RecoveryScript::Succeed,
        RecoveryScript::Succeed,
    ]));

    for _ in 0..3 {
        governor.handle_error(&no_source_fault(), NetworkState::NoSource);
        assert!(governor.attempt_recovery().await);
    }
    assert_eq!(governor.get_state().recovery.attempts, 3);

    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert_eq!(hooks.recovery_calls(), 3);
    assert_eq!(hooks.exhaustions(), 1);
}

#[tokio::test]
async fn test_reset_restores_zero_recovery_state() {
    let (governor, _hooks) = large_track_governor(RecordingHooks::new());
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    governor.attempt_recovery().await;
    assert_ne!(governor.get_state().recovery, RecoveryState::default());

    governor.reset_for_new_track(Some(5 * MIB));
    assert_eq!(governor.get_state().recovery, RecoveryState::default());
    assert_eq!(governor.get_state().recovery_phase, RecoveryPhase::Idle);
}

#[tokio::test]
async fn test_hook_error_and_panic_count_as_failures() {
    let (governor, hooks) = large_track_governor(RecordingHooks::with_script([
        RecoveryScript::Error("reload rejected".to_string()),
        RecoveryScript::Panic,
    ]));

    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert!(!governor.attempt_recovery().await);
    assert_eq!(governor.get_state().recovery.attempts, 2);
    assert!(!governor.get_state().recovery.is_recovering);
    assert_eq!(hooks.exhaustions(), 0);

    let codes: Vec<Option<i32>> = governor
        .diagnostics()
        .events
        .recent
        .iter()
        .filter_map(|event| match event {
            GovernorEvent::RecoveryFailed { error_code, .. } => Some(*error_code),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec![Some(2005), Some(2006)]);
}

#[tokio::test]
async fn test_missing_hook_counts_as_failure() {
    let (governor, _hooks) =
        large_track_governor(RecordingHooks::with_script([RecoveryScript::Decline]));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert_eq!(governor.get_state().recovery.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_hook_times_out() {
    let (governor, _hooks) =
        large_track_governor(RecordingHooks::with_script([RecoveryScript::Hang]));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);

    let started = tokio::time::Instant::now();
    assert!(!governor.attempt_recovery().await);
    assert!(started.elapsed() >= Duration::from_millis(10_000));

    let state = governor.get_state();
    assert_eq!(state.recovery.attempts, 1);
    assert!(!state.recovery.is_recovering);
    assert!(governor
        .diagnostics()
        .events
        .recent
        .contains(&GovernorEvent::RecoveryFailed {
            attempt: 1,
            error_code: Some(2004),
        }));
}

/// Recovery hook that resolves when the test says so
#[derive(Default)]
struct GatedHooks {
    release: StdMutex<Option<oneshot::Receiver<bool>>>,
}

impl GatedHooks {
    fn arm(&self) -> oneshot::Sender<bool> {
        let (tx, rx) = oneshot::channel();
        *self.release.lock().unwrap() = Some(rx);
        tx
    }
}

impl GovernorHooks for GatedHooks {
    fn on_recovery_needed(&self, _resume_position_secs: f64) -> Option<RecoveryFuture> {
        let rx = self.release.lock().unwrap().take()?;
        Some(async move { Ok::<_, anyhow::Error>(rx.await.unwrap_or(false)) }.boxed())
    }
}

async fn gated_governor() -> (Arc<Governor>, Arc<dyn GovernorHooks>, oneshot::Sender<bool>) {
    let governor = Arc::new(self::governor(cellular()));
    let gated = Arc::new(GatedHooks::default());
    let release = gated.arm();
    let hooks: Arc<dyn GovernorHooks> = gated;
    governor.set_hooks(&hooks);
    governor.reset_for_new_track(Some(30 * MIB));
    governor.observe(BufferSample::playing(300.0, 600.0));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    (governor, hooks, release)
}

async fn wait_until_recovering(governor: &Governor) {
    for _ in 0..100 {
        if governor.get_state().recovery.is_recovering {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("recovery never started");
}

#[tokio::test]
async fn test_recovery_blocks_prefetch_and_overlapping_attempts() {
    let (governor, _hooks, release) = gated_governor().await;

    let in_flight = tokio::spawn({
        let governor = Arc::clone(&governor);
        async move { governor.attempt_recovery().await }
    });
    wait_until_recovering(&governor).await;

    assert!(!governor.can_prefetch());
    assert_eq!(governor.prefetch_state().reason, PrefetchReason::Recovering);
    assert!(!governor.attempt_recovery().await);
    assert_eq!(governor.get_state().recovery.attempts, 1);

    release.send(true).unwrap();
    assert!(in_flight.await.unwrap());
    assert_eq!(governor.get_state().recovery.error_kind, ErrorKind::None);
    assert_eq!(
        governor.prefetch_state().reason,
        PrefetchReason::LargeTrackGuard
    );
}

#[tokio::test]
async fn test_destroy_mid_recovery_discards_result() {
    let (governor, _hooks, release) = gated_governor().await;

    let in_flight = tokio::spawn({
        let governor = Arc::clone(&governor);
        async move { governor.attempt_recovery().await }
    });
    wait_until_recovering(&governor).await;

    governor.destroy();
    let _ = release.send(true);
    assert!(!in_flight.await.unwrap());

    let state = governor.get_state();
    assert!(!state.active);
    assert_eq!(state.recovery.error_kind, ErrorKind::BufferFailure);
    assert!(governor.can_prefetch());
}

#[tokio::test]
async fn test_track_change_mid_recovery_discards_result() {
    let (governor, _hooks, release) = gated_governor().await;

    let in_flight = tokio::spawn({
        let governor = Arc::clone(&governor);
        async move { governor.attempt_recovery().await }
    });
    wait_until_recovering(&governor).await;

    governor.reset_for_new_track(None);
    release.send(true).unwrap();
    assert!(!in_flight.await.unwrap());
    assert_eq!(governor.get_state().recovery, RecoveryState::default());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_attempt_counts_as_failure() {
    let (governor, hooks) = large_track_governor(RecordingHooks::with_script([
        RecoveryScript::Hang,
        RecoveryScript::Succeed,
    ]));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);

    let host_timeout =
        tokio::time::timeout(Duration::from_millis(20), governor.attempt_recovery()).await;
    assert!(host_timeout.is_err(), "hung hook outlives the host's timeout");

    let state = governor.get_state();
    assert!(!state.recovery.is_recovering);
    assert_eq!(state.recovery.attempts, 1);
    assert_eq!(state.recovery_phase, RecoveryPhase::ErrorDetected);
    assert_eq!(state.prefetch.reason, PrefetchReason::LargeTrackGuard);
    assert!(governor
        .diagnostics()
        .events
        .recent
        .contains(&GovernorEvent::RecoveryFailed {
            attempt: 1,
            error_code: Some(2007),
        }));

    assert!(governor.attempt_recovery().await);
    assert_eq!(hooks.recovery_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_final_attempt_exhausts() {
    let (governor, hooks) = large_track_governor(RecordingHooks::with_script([
        RecoveryScript::Fail,
        RecoveryScript::Fail,
        RecoveryScript::Hang,
    ]));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);
    assert!(!governor.attempt_recovery().await);
    assert!(!governor.attempt_recovery().await);

    let _ = tokio::time::timeout(Duration::from_millis(20), governor.attempt_recovery()).await;

    assert_eq!(governor.get_state().recovery_phase, RecoveryPhase::Exhausted);
    assert_eq!(hooks.exhaustions(), 1);
}

#[test]
fn test_attempt_outside_runtime_is_refused() {
    let (governor, hooks) =
        large_track_governor(RecordingHooks::with_script([RecoveryScript::Succeed]));
    governor.handle_error(&no_source_fault(), NetworkState::NoSource);

    assert!(!futures::executor::block_on(governor.attempt_recovery()));

    let state = governor.get_state();
    assert_eq!(state.recovery.attempts, 0);
    assert!(!state.recovery.is_recovering);
    assert!(state.prefetch.reason != PrefetchReason::Recovering);
    assert_eq!(hooks.recovery_calls(), 0);
}

#[tokio::test]
async fn test_stop_monitoring_mid_recovery_keeps_result() {
    let (governor, _hooks, release) = gated_governor().await;
    let element = Arc::new(ScriptedElement::new());
    element.set_position(300.0);
    element.set_buffered_end(600.0);
    governor.start_monitoring(element.clone()).unwrap();

    let in_flight = tokio::spawn({
        let governor = Arc::clone(&governor);
        async move { governor.attempt_recovery().await }
    });
    wait_until_recovering(&governor).await;

    governor.stop_monitoring();
    assert!(!governor.is_monitoring());
    release.send(true).unwrap();
    assert!(in_flight.await.unwrap());

    let state = governor.get_state();
    assert!(!state.recovery.is_recovering);
    assert_eq!(state.recovery.error_kind, ErrorKind::None);
    assert_eq!(state.prefetch.reason, PrefetchReason::LargeTrackGuard);
}

// ============================================================================
// MONITORING
// ============================================================================

#[test]
fn test_start_monitoring_requires_runtime() {
    let governor = governor(cellular());
    let element = Arc::new(ScriptedElement::new());
    assert_eq!(
        governor.start_monitoring(element),
        Err(GovernorError::NoRuntime)
    );
    assert!(!governor.is_monitoring());
}

#[tokio::test(start_paused = true)]
async fn test_polling_drives_throttle() {
    let governor = governor(cellular());
    let hooks = attach(&governor, RecordingHooks::new());
    let element = Arc::new(ScriptedElement::new());
    element.set_position(30.0);
    element.set_buffered_end(end_for_ratio(0.95, 12 * MIB, NORMAL_BPS));

    governor.start_monitoring(element.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(governor.get_state().is_throttling);
    assert_eq!(hooks.throttle_starts(), 1);

    element.set_buffered_end(end_for_ratio(0.5, 12 * MIB, NORMAL_BPS));
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(governor.get_state().is_throttling);

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(!governor.get_state().is_throttling);
    assert_eq!(hooks.throttle_ends(), 1);
    governor.stop_monitoring();
}

#[tokio::test(start_paused = true)]
async fn test_element_events_update_between_polls() {
    let governor = governor(cellular());
    let element = Arc::new(ScriptedElement::new());
    element.set_position(30.0);
    governor.start_monitoring(element.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(governor.get_state().estimated_buffered_bytes, 0);

    element.set_buffered_end(100.0);
    assert_eq!(element.emit(MediaEvent::Progress), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(governor.get_state().estimated_buffered_bytes, 1_600_000);

    element.emit(MediaEvent::Waiting);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(governor
        .diagnostics()
        .events
        .recent
        .iter()
        .any(|event| matches!(event, GovernorEvent::Stalled { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_subscription() {
    let governor = governor(cellular());
    let element = Arc::new(ScriptedElement::new());

    governor.start_monitoring(element.clone()).unwrap();
    governor.start_monitoring(element.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(element.listener_count(), 1);
    assert!(governor.is_monitoring());
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_destroy_are_idempotent() {
    let governor = governor(cellular());
    let element = Arc::new(ScriptedElement::new());
    governor.start_monitoring(element.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(element.listener_count(), 1);

    governor.stop_monitoring();
    governor.stop_monitoring();
    governor.destroy();
    governor.destroy();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(element.listener_count(), 0);
    assert!(!governor.is_monitoring());
    assert!(!governor.is_active());
    assert!(governor.start_monitoring(element.clone()).is_ok());
    assert!(!governor.is_monitoring());
}

#[test]
fn test_diagnostics_report_serializes() {
    let governor = governor(cellular());
    governor.reset_for_new_track(Some(30 * MIB));
    let report = governor.diagnostics();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["environment"]["is_cellular"], true);
    assert_eq!(json["state"]["track_size_class"], "large");
    assert_eq!(json["events"]["recent"][0]["type"], "track_reset");
}
