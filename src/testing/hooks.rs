use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::hooks::{GovernorHooks, RecoveryFuture};

/// How the next recovery hook invocation resolves
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryScript {
    Succeed,
    Fail,
    Error(String),
    Panic,
    /// Never resolves
    Hang,
    /// No recovery hook at all
    Decline,
}

/// Hooks that count every call and replay scripted recovery outcomes
///
/// Once the script runs out every attempt fails.
#[derive(Default)]
pub struct RecordingHooks {
    throttle_starts: AtomicUsize,
    throttle_ends: AtomicUsize,
    exhaustions: AtomicUsize,
    recovery_positions: Mutex<Vec<f64>>,
    script: Mutex<VecDeque<RecoveryScript>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: impl IntoIterator<Item = RecoveryScript>) -> Self {
        let hooks = Self::default();
        hooks.push_script(script);
        hooks
    }

    pub fn push_script(&self, script: impl IntoIterator<Item = RecoveryScript>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(script);
    }

    pub fn throttle_starts(&self) -> usize {
        self.throttle_starts.load(Ordering::SeqCst)
    }

    pub fn throttle_ends(&self) -> usize {
        self.throttle_ends.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> usize {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Resume positions the recovery hook was invoked with
    pub fn recovery_positions(&self) -> Vec<f64> {
        self.recovery_positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn recovery_calls(&self) -> usize {
        self.recovery_positions().len()
    }
}

impl GovernorHooks for RecordingHooks {
    fn on_throttle_start(&self) {
        self.throttle_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_throttle_end(&self) {
        self.throttle_ends.fetch_add(1, Ordering::SeqCst);
    }

    fn on_recovery_needed(&self, resume_position_secs: f64) -> Option<RecoveryFuture> {
        self.recovery_positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resume_position_secs);

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(RecoveryScript::Fail);

        match next {
            RecoveryScript::Succeed => Some(async { Ok::<_, anyhow::Error>(true) }.boxed()),
            RecoveryScript::Fail => Some(async { Ok::<_, anyhow::Error>(false) }.boxed()),
            RecoveryScript::Error(message) => {
                Some(async move { Err::<bool, _>(anyhow::anyhow!(message)) }.boxed())
            }
            RecoveryScript::Panic => Some(panicking_recovery().boxed()),
            RecoveryScript::Hang => Some(futures::future::pending::<anyhow::Result<bool>>().boxed()),
            RecoveryScript::Decline => None,
        }
    }

    fn on_recovery_exhausted(&self) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }
}

async fn panicking_recovery() -> anyhow::Result<bool> {
    panic!("scripted recovery panic")
}
