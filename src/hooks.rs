//! Host callbacks.
//!
//! Every hook is optional: [`GovernorHooks`] methods default to no-ops, and
//! a missing recovery hook counts as a failed attempt. The governor keeps
//! only a weak reference, so dropping the host's `Arc` detaches the hooks.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures::future::BoxFuture;

/// Future resolving to whether the reload/seek restored playback.
pub type RecoveryFuture = BoxFuture<'static, anyhow::Result<bool>>;

pub trait GovernorHooks: Send + Sync {
    fn on_throttle_start(&self) {}

    fn on_throttle_end(&self) {}

    /// Reload/seek the element to `resume_position_secs`.
    ///
    /// Return `None` when the host cannot recover at all.
    fn on_recovery_needed(&self, _resume_position_secs: f64) -> Option<RecoveryFuture> {
        None
    }

    /// Recovery budget for the current track is spent; skip or abandon it.
    fn on_recovery_exhausted(&self) {}
}

/// Weak, swappable hook registration.
#[derive(Default)]
pub(crate) struct HookSlot {
    inner: RwLock<Option<Weak<dyn GovernorHooks>>>,
}

impl HookSlot {
    pub(crate) fn set(&self, hooks: &Arc<dyn GovernorHooks>) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::downgrade(hooks));
    }

    pub(crate) fn clear(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn GovernorHooks>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}
