// Buffer Governor - prefetch throttling and fault recovery for constrained players
// Estimates buffered bytes from time ranges and keeps prefetching below the native ceiling

// Module declarations
pub mod config;
pub mod element;
pub mod environment;
pub mod error;
pub mod estimator;
pub mod gate;
pub mod governor;
pub mod hooks;
#[cfg(all(feature = "debug_http", debug_assertions))]
pub mod http;
pub mod policy;
pub mod recovery;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use serde::{Deserialize, Serialize};

// Re-exports for convenience
pub use config::GovernorConfig;
pub use element::{BufferSample, MediaError, MediaErrorCode, MediaEvent, NetworkState, PlaybackElement};
pub use environment::EnvironmentDescriptor;
pub use error::GovernorError;
pub use gate::{PrefetchReason, PrefetchState};
pub use governor::{DiagnosticsReport, Governor, GovernorState};
pub use hooks::{GovernorHooks, RecoveryFuture};
pub use policy::{ThresholdSet, TrackSizeClass};
pub use recovery::{ErrorKind, RecoveryPhase, RecoveryState};

/// Host-side identifier of a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
