// Governor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Governor error code constants
///
/// Single source of truth for the numeric codes hosts match on.
///
/// Error code range: 2001-2007
pub struct GovernorErrorCodes {}

impl GovernorErrorCodes {
    /// Configuration values violate an invariant
    pub const INVALID_CONFIG: i32 = 2001;

    /// Monitoring or recovery was started outside of a tokio runtime
    pub const NO_RUNTIME: i32 = 2002;

    /// Recovery was attempted but the host supplied no recovery hook
    pub const RECOVERY_HANDLER_MISSING: i32 = 2003;

    /// Recovery hook did not resolve within the attempt window
    pub const RECOVERY_TIMED_OUT: i32 = 2004;

    /// Recovery hook resolved with an error
    pub const RECOVERY_HANDLER_FAILED: i32 = 2005;

    /// Recovery hook panicked while running
    pub const RECOVERY_HANDLER_PANICKED: i32 = 2006;

    /// Host dropped the recovery future before the hook resolved
    pub const RECOVERY_CANCELLED: i32 = 2007;
}

/// Log a governor error with structured context
///
/// This function logs governor errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_governor_error(err: &GovernorError, context: &str) {
    error!(
        "Governor error in {}: code={}, component=BufferGovernor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Governor-related errors
///
/// Only `InvalidConfig` and `NoRuntime` are returned from public operations.
/// Recovery hook failures are logged and counted against the attempt budget.
#[derive(Debug, Clone, PartialEq)]
pub enum GovernorError {
    /// Configuration values violate an invariant
    InvalidConfig { reason: String },

    /// Monitoring requires a running tokio runtime
    NoRuntime,

    /// No recovery hook is registered
    RecoveryHandlerMissing,

    /// Recovery hook exceeded the attempt window
    RecoveryTimedOut { timeout_ms: u64 },

    /// Recovery hook returned an error
    RecoveryHandlerFailed { details: String },

    /// Recovery hook panicked
    RecoveryHandlerPanicked,

    /// `attempt_recovery` was dropped while the hook was running
    RecoveryCancelled,
}

impl ErrorCode for GovernorError {
    fn code(&self) -> i32 {
        match self {
            GovernorError::InvalidConfig { .. } => GovernorErrorCodes::INVALID_CONFIG,
            GovernorError::NoRuntime => GovernorErrorCodes::NO_RUNTIME,
            GovernorError::RecoveryHandlerMissing => GovernorErrorCodes::RECOVERY_HANDLER_MISSING,
            GovernorError::RecoveryTimedOut { .. } => GovernorErrorCodes::RECOVERY_TIMED_OUT,
            GovernorError::RecoveryHandlerFailed { .. } => {
                GovernorErrorCodes::RECOVERY_HANDLER_FAILED
            }
            GovernorError::RecoveryHandlerPanicked => GovernorErrorCodes::RECOVERY_HANDLER_PANICKED,
            GovernorError::RecoveryCancelled => GovernorErrorCodes::RECOVERY_CANCELLED,
        }
    }

    fn message(&self) -> String {
        match self {
            GovernorError::InvalidConfig { reason } => {
                format!("Invalid governor configuration: {}", reason)
            }
            GovernorError::NoRuntime => {
                "Monitoring and recovery require a tokio runtime. Call them from within one."
                    .to_string()
            }
            GovernorError::RecoveryHandlerMissing => {
                "No recovery hook registered. Call set_hooks() first.".to_string()
            }
            GovernorError::RecoveryTimedOut { timeout_ms } => {
                format!("Recovery hook did not resolve within {}ms", timeout_ms)
            }
            GovernorError::RecoveryHandlerFailed { details } => {
                format!("Recovery hook failed: {}", details)
            }
            GovernorError::RecoveryHandlerPanicked => "Recovery hook panicked".to_string(),
            GovernorError::RecoveryCancelled => {
                "Recovery attempt dropped before the hook resolved".to_string()
            }
        }
    }
}

impl fmt::Display for GovernorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GovernorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for GovernorError {}
