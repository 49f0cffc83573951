// Error types for the buffer governor
//
// This module defines the governor's error type, providing structured error
// handling with numeric codes suitable for reporting across host boundaries.

mod governor;

pub use governor::{log_governor_error, GovernorError, GovernorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
