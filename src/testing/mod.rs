//! Deterministic stand-ins for the host side of the governor contract.
//!
//! Used by unit tests, integration tests and the `governor_sim` CLI to drive
//! a governor without a real media player.

pub mod element;
pub mod hooks;

pub use element::ScriptedElement;
pub use hooks::{RecordingHooks, RecoveryScript};
