// Recovery module - fault classification and bounded-retry recovery
//
// Two components:
// 1. RecoveryState: per-track fault and checkpoint bookkeeping
// 2. RecoveryMachine: attempt gating and outcome application
//
// The flow:
// 1. The host reports a player fault; it is classified into an ErrorKind
// 2. An attempt is requested; the machine checks budget and checkpoint
// 3. The host's hook reloads/seeks; its result moves the machine to
//    Idle, back to ErrorDetected, or to Exhausted

pub mod machine;
pub mod state;

pub use machine::{AttemptDecision, AttemptOutcome, RecoveryMachine, RefusalReason};
pub use state::{classify_fault, ErrorKind, RecoveryPhase, RecoveryState};
