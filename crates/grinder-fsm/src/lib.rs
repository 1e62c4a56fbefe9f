//! grinder-fsm (C8)
//!
//! Pure lifecycle state machine: INIT -> READY -> ACTIVE -> THROTTLED ->
//! PAUSED -> DEGRADED -> EMERGENCY, plus the `is_action_allowed` permission
//! matrix consumed by the safety envelope (C9).
//!
//! Deterministic, pure logic. No IO, no wall-clock — the caller supplies
//! `ts_ms` in `FsmInputs`.

pub mod engine;
pub mod types;

pub use engine::{is_action_allowed, tick};
pub use types::*;
