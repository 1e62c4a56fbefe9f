//! grinder-risk (C7)
//!
//! Drawdown guard, kill-switch latch, and consecutive-loss guard.
//!
//! Deterministic, pure logic. No IO, no time, no broker calls.

pub mod engine;
pub mod types;

pub use engine::{evaluate, tick};
pub use types::*;
