//! grinder-runtime (ambient, §5)
//!
//! Wires the per-module crates into one per-symbol decision pipeline and
//! publishes account-level risk state to every symbol worker without
//! cross-symbol locking. See `pipeline::process_tick` for the tick-by-tick
//! entry point and `risk_view` for the single-writer/many-reader snapshot.

pub mod pipeline;
pub mod risk_view;
pub mod workers;
