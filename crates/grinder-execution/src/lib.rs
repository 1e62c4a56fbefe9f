//! grinder-execution (C11)
//!
//! Per-symbol grid reconciliation and dispatch: expand a [`grinder_types::GridPlan`]
//! into level targets, diff them against tracked resting orders through
//! `grinder-router`'s decision table, gate every outbound action through
//! `grinder-safety`, and drive each level's [`oms::state_machine::OmsOrder`]
//! from the broker events that come back.

pub mod grid;
mod id_map;
mod engine;
mod oms;
mod types;

pub use engine::{apply_event, dispatch_action, reconcile, DispatchOutcome, ExecutionError, ReconcileContext, SafetyContext};
pub use grid::{expand_grid, make_client_order_id, GridExpandError, LevelTarget, SymbolScale};
pub use id_map::BrokerOrderMap;
pub use oms::state_machine::{OmsEvent, OmsOrder, OrderState, TransitionError};
pub use types::{EngineAction, InboundEvent, InboundEventKind, SymbolEngineState, TrackedLevel};
