//! Shared execution-engine types: per-level router actions, the inbound
//! broker events that drive the OMS, and the per-symbol state the engine
//! reconciles against.

use std::collections::BTreeMap;

use grinder_router::RouterReason;
use grinder_types::{OrderIntent, Side};

use crate::id_map::BrokerOrderMap;
use crate::oms::state_machine::OmsOrder;

/// What the engine decided to do for one grid level this tick. Always
/// produced — Noop and Block are actions too (I5: every branch returns a
/// reason), they just never reach [`crate::engine::dispatch_action`]'s IO.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    Place { level_idx: i32, client_order_id: String, side: Side, price_ticks: i64, qty_steps: i64, intent: OrderIntent, reason: RouterReason },
    CancelReplace { level_idx: i32, cancel_client_order_id: String, new_client_order_id: String, side: Side, price_ticks: i64, qty_steps: i64, intent: OrderIntent, reason: RouterReason },
    Amend { level_idx: i32, client_order_id: String, price_ticks: i64, qty_steps: i64, intent: OrderIntent, reason: RouterReason },
    Cancel { level_idx: i32, client_order_id: String, reason: RouterReason },
    Noop { level_idx: i32, reason: RouterReason },
    Block { level_idx: i32, reason: RouterReason },
}

impl EngineAction {
    pub fn level_idx(&self) -> i32 {
        match self {
            EngineAction::Place { level_idx, .. }
            | EngineAction::CancelReplace { level_idx, .. }
            | EngineAction::Amend { level_idx, .. }
            | EngineAction::Cancel { level_idx, .. }
            | EngineAction::Noop { level_idx, .. }
            | EngineAction::Block { level_idx, .. } => *level_idx,
        }
    }
}

/// One resting order the engine currently believes is live at a level.
#[derive(Debug, Clone)]
pub struct TrackedLevel {
    pub client_order_id: String,
    pub price_ticks: i64,
    pub qty_steps: i64,
    pub side: Side,
    pub oms: OmsOrder,
}

/// Per-symbol engine state: one instance per traded symbol, reconciled
/// serially. Cross-symbol parallelism happens by running independent
/// instances on independent workers.
#[derive(Debug)]
pub struct SymbolEngineState {
    pub symbol: String,
    pub levels: BTreeMap<i32, TrackedLevel>,
    pub order_map: BrokerOrderMap,
    next_seq: BTreeMap<i32, u64>,
}

impl SymbolEngineState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), levels: BTreeMap::new(), order_map: BrokerOrderMap::new(), next_seq: BTreeMap::new() }
    }

    pub(crate) fn next_seq(&mut self, level_idx: i32) -> u64 {
        let slot = self.next_seq.entry(level_idx).or_insert(0);
        let seq = *slot;
        *slot += 1;
        seq
    }
}

/// A broker-originated event targeting a specific tracked level, keyed by
/// `event_id` for idempotent replay through [`OmsOrder::apply`].
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub level_idx: i32,
    pub event_id: String,
    pub kind: InboundEventKind,
}

#[derive(Debug, Clone)]
pub enum InboundEventKind {
    Ack,
    PartialFill { delta_qty: i64, fill_price_ticks: i64 },
    Fill { delta_qty: i64, fill_price_ticks: i64 },
    CancelAck,
    CancelReject,
    ReplaceAck,
    ReplaceReject,
    Reject,
}
