//! Turns a desired grid into broker actions, and drives the OMS/portfolio
//! state forward as broker events arrive.
//!
//! [`reconcile`] is pure: `(state, ctx) -> Vec<EngineAction>`, no IO. Safety
//! evaluation and the actual [`grinder_port::ExchangePort`] call happen in
//! [`dispatch_action`], which is the only place in this crate that touches
//! the wire — mirroring the base workspace's gateway-then-dispatch shape,
//! generalized from a three-verdict chokepoint to the full per-action
//! [`grinder_safety`] chain.

use std::collections::{BTreeMap, HashSet};

use grinder_port::{AmendOrder, ExchangePort, PlaceOrder, PortError};
use grinder_portfolio::ledger::{Ledger, LedgerError};
use grinder_portfolio::round_trip::RoundTripOutcome;
use grinder_portfolio::types::{Fill as PortfolioFill, Side as PortfolioSide};
use grinder_router::{decide, DesiredLevel, ExistingOrder, RouterCapabilities, RouterDecision, RouterReason};
use grinder_safety::{evaluate, FillProbCircuitBreaker, GateRefusal, Mode, SafetyConfig, SafetyRequest, SafetyVerdict};
use grinder_types::{FsmState, GridPlan, OrderIntent, OrderType, Side, TimeInForce};

use crate::grid::{expand_grid, GridExpandError, SymbolScale};
use crate::oms::state_machine::{OmsEvent, OmsOrder, TransitionError};
use crate::types::{EngineAction, InboundEvent, InboundEventKind, SymbolEngineState, TrackedLevel};

use grinder_router::SymbolConstraints;

/// Everything [`reconcile`] needs besides the mutable per-symbol state.
pub struct ReconcileContext<'a> {
    pub strategy: &'a str,
    pub plan: &'a GridPlan,
    pub constraints: &'a SymbolConstraints,
    pub scale: &'a SymbolScale,
    pub capabilities: &'a RouterCapabilities,
    pub drawdown_breached: bool,
    pub position_qty_signed: i64,
}

/// Expand the grid, diff it against tracked levels, and route each level
/// through [`grinder_router::decide`]. No IO: the result is a plan, not an
/// effect.
pub fn reconcile(state: &mut SymbolEngineState, ctx: &ReconcileContext) -> Result<Vec<EngineAction>, GridExpandError> {
    let targets = expand_grid(ctx.plan, ctx.constraints, ctx.scale, ctx.position_qty_signed)?;
    let desired_by_level: BTreeMap<i32, _> = targets.iter().map(|t| (t.level_idx, t)).collect();

    let mut actions = Vec::new();

    // Levels we're tracking that the freshly-expanded grid no longer wants
    // (e.g. the grid shrank) are cancelled directly — there's no "desired"
    // side for `decide()` to route against.
    for (level_idx, tracked) in state.levels.iter() {
        if !desired_by_level.contains_key(level_idx) {
            actions.push(EngineAction::Cancel {
                level_idx: *level_idx,
                client_order_id: tracked.client_order_id.clone(),
                reason: RouterReason::ExplicitCancel,
            });
        }
    }

    for (level_idx, target) in &desired_by_level {
        let desired = DesiredLevel { price_ticks: target.price_ticks, qty_steps: target.qty_steps, side: target.side };
        let existing = state.levels.get(level_idx).map(|t| ExistingOrder { price_ticks: t.price_ticks, qty_steps: t.qty_steps });

        let outcome = decide(target.intent, Some(&desired), existing.as_ref(), ctx.constraints, ctx.capabilities, ctx.drawdown_breached);

        let action = match outcome.decision {
            RouterDecision::Noop => EngineAction::Noop { level_idx: *level_idx, reason: outcome.reason },
            RouterDecision::Block => EngineAction::Block { level_idx: *level_idx, reason: outcome.reason },
            RouterDecision::Place => {
                let seq = state.next_seq(*level_idx);
                EngineAction::Place {
                    level_idx: *level_idx,
                    client_order_id: crate::grid::make_client_order_id(ctx.strategy, &state.symbol, *level_idx, seq),
                    side: target.side,
                    price_ticks: target.price_ticks,
                    qty_steps: target.qty_steps,
                    intent: target.intent,
                    reason: outcome.reason,
                }
            }
            RouterDecision::Amend => EngineAction::Amend {
                level_idx: *level_idx,
                client_order_id: state.levels.get(level_idx).map(|t| t.client_order_id.clone()).unwrap_or_default(),
                price_ticks: target.price_ticks,
                qty_steps: target.qty_steps,
                intent: target.intent,
                reason: outcome.reason,
            },
            RouterDecision::CancelReplace => {
                let seq = state.next_seq(*level_idx);
                let new_client_order_id = crate::grid::make_client_order_id(ctx.strategy, &state.symbol, *level_idx, seq);
                match &existing {
                    // The router returns CancelReplace both for "nothing resting
                    // yet" and for "replace what's resting" — disambiguate on
                    // whether we're actually tracking a prior order.
                    None => EngineAction::Place {
                        level_idx: *level_idx,
                        client_order_id: new_client_order_id,
                        side: target.side,
                        price_ticks: target.price_ticks,
                        qty_steps: target.qty_steps,
                        intent: target.intent,
                        reason: outcome.reason,
                    },
                    Some(_) => EngineAction::CancelReplace {
                        level_idx: *level_idx,
                        cancel_client_order_id: state.levels.get(level_idx).map(|t| t.client_order_id.clone()).unwrap_or_default(),
                        new_client_order_id,
                        side: target.side,
                        price_ticks: target.price_ticks,
                        qty_steps: target.qty_steps,
                        intent: target.intent,
                        reason: outcome.reason,
                    },
                }
            }
        };
        actions.push(action);
    }

    Ok(actions)
}

/// Everything [`dispatch_action`] needs to build a [`SafetyRequest`].
pub struct SafetyContext<'a> {
    pub ts_ms: i64,
    pub armed: bool,
    pub mode: Mode,
    pub kill_switch_active: bool,
    pub symbol_whitelist: &'a HashSet<String>,
    pub drawdown_latched: bool,
    pub fsm_state: FsmState,
    pub predicted_fill_prob_bps: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dispatched { level_idx: i32, client_order_id: String },
    SafetyBlocked { level_idx: i32, reason: GateRefusal },
    PortError { level_idx: i32, error: PortError },
    /// The local OMS state machine refused to apply `CancelRequest` or
    /// `ReplaceRequest` before we ever called the port. Per
    /// `oms::state_machine`'s contract this is a halt/alert condition, not a
    /// recoverable error — the caller must surface it, not retry silently.
    OmsTransitionRefused { level_idx: i32, error: TransitionError },
    Skipped { level_idx: i32 },
}

fn safety_request<'a>(symbol: &'a str, intent: OrderIntent, ctx: &'a SafetyContext) -> SafetyRequest<'a> {
    SafetyRequest {
        ts_ms: ctx.ts_ms,
        armed: ctx.armed,
        mode: ctx.mode,
        kill_switch_active: ctx.kill_switch_active,
        symbol,
        symbol_whitelist: ctx.symbol_whitelist,
        drawdown_latched: ctx.drawdown_latched,
        fsm_state: ctx.fsm_state,
        intent,
        predicted_fill_prob_bps: ctx.predicted_fill_prob_bps,
    }
}

/// Evaluate the safety chain for one action and, on `Allow`, call the port.
/// `Noop`/`Block` actions never reach the gate — they were already refused
/// (or found to need nothing) by [`reconcile`].
pub fn dispatch_action(
    state: &mut SymbolEngineState,
    port: &mut dyn ExchangePort,
    safety_cfg: &SafetyConfig,
    circuit_breaker: &mut FillProbCircuitBreaker,
    ctx: &SafetyContext,
    action: &EngineAction,
) -> DispatchOutcome {
    match action {
        EngineAction::Noop { level_idx, .. } | EngineAction::Block { level_idx, .. } => {
            DispatchOutcome::Skipped { level_idx: *level_idx }
        }
        EngineAction::Place { level_idx, client_order_id, side, price_ticks, qty_steps, intent, .. } => {
            let req = safety_request(&state.symbol, *intent, ctx);
            match evaluate(&req, safety_cfg, circuit_breaker) {
                SafetyVerdict::Block(reason) => DispatchOutcome::SafetyBlocked { level_idx: *level_idx, reason },
                SafetyVerdict::Allow => {
                    let order = PlaceOrder {
                        client_order_id: client_order_id.clone(),
                        symbol: state.symbol.clone(),
                        side: *side,
                        price_ticks: *price_ticks,
                        qty_steps: *qty_steps,
                        order_type: OrderType::Limit,
                        tif: TimeInForce::Gtc,
                        reduce_only: *intent == OrderIntent::ReduceRisk,
                    };
                    match port.place(&order) {
                        Ok(ack) => {
                            state.order_map.register(client_order_id.clone(), ack.broker_order_id);
                            state.levels.insert(
                                *level_idx,
                                TrackedLevel {
                                    client_order_id: client_order_id.clone(),
                                    price_ticks: *price_ticks,
                                    qty_steps: *qty_steps,
                                    side: *side,
                                    oms: OmsOrder::new(client_order_id.clone(), state.symbol.clone(), *qty_steps),
                                },
                            );
                            DispatchOutcome::Dispatched { level_idx: *level_idx, client_order_id: client_order_id.clone() }
                        }
                        Err(error) => DispatchOutcome::PortError { level_idx: *level_idx, error },
                    }
                }
            }
        }
        EngineAction::CancelReplace { level_idx, cancel_client_order_id, new_client_order_id, side, price_ticks, qty_steps, intent, .. } => {
            let req = safety_request(&state.symbol, *intent, ctx);
            match evaluate(&req, safety_cfg, circuit_breaker) {
                SafetyVerdict::Block(reason) => DispatchOutcome::SafetyBlocked { level_idx: *level_idx, reason },
                SafetyVerdict::Allow => {
                    if let Some(tracked) = state.levels.get_mut(level_idx) {
                        if let Err(error) = tracked.oms.apply(&OmsEvent::CancelRequest, None) {
                            return DispatchOutcome::OmsTransitionRefused { level_idx: *level_idx, error };
                        }
                    }
                    if let Err(error) = port.cancel(cancel_client_order_id) {
                        return DispatchOutcome::PortError { level_idx: *level_idx, error };
                    }
                    state.order_map.deregister(cancel_client_order_id);

                    let order = PlaceOrder {
                        client_order_id: new_client_order_id.clone(),
                        symbol: state.symbol.clone(),
                        side: *side,
                        price_ticks: *price_ticks,
                        qty_steps: *qty_steps,
                        order_type: OrderType::Limit,
                        tif: TimeInForce::Gtc,
                        reduce_only: *intent == OrderIntent::ReduceRisk,
                    };
                    match port.place(&order) {
                        Ok(ack) => {
                            state.order_map.register(new_client_order_id.clone(), ack.broker_order_id);
                            state.levels.insert(
                                *level_idx,
                                TrackedLevel {
                                    client_order_id: new_client_order_id.clone(),
                                    price_ticks: *price_ticks,
                                    qty_steps: *qty_steps,
                                    side: *side,
                                    oms: OmsOrder::new(new_client_order_id.clone(), state.symbol.clone(), *qty_steps),
                                },
                            );
                            DispatchOutcome::Dispatched { level_idx: *level_idx, client_order_id: new_client_order_id.clone() }
                        }
                        Err(error) => DispatchOutcome::PortError { level_idx: *level_idx, error },
                    }
                }
            }
        }
        EngineAction::Amend { level_idx, client_order_id, price_ticks, qty_steps, intent, .. } => {
            let req = safety_request(&state.symbol, *intent, ctx);
            match evaluate(&req, safety_cfg, circuit_breaker) {
                SafetyVerdict::Block(reason) => DispatchOutcome::SafetyBlocked { level_idx: *level_idx, reason },
                SafetyVerdict::Allow => {
                    if let Some(tracked) = state.levels.get_mut(level_idx) {
                        if let Err(error) = tracked.oms.apply(&OmsEvent::ReplaceRequest, None) {
                            return DispatchOutcome::OmsTransitionRefused { level_idx: *level_idx, error };
                        }
                    }
                    let order = AmendOrder { client_order_id: client_order_id.clone(), symbol: state.symbol.clone(), price_ticks: *price_ticks, qty_steps: *qty_steps };
                    match port.amend(&order) {
                        Ok(_) => {
                            if let Some(tracked) = state.levels.get_mut(level_idx) {
                                tracked.price_ticks = *price_ticks;
                                tracked.qty_steps = *qty_steps;
                            }
                            DispatchOutcome::Dispatched { level_idx: *level_idx, client_order_id: client_order_id.clone() }
                        }
                        Err(error) => DispatchOutcome::PortError { level_idx: *level_idx, error },
                    }
                }
            }
        }
        EngineAction::Cancel { level_idx, client_order_id, .. } => {
            let req = safety_request(&state.symbol, OrderIntent::Cancel, ctx);
            match evaluate(&req, safety_cfg, circuit_breaker) {
                SafetyVerdict::Block(reason) => DispatchOutcome::SafetyBlocked { level_idx: *level_idx, reason },
                SafetyVerdict::Allow => {
                    if let Some(tracked) = state.levels.get_mut(level_idx) {
                        if let Err(error) = tracked.oms.apply(&OmsEvent::CancelRequest, None) {
                            return DispatchOutcome::OmsTransitionRefused { level_idx: *level_idx, error };
                        }
                    }
                    match port.cancel(client_order_id) {
                        Ok(_) => {
                            state.order_map.deregister(client_order_id);
                            DispatchOutcome::Dispatched { level_idx: *level_idx, client_order_id: client_order_id.clone() }
                        }
                        Err(error) => DispatchOutcome::PortError { level_idx: *level_idx, error },
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    Transition(TransitionError),
    UnknownLevel(i32),
    Ledger(LedgerError),
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionError::Transition(e) => write!(f, "{e}"),
            ExecutionError::UnknownLevel(idx) => write!(f, "event for untracked level {idx}"),
            ExecutionError::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

const MICROS_SCALE_DIGITS: u32 = 6;

/// Rescale a value expressed at `scale_digits` decimal places into the
/// portfolio ledger's fixed 1e-6 ("micros") scale used by [`PortfolioFill`].
fn to_micros(value: i64, scale_digits: u32) -> i64 {
    if scale_digits <= MICROS_SCALE_DIGITS {
        value.saturating_mul(10i64.pow(MICROS_SCALE_DIGITS - scale_digits))
    } else {
        value / 10i64.pow(scale_digits - MICROS_SCALE_DIGITS)
    }
}

fn to_portfolio_side(side: Side) -> PortfolioSide {
    match side {
        Side::Buy => PortfolioSide::Buy,
        Side::Sell => PortfolioSide::Sell,
    }
}

/// Drive one broker-originated event through the tracked level's OMS, and
/// — for (partial) fills — record the fill against the ledger. Returns the
/// [`RoundTripOutcome`] when the fill closed a round trip; feeding it into
/// `grinder-risk` is the caller's job, not this crate's.
pub fn apply_event(
    state: &mut SymbolEngineState,
    ledger: &mut Ledger,
    scale: &SymbolScale,
    event: &InboundEvent,
) -> Result<Option<RoundTripOutcome>, ExecutionError> {
    let tracked = state.levels.get_mut(&event.level_idx).ok_or(ExecutionError::UnknownLevel(event.level_idx))?;

    let (oms_event, fill) = match &event.kind {
        InboundEventKind::Ack => (OmsEvent::Ack, None),
        InboundEventKind::PartialFill { delta_qty, fill_price_ticks } => {
            (OmsEvent::PartialFill { delta_qty: *delta_qty }, Some((*delta_qty, *fill_price_ticks)))
        }
        InboundEventKind::Fill { delta_qty, fill_price_ticks } => {
            (OmsEvent::Fill { delta_qty: *delta_qty }, Some((*delta_qty, *fill_price_ticks)))
        }
        InboundEventKind::CancelAck => (OmsEvent::CancelAck, None),
        InboundEventKind::CancelReject => (OmsEvent::CancelReject, None),
        InboundEventKind::ReplaceAck => (OmsEvent::ReplaceAck, None),
        InboundEventKind::ReplaceReject => (OmsEvent::ReplaceReject, None),
        InboundEventKind::Reject => (OmsEvent::Reject, None),
    };

    tracked.oms.apply(&oms_event, Some(&event.event_id)).map_err(ExecutionError::Transition)?;

    let side = state.levels.get(&event.level_idx).map(|t| t.side);
    let terminal = state.levels.get(&event.level_idx).map(|t| t.oms.state.is_terminal()).unwrap_or(false);
    let client_order_id = state.levels.get(&event.level_idx).map(|t| t.client_order_id.clone());

    let round_trip = if let (Some((delta_qty, fill_price_ticks)), Some(side)) = (fill, side) {
        let price_micros = to_micros(fill_price_ticks, scale.price_scale_digits);
        let fill = PortfolioFill::new(state.symbol.clone(), to_portfolio_side(side), delta_qty, price_micros, 0);
        ledger.append_fill_tracked(fill).map_err(ExecutionError::Ledger)?
    } else {
        None
    };

    // A terminal order (filled, cancelled, or rejected) frees its level: the
    // next `reconcile()` sees no existing order there and places fresh.
    if terminal {
        if let Some(client_order_id) = client_order_id {
            state.order_map.deregister(&client_order_id);
        }
        state.levels.remove(&event.level_idx);
    }

    Ok(round_trip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grinder_port_paper::PaperBroker;
    use grinder_router::SymbolConstraints;
    use grinder_types::{GridPolicyKind, Regime, ResetAction};
    use std::collections::HashSet;

    fn constraints() -> SymbolConstraints {
        SymbolConstraints { tick_size_ticks: 10, step_size_steps: 1, min_qty_steps: 1, min_notional_x1000: 1 }
    }

    fn scale() -> SymbolScale {
        SymbolScale { price_scale_digits: 2, qty_scale_digits: 3 }
    }

    fn plan() -> GridPlan {
        GridPlan {
            mode: GridPolicyKind::Static,
            center_price: "100.00".to_string(),
            spacing_bps: 100,
            levels_up: 1,
            levels_down: 1,
            size_schedule: vec!["1.000".to_string()],
            skew_bps: 0,
            regime: Regime::Range,
            width_bps: 200,
            reset_action: ResetAction::None,
            reason_codes: vec![],
        }
    }

    fn caps() -> RouterCapabilities {
        RouterCapabilities { supports_amend: true }
    }

    fn allow_ctx(whitelist: &HashSet<String>) -> SafetyContext<'_> {
        SafetyContext {
            ts_ms: 0,
            armed: true,
            mode: Mode::LiveTrade,
            kill_switch_active: false,
            symbol_whitelist: whitelist,
            drawdown_latched: false,
            fsm_state: FsmState::Active,
            predicted_fill_prob_bps: 10_000,
        }
    }

    #[test]
    fn reconcile_places_fresh_grid_as_place_actions() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let ctx = ReconcileContext {
            strategy: "grid-v1",
            plan: &plan(),
            constraints: &constraints(),
            scale: &scale(),
            capabilities: &caps(),
            drawdown_breached: false,
            position_qty_signed: 0,
        };
        let actions = reconcile(&mut state, &ctx).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| matches!(a, EngineAction::Place { .. })));
    }

    #[test]
    fn reconcile_cancels_levels_no_longer_in_the_grid() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        state.levels.insert(
            5,
            TrackedLevel {
                client_order_id: "stale".to_string(),
                price_ticks: 10_500,
                qty_steps: 1000,
                side: Side::Sell,
                oms: OmsOrder::new("stale", "BTCUSDT", 1000),
            },
        );
        let ctx = ReconcileContext {
            strategy: "grid-v1",
            plan: &plan(),
            constraints: &constraints(),
            scale: &scale(),
            capabilities: &caps(),
            drawdown_breached: false,
            position_qty_signed: 0,
        };
        let actions = reconcile(&mut state, &ctx).unwrap();
        assert!(actions.iter().any(|a| matches!(a, EngineAction::Cancel { level_idx: 5, .. })));
    }

    #[test]
    fn dispatch_place_registers_tracked_level_and_broker_id() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let mut port = PaperBroker::new(0);
        let safety_cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        let whitelist: HashSet<String> = ["BTCUSDT".to_string()].into_iter().collect();
        let ctx = allow_ctx(&whitelist);

        let action = EngineAction::Place {
            level_idx: -1,
            client_order_id: "grid-v1_BTCUSDT_-1_0".to_string(),
            side: Side::Buy,
            price_ticks: 9900,
            qty_steps: 1000,
            intent: OrderIntent::IncreaseRisk,
            reason: RouterReason::NoExistingOrder,
        };

        let outcome = dispatch_action(&mut state, &mut port, &safety_cfg, &mut cb, &ctx, &action);
        assert!(matches!(outcome, DispatchOutcome::Dispatched { .. }));
        assert!(state.levels.contains_key(&-1));
        assert_eq!(state.order_map.broker_id("grid-v1_BTCUSDT_-1_0"), Some("grid-v1_BTCUSDT_-1_0"));
    }

    #[test]
    fn dispatch_blocks_when_symbol_not_whitelisted() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let mut port = PaperBroker::new(0);
        let safety_cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        let whitelist: HashSet<String> = ["ETHUSDT".to_string()].into_iter().collect();
        let ctx = allow_ctx(&whitelist);

        let action = EngineAction::Place {
            level_idx: -1,
            client_order_id: "grid-v1_BTCUSDT_-1_0".to_string(),
            side: Side::Buy,
            price_ticks: 9900,
            qty_steps: 1000,
            intent: OrderIntent::IncreaseRisk,
            reason: RouterReason::NoExistingOrder,
        };

        let outcome = dispatch_action(&mut state, &mut port, &safety_cfg, &mut cb, &ctx, &action);
        assert_eq!(outcome, DispatchOutcome::SafetyBlocked { level_idx: -1, reason: GateRefusal::SymbolNotWhitelisted });
        assert!(!state.levels.contains_key(&-1));
    }

    #[test]
    fn noop_and_block_actions_never_touch_the_port() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let mut port = PaperBroker::new(0);
        let safety_cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        let whitelist: HashSet<String> = ["BTCUSDT".to_string()].into_iter().collect();
        let ctx = allow_ctx(&whitelist);

        let action = EngineAction::Noop { level_idx: 1, reason: RouterReason::NoChange };
        let outcome = dispatch_action(&mut state, &mut port, &safety_cfg, &mut cb, &ctx, &action);
        assert_eq!(outcome, DispatchOutcome::Skipped { level_idx: 1 });
    }

    #[test]
    fn apply_fill_event_updates_oms_and_dedups_on_retry() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        state.levels.insert(
            -1,
            TrackedLevel {
                client_order_id: "grid-v1_BTCUSDT_-1_0".to_string(),
                price_ticks: 9900,
                qty_steps: 1000,
                side: Side::Buy,
                oms: OmsOrder::new("grid-v1_BTCUSDT_-1_0", "BTCUSDT", 1000),
            },
        );
        let mut ledger = Ledger::new(0);
        let event = InboundEvent { level_idx: -1, event_id: "evt-1".to_string(), kind: InboundEventKind::Fill { delta_qty: 1000, fill_price_ticks: 9900 } };

        let rt1 = apply_event(&mut state, &mut ledger, &scale(), &event).unwrap();
        assert!(rt1.is_none());
        // a fully filled order is terminal and frees its level for the next reconcile.
        assert!(!state.levels.contains_key(&-1));

        // replay of the same level is now unknown (level was freed) and is
        // reported as such rather than silently dropped.
        assert_eq!(apply_event(&mut state, &mut ledger, &scale(), &event), Err(ExecutionError::UnknownLevel(-1)));
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn cancel_dispatch_refuses_and_never_touches_the_port_when_oms_transition_is_illegal() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let mut oms = OmsOrder::new("grid-v1_BTCUSDT_-1_0", "BTCUSDT", 1000);
        oms.apply(&OmsEvent::Fill { delta_qty: 1000 }, None).unwrap();
        state.levels.insert(
            -1,
            TrackedLevel { client_order_id: "grid-v1_BTCUSDT_-1_0".to_string(), price_ticks: 9900, qty_steps: 1000, side: Side::Buy, oms },
        );
        state.order_map.register("grid-v1_BTCUSDT_-1_0".to_string(), "broker-1".to_string());
        let mut port = PaperBroker::new(0);
        let safety_cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        let whitelist: HashSet<String> = ["BTCUSDT".to_string()].into_iter().collect();
        let ctx = allow_ctx(&whitelist);

        let action = EngineAction::Cancel { level_idx: -1, client_order_id: "grid-v1_BTCUSDT_-1_0".to_string(), reason: RouterReason::ExplicitCancel };
        let outcome = dispatch_action(&mut state, &mut port, &safety_cfg, &mut cb, &ctx, &action);
        assert!(matches!(outcome, DispatchOutcome::OmsTransitionRefused { level_idx: -1, .. }));
        // the order is still registered: we must not have told the port to cancel it.
        assert_eq!(state.order_map.broker_id("grid-v1_BTCUSDT_-1_0"), Some("broker-1"));
    }

    #[test]
    fn apply_event_for_untracked_level_is_an_error() {
        let mut state = SymbolEngineState::new("BTCUSDT");
        let mut ledger = Ledger::new(0);
        let event = InboundEvent { level_idx: 9, event_id: "evt-1".to_string(), kind: InboundEventKind::Ack };
        assert_eq!(apply_event(&mut state, &mut ledger, &scale(), &event), Err(ExecutionError::UnknownLevel(9)));
    }
}
