//! grinder-router (C10)
//!
//! Per-level smart order router: a pure function over `(existing, desired,
//! constraints)` that decides PLACE/CANCEL_REPLACE/AMEND/NOOP/BLOCK with a
//! typed reason, first-match against a 9-row table. No IO, no state
//! mutation — the same thin-boundary discipline as the base workspace's
//! `OrderRouter`, generalized from a broker passthrough into the full
//! decision table.

use grinder_types::{OrderIntent, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterDecision {
    Place,
    CancelReplace,
    Amend,
    Noop,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterReason {
    DrawdownGateActive,
    ExplicitCancel,
    NoExistingOrder,
    ConstraintViolation,
    NoChange,
    SmallPriceDelta,
    LargePriceDelta,
    QtyChangeOnly,
}

impl std::fmt::Display for RouterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            RouterReason::DrawdownGateActive => "DRAWDOWN_GATE_ACTIVE",
            RouterReason::ExplicitCancel => "EXPLICIT_CANCEL",
            RouterReason::NoExistingOrder => "NO_EXISTING_ORDER",
            RouterReason::ConstraintViolation => "CONSTRAINT_VIOLATION",
            RouterReason::NoChange => "NO_CHANGE",
            RouterReason::SmallPriceDelta => "SMALL_PRICE_DELTA",
            RouterReason::LargePriceDelta => "LARGE_PRICE_DELTA",
            RouterReason::QtyChangeOnly => "QTY_CHANGE_ONLY",
        };
        write!(f, "{code}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DesiredLevel {
    pub price_ticks: i64,
    pub qty_steps: i64,
    pub side: Side,
}

#[derive(Debug, Clone, Copy)]
pub struct ExistingOrder {
    pub price_ticks: i64,
    pub qty_steps: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolConstraints {
    pub tick_size_ticks: i64,
    pub step_size_steps: i64,
    pub min_qty_steps: i64,
    pub min_notional_x1000: i64,
}

/// Capability flags for the exchange this router instance targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterCapabilities {
    pub supports_amend: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterAction {
    pub decision: RouterDecision,
    pub price_ticks: i64,
    pub qty_steps: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterOutcome {
    pub decision: RouterDecision,
    pub reason: RouterReason,
    pub action: Option<RouterAction>,
}

/// `price % tick_size == 0`, `qty == floor_to_step(qty, step_size)`,
/// `qty >= min_qty`, `qty * price >= min_notional`.
pub fn check_constraints(desired: &DesiredLevel, c: &SymbolConstraints) -> bool {
    if c.tick_size_ticks <= 0 || c.step_size_steps <= 0 {
        return false;
    }
    if desired.price_ticks % c.tick_size_ticks != 0 {
        return false;
    }
    if desired.qty_steps % c.step_size_steps != 0 {
        return false;
    }
    if desired.qty_steps < c.min_qty_steps {
        return false;
    }
    let notional_x1000 = desired.qty_steps.saturating_mul(desired.price_ticks);
    notional_x1000 >= c.min_notional_x1000
}

const AMEND_THRESHOLD_BPS: i64 = 5;

fn price_delta_bps(existing_price: i64, desired_price: i64) -> i64 {
    if existing_price == 0 {
        return i64::MAX;
    }
    ((desired_price - existing_price).abs() * 10_000) / existing_price
}

/// Per-level SOR decision. First-match against the 9-row table (spec §4.9).
///
/// Invariants upheld by construction:
/// - I1: DRAWDOWN_GATE_ACTIVE blocks INCREASE_RISK before anything else runs.
/// - I2: BLOCK is returned whenever constraints fail, never an action.
/// - I3/I4: pure function of the arguments, no hidden state.
/// - I5: every branch returns a reason.
/// - I6: AMEND is only ever returned when `capabilities.supports_amend`.
pub fn decide(
    intent: OrderIntent,
    desired: Option<&DesiredLevel>,
    existing: Option<&ExistingOrder>,
    constraints: &SymbolConstraints,
    capabilities: &RouterCapabilities,
    drawdown_breached: bool,
) -> RouterOutcome {
    if drawdown_breached && intent == OrderIntent::IncreaseRisk {
        return RouterOutcome { decision: RouterDecision::Block, reason: RouterReason::DrawdownGateActive, action: None };
    }

    if intent == OrderIntent::Cancel {
        return RouterOutcome {
            decision: RouterDecision::CancelReplace,
            reason: RouterReason::ExplicitCancel,
            action: existing.map(|_| RouterAction { decision: RouterDecision::CancelReplace, price_ticks: 0, qty_steps: 0 }),
        };
    }

    let desired = match desired {
        Some(d) => d,
        None => return RouterOutcome { decision: RouterDecision::Noop, reason: RouterReason::NoChange, action: None },
    };
    let constraints_ok = check_constraints(desired, constraints);

    match existing {
        None => {
            if constraints_ok {
                RouterOutcome {
                    decision: RouterDecision::CancelReplace,
                    reason: RouterReason::NoExistingOrder,
                    action: Some(RouterAction {
                        decision: RouterDecision::CancelReplace,
                        price_ticks: desired.price_ticks,
                        qty_steps: desired.qty_steps,
                    }),
                }
            } else {
                RouterOutcome { decision: RouterDecision::Block, reason: RouterReason::ConstraintViolation, action: None }
            }
        }
        Some(ex) => {
            let delta_bps = price_delta_bps(ex.price_ticks, desired.price_ticks);
            let qty_changed = ex.qty_steps != desired.qty_steps;

            if delta_bps == 0 && !qty_changed {
                return RouterOutcome { decision: RouterDecision::Noop, reason: RouterReason::NoChange, action: None };
            }
            if !constraints_ok {
                return RouterOutcome { decision: RouterDecision::Block, reason: RouterReason::ConstraintViolation, action: None };
            }
            if delta_bps > 0 && delta_bps <= AMEND_THRESHOLD_BPS && capabilities.supports_amend {
                return RouterOutcome {
                    decision: RouterDecision::Amend,
                    reason: RouterReason::SmallPriceDelta,
                    action: Some(RouterAction { decision: RouterDecision::Amend, price_ticks: desired.price_ticks, qty_steps: desired.qty_steps }),
                };
            }
            if delta_bps > AMEND_THRESHOLD_BPS {
                return RouterOutcome {
                    decision: RouterDecision::CancelReplace,
                    reason: RouterReason::LargePriceDelta,
                    action: Some(RouterAction { decision: RouterDecision::CancelReplace, price_ticks: desired.price_ticks, qty_steps: desired.qty_steps }),
                };
            }
            if qty_changed && capabilities.supports_amend {
                return RouterOutcome {
                    decision: RouterDecision::Amend,
                    reason: RouterReason::QtyChangeOnly,
                    action: Some(RouterAction { decision: RouterDecision::Amend, price_ticks: desired.price_ticks, qty_steps: desired.qty_steps }),
                };
            }
            // Price delta small but no amend capability, or qty changed but
            // no amend capability: fall back to cancel-replace.
            RouterOutcome {
                decision: RouterDecision::CancelReplace,
                reason: if qty_changed { RouterReason::QtyChangeOnly } else { RouterReason::SmallPriceDelta },
                action: Some(RouterAction { decision: RouterDecision::CancelReplace, price_ticks: desired.price_ticks, qty_steps: desired.qty_steps }),
            }
        }
    }
}
