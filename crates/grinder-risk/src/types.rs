use std::collections::BTreeMap;

use grinder_types::OrderIntent;

/// Drawdown guard + kill-switch configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskConfig {
    /// If equity drops by this amount from session high-water-mark, latch
    /// into DRAWDOWN (blocks INCREASE_RISK only).
    pub session_drawdown_limit_micros: i64,

    /// If equity drops by this amount from day-start equity, latch into
    /// DRAWDOWN.
    pub daily_drawdown_limit_micros: i64,

    /// Consecutive losing round-trips before raising the operator-override
    /// flag.
    pub consecutive_loss_threshold: u32,
}

impl RiskConfig {
    pub fn sane_defaults() -> Self {
        Self {
            session_drawdown_limit_micros: 0,
            daily_drawdown_limit_micros: 0,
            consecutive_loss_threshold: 5,
        }
    }
}

/// Kill-switch latch reasons (§4.6).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KillSwitchReason {
    Manual,
    DdBreach,
    Operator,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KillSwitchEvent {
    pub reason: KillSwitchReason,
    pub evidence: BTreeMap<String, String>,
}

impl KillSwitchEvent {
    pub fn new(reason: KillSwitchReason) -> Self {
        Self {
            reason,
            evidence: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.evidence.insert(k.into(), v.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskInput {
    pub day_id: u32,
    pub equity_micros: i64,
    pub intent: OrderIntent,
    pub manual_kill_switch: Option<KillSwitchEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiskDecision {
    Allow,
    Block { reason: ReasonCode, kill_switch: Option<KillSwitchEvent> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    DdPortfolioBreach,
    KillSwitchActive,
    BadInput,
}

/// Drawdown/kill-switch state. Transitions are **latched**: clearing
/// DRAWDOWN or the kill switch requires an explicit operator action
/// (`RiskState::operator_clear`), never an equity bounce alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskState {
    pub day_id: u32,
    pub day_start_equity_micros: i64,
    pub session_peak_equity_micros: i64,
    pub drawdown_latched: bool,
    pub kill_switch: Option<KillSwitchEvent>,
    pub consecutive_losses: u32,
    pub operator_override_required: bool,
}

impl RiskState {
    pub fn new(day_id: u32, equity_micros: i64) -> Self {
        Self {
            day_id,
            day_start_equity_micros: equity_micros,
            session_peak_equity_micros: equity_micros,
            drawdown_latched: false,
            kill_switch: None,
            consecutive_losses: 0,
            operator_override_required: false,
        }
    }

    /// Explicit operator action required to clear a DRAWDOWN latch or the
    /// kill switch. Never called automatically.
    pub fn operator_clear(&mut self) {
        self.drawdown_latched = false;
        self.kill_switch = None;
        self.operator_override_required = false;
    }

    pub fn record_round_trip(&mut self, was_loss: bool, cfg: &RiskConfig) {
        if was_loss {
            self.consecutive_losses = self.consecutive_losses.saturating_add(1);
            if self.consecutive_losses >= cfg.consecutive_loss_threshold {
                self.operator_override_required = true;
            }
        } else {
            self.consecutive_losses = 0;
        }
    }
}
