//! grinder-safety (C9)
//!
//! The single choke-point for every outbound order action. Seven sequential
//! gates, first-match-blocks, each with a typed refusal reason — the same
//! discipline as the base workspace's `BrokerGateway`/`GateVerdicts` chain,
//! generalized from three gates to seven and driven by `grinder-fsm` /
//! `grinder-risk` state instead of an equities integrity engine.
//!
//! Pure deterministic logic. No IO, no broker calls.

use std::collections::HashSet;

use grinder_fsm::is_action_allowed;
use grinder_types::{FsmState, OrderIntent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    LiveTrade,
    Paper,
    Backtest,
}

/// What this request wants to do at the wire level. `Increase`/`Reduce`
/// requests place or replace a resting order; `Cancel` always tries to
/// remove one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Place,
    Replace,
    Cancel,
}

impl OrderIntent {
    fn default_action(self) -> RequestAction {
        match self {
            OrderIntent::IncreaseRisk | OrderIntent::ReduceRisk => RequestAction::Place,
            OrderIntent::Cancel => RequestAction::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    NotArmed,
    ModeNotLiveTrade,
    KillSwitchActive,
    SymbolNotWhitelisted,
    DrawdownBlocked,
    FsmStateBlocked,
    FillProbLow,
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            GateRefusal::NotArmed => "NOT_ARMED",
            GateRefusal::ModeNotLiveTrade => "MODE_NOT_LIVE_TRADE",
            GateRefusal::KillSwitchActive => "KILL_SWITCH_ACTIVE",
            GateRefusal::SymbolNotWhitelisted => "SYMBOL_NOT_WHITELISTED",
            GateRefusal::DrawdownBlocked => "DRAWDOWN_BLOCKED",
            GateRefusal::FsmStateBlocked => "FSM_STATE_BLOCKED",
            GateRefusal::FillProbLow => "FILL_PROB_LOW",
        };
        write!(f, "GATE_REFUSED: {code}")
    }
}

impl std::error::Error for GateRefusal {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Allow,
    Block(GateRefusal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub fill_prob_threshold_bps: u16,
    /// If the fraction of requests blocked by the fill-prob gate within the
    /// circuit-breaker window reaches this bps rate, the gate is bypassed
    /// (fails open) for the rest of the window.
    pub fill_prob_block_rate_circuit_breaker_bps: u16,
    pub circuit_breaker_window_ms: i64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            fill_prob_threshold_bps: 2_000,
            fill_prob_block_rate_circuit_breaker_bps: 5_000,
            circuit_breaker_window_ms: 5 * 60 * 1000,
        }
    }
}

/// Rolling window tracking how often the fill-probability gate has blocked,
/// so it can fail open rather than choke legitimate order flow.
#[derive(Debug, Clone)]
pub struct FillProbCircuitBreaker {
    window_start_ms: i64,
    evaluated: u32,
    blocked: u32,
}

impl FillProbCircuitBreaker {
    pub fn new(now_ms: i64) -> Self {
        Self { window_start_ms: now_ms, evaluated: 0, blocked: 0 }
    }

    fn roll_window(&mut self, now_ms: i64, cfg: &SafetyConfig) {
        if now_ms.saturating_sub(self.window_start_ms) >= cfg.circuit_breaker_window_ms {
            self.window_start_ms = now_ms;
            self.evaluated = 0;
            self.blocked = 0;
        }
    }

    fn is_tripped(&self, cfg: &SafetyConfig) -> bool {
        if self.evaluated == 0 {
            return false;
        }
        let rate_bps = (self.blocked as u64 * 10_000) / self.evaluated as u64;
        rate_bps as u16 >= cfg.fill_prob_block_rate_circuit_breaker_bps
    }

    /// Returns `true` if the fill-prob gate should block this request, based
    /// on the trip state as of *before* this request is recorded — so the
    /// request that pushes the rate over the limit is still blocked, and
    /// only later requests in the window fail open.
    fn evaluate(&mut self, now_ms: i64, would_block: bool, cfg: &SafetyConfig) -> bool {
        self.roll_window(now_ms, cfg);
        let already_tripped = self.is_tripped(cfg);

        self.evaluated = self.evaluated.saturating_add(1);
        if would_block {
            self.blocked = self.blocked.saturating_add(1);
        }

        if already_tripped {
            return false;
        }
        would_block
    }
}

#[derive(Debug, Clone)]
pub struct SafetyRequest<'a> {
    pub ts_ms: i64,
    pub armed: bool,
    pub mode: Mode,
    pub kill_switch_active: bool,
    pub symbol: &'a str,
    pub symbol_whitelist: &'a HashSet<String>,
    pub drawdown_latched: bool,
    pub fsm_state: FsmState,
    pub intent: OrderIntent,
    pub predicted_fill_prob_bps: u16,
}

/// Evaluate the seven-gate chain for one request. First-match-blocks:
/// cheap deterministic checks run before the only stateful one (gate 7).
pub fn evaluate(req: &SafetyRequest, cfg: &SafetyConfig, circuit_breaker: &mut FillProbCircuitBreaker) -> SafetyVerdict {
    if !req.armed {
        return SafetyVerdict::Block(GateRefusal::NotArmed);
    }
    if req.mode != Mode::LiveTrade {
        return SafetyVerdict::Block(GateRefusal::ModeNotLiveTrade);
    }

    let action = req.intent.default_action();
    if req.kill_switch_active && matches!(action, RequestAction::Place | RequestAction::Replace) {
        return SafetyVerdict::Block(GateRefusal::KillSwitchActive);
    }

    if !matches!(action, RequestAction::Cancel) && !req.symbol_whitelist.contains(req.symbol) {
        return SafetyVerdict::Block(GateRefusal::SymbolNotWhitelisted);
    }

    if req.drawdown_latched && req.intent == OrderIntent::IncreaseRisk {
        return SafetyVerdict::Block(GateRefusal::DrawdownBlocked);
    }

    if !is_action_allowed(req.fsm_state, req.intent) {
        return SafetyVerdict::Block(GateRefusal::FsmStateBlocked);
    }

    if matches!(action, RequestAction::Place | RequestAction::Replace) {
        let would_block = req.predicted_fill_prob_bps < cfg.fill_prob_threshold_bps;
        if circuit_breaker.evaluate(req.ts_ms, would_block, cfg) {
            return SafetyVerdict::Block(GateRefusal::FillProbLow);
        }
    }

    SafetyVerdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_req<'a>(symbol: &'a str, whitelist: &'a HashSet<String>) -> SafetyRequest<'a> {
        SafetyRequest {
            ts_ms: 0,
            armed: true,
            mode: Mode::LiveTrade,
            kill_switch_active: false,
            symbol,
            symbol_whitelist: whitelist,
            drawdown_latched: false,
            fsm_state: FsmState::Active,
            intent: OrderIntent::IncreaseRisk,
            predicted_fill_prob_bps: 10_000,
        }
    }

    fn whitelist(syms: &[&str]) -> HashSet<String> {
        syms.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn not_armed_blocks_everything() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.armed = false;
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::NotArmed));
    }

    #[test]
    fn kill_switch_allows_cancel_blocks_place() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.kill_switch_active = true;
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::KillSwitchActive));

        req.intent = OrderIntent::Cancel;
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Allow);
    }

    #[test]
    fn symbol_not_whitelisted_blocks_non_cancel() {
        let wl = whitelist(&["ETHUSDT"]);
        let req = base_req("BTCUSDT", &wl);
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::SymbolNotWhitelisted));
    }

    #[test]
    fn drawdown_blocks_only_increase_risk() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.drawdown_latched = true;
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::DrawdownBlocked));

        req.intent = OrderIntent::ReduceRisk;
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Allow);
    }

    #[test]
    fn fsm_state_blocks_increase_risk_in_throttled() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.fsm_state = FsmState::Throttled;
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::FsmStateBlocked));
    }

    #[test]
    fn low_fill_prob_blocks_until_circuit_breaker_trips() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.predicted_fill_prob_bps = 100; // below default threshold of 2000
        let cfg = SafetyConfig { fill_prob_block_rate_circuit_breaker_bps: 5_000, ..SafetyConfig::default() };
        let mut cb = FillProbCircuitBreaker::new(0);

        // First request blocked; breaker's rate (1/1 = 10000bps) now exceeds
        // the trip threshold, so every subsequent request in the window
        // fails open.
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::FillProbLow));
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Allow, "circuit breaker must fail open once tripped");
    }

    #[test]
    fn gate_order_arming_before_mode() {
        let wl = whitelist(&["BTCUSDT"]);
        let mut req = base_req("BTCUSDT", &wl);
        req.armed = false;
        req.mode = Mode::Paper;
        let cfg = SafetyConfig::default();
        let mut cb = FillProbCircuitBreaker::new(0);
        assert_eq!(evaluate(&req, &cfg, &mut cb), SafetyVerdict::Block(GateRefusal::NotArmed));
    }
}
