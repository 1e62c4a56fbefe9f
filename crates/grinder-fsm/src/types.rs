use grinder_types::{FsmState, ToxicityBand};

/// Operator-issued override, highest priority after kill-switch/DD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorOverride {
    None,
    Pause,
    Emergency,
}

/// Immutable snapshot of the inputs the FSM reacts to on one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct FsmInputs {
    pub ts_ms: i64,
    pub toxicity_band: ToxicityBand,
    pub feed_staleness_ms: i64,
    pub drawdown_pct_bps: i64,
    pub kill_switch_active: bool,
    /// Absolute position notional, scaled x1000 (matches
    /// `position_reduced_threshold_usd_x1000` in [`FsmConfig`]).
    pub position_notional_usd_x1000: i64,
    pub operator_override: OperatorOverride,
    pub health_ok: bool,
    pub feeds_ready: bool,
    pub topk_ready: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsmConfig {
    pub max_feed_staleness_ms: i64,
    pub drawdown_breach_bps: i64,
    pub position_reduced_threshold_usd_x1000: i64,
    pub cooldown_ticks: u32,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            max_feed_staleness_ms: 10_000,
            drawdown_breach_bps: 1_000,
            position_reduced_threshold_usd_x1000: 100_000,
            cooldown_ticks: 20,
        }
    }
}

/// Runtime FSM state: the current lifecycle state plus the anti-flap
/// cooldown counter governing exits from PAUSED/THROTTLED.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsmRuntime {
    pub state: FsmState,
    pub ticks_in_state: u32,
    pub low_toxicity_ticks: u32,
}

impl FsmRuntime {
    pub fn new() -> Self {
        Self {
            state: FsmState::Init,
            ticks_in_state: 0,
            low_toxicity_ticks: 0,
        }
    }

    /// Fail-closed boot: the FSM always starts at INIT, regardless of any
    /// persisted last-known state. A persisted ACTIVE record is never
    /// trusted across a restart.
    pub fn boot(_persisted: Option<FsmRuntime>) -> Self {
        Self::new()
    }
}

impl Default for FsmRuntime {
    fn default() -> Self {
        Self::new()
    }
}

pub const REASON_HEALTH_OK: &str = "HEALTH_OK";
pub const REASON_FEEDS_READY: &str = "FEEDS_READY";
pub const REASON_TOX_MID: &str = "TOX_MID";
pub const REASON_TOX_HIGH: &str = "TOX_HIGH";
pub const REASON_OPERATOR_PAUSE: &str = "OPERATOR_PAUSE";
pub const REASON_FEED_STALE: &str = "FEED_STALE";
pub const REASON_DD_BREACH: &str = "DD_BREACH";
pub const REASON_KILL_SWITCH: &str = "KILL_SWITCH";
pub const REASON_OPERATOR_EMERGENCY: &str = "OPERATOR_EMERGENCY";
pub const REASON_POSITION_REDUCED: &str = "POSITION_REDUCED";
pub const REASON_TOX_LOW_COOLDOWN: &str = "TOX_LOW_COOLDOWN";

/// `is_action_allowed` permission matrix (§4.8).
pub fn is_action_allowed(state: FsmState, intent: grinder_types::OrderIntent) -> bool {
    use grinder_types::OrderIntent::*;
    match (state, intent) {
        (FsmState::Init, _) => false,
        (FsmState::Ready, Cancel) => true,
        (FsmState::Ready, _) => false,
        (FsmState::Active, _) => true,
        (FsmState::Throttled, IncreaseRisk) => false,
        (FsmState::Throttled, _) => true,
        (FsmState::Paused | FsmState::Degraded | FsmState::Emergency, IncreaseRisk) => false,
        (FsmState::Paused | FsmState::Degraded | FsmState::Emergency, _) => true,
    }
}
