//! Adaptive grid policy (C6) — deterministic integer math producing a
//! [`GridPlan`] from features, regime, toxicity, and an optional ML signal.

use grinder_types::numeric::parse_decimal;
use grinder_types::{GridPlan, GridPolicyKind, Regime, ResetAction, ToxicityBand};

/// Fixed internal precision used to parse `center_price` into a scaled
/// integer for drift comparisons. Only the ratio between ticks matters
/// here, not the symbol's actual tick size, so a generous fixed scale
/// keeps this independent of per-symbol price scale digits.
const CENTER_PRICE_SCALE_DIGITS: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub step_alpha_x1000: i64,
    pub step_min_bps: i64,
    pub step_max_bps: i64,
    pub step_ema_alpha_x1000: i64,
    pub center_drift_bps: i64,
    pub step_reset_delta_bps: i64,
    pub max_skew_bps: i64,
    pub default_levels_up: u32,
    pub default_levels_down: u32,
    pub base_level_size: i64, // scaled qty units, interpreted by the caller
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            step_alpha_x1000: 1000,
            step_min_bps: 5,
            step_max_bps: 500,
            step_ema_alpha_x1000: 300,
            center_drift_bps: 50,
            step_reset_delta_bps: 30,
            max_skew_bps: 20,
            default_levels_up: 5,
            default_levels_down: 5,
            base_level_size: 1_000_000,
        }
    }
}

fn regime_mult_x100(regime: Regime) -> i64 {
    match regime {
        Regime::Range | Regime::TrendUp | Regime::TrendDown => 100,
        Regime::VolShock => 150,
        Regime::ThinBook | Regime::Toxic => 200,
        Regime::Paused | Regime::Emergency => 200,
    }
}

/// Regime pairs that force a HARD reset when crossed.
fn is_hard_reset_crossing(from: Regime, to: Regime) -> bool {
    use Regime::*;
    if from == to {
        return false;
    }
    match (from, to) {
        (Range, TrendUp) | (Range, TrendDown) | (TrendUp, Range) | (TrendDown, Range) => true,
        (TrendUp, TrendDown) | (TrendDown, TrendUp) => true,
        (_, Toxic) | (_, VolShock) => true,
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct PolicyInputs {
    pub symbol: String,
    pub center_price: String,
    pub natr_bps: i64,
    pub regime: Regime,
    pub toxicity_band: ToxicityBand,
    pub spacing_multiplier_x1000: i64, // from MlSignalHistory::select_at, or neutral 1000
    pub inventory_pct_x1000: i64,      // signed, +long / -short, x1000 scale
    pub dd_budget_ratio_x1000: i64,    // 1000 == full budget available
}

/// Per-symbol persistent policy state (EMA memory + last regime for reset
/// detection). Owned by exactly one worker.
#[derive(Debug, Clone)]
pub struct PolicyState {
    prev_spacing_bps: i64,
    prev_center_ticks: Option<i64>,
    last_regime: Option<Regime>,
}

impl PolicyState {
    pub fn new() -> Self {
        Self {
            prev_spacing_bps: 0,
            prev_center_ticks: None,
            last_regime: None,
        }
    }
}

impl Default for PolicyState {
    fn default() -> Self {
        Self::new()
    }
}

pub trait GridPolicy {
    fn kind(&self) -> GridPolicyKind;
    fn plan(&mut self, state: &mut PolicyState, inputs: &PolicyInputs, cfg: &PolicyConfig) -> GridPlan;
}

/// Fixed-spacing fallback policy — used during feature warmup and in
/// dry-run/paper smoke tests.
pub struct StaticPolicy {
    pub spacing_bps: i64,
}

impl GridPolicy for StaticPolicy {
    fn kind(&self) -> GridPolicyKind {
        GridPolicyKind::Static
    }

    fn plan(&mut self, _state: &mut PolicyState, inputs: &PolicyInputs, cfg: &PolicyConfig) -> GridPlan {
        let levels_up = cfg.default_levels_up;
        let levels_down = cfg.default_levels_down;
        let width_bps = self.spacing_bps * (levels_up + levels_down) as i64 / 2;
        GridPlan {
            mode: GridPolicyKind::Static,
            center_price: inputs.center_price.clone(),
            spacing_bps: self.spacing_bps,
            levels_up,
            levels_down,
            size_schedule: vec![cfg.base_level_size.to_string(); (levels_up + levels_down) as usize],
            skew_bps: 0,
            regime: inputs.regime,
            width_bps,
            reset_action: ResetAction::None,
            reason_codes: vec!["STEP_SMOOTHING".to_string()],
        }
    }
}

pub struct AdaptivePolicy;

impl GridPolicy for AdaptivePolicy {
    fn kind(&self) -> GridPolicyKind {
        GridPolicyKind::Adaptive
    }

    fn plan(&mut self, state: &mut PolicyState, inputs: &PolicyInputs, cfg: &PolicyConfig) -> GridPlan {
        let mut reason_codes = Vec::new();

        let regime_mult = regime_mult_x100(inputs.regime);
        reason_codes.push(format!("REGIME_{:?}", inputs.regime).to_uppercase());

        let step_raw = (cfg.step_alpha_x1000 * inputs.natr_bps * regime_mult) / 1_000_000;
        let mut step_clamped = step_raw.clamp(cfg.step_min_bps, cfg.step_max_bps);
        if step_clamped == cfg.step_min_bps && step_raw < cfg.step_min_bps {
            reason_codes.push("STEP_SPREAD_FLOOR".to_string());
        }

        // Optional ML multiplier, clamped to the [500, 2000] contract range.
        let ml_mult = inputs.spacing_multiplier_x1000.clamp(500, 2000);
        if ml_mult != 1000 {
            step_clamped = (step_clamped * ml_mult) / 1000;
            step_clamped = step_clamped.clamp(cfg.step_min_bps, cfg.step_max_bps);
            reason_codes.push("STEP_VOL_ADJ".to_string());
        }

        let spacing_bps = if state.prev_spacing_bps == 0 {
            step_clamped
        } else {
            let prev = state.prev_spacing_bps;
            let delta = step_clamped - prev;
            let weighted = delta * cfg.step_ema_alpha_x1000 / 1000;
            (prev + weighted).max(cfg.step_min_bps)
        };
        reason_codes.push("STEP_SMOOTHING".to_string());

        let (levels_up, levels_down) = levels_for_regime(inputs.regime, cfg);
        let width_bps = spacing_bps * (levels_up + levels_down) as i64 / 2;

        let skew_bps = (-inputs.inventory_pct_x1000 / 50).clamp(-cfg.max_skew_bps, cfg.max_skew_bps);

        let center_ticks = parse_decimal(&inputs.center_price, CENTER_PRICE_SCALE_DIGITS).unwrap_or(0);
        let mut reset_action = ResetAction::None;

        if let Some(last_regime) = state.last_regime {
            if is_hard_reset_crossing(last_regime, inputs.regime) {
                reset_action = ResetAction::Hard;
                reason_codes.push("RESET_HARD_REGIME_CROSS".to_string());
            }
        }
        if reset_action == ResetAction::None {
            if let Some(prev_ticks) = state.prev_center_ticks {
                if prev_ticks > 0 {
                    let drift_bps = (center_ticks - prev_ticks).abs() * 10_000 / prev_ticks;
                    if drift_bps >= cfg.center_drift_bps {
                        reset_action = ResetAction::Soft;
                        reason_codes.push("RESET_SOFT_CENTER_DRIFT".to_string());
                    }
                }
            }
            let step_drift = (spacing_bps - state.prev_spacing_bps).abs();
            if reset_action == ResetAction::None && step_drift >= cfg.step_reset_delta_bps {
                reset_action = ResetAction::Soft;
                reason_codes.push("RESET_SOFT_STEP_DRIFT".to_string());
            }
        }

        state.prev_spacing_bps = spacing_bps;
        state.prev_center_ticks = Some(center_ticks);
        state.last_regime = Some(inputs.regime);

        let size_schedule = size_schedule_for(inputs, cfg, levels_up, levels_down);

        GridPlan {
            mode: GridPolicyKind::Adaptive,
            center_price: inputs.center_price.clone(),
            spacing_bps,
            levels_up,
            levels_down,
            size_schedule,
            skew_bps,
            regime: inputs.regime,
            width_bps,
            reset_action,
            reason_codes,
        }
    }
}

fn levels_for_regime(regime: Regime, cfg: &PolicyConfig) -> (u32, u32) {
    match regime {
        Regime::VolShock | Regime::ThinBook | Regime::Toxic => {
            (cfg.default_levels_up.max(1) / 2, cfg.default_levels_down.max(1) / 2)
        }
        _ => (cfg.default_levels_up, cfg.default_levels_down),
    }
}

fn size_schedule_for(inputs: &PolicyInputs, cfg: &PolicyConfig, levels_up: u32, levels_down: u32) -> Vec<String> {
    let dd_scale = inputs.dd_budget_ratio_x1000.clamp(0, 1000);
    let size = cfg.base_level_size * dd_scale / 1000;
    vec![size.to_string(); (levels_up + levels_down) as usize]
}

pub use grinder_ml::MlSignalHistory as SignalHistory;
