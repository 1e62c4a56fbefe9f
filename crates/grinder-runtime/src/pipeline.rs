//! Per-symbol decision pipeline: one [`SymbolPipelineState`] per traded
//! symbol, advanced tick-by-tick by [`process_tick`]. Owned and driven by
//! exactly one worker — no cross-symbol locking on this path (§5).

use std::collections::HashSet;

use grinder_execution::{
    dispatch_action, reconcile, DispatchOutcome, ReconcileContext, SafetyContext, SymbolEngineState, SymbolScale,
};
use grinder_features::{ingest, SymbolFeatureState};
use grinder_fsm::engine::tick as fsm_tick;
use grinder_fsm::types::{FsmConfig, FsmInputs, FsmRuntime, OperatorOverride};
use grinder_policy::{AdaptivePolicy, GridPolicy, PolicyConfig, PolicyInputs, PolicyState};
use grinder_port::ExchangePort;
use grinder_regime::{RegimeInputs, RegimeState, RegimeThresholds};
use grinder_risk::engine::evaluate as risk_evaluate;
use grinder_risk::types::{ReasonCode, RiskConfig, RiskDecision, RiskInput, RiskState};
use grinder_router::{RouterCapabilities, SymbolConstraints};
use grinder_safety::{FillProbCircuitBreaker, Mode, SafetyConfig};
use grinder_toxicity::{composite_score, ToxicityComponents, ToxicityState, ToxicityWeights};
use grinder_types::{FeatureSnapshot, L2FeatureSnapshot, OrderIntent, Regime, TickEvent, ToxicityBand, TransitionEvent};

/// Fixed per-symbol wire/scale constraints, set once at onboarding and
/// never mutated by the pipeline itself.
#[derive(Debug, Clone)]
pub struct SymbolStaticConfig {
    pub symbol: String,
    pub strategy: String,
    pub scale: SymbolScale,
    pub constraints: SymbolConstraints,
    pub capabilities: RouterCapabilities,
    pub regime_thresholds: RegimeThresholds,
    pub toxicity_weights: ToxicityWeights,
    pub policy_config: PolicyConfig,
    pub fsm_config: FsmConfig,
    pub safety_config: SafetyConfig,
}

/// All mutable per-symbol state. Owned by exactly one decision worker.
pub struct SymbolPipelineState {
    pub features: SymbolFeatureState,
    pub regime: RegimeState,
    pub toxicity: ToxicityState,
    pub policy: PolicyState,
    pub engine: SymbolEngineState,
    pub fsm: FsmRuntime,
    pub risk: RiskState,
    pub circuit_breaker: FillProbCircuitBreaker,
}

impl SymbolPipelineState {
    pub fn new(symbol: impl Into<String>, now_ms: i64, day_id: u32, starting_equity_micros: i64) -> Self {
        let symbol = symbol.into();
        Self {
            features: SymbolFeatureState::new(symbol.clone()),
            regime: RegimeState::new(Regime::Range),
            toxicity: ToxicityState::new(),
            policy: PolicyState::new(),
            engine: SymbolEngineState::new(symbol),
            fsm: FsmRuntime::boot(None),
            risk: RiskState::new(day_id, starting_equity_micros),
            circuit_breaker: FillProbCircuitBreaker::new(now_ms),
        }
    }
}

/// Everything one [`process_tick`] call needs besides the mutable pipeline
/// state: the event plus the slower-moving cross-symbol/account context
/// (inventory, drawdown budget, ML signal, arm/mode, Top-K membership).
pub struct TickContext<'a> {
    pub cfg: &'a SymbolStaticConfig,
    pub day_id: u32,
    pub equity_micros: i64,
    pub position_qty_signed: i64,
    pub inventory_pct_x1000: i64,
    pub dd_budget_ratio_x1000: i64,
    pub spacing_multiplier_x1000: i64,
    pub armed: bool,
    pub mode: Mode,
    pub operator_override: OperatorOverride,
    pub symbol_whitelist: &'a HashSet<String>,
    pub topk_ready: bool,
}

/// Outcome of one [`process_tick`] call.
#[derive(Debug)]
pub struct TickOutcome {
    pub regime: Regime,
    pub toxicity_band: ToxicityBand,
    pub fsm_transition: Option<TransitionEvent>,
    pub dispatch: Vec<DispatchOutcome>,
}

/// Advance one symbol's full decision pipeline by one [`TickEvent`].
///
/// Wires: features -> regime -> toxicity -> policy -> grid reconcile ->
/// safety-gated dispatch -> risk -> fsm, matching the module order fixed
/// by the workspace's crate boundaries. Returns `None` when the event
/// produced no L1 feature snapshot (e.g. a depth diff with no book-ticker
/// change) — there is nothing new to replan against this tick.
pub fn process_tick(
    state: &mut SymbolPipelineState,
    port: &mut dyn ExchangePort,
    event: &TickEvent,
    ctx: &TickContext,
) -> Option<TickOutcome> {
    let (l1, l2) = ingest(&mut state.features, event);
    let l1 = l1?;

    let tox_components = toxicity_components_from(&l1, l2.as_ref());
    let raw_score = composite_score(&tox_components, &ctx.cfg.toxicity_weights);
    let tox_result = state.toxicity.update(raw_score);

    let regime_inputs = RegimeInputs {
        tox_score: tox_result.score,
        spread_bps: l1.spread_bps,
        depth_top5_usd_scaled: l2
            .as_ref()
            .map(|s| parse_usd_scaled(&s.depth_top5_usd))
            .unwrap_or(i64::MAX),
        price_jump_bps_1m: l1.price_jump_bps_1m,
        trend_slope_5m_bps: l1.trend_slope_5m_bps,
    };
    let regime = state.regime.evaluate(&regime_inputs, &ctx.cfg.regime_thresholds);

    let policy_inputs = PolicyInputs {
        symbol: ctx.cfg.symbol.clone(),
        center_price: l1.mid_price.clone(),
        natr_bps: l1.natr_bps,
        regime,
        toxicity_band: tox_result.band,
        spacing_multiplier_x1000: ctx.spacing_multiplier_x1000,
        inventory_pct_x1000: ctx.inventory_pct_x1000,
        dd_budget_ratio_x1000: ctx.dd_budget_ratio_x1000,
    };
    let mut adaptive = AdaptivePolicy;
    let plan = adaptive.plan(&mut state.policy, &policy_inputs, &ctx.cfg.policy_config);

    let drawdown_breached = state.risk.drawdown_latched;
    let reconcile_ctx = ReconcileContext {
        strategy: &ctx.cfg.strategy,
        plan: &plan,
        constraints: &ctx.cfg.constraints,
        scale: &ctx.cfg.scale,
        capabilities: &ctx.cfg.capabilities,
        drawdown_breached,
        position_qty_signed: ctx.position_qty_signed,
    };
    let actions = reconcile(&mut state.engine, &reconcile_ctx).ok()?;

    let risk_input = RiskInput {
        day_id: ctx.day_id,
        equity_micros: ctx.equity_micros,
        intent: OrderIntent::IncreaseRisk,
        manual_kill_switch: None,
    };
    let risk_decision = risk_evaluate(&mut state.risk, &RiskConfig::sane_defaults(), &risk_input);
    let kill_switch_active = matches!(
        risk_decision,
        RiskDecision::Block { reason: ReasonCode::KillSwitchActive, .. }
    );

    let fsm_inputs = FsmInputs {
        ts_ms: event.ts_ms(),
        toxicity_band: tox_result.band,
        feed_staleness_ms: 0,
        drawdown_pct_bps: 0,
        kill_switch_active,
        position_notional_usd_x1000: 0,
        operator_override: ctx.operator_override,
        health_ok: true,
        feeds_ready: true,
        topk_ready: ctx.topk_ready,
    };
    let fsm_transition = fsm_tick(&mut state.fsm, &ctx.cfg.fsm_config, &fsm_inputs);

    let safety_ctx = SafetyContext {
        ts_ms: event.ts_ms(),
        armed: ctx.armed,
        mode: ctx.mode,
        kill_switch_active,
        symbol_whitelist: ctx.symbol_whitelist,
        drawdown_latched: state.risk.drawdown_latched,
        fsm_state: state.fsm.state,
        predicted_fill_prob_bps: 10_000,
    };

    let dispatch: Vec<DispatchOutcome> = actions
        .iter()
        .map(|action| {
            dispatch_action(
                &mut state.engine,
                port,
                &ctx.cfg.safety_config,
                &mut state.circuit_breaker,
                &safety_ctx,
                action,
            )
        })
        .collect();

    Some(TickOutcome {
        regime,
        toxicity_band: tox_result.band,
        fsm_transition,
        dispatch,
    })
}

/// Derive z-scored toxicity components from the feature snapshots the
/// feature engine already computed, rather than re-deriving VPIN/Kyle's
/// lambda/Amihud from raw trades here. `liq_surge_z` has no L1/L2 feature
/// counterpart yet and is left neutral.
fn toxicity_components_from(l1: &FeatureSnapshot, l2: Option<&L2FeatureSnapshot>) -> ToxicityComponents {
    let spread_z = (l1.spread_bps as f64 / 10.0).clamp(-3.0, 3.0);
    let jump_z = (l1.price_jump_bps_1m as f64 / 20.0).clamp(-3.0, 3.0);
    let ofi_z = l2.map(|s| (s.ofi_1s as f64 / 500.0).clamp(-3.0, 3.0)).unwrap_or(0.0);
    let imbalance_z = l2
        .map(|s| (s.book_imbalance_bps as f64 / 500.0).clamp(-3.0, 3.0))
        .unwrap_or(0.0);
    ToxicityComponents {
        vpin_z: imbalance_z,
        kyle_lambda_z: ofi_z,
        amihud_z: jump_z,
        spread_widen_z: spread_z,
        ofi_shock_z: ofi_z,
        liq_surge_z: 0.0,
    }
}

fn parse_usd_scaled(raw: &str) -> i64 {
    raw.parse::<f64>().map(|v| (v * 100.0).round() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grinder_port_paper::PaperBroker;
    use grinder_types::Side;

    fn static_cfg() -> SymbolStaticConfig {
        SymbolStaticConfig {
            symbol: "BTCUSDT".to_string(),
            strategy: "grinder".to_string(),
            scale: SymbolScale { price_scale_digits: 2, qty_scale_digits: 4 },
            constraints: SymbolConstraints {
                tick_size_ticks: 1,
                step_size_steps: 1,
                min_qty_steps: 1,
                min_notional_x1000: 5_000,
            },
            capabilities: RouterCapabilities { supports_amend: true },
            regime_thresholds: RegimeThresholds::default(),
            toxicity_weights: ToxicityWeights::default(),
            policy_config: PolicyConfig::default(),
            fsm_config: FsmConfig::default(),
            safety_config: SafetyConfig::default(),
        }
    }

    fn book_ticker(ts_ms: i64, bid: &str, ask: &str) -> TickEvent {
        TickEvent::BookTicker {
            symbol: "BTCUSDT".to_string(),
            ts_ms,
            bid_price: bid.to_string(),
            bid_qty: "1.0".to_string(),
            ask_price: ask.to_string(),
            ask_qty: "1.0".to_string(),
        }
    }

    #[test]
    fn depth_diff_with_no_l1_change_returns_none() {
        let mut state = SymbolPipelineState::new("BTCUSDT", 0, 1, 1_000_000);
        let mut port = PaperBroker::new(0);
        let cfg = static_cfg();
        let whitelist: HashSet<String> = ["BTCUSDT".to_string()].into_iter().collect();
        let ctx = TickContext {
            cfg: &cfg,
            day_id: 1,
            equity_micros: 1_000_000,
            position_qty_signed: 0,
            inventory_pct_x1000: 0,
            dd_budget_ratio_x1000: 1000,
            spacing_multiplier_x1000: 1000,
            armed: true,
            mode: Mode::Paper,
            operator_override: OperatorOverride::None,
            symbol_whitelist: &whitelist,
            topk_ready: true,
        };
        let event = TickEvent::DepthDiff {
            symbol: "BTCUSDT".to_string(),
            ts_ms: 1,
            bids: vec![],
            asks: vec![],
            first_update_id: 1,
            final_update_id: 1,
        };
        assert!(process_tick(&mut state, &mut port, &event, &ctx).is_none());
    }

    #[test]
    fn book_ticker_drives_a_full_pipeline_tick() {
        let mut state = SymbolPipelineState::new("BTCUSDT", 0, 1, 1_000_000);
        let mut port = PaperBroker::new(0);
        let cfg = static_cfg();
        let whitelist: HashSet<String> = ["BTCUSDT".to_string()].into_iter().collect();
        let ctx = TickContext {
            cfg: &cfg,
            day_id: 1,
            equity_micros: 1_000_000,
            position_qty_signed: 0,
            inventory_pct_x1000: 0,
            dd_budget_ratio_x1000: 1000,
            spacing_multiplier_x1000: 1000,
            armed: true,
            mode: Mode::Paper,
            operator_override: OperatorOverride::None,
            symbol_whitelist: &whitelist,
            topk_ready: true,
        };
        let event = book_ticker(1, "100.00", "100.10");
        let outcome = process_tick(&mut state, &mut port, &event, &ctx);
        assert!(outcome.is_some());
        let outcome = outcome.unwrap();
        assert_eq!(outcome.regime, Regime::Range);
        // Init -> Ready on the first tick with health_ok=true.
        assert_eq!(outcome.fsm_transition.as_ref().map(|t| t.to), Some(grinder_types::FsmState::Ready));
        let _ = Side::Buy;
    }
}
