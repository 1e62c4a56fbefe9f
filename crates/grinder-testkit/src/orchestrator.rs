//! End-to-end replay harness (spec §8: determinism + replay-fixture properties).
//!
//! Drives one [`grinder_runtime::pipeline::SymbolPipelineState`] per symbol
//! seen in the fixture, in the same per-symbol decision order every worker
//! in the real runtime would use (§5), and folds a canonical per-tick
//! record into a running SHA-256 digest. Two runs over the same event
//! prefix and config always produce the same digest — that equality is the
//! property under test, not any specific hash value.

use std::collections::{BTreeMap, HashSet};

use grinder_execution::SymbolScale;
use grinder_fsm::types::{FsmConfig, OperatorOverride};
use grinder_policy::PolicyConfig;
use grinder_port::ExchangePort;
use grinder_regime::RegimeThresholds;
use grinder_router::{RouterCapabilities, SymbolConstraints};
use grinder_runtime::pipeline::{process_tick, SymbolPipelineState, SymbolStaticConfig, TickContext};
use grinder_safety::{Mode, SafetyConfig};
use grinder_toxicity::ToxicityWeights;
use grinder_types::{FsmState, Regime, TickEvent, ToxicityBand, TransitionEvent};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Static parameters shared by every symbol onboarded during a run. Mirrors
/// the CLI surface in spec §6 (`--symbols`, `--paper-size-per-level`,
/// `--armed`, ...).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub day_id: u32,
    pub starting_equity_micros: i64,
    pub armed: bool,
    pub mode: Mode,
    pub operator_override: OperatorOverride,
    pub base_level_size: i64,
    pub constraints: SymbolConstraints,
    pub scale: SymbolScale,
    pub capabilities: RouterCapabilities,
    pub symbol_whitelist: HashSet<String>,
}

impl OrchestratorConfig {
    pub fn sane_defaults(symbols: impl IntoIterator<Item = String>) -> Self {
        let symbol_whitelist: HashSet<String> = symbols.into_iter().collect();
        Self {
            day_id: 1,
            starting_equity_micros: 1_000_000_000,
            armed: true,
            mode: Mode::Paper,
            operator_override: OperatorOverride::None,
            base_level_size: PolicyConfig::default().base_level_size,
            constraints: SymbolConstraints {
                tick_size_ticks: 1,
                step_size_steps: 1,
                min_qty_steps: 1,
                min_notional_x1000: 5_000,
            },
            scale: SymbolScale { price_scale_digits: 2, qty_scale_digits: 4 },
            capabilities: RouterCapabilities { supports_amend: true },
            symbol_whitelist,
        }
    }

    fn static_config_for(&self, symbol: &str) -> SymbolStaticConfig {
        let mut policy_config = PolicyConfig::default();
        policy_config.base_level_size = self.base_level_size;
        SymbolStaticConfig {
            symbol: symbol.to_string(),
            strategy: "grinder".to_string(),
            scale: self.scale,
            constraints: self.constraints,
            capabilities: self.capabilities,
            regime_thresholds: RegimeThresholds::default(),
            toxicity_weights: ToxicityWeights::default(),
            policy_config,
            fsm_config: FsmConfig::default(),
            safety_config: SafetyConfig::default(),
        }
    }
}

/// One canonicalized per-tick record folded into the run digest. Every
/// field is either already a closed enum (stable `Serialize` encoding) or a
/// plain string rendered from a `Display`/debug impl, so the serialized
/// bytes never depend on hash-map iteration order or a wall clock.
#[derive(Debug, Clone, Serialize)]
pub struct TickLogEntry {
    pub symbol: String,
    pub ts_ms: i64,
    pub regime: Regime,
    pub toxicity_band: ToxicityBand,
    pub fsm_transition: Option<TransitionEvent>,
    pub dispatch: Vec<String>,
}

/// Everything produced by one [`Orchestrator::run`] call.
#[derive(Debug, Clone)]
pub struct OrchestratorReport {
    pub ticks_processed: u64,
    pub events_skipped: u64,
    pub transitions: Vec<TransitionEvent>,
    pub log: Vec<TickLogEntry>,
    /// Hex SHA-256 over the ordered, canonically-serialized [`TickLogEntry`]
    /// stream. The determinism property (spec §8) is
    /// `digest(run(F,C)) == digest(run(F,C))`, not any particular value.
    pub digest: String,
}

/// Owns one [`SymbolPipelineState`] per symbol encountered so far plus the
/// static config template every newly onboarded symbol is stamped from.
pub struct Orchestrator {
    cfg: OrchestratorConfig,
    states: BTreeMap<String, SymbolPipelineState>,
    /// Net signed position per symbol, scaled-integer qty steps. The replay
    /// harness does not model fills against this counter; callers that need
    /// fill-driven inventory can mutate it between `run` calls via
    /// [`Orchestrator::set_position`].
    positions: BTreeMap<String, i64>,
}

impl Orchestrator {
    pub fn new(cfg: OrchestratorConfig) -> Self {
        Self { cfg, states: BTreeMap::new(), positions: BTreeMap::new() }
    }

    pub fn set_position(&mut self, symbol: &str, qty_signed: i64) {
        self.positions.insert(symbol.to_string(), qty_signed);
    }

    /// Replay `events` (already time-ordered; see [`crate::load_fixture_jsonl`])
    /// through the full per-symbol pipeline, dispatching through `port`.
    /// `UserDataEvent`s carry no symbol and are not routed to a pipeline —
    /// account-level reconciliation is `grinder-reconcile`'s orthogonal loop
    /// (§4.12), not this replay harness.
    pub fn run(&mut self, events: &[TickEvent], port: &mut dyn ExchangePort) -> OrchestratorReport {
        let mut transitions = Vec::new();
        let mut log = Vec::new();
        let mut ticks_processed = 0u64;
        let mut events_skipped = 0u64;
        let mut hasher = Sha256::new();

        for event in events {
            let symbol = match event.symbol() {
                Some(s) => s.to_string(),
                None => {
                    events_skipped += 1;
                    continue;
                }
            };

            let cfg = &self.cfg;
            let state = self.states.entry(symbol.clone()).or_insert_with(|| {
                SymbolPipelineState::new(symbol.clone(), event.ts_ms(), cfg.day_id, cfg.starting_equity_micros)
            });
            let static_cfg = self.cfg.static_config_for(&symbol);
            let position_qty_signed = *self.positions.get(&symbol).unwrap_or(&0);

            let ctx = TickContext {
                cfg: &static_cfg,
                day_id: self.cfg.day_id,
                equity_micros: self.cfg.starting_equity_micros,
                position_qty_signed,
                inventory_pct_x1000: 0,
                dd_budget_ratio_x1000: 1000,
                spacing_multiplier_x1000: 1000,
                armed: self.cfg.armed,
                mode: self.cfg.mode,
                operator_override: self.cfg.operator_override,
                symbol_whitelist: &self.cfg.symbol_whitelist,
                topk_ready: true,
            };

            let Some(outcome) = process_tick(state, port, event, &ctx) else {
                events_skipped += 1;
                continue;
            };

            ticks_processed += 1;
            if let Some(t) = outcome.fsm_transition.clone() {
                transitions.push(t);
            }

            let entry = TickLogEntry {
                symbol: symbol.clone(),
                ts_ms: event.ts_ms(),
                regime: outcome.regime,
                toxicity_band: outcome.toxicity_band,
                fsm_transition: outcome.fsm_transition,
                dispatch: outcome.dispatch.iter().map(describe_dispatch).collect(),
            };

            let line = serde_json::to_vec(&entry).expect("TickLogEntry is always serializable");
            hasher.update(&line);
            hasher.update(b"\n");
            log.push(entry);
        }

        OrchestratorReport {
            ticks_processed,
            events_skipped,
            transitions,
            log,
            digest: hex::encode(hasher.finalize()),
        }
    }

    pub fn fsm_state(&self, symbol: &str) -> Option<FsmState> {
        self.states.get(symbol).map(|s| s.fsm.state)
    }
}

fn describe_dispatch(outcome: &grinder_execution::DispatchOutcome) -> String {
    use grinder_execution::DispatchOutcome::*;
    match outcome {
        Dispatched { level_idx, client_order_id } => format!("DISPATCHED level={level_idx} client_order_id={client_order_id}"),
        SafetyBlocked { level_idx, reason } => format!("SAFETY_BLOCKED level={level_idx} reason={reason}"),
        PortError { level_idx, error } => format!("PORT_ERROR level={level_idx} error={error:?}"),
        OmsTransitionRefused { level_idx, error } => format!("OMS_TRANSITION_REFUSED level={level_idx} error={error}"),
        Skipped { level_idx } => format!("SKIPPED level={level_idx}"),
    }
}
