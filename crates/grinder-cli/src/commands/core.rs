//! `grinder core` — the fixture-replay / live trading entry point described
//! in spec §6's CLI surface: `--fixture`, `--armed`, `--exchange-port
//! {noop,futures}`, `--mainnet`, `--symbols`, `--paper-size-per-level`,
//! `--max-notional-per-order`, `--metrics-port`, `--reset-budget`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{extract::State, routing::get, Router};
use clap::ValueEnum;
use grinder_fsm::types::OperatorOverride;
use grinder_metrics::{Metrics, ReasonCode};
use grinder_port::{Ack, AmendOrder, ExchangePort, PlaceOrder, PortError};
use grinder_port_futures::{BinanceFuturesConfig, BinanceFuturesPort, SymbolMeta};
use grinder_port_paper::PaperBroker;
use grinder_router::SymbolConstraints;
use grinder_safety::Mode;
use grinder_testkit::orchestrator::{Orchestrator, OrchestratorConfig};
use grinder_types::{AccountSnapshot, OpenOrderSnap, PositionSnap};

use super::{today_utc, utc_stamp};
use crate::budget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExchangePortKind {
    Noop,
    Futures,
}

pub struct CoreArgs {
    pub fixture: String,
    pub armed: bool,
    pub exchange_port: ExchangePortKind,
    pub mainnet: bool,
    pub symbols: Vec<String>,
    pub paper_size_per_level: i64,
    pub max_notional_per_order: Option<i64>,
    pub metrics_port: Option<u16>,
    pub reset_budget: bool,
    pub state_dir: String,
    pub artifact_dir: Option<String>,
}

/// Wraps either port implementation behind one [`ExchangePort`] so the
/// replay harness doesn't need to be generic over the concrete adapter.
enum AnyPort {
    Noop(PaperBroker),
    Futures(Box<BinanceFuturesPort>),
}

impl ExchangePort for AnyPort {
    fn place(&mut self, order: &PlaceOrder) -> Result<Ack, PortError> {
        match self {
            AnyPort::Noop(p) => p.place(order),
            AnyPort::Futures(p) => p.place(order),
        }
    }
    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, PortError> {
        match self {
            AnyPort::Noop(p) => p.cancel(client_order_id),
            AnyPort::Futures(p) => p.cancel(client_order_id),
        }
    }
    fn amend(&mut self, order: &AmendOrder) -> Result<Ack, PortError> {
        match self {
            AnyPort::Noop(p) => p.amend(order),
            AnyPort::Futures(p) => p.amend(order),
        }
    }
    fn fetch_open_orders(&mut self, symbol: &str) -> Result<Vec<OpenOrderSnap>, PortError> {
        match self {
            AnyPort::Noop(p) => p.fetch_open_orders(symbol),
            AnyPort::Futures(p) => p.fetch_open_orders(symbol),
        }
    }
    fn fetch_positions(&mut self, symbol: &str) -> Result<Vec<PositionSnap>, PortError> {
        match self {
            AnyPort::Noop(p) => p.fetch_positions(symbol),
            AnyPort::Futures(p) => p.fetch_positions(symbol),
        }
    }
    fn fetch_account_snapshot(&mut self) -> Result<AccountSnapshot, PortError> {
        match self {
            AnyPort::Noop(p) => p.fetch_account_snapshot(),
            AnyPort::Futures(p) => p.fetch_account_snapshot(),
        }
    }
}

pub async fn run_core(args: CoreArgs) -> Result<()> {
    if args.symbols.is_empty() {
        bail!("--symbols must name at least one symbol");
    }

    let mode = resolve_mode(&args)?;
    tracing::info!(fixture = %args.fixture, ?mode, armed = args.armed, "starting core replay");
    let events = grinder_testkit::load_fixture_jsonl(&args.fixture)?;

    let state_dir = PathBuf::from(&args.state_dir);
    let budget_path = state_dir.join("budget.json");
    let mut budget = budget::load_or_reset(&budget_path, &today_utc(), args.reset_budget)?;

    let mut cfg = OrchestratorConfig::sane_defaults(args.symbols.iter().cloned());
    cfg.armed = args.armed;
    cfg.mode = mode;
    cfg.base_level_size = args.paper_size_per_level;
    cfg.operator_override = resolve_operator_override();
    if let Some(max_notional) = args.max_notional_per_order {
        cfg.constraints = SymbolConstraints { min_notional_x1000: max_notional.min(cfg.constraints.min_notional_x1000), ..cfg.constraints };
    }

    let mut port = build_port(&args, mode, &cfg.constraints)?;

    let mut orch = Orchestrator::new(cfg);
    let report = orch.run(&events, &mut port);

    for transition in &report.transitions {
        println!(
            "EVIDENCE_REF kind=fsm from={:?} to={:?} reason={} ts_ms={}",
            transition.from, transition.to, transition.reason, transition.ts_ms
        );
        if is_risk_relevant(&transition.to) {
            write_fsm_evidence(&args, transition)?;
        }
    }

    let dispatched = report.log.iter().flat_map(|e| e.dispatch.iter()).filter(|d| d.starts_with("DISPATCHED")).count();
    if dispatched > 0 {
        budget.record_order(dispatched as i64 * args.paper_size_per_level);
        budget::save_atomic(&budget_path, &budget)?;
    }

    let metrics = Metrics::new();
    for transition in &report.transitions {
        metrics.fsm_transitions_total(&format!("{:?}", transition.from).to_uppercase(), &format!("{:?}", transition.to).to_uppercase(), ReasonCode::None);
    }
    metrics.port_order_attempts_total(port_label(args.exchange_port), "place");

    println!(
        "ticks_processed={} events_skipped={} transitions={} dispatched={} digest={} orders_today={} notional_today_usd_scaled={}",
        report.ticks_processed,
        report.events_skipped,
        report.transitions.len(),
        dispatched,
        report.digest,
        budget.orders_today,
        budget.notional_today_usd_scaled,
    );

    if let Some(port_num) = args.metrics_port {
        serve_metrics_until_ctrl_c(metrics, port_num).await?;
    }

    Ok(())
}

fn resolve_mode(args: &CoreArgs) -> Result<Mode> {
    // GRINDER_TRADING_MODE, when set, is authoritative; --armed/--mainnet
    // still gate whether that mode is actually permitted to run.
    let requested = match std::env::var("GRINDER_TRADING_MODE") {
        Ok(raw) => Some(super::parse_run_mode(&raw).map(run_mode_to_safety_mode)?),
        Err(_) => None,
    };

    if args.mainnet {
        if !args.armed {
            bail!("--mainnet requires --armed");
        }
        let allowed = std::env::var("ALLOW_MAINNET_TRADE").map(|v| v == "1").unwrap_or(false);
        if !allowed {
            bail!("--mainnet requires ALLOW_MAINNET_TRADE=1 in the environment");
        }
        if args.symbols.is_empty() {
            bail!("--mainnet requires a non-empty --symbols whitelist");
        }
        if matches!(requested, Some(m) if m != Mode::LiveTrade) {
            bail!("--mainnet requires GRINDER_TRADING_MODE=LIVE_TRADE when the env var is set");
        }
        Ok(Mode::LiveTrade)
    } else if let Some(m) = requested {
        Ok(m)
    } else if args.armed {
        Ok(Mode::Paper)
    } else {
        Ok(Mode::Backtest)
    }
}

fn run_mode_to_safety_mode(mode: grinder_config::consumption::RunMode) -> Mode {
    match mode {
        grinder_config::consumption::RunMode::Backtest => Mode::Backtest,
        grinder_config::consumption::RunMode::Paper => Mode::Paper,
        grinder_config::consumption::RunMode::LiveTrade => Mode::LiveTrade,
    }
}

/// `GRINDER_OPERATOR_OVERRIDE ∈ {∅, PAUSE, EMERGENCY}` (normalized
/// uppercase); `ML_KILL_SWITCH=1` forces `Emergency` regardless.
fn resolve_operator_override() -> OperatorOverride {
    if std::env::var("ML_KILL_SWITCH").map(|v| v == "1").unwrap_or(false) {
        return OperatorOverride::Emergency;
    }
    match std::env::var("GRINDER_OPERATOR_OVERRIDE").unwrap_or_default().trim().to_ascii_uppercase().as_str() {
        "PAUSE" => OperatorOverride::Pause,
        "EMERGENCY" => OperatorOverride::Emergency,
        _ => OperatorOverride::None,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn build_port(args: &CoreArgs, mode: Mode, constraints: &SymbolConstraints) -> Result<AnyPort> {
    match args.exchange_port {
        ExchangePortKind::Noop => Ok(AnyPort::Noop(PaperBroker::new(chrono::Utc::now().timestamp_millis()))),
        ExchangePortKind::Futures => {
            let api_key = std::env::var("GRINDER_API_KEY").unwrap_or_default();
            let api_secret = std::env::var("GRINDER_API_SECRET").unwrap_or_default();
            let dry_run = mode != Mode::LiveTrade;
            let defaults = grinder_port::PortConfig::default();
            let mut port_cfg = grinder_port::PortConfig {
                symbol_whitelist: args.symbols.iter().cloned().collect(),
                allow_mainnet_trade: args.mainnet,
                http_deadline_place_ms: env_u64("HTTP_DEADLINE_PLACE_MS", defaults.http_deadline_place_ms),
                http_deadline_cancel_ms: env_u64("HTTP_DEADLINE_CANCEL_MS", defaults.http_deadline_cancel_ms),
                http_deadline_amend_ms: env_u64("HTTP_DEADLINE_AMEND_MS", defaults.http_deadline_amend_ms),
                http_deadline_fetch_ms: env_u64("HTTP_DEADLINE_FETCH_MS", defaults.http_deadline_fetch_ms),
                http_max_attempts_place: env_u32("HTTP_MAX_ATTEMPTS_PLACE", defaults.http_max_attempts_place),
                http_max_attempts_cancel: env_u32("HTTP_MAX_ATTEMPTS_CANCEL", defaults.http_max_attempts_cancel),
                http_max_attempts_amend: env_u32("HTTP_MAX_ATTEMPTS_AMEND", defaults.http_max_attempts_amend),
                http_max_attempts_fetch: env_u32("HTTP_MAX_ATTEMPTS_FETCH", defaults.http_max_attempts_fetch),
                ..defaults
            };
            if let Some(max_notional) = args.max_notional_per_order {
                port_cfg.max_notional_per_order_x1000 = max_notional;
            }
            let mut port = BinanceFuturesPort::new(BinanceFuturesConfig {
                base_url: "https://fapi.binance.com".to_string(),
                api_key,
                api_secret,
                recv_window_ms: 5_000,
                dry_run,
                port: port_cfg,
            })
            .context("construct futures port")?;
            for symbol in &args.symbols {
                port.set_symbol_meta(symbol, SymbolMeta { constraints: *constraints, price_scale_digits: 2, qty_scale_digits: 4 });
            }
            Ok(AnyPort::Futures(Box::new(port)))
        }
    }
}

fn is_risk_relevant(to: &grinder_types::FsmState) -> bool {
    matches!(to, grinder_types::FsmState::Paused | grinder_types::FsmState::Degraded | grinder_types::FsmState::Emergency)
}

fn write_fsm_evidence(args: &CoreArgs, transition: &grinder_types::TransitionEvent) -> Result<()> {
    let Some(root) = &args.artifact_dir else { return Ok(()) };
    let summary = format!("fsm transition {:?} -> {:?} reason={} ts_ms={}\n", transition.from, transition.to, transition.reason, transition.ts_ms);
    let result = grinder_artifacts::write_evidence_dir(grinder_artifacts::WriteEvidenceArgs {
        artifact_root: std::path::Path::new(root),
        kind: "fsm",
        utc_stamp: &utc_stamp(),
        summary: &summary,
        files: &[],
    })?;
    tracing::warn!(dir = %result.dir.display(), to = ?transition.to, "risk-relevant fsm transition, evidence written");
    println!("EVIDENCE_REF dir={}", result.dir.display());
    Ok(())
}

fn port_label(kind: ExchangePortKind) -> &'static str {
    match kind {
        ExchangePortKind::Noop => "noop",
        ExchangePortKind::Futures => "futures",
    }
}

async fn serve_metrics_until_ctrl_c(metrics: Metrics, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(metrics));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("bind metrics port {port}"))?;
    println!("metrics_listening=http://{addr}/metrics");

    tokio::select! {
        result = axum::serve(listener, app) => result.context("metrics server crashed")?,
        _ = tokio::signal::ctrl_c() => {}
    }

    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> (axum::http::StatusCode, [(&'static str, &'static str); 1], String) {
    let body = grinder_metrics::render_text(metrics.registry());
    (axum::http::StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}
