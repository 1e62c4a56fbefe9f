//! Bounded MPSC wiring and cooperative shutdown for the per-role worker
//! topology (§5): one per-symbol decision worker, one risk worker, one port
//! worker pool. Ingress/prefilter/reconciler worker lifecycles are owned by
//! `grinder-daemon`; this module only supplies the channel/shutdown
//! primitives they share.

use std::sync::Arc;

use grinder_metrics::Metrics;
use grinder_port::ExchangePort;
use grinder_types::TickEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::pipeline::{process_tick, SymbolPipelineState, SymbolStaticConfig, TickContext};
use crate::risk_view::RiskViewHandle;

/// Depth of the bounded channel feeding one symbol's decision worker.
/// Sized to absorb a burst without unbounded memory growth; a full queue
/// means the feed is outrunning the decision loop and the tick is dropped.
pub const DECISION_QUEUE_DEPTH: usize = 1024;

/// Depth of the shutdown broadcast channel. One slot is enough — every
/// worker only ever needs to observe the single stop signal once.
const SHUTDOWN_QUEUE_DEPTH: usize = 1;

/// Sender half given to the ingress worker (or a test harness) that feeds
/// one symbol's decision worker.
pub type DecisionSender = mpsc::Sender<TickEvent>;

/// Cooperative shutdown broadcaster. Cloning the sender and calling
/// [`ShutdownSignal::subscribe`] per worker is how `grinder-daemon` fans the
/// same stop signal out to every spawned worker.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SHUTDOWN_QUEUE_DEPTH);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every subscribed worker to drain and exit. A send with no
    /// subscribers left is not an error — workers may have already exited.
    pub fn fire(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything a decision worker needs that does not change tick-to-tick:
/// static per-symbol config plus the shared handles to cross-symbol state.
pub struct DecisionWorkerConfig {
    pub symbol: String,
    pub cfg: SymbolStaticConfig,
    pub risk_view: RiskViewHandle,
    pub metrics: Metrics,
}

/// Spawn the decision worker for one symbol: owns that symbol's
/// [`SymbolPipelineState`] exclusively (no cross-symbol locks on this
/// path), drains `events` until the channel closes or `shutdown` fires,
/// and routes dispatch through `port`.
///
/// On shutdown the worker drains whatever is already queued before exiting
/// so no in-flight tick is silently discarded — the broadcast signal only
/// stops the worker from accepting *new* sends upstream.
pub fn spawn_decision_worker(
    mut events: mpsc::Receiver<TickEvent>,
    mut shutdown: broadcast::Receiver<()>,
    config: DecisionWorkerConfig,
    mut port: impl ExchangePort + Send + 'static,
) -> JoinHandle<SymbolPipelineState> {
    tokio::spawn(async move {
        let view = config.risk_view.load();
        let mut state = SymbolPipelineState::new(config.symbol.clone(), view.ts_ms, view.day_id, view.equity_micros);
        let whitelist = std::iter::once(config.symbol.clone()).collect::<std::collections::HashSet<_>>();
        tracing::info!(symbol = %config.symbol, "decision worker started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    let mut drained = 0u32;
                    while let Ok(event) = events.try_recv() {
                        run_one_tick(&mut state, &mut port, &event, &config, &whitelist);
                        drained += 1;
                    }
                    tracing::info!(symbol = %config.symbol, drained, "decision worker draining on shutdown");
                    break;
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => run_one_tick(&mut state, &mut port, &event, &config, &whitelist),
                        None => break,
                    }
                }
            }
        }

        tracing::info!(symbol = %config.symbol, "decision worker exited");
        state
    })
}

fn run_one_tick(
    state: &mut SymbolPipelineState,
    port: &mut impl ExchangePort,
    event: &TickEvent,
    config: &DecisionWorkerConfig,
    whitelist: &std::collections::HashSet<String>,
) {
    let view = config.risk_view.load();
    let ctx = TickContext {
        cfg: &config.cfg,
        day_id: view.day_id,
        equity_micros: view.equity_micros,
        position_qty_signed: 0,
        inventory_pct_x1000: 0,
        dd_budget_ratio_x1000: view.dd_budget_ratio_x1000,
        spacing_multiplier_x1000: 1_000,
        armed: true,
        mode: grinder_safety::Mode::Paper,
        operator_override: grinder_fsm::types::OperatorOverride::None,
        symbol_whitelist: whitelist,
        topk_ready: true,
    };
    if let Some(outcome) = process_tick(state, port, event, &ctx) {
        if let Some(transition) = outcome.fsm_transition {
            config.metrics.fsm_transitions_total(
                &format!("{:?}", transition.from).to_ascii_uppercase(),
                &format!("{:?}", transition.to).to_ascii_uppercase(),
                grinder_metrics::ReasonCode::None,
            );
        }
    }
}

/// Send a tick to a symbol's decision worker, counting a drop against
/// `feed_drop_total{symbol}` on backpressure rather than blocking the
/// caller (§5: "oldest ticks dropped ... on saturation").
pub fn try_dispatch(sender: &DecisionSender, metrics: &Arc<Metrics>, symbol: &str, event: TickEvent) {
    if sender.try_send(event).is_err() {
        metrics.feed_drop_total(symbol);
    }
}
