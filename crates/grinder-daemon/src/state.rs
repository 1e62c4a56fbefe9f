//! Shared runtime state for grinder-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;
use std::time::Duration;

use grinder_types::BrokerSnapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ArmState — operator arm/disarm/halt control plane
// ---------------------------------------------------------------------------

/// Operator-facing arm/disarm/halt gate. Boots fail-closed: a fresh daemon
/// is `disarmed` until an explicit `POST /v1/integrity/arm` call, matching
/// the env-gate discipline the core pipeline enforces before any write path
/// (`ALLOW_MAINNET_TRADE`, `GRINDER_OPERATOR_OVERRIDE`).
#[derive(Clone, Debug)]
pub struct ArmState {
    pub disarmed: bool,
    pub halted: bool,
}

impl Default for ArmState {
    fn default() -> Self {
        // Fail-closed: nothing may run until an operator arms explicitly.
        Self { disarmed: true, halted: false }
    }
}

impl ArmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_execution_blocked(&self) -> bool {
        self.disarmed || self.halted
    }
}

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of daemon state, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub active_run_id: Option<Uuid>,
    /// "idle" | "running" | "halted"
    pub state: String,
    pub notes: Option<String>,
    /// Reflects `IntegrityState::is_execution_blocked()` negation: true = armed.
    pub integrity_armed: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Mutable run/status state.
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Operator arm/disarm/halt state.
    pub integrity: Arc<RwLock<ArmState>>,
    /// Most recently known broker account/positions/orders/fills snapshot.
    pub broker_snapshot: Arc<RwLock<Option<BrokerSnapshot>>>,
    /// Counter/gauge registry exposed at `GET /metrics`.
    pub metrics: grinder_metrics::Metrics,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            active_run_id: None,
            state: "idle".to_string(),
            notes: None,
            integrity_armed: false, // fail-closed until an explicit arm
        };

        Self {
            bus,
            build: BuildInfo {
                service: "grinder-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            integrity: Arc::new(RwLock::new(ArmState::new())),
            broker_snapshot: Arc::new(RwLock::new(None)),
            metrics: grinder_metrics::Metrics::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that polls `local_fn`/`broker_fn` every `interval`
/// and runs them through `grinder_reconcile::reconcile_tick`. A tick with no
/// broker snapshot available yet is skipped silently; a tick that reports
/// `DriftAction::HaltAndDisarm` halts and disarms the daemon, which is sticky
/// until an operator re-arms.
pub fn spawn_reconcile_tick<L, B>(
    state: Arc<AppState>,
    local_fn: L,
    broker_fn: B,
    interval: Duration,
) where
    L: Fn() -> grinder_reconcile::LocalSnapshot + Send + 'static,
    B: Fn() -> Option<grinder_reconcile::BrokerSnapshot> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let broker = match broker_fn() {
                Some(snap) => snap,
                None => continue,
            };
            let local = local_fn();

            let action = grinder_reconcile::reconcile_tick(&local, &broker);
            if action.requires_halt_and_disarm() {
                {
                    let mut ig = state.integrity.write().await;
                    ig.disarmed = true;
                    ig.halted = true;
                }
                {
                    let mut s = state.status.write().await;
                    s.state = "halted".to_string();
                    s.integrity_armed = false;
                }
                let _ = state.bus.send(BusMsg::LogLine {
                    level: "ERROR".to_string(),
                    msg: "RECONCILE_MISMATCH: position drift detected, halting and disarming"
                        .to_string(),
                });
            }
        }
    });
}
