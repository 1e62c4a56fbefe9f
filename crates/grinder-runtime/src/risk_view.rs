//! Immutable risk snapshot publisher (§5).
//!
//! The risk worker is the sole writer of account-level risk state (equity,
//! drawdown, kill-switch, per-symbol position caps). Every decision worker
//! reads the latest snapshot without blocking the writer and without
//! locking each other out. The base workspace's dependency set has no
//! `arc-swap`, so this is a hand-rolled `Arc<RwLock<Arc<T>>>`: readers hold
//! the read lock only long enough to clone the inner `Arc`, so a slow
//! reader never stalls the publisher.

use std::sync::Arc;

use parking_lot::RwLock;

/// Account-level risk facts every symbol worker needs but none of them own.
#[derive(Debug, Clone)]
pub struct RiskView {
    pub ts_ms: i64,
    pub day_id: u32,
    pub equity_micros: i64,
    pub drawdown_latched: bool,
    pub kill_switch_active: bool,
    pub dd_budget_ratio_x1000: i64,
}

impl RiskView {
    pub fn boot() -> Self {
        Self {
            ts_ms: 0,
            day_id: 0,
            equity_micros: 0,
            drawdown_latched: false,
            kill_switch_active: false,
            dd_budget_ratio_x1000: 1000,
        }
    }
}

impl Default for RiskView {
    fn default() -> Self {
        Self::boot()
    }
}

/// Cloneable handle shared between the risk worker (writer) and every
/// decision worker (reader).
#[derive(Clone)]
pub struct RiskViewHandle {
    inner: Arc<RwLock<Arc<RiskView>>>,
}

impl RiskViewHandle {
    pub fn new(initial: RiskView) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(initial))) }
    }

    /// Cheap: clones the `Arc`, releases the lock immediately. The caller
    /// holds an immutable snapshot that cannot change underneath it.
    pub fn load(&self) -> Arc<RiskView> {
        self.inner.read().clone()
    }

    /// Replace the published snapshot. Called by the risk worker only.
    pub fn publish(&self, next: RiskView) {
        *self.inner.write() = Arc::new(next);
    }
}

impl Default for RiskViewHandle {
    fn default() -> Self {
        Self::new(RiskView::boot())
    }
}
