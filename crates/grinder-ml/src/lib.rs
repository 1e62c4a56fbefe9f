//! Optional external ML signal contract (§6).
//!
//! GRINDER treats model training/inference as an out-of-scope collaborator;
//! this crate is the pure, deterministic interface by which a signal
//! producer's output enters the decision path — selection by event-time
//! lookup, with neutral defaults when no signal is available.

use grinder_types::MlSignalSnapshot;

/// Ordered-by-`ts_ms` history of signals for one symbol. The caller is
/// responsible for feeding signals in non-decreasing `ts_ms` order.
#[derive(Debug, Clone, Default)]
pub struct MlSignalHistory {
    snapshots: Vec<MlSignalSnapshot>,
}

impl MlSignalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: MlSignalSnapshot) {
        debug_assert!(
            self.snapshots.last().map(|s| s.ts_ms <= snapshot.ts_ms).unwrap_or(true),
            "signal history must be fed in non-decreasing ts_ms order"
        );
        self.snapshots.push(snapshot);
    }

    /// Select the signal with the greatest `ts_ms <= t` via binary search.
    /// Returns `None` if no such signal exists (caller applies neutral
    /// defaults).
    pub fn select_at(&self, t_ms: i64) -> Option<&MlSignalSnapshot> {
        match self.snapshots.binary_search_by(|s| s.ts_ms.cmp(&t_ms)) {
            Ok(idx) => Some(&self.snapshots[idx]),
            Err(0) => None,
            Err(idx) => Some(&self.snapshots[idx - 1]),
        }
    }

    /// Neutral spacing multiplier to apply when no signal is selected.
    pub fn neutral_spacing_multiplier_x1000() -> i64 {
        MlSignalSnapshot::NEUTRAL_SPACING_MULTIPLIER_X1000
    }
}
