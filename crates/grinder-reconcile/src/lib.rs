//! Account reconciliation engine.
//!
//! Architectural decisions:
//! - Broker snapshot reconciliation required before LIVE
//! - Divergence triggers HALT
//! - Unknown broker order triggers HALT
//! - Position mismatch triggers HALT
//! - Clean reconcile required before arming
//! - Snapshots are read-only evidence: this crate never mutates broker state
//!
//! Deterministic, pure logic. No IO. No broker calls.

mod canonical;
mod engine;
mod gate;
mod types;
mod watermark;

pub mod snapshot_adapter;

// reconcile_monotonic is the required production path; it enforces snapshot
// monotonicity via SnapshotWatermark before running content comparison.
// StaleBrokerSnapshot is returned when a snapshot fails the watermark check.
pub use engine::{is_clean_reconcile, reconcile, reconcile_monotonic, StaleBrokerSnapshot};

// Mandatory gate API for arm/start and periodic drift monitoring.
pub use gate::{check_arm_gate, check_start_gate, reconcile_tick, ArmStartGate, DriftAction};
pub use snapshot_adapter::{
    normalize, normalize_json, normalize_lenient, RawBrokerOrder, RawBrokerPosition,
    RawBrokerSnapshot, SnapshotAdapterError,
};
pub use types::*;
// Snapshot freshness + monotonicity enforcement.
pub use watermark::{SnapshotFreshness, SnapshotWatermark};

// Canonical serialization + digest for evidence artifacts.
pub use canonical::{
    digest_broker, digest_local, load_broker, load_local, render_broker, render_local,
    CanonicalError,
};
