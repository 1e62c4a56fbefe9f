//! Canonical serialization of reconcile snapshots.
//!
//! Snapshots are persisted as evidence artifacts whenever a reconcile halts or
//! a mismatch is detected, so the wire form must be deterministic: the same
//! logical snapshot always renders to the same bytes and the same digest,
//! regardless of insertion order on the way in.
//!
//! Determinism comes from two properties already held by [`BrokerSnapshot`]
//! and [`LocalSnapshot`]: their order/position maps are `BTreeMap`s (so key
//! order is always ascending), and their struct field order is fixed by
//! `derive(Serialize)`. `serde_json` preserves both, so compact serialization
//! is already canonical — no manual key sorting is required here.

use sha2::{Digest, Sha256};

use crate::types::{BrokerSnapshot, LocalSnapshot};

/// Error returned by canonical render/load/digest operations.
#[derive(Debug)]
pub enum CanonicalError {
    /// Serialization to the canonical wire form failed.
    Render(serde_json::Error),
    /// Deserialization from the canonical wire form failed.
    Load(serde_json::Error),
}

impl std::fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(e) => write!(f, "failed to render canonical snapshot: {e}"),
            Self::Load(e) => write!(f, "failed to load canonical snapshot: {e}"),
        }
    }
}

impl std::error::Error for CanonicalError {}

/// Render a [`BrokerSnapshot`] to its canonical (deterministic) wire form.
pub fn render_broker(snap: &BrokerSnapshot) -> Result<String, CanonicalError> {
    serde_json::to_string(snap).map_err(CanonicalError::Render)
}

/// Parse a canonical wire form back into a [`BrokerSnapshot`].
pub fn load_broker(bytes: &str) -> Result<BrokerSnapshot, CanonicalError> {
    serde_json::from_str(bytes).map_err(CanonicalError::Load)
}

/// SHA-256 digest (lowercase hex) of a [`BrokerSnapshot`]'s canonical form.
pub fn digest_broker(snap: &BrokerSnapshot) -> Result<String, CanonicalError> {
    let rendered = render_broker(snap)?;
    Ok(hex::encode(Sha256::digest(rendered.as_bytes())))
}

/// Render a [`LocalSnapshot`] to its canonical (deterministic) wire form.
pub fn render_local(snap: &LocalSnapshot) -> Result<String, CanonicalError> {
    serde_json::to_string(snap).map_err(CanonicalError::Render)
}

/// Parse a canonical wire form back into a [`LocalSnapshot`].
pub fn load_local(bytes: &str) -> Result<LocalSnapshot, CanonicalError> {
    serde_json::from_str(bytes).map_err(CanonicalError::Load)
}

/// SHA-256 digest (lowercase hex) of a [`LocalSnapshot`]'s canonical form.
pub fn digest_local(snap: &LocalSnapshot) -> Result<String, CanonicalError> {
    let rendered = render_local(snap)?;
    Ok(hex::encode(Sha256::digest(rendered.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderSnapshot, OrderStatus, Side};

    fn sample_broker() -> BrokerSnapshot {
        let mut snap = BrokerSnapshot::empty_at(1_700_000_000_000);
        snap.orders.insert(
            "ord-2".to_string(),
            OrderSnapshot::new("ord-2", "BTCUSDT", Side::Sell, 10, 0, OrderStatus::New),
        );
        snap.orders.insert(
            "ord-1".to_string(),
            OrderSnapshot::new("ord-1", "BTCUSDT", Side::Buy, 5, 5, OrderStatus::Filled),
        );
        snap.positions.insert("BTCUSDT".to_string(), 5);
        snap
    }

    #[test]
    fn round_trip_preserves_the_snapshot() {
        let snap = sample_broker();
        let rendered = render_broker(&snap).unwrap();
        let loaded = load_broker(&rendered).unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn render_is_deterministic_across_calls() {
        let snap = sample_broker();
        assert_eq!(render_broker(&snap).unwrap(), render_broker(&snap).unwrap());
    }

    #[test]
    fn digest_is_deterministic_and_64_hex_chars() {
        let snap = sample_broker();
        let d1 = digest_broker(&snap).unwrap();
        let d2 = digest_broker(&snap).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert!(d1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_changes_when_content_changes() {
        let snap_a = sample_broker();
        let mut snap_b = sample_broker();
        snap_b.positions.insert("BTCUSDT".to_string(), 6);
        assert_ne!(digest_broker(&snap_a).unwrap(), digest_broker(&snap_b).unwrap());
    }

    #[test]
    fn insertion_order_does_not_affect_rendered_bytes() {
        let mut a = BrokerSnapshot::empty_at(1);
        a.orders.insert(
            "ord-a".to_string(),
            OrderSnapshot::new("ord-a", "X", Side::Buy, 1, 0, OrderStatus::New),
        );
        a.orders.insert(
            "ord-b".to_string(),
            OrderSnapshot::new("ord-b", "X", Side::Sell, 1, 0, OrderStatus::New),
        );

        let mut b = BrokerSnapshot::empty_at(1);
        b.orders.insert(
            "ord-b".to_string(),
            OrderSnapshot::new("ord-b", "X", Side::Sell, 1, 0, OrderStatus::New),
        );
        b.orders.insert(
            "ord-a".to_string(),
            OrderSnapshot::new("ord-a", "X", Side::Buy, 1, 0, OrderStatus::New),
        );

        assert_eq!(render_broker(&a).unwrap(), render_broker(&b).unwrap());
    }

    #[test]
    fn local_snapshot_round_trips_too() {
        let mut local = LocalSnapshot::empty();
        local.positions.insert("ETHUSDT".to_string(), -3);
        let rendered = render_local(&local).unwrap();
        assert_eq!(load_local(&rendered).unwrap(), local);
    }
}
