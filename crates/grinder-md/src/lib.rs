//! Inbound feed normalization.
//!
//! Connects to a venue's combined websocket stream, parses each frame as a
//! [`raw::RawMessage`], and normalizes it into a [`grinder_types::TickEvent`]
//! for downstream feature extraction. Also fetches the REST depth snapshot a
//! caller needs before it can start applying `depthUpdate` diffs.
//!
//! This crate does not decide what to do with a `TickEvent` once produced —
//! that's `grinder-features`' job — and it does not retry or reconnect on
//! its own; `grinder-daemon` owns the worker lifecycle and backoff policy.

pub mod normalizer;
pub mod raw;
pub mod sequence;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use raw::{RawDepthSnapshot, RawMessage};

pub use normalizer::{normalize, normalize_snapshot_levels, NormalizeError};
pub use sequence::{ContinuityIssue, SequenceTracker};

/// Where to connect and which symbols to subscribe to.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_base_url: String,
    pub symbols: Vec<String>,
}

/// A parsed, normalized depth-book snapshot ready to seed a local book.
#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

/// Fetch the full depth-book snapshot for `symbol` over REST.
///
/// Callers must do this once per symbol before applying `depthUpdate`
/// diffs, and discard any diff whose `final_update_id <= last_update_id`.
pub async fn fetch_depth_snapshot(
    http: &reqwest::Client,
    cfg: &FeedConfig,
    symbol: &str,
    limit: u32,
) -> Result<DepthSnapshot> {
    let url = format!(
        "{}/fapi/v1/depth?symbol={}&limit={}",
        cfg.rest_base_url.trim_end_matches('/'),
        symbol,
        limit
    );
    let raw: RawDepthSnapshot = http
        .get(url)
        .send()
        .await
        .context("depth snapshot request failed")?
        .json()
        .await
        .context("depth snapshot response decode failed")?;

    let (bids, asks) = normalize_snapshot_levels(&raw.bids, &raw.asks)
        .context("depth snapshot contained a malformed decimal level")?;

    Ok(DepthSnapshot {
        last_update_id: raw.last_update_id,
        bids,
        asks,
    })
}

/// One frame from the combined stream, either a normalized event or a
/// continuity issue the caller should log/count but can usually ignore for
/// correctness (the normalized event is still forwarded alongside it).
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub event: grinder_types::TickEvent,
    pub continuity_issue: Option<ContinuityIssue>,
}

/// Connect to the venue's combined websocket stream and forward normalized
/// events on `tx` until the connection closes or `tx` is dropped.
///
/// Malformed frames are logged and skipped rather than terminating the
/// connection — a single bad message must not take down the feed.
pub async fn run_feed(cfg: FeedConfig, tx: mpsc::Sender<FeedMessage>) -> Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(&cfg.ws_url)
        .await
        .with_context(|| format!("websocket connect failed: {}", cfg.ws_url))?;
    let (_, mut read) = ws_stream.split();
    let mut tracker = SequenceTracker::new();

    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "feed websocket read error");
                return Err(e).context("feed websocket read error");
            }
        };

        let text = match frame {
            Message::Text(t) => t,
            _ => {
                debug!("ignoring non-text feed frame");
                continue;
            }
        };

        let raw: RawMessage = match serde_json::from_str(&text) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable feed frame, skipping");
                continue;
            }
        };

        let event = match normalize(&raw) {
            Ok(ev) => ev,
            Err(e) => {
                warn!(error = %e, "feed normalization failed, skipping");
                continue;
            }
        };

        let continuity_issue = tracker.observe(&event);
        if tx
            .send(FeedMessage { event, continuity_issue })
            .await
            .is_err()
        {
            // Receiver gone: caller is shutting down.
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_config_carries_symbols_verbatim() {
        let cfg = FeedConfig {
            ws_url: "wss://example.invalid/ws".into(),
            rest_base_url: "https://example.invalid".into(),
            symbols: vec!["BTCUSDT".into(), "ETHUSDT".into()],
        };
        assert_eq!(cfg.symbols.len(), 2);
    }
}
