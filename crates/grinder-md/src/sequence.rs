//! Per-stream continuity tracking for the inbound feed.
//!
//! A feed adapter sees gaps: a dropped websocket frame, a reconnect, a
//! venue-side resync. This module's job is to notice and name the gap —
//! never to repair it. Repair (resnapshotting the book, discarding stale
//! trades) is a caller concern.

use std::collections::BTreeMap;

use grinder_types::TickEvent;

/// Why a tracker flagged an inbound event as discontinuous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuityIssue {
    /// A trade's `seq` did not exceed the last seen `seq` for this symbol.
    TradeSeqNotIncreasing { symbol: String, seq: u64, last_seq: u64 },
    /// A depth diff's `first_update_id` left a hole after the previous
    /// diff's `final_update_id`.
    DepthUpdateGap {
        symbol: String,
        expected_first: u64,
        got_first: u64,
    },
    /// An event's `ts_ms` did not exceed the last seen `ts_ms` for its
    /// stream (clock went backwards or the venue resent a message).
    TimestampNotIncreasing { symbol: String, ts_ms: i64, last_ts_ms: i64 },
}

#[derive(Debug, Clone, Default)]
struct SymbolState {
    last_trade_seq: Option<u64>,
    last_depth_final_id: Option<u64>,
    last_trade_ts_ms: Option<i64>,
    last_depth_ts_ms: Option<i64>,
}

/// Tracks per-symbol sequence continuity across a stream of [`TickEvent`]s.
///
/// One tracker instance should be shared across all events for a venue
/// connection; it resets only when the caller explicitly calls
/// [`SequenceTracker::reset_symbol`] after a resnapshot.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    symbols: BTreeMap<String, SymbolState>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget continuity state for one symbol, e.g. after fetching a fresh
    /// depth snapshot and restarting the diff sequence.
    pub fn reset_symbol(&mut self, symbol: &str) {
        self.symbols.remove(symbol);
    }

    /// Observe one event, returning any continuity issue it raises. The
    /// event is always accepted into the tracker's state regardless of the
    /// issue found; callers decide whether to drop it.
    pub fn observe(&mut self, event: &TickEvent) -> Option<ContinuityIssue> {
        match event {
            TickEvent::AggTrade { symbol, ts_ms, seq, .. } => {
                let state = self.symbols.entry(symbol.clone()).or_default();
                let mut issue = None;

                if let (Some(seq), Some(last_seq)) = (*seq, state.last_trade_seq) {
                    if seq <= last_seq {
                        issue = Some(ContinuityIssue::TradeSeqNotIncreasing {
                            symbol: symbol.clone(),
                            seq,
                            last_seq,
                        });
                    }
                }
                if issue.is_none() {
                    if let Some(last_ts_ms) = state.last_trade_ts_ms {
                        if *ts_ms <= last_ts_ms {
                            issue = Some(ContinuityIssue::TimestampNotIncreasing {
                                symbol: symbol.clone(),
                                ts_ms: *ts_ms,
                                last_ts_ms,
                            });
                        }
                    }
                }

                if seq.is_some() {
                    state.last_trade_seq = *seq;
                }
                state.last_trade_ts_ms = Some((*ts_ms).max(state.last_trade_ts_ms.unwrap_or(i64::MIN)));
                issue
            }
            TickEvent::DepthDiff {
                symbol,
                ts_ms,
                first_update_id,
                final_update_id,
                ..
            } => {
                let state = self.symbols.entry(symbol.clone()).or_default();
                let mut issue = None;

                if let Some(expected_first) = state.last_depth_final_id.map(|id| id + 1) {
                    if *first_update_id != expected_first && *first_update_id > expected_first {
                        issue = Some(ContinuityIssue::DepthUpdateGap {
                            symbol: symbol.clone(),
                            expected_first,
                            got_first: *first_update_id,
                        });
                    }
                }
                if issue.is_none() {
                    if let Some(last_ts_ms) = state.last_depth_ts_ms {
                        if *ts_ms <= last_ts_ms {
                            issue = Some(ContinuityIssue::TimestampNotIncreasing {
                                symbol: symbol.clone(),
                                ts_ms: *ts_ms,
                                last_ts_ms,
                            });
                        }
                    }
                }

                state.last_depth_final_id = Some(*final_update_id);
                state.last_depth_ts_ms = Some(*ts_ms);
                issue
            }
            _ => None,
        }
    }
}
