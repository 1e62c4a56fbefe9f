//! Feature engine (C2) — per-symbol rolling windows, ATR/NATR, L1/L2
//! microstructure snapshot derivation.
//!
//! Pure function of the ordered tick prefix for a symbol: no clock reads,
//! no lookahead. Time comes from each event's `ts_ms` only.

use std::collections::VecDeque;

use grinder_types::{FeatureSnapshot, L2FeatureSnapshot, MidBar, Side, TickEvent};

const ATR_PERIOD: usize = 14;
const DEPTH_UPDATE_MS: i64 = 250;
const TRADE_WINDOW_1M_MS: i64 = 60_000;
const TRADE_WINDOW_5M_MS: i64 = 300_000;
const TRADE_WINDOW_1H_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy)]
struct TradeSample {
    ts_ms: i64,
    price_scaled: i64,
    qty_scaled: i64,
}

/// Per-symbol rolling state. Owned by exactly one worker (single-writer).
#[derive(Debug, Clone)]
pub struct SymbolFeatureState {
    symbol: String,
    bars: VecDeque<MidBar>,
    true_ranges: VecDeque<f64>,
    prev_close: Option<f64>,
    atr: f64,
    trades_1h: VecDeque<TradeSample>,
    last_l1: Option<L1Fields>,
    last_bid_scaled: Option<i64>,
    last_ask_scaled: Option<i64>,
    last_l2_emit_ms: i64,
    last_bar_key: Option<i64>,
    last_trade_seq: Option<u64>,
    feature_inconsistent_total: u64,
    feed_sequence_gap_total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct L1Fields {
    mid_price_scaled: i64,
    spread_bps: i64,
    natr_bps: i64,
    trend_slope_5m_bps: i64,
    price_jump_bps_1m: i64,
}

impl SymbolFeatureState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: VecDeque::with_capacity(ATR_PERIOD + 2),
            true_ranges: VecDeque::with_capacity(ATR_PERIOD),
            prev_close: None,
            atr: 0.0,
            trades_1h: VecDeque::new(),
            last_l1: None,
            last_bid_scaled: None,
            last_ask_scaled: None,
            last_l2_emit_ms: i64::MIN,
            last_bar_key: None,
            last_trade_seq: None,
            feature_inconsistent_total: 0,
            feed_sequence_gap_total: 0,
        }
    }

    pub fn feature_inconsistent_total(&self) -> u64 {
        self.feature_inconsistent_total
    }

    pub fn feed_sequence_gap_total(&self) -> u64 {
        self.feed_sequence_gap_total
    }

    /// Feed one completed bar into the rolling ATR window. Returns the
    /// current `natr_bps` (0 during warmup, i.e. before `period + 1` bars).
    pub fn on_bar(&mut self, bar: MidBar) -> i64 {
        let bar_key = bar.ts_close_ms;
        if let Some(last) = self.last_bar_key {
            if bar_key <= last {
                self.feed_sequence_gap_total += 1;
                return self.current_natr_bps();
            }
        }
        self.last_bar_key = Some(bar_key);

        let high: f64 = bar.high.parse().unwrap_or(0.0);
        let low: f64 = bar.low.parse().unwrap_or(0.0);
        let close: f64 = bar.close.parse().unwrap_or(0.0);

        if close <= 0.0 {
            self.feature_inconsistent_total += 1;
            self.bars.push_back(bar);
            return 0;
        }

        let tr = match self.prev_close {
            None => high - low,
            Some(prev) => {
                let a = high - low;
                let b = (high - prev).abs();
                let c = (low - prev).abs();
                a.max(b).max(c)
            }
        };
        self.true_ranges.push_back(tr);
        if self.true_ranges.len() > ATR_PERIOD {
            self.true_ranges.pop_front();
        }
        self.prev_close = Some(close);
        self.bars.push_back(bar);
        if self.bars.len() > ATR_PERIOD + 2 {
            self.bars.pop_front();
        }

        if self.true_ranges.len() < ATR_PERIOD {
            return 0;
        }

        // Canonical incremental SMA-based ATR(14).
        self.atr = self.true_ranges.iter().sum::<f64>() / ATR_PERIOD as f64;
        self.current_natr_bps()
    }

    fn current_natr_bps(&self) -> i64 {
        let close = match self.prev_close {
            Some(c) if c > 0.0 => c,
            _ => return 0,
        };
        if self.true_ranges.len() < ATR_PERIOD {
            return 0;
        }
        natr_bps(self.atr, close)
    }

    /// Feed an aggregate trade. Returns `Some(snapshot)` iff an L1 field
    /// changed relative to the previous snapshot.
    pub fn on_agg_trade(
        &mut self,
        ts_ms: i64,
        price: &str,
        qty: &str,
        _side: Side,
        seq: Option<u64>,
    ) -> Option<FeatureSnapshot> {
        if let (Some(last_seq), Some(seq)) = (self.last_trade_seq, seq) {
            if seq <= last_seq {
                self.feed_sequence_gap_total += 1;
                return None;
            }
        }
        if let Some(seq) = seq {
            self.last_trade_seq = Some(seq);
        }

        let price_f: f64 = price.parse().unwrap_or(0.0);
        let qty_f: f64 = qty.parse().unwrap_or(0.0);
        if price_f <= 0.0 {
            self.feature_inconsistent_total += 1;
            return None;
        }

        self.trades_1h.push_back(TradeSample {
            ts_ms,
            price_scaled: (price_f * 1_000_000.0).round() as i64,
            qty_scaled: (qty_f * 1_000_000.0).round() as i64,
        });
        while let Some(front) = self.trades_1h.front() {
            if ts_ms - front.ts_ms > TRADE_WINDOW_1H_MS {
                self.trades_1h.pop_front();
            } else {
                break;
            }
        }

        self.emit_if_changed(ts_ms)
    }

    /// Feed a book-ticker update (best bid/ask). Returns `Some(snapshot)`
    /// iff an L1 field changed.
    pub fn on_book_ticker(
        &mut self,
        ts_ms: i64,
        bid_price: &str,
        ask_price: &str,
    ) -> Option<FeatureSnapshot> {
        let bid: f64 = bid_price.parse().unwrap_or(0.0);
        let ask: f64 = ask_price.parse().unwrap_or(0.0);
        if ask < bid || bid <= 0.0 || ask <= 0.0 {
            self.feature_inconsistent_total += 1;
            return None;
        }
        self.last_bid_scaled = Some((bid * 1_000_000.0).round() as i64);
        self.last_ask_scaled = Some((ask * 1_000_000.0).round() as i64);
        self.emit_if_changed(ts_ms)
    }

    fn emit_if_changed(&mut self, ts_ms: i64) -> Option<FeatureSnapshot> {
        let mid_price = self.current_mid_price()?;
        let spread_bps = self.current_spread_bps()?;
        let natr_bps = self.current_natr_bps();
        let trend_slope_5m_bps = self.trend_slope_bps(TRADE_WINDOW_5M_MS, ts_ms);
        let price_jump_bps_1m = self.price_jump_bps(TRADE_WINDOW_1M_MS, ts_ms);

        let fields = L1Fields {
            mid_price_scaled: (mid_price * 1_000_000.0).round() as i64,
            spread_bps,
            natr_bps,
            trend_slope_5m_bps,
            price_jump_bps_1m,
        };

        if self.last_l1 == Some(fields) {
            return None;
        }
        self.last_l1 = Some(fields);

        let (volume_24h, volume_1h) = self.volume_windows(ts_ms);
        let trade_count_1m = self
            .trades_1h
            .iter()
            .rev()
            .take_while(|t| ts_ms - t.ts_ms <= TRADE_WINDOW_1M_MS)
            .count() as u32;

        Some(FeatureSnapshot {
            symbol: self.symbol.clone(),
            ts_ms,
            mid_price: format!("{mid_price:.8}"),
            spread_bps,
            natr_bps,
            trend_slope_5m_bps,
            price_jump_bps_1m,
            trade_count_1m,
            volume_24h_usd: format!("{volume_24h:.2}"),
            volume_1h_usd: format!("{volume_1h:.2}"),
            open_interest_usd: None,
        })
    }

    fn current_mid_price(&self) -> Option<f64> {
        self.trades_1h.back().map(|t| t.price_scaled as f64 / 1_000_000.0)
    }

    fn current_spread_bps(&self) -> Option<i64> {
        // A pure trade feed (no book-ticker observed yet) has no bid/ask to
        // derive a spread from; 0 is the neutral value, not a synthetic one.
        match (self.last_bid_scaled, self.last_ask_scaled) {
            (Some(bid), Some(ask)) if bid > 0 && ask >= bid => {
                let mid = (bid + ask) / 2;
                if mid <= 0 {
                    Some(0)
                } else {
                    Some((ask - bid) * 10_000 / mid)
                }
            }
            _ => Some(0),
        }
    }

    fn trend_slope_bps(&self, window_ms: i64, now_ms: i64) -> i64 {
        let in_window: Vec<&TradeSample> = self
            .trades_1h
            .iter()
            .filter(|t| now_ms - t.ts_ms <= window_ms)
            .collect();
        match (in_window.first(), in_window.last()) {
            (Some(first), Some(last)) if first.price_scaled > 0 => {
                ((last.price_scaled - first.price_scaled) * 10_000) / first.price_scaled
            }
            _ => 0,
        }
    }

    fn price_jump_bps(&self, window_ms: i64, now_ms: i64) -> i64 {
        self.trend_slope_bps(window_ms, now_ms)
    }

    fn volume_windows(&self, now_ms: i64) -> (f64, f64) {
        let mut v24 = 0.0;
        let mut v1h = 0.0;
        for t in &self.trades_1h {
            let notional = (t.price_scaled as f64 / 1_000_000.0) * (t.qty_scaled as f64 / 1_000_000.0);
            if now_ms - t.ts_ms <= TRADE_WINDOW_1H_MS {
                v1h += notional;
                v24 += notional;
            }
        }
        (v24, v1h)
    }

    /// L2 snapshot, throttled to at most once per `DEPTH_UPDATE_MS`.
    pub fn on_depth(
        &mut self,
        ts_ms: i64,
        bids: &[(String, String)],
        asks: &[(String, String)],
    ) -> Option<L2FeatureSnapshot> {
        if ts_ms - self.last_l2_emit_ms < DEPTH_UPDATE_MS {
            return None;
        }
        self.last_l2_emit_ms = ts_ms;

        let depth_top5_usd: f64 = bids
            .iter()
            .take(5)
            .chain(asks.iter().take(5))
            .filter_map(|(p, q)| {
                let p: f64 = p.parse().ok()?;
                let q: f64 = q.parse().ok()?;
                Some(p * q)
            })
            .sum();

        let bid_vol: f64 = bids.iter().take(5).filter_map(|(_, q)| q.parse().ok()).sum();
        let ask_vol: f64 = asks.iter().take(5).filter_map(|(_, q)| q.parse().ok()).sum();
        let total = bid_vol + ask_vol;
        let book_imbalance_bps = if total > 0.0 {
            (((bid_vol - ask_vol) / total) * 10_000.0).round() as i64
        } else {
            0
        };

        Some(L2FeatureSnapshot {
            symbol: self.symbol.clone(),
            ts_ms,
            depth_top5_usd: format!("{depth_top5_usd:.2}"),
            book_imbalance_bps,
            ofi_1s: 0,
        })
    }
}

/// Frozen encoding (SSOT): `natr_bps = round((ATR/close) * 10000)`.
pub fn natr_bps(atr: f64, close: f64) -> i64 {
    if close <= 0.0 {
        return 0;
    }
    ((atr / close) * 10_000.0).round() as i64
}

/// Drive a rolling feature state from a raw [`TickEvent`]. Returns
/// `(l1, l2)` snapshots, either of which may be absent for a given event.
pub fn ingest(
    state: &mut SymbolFeatureState,
    event: &TickEvent,
) -> (Option<FeatureSnapshot>, Option<L2FeatureSnapshot>) {
    match event {
        TickEvent::AggTrade {
            ts_ms,
            price,
            qty,
            side,
            seq,
            ..
        } => (state.on_agg_trade(*ts_ms, price, qty, *side, *seq), None),
        TickEvent::BookTicker {
            ts_ms,
            bid_price,
            ask_price,
            ..
        } => (state.on_book_ticker(*ts_ms, bid_price, ask_price), None),
        TickEvent::DepthDiff { ts_ms, bids, asks, .. } => (None, state.on_depth(*ts_ms, bids, asks)),
        TickEvent::ForceOrder { .. } | TickEvent::MarkPrice { .. } | TickEvent::UserDataEvent { .. } => (None, None),
    }
}
