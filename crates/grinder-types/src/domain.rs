//! Canonical GRINDER event/decision types.
//!
//! Every field that crosses a wire or evidence boundary is a decimal
//! string; internal decision-path math uses the scaled-integer newtypes in
//! [`crate::numeric`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// One normalized inbound market-data or account event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TickEvent {
    AggTrade {
        symbol: String,
        ts_ms: i64,
        price: String,
        qty: String,
        side: Side,
        seq: Option<u64>,
    },
    BookTicker {
        symbol: String,
        ts_ms: i64,
        bid_price: String,
        bid_qty: String,
        ask_price: String,
        ask_qty: String,
    },
    DepthDiff {
        symbol: String,
        ts_ms: i64,
        bids: Vec<(String, String)>,
        asks: Vec<(String, String)>,
        first_update_id: u64,
        final_update_id: u64,
    },
    ForceOrder {
        symbol: String,
        ts_ms: i64,
        side: Side,
        price: String,
        qty: String,
    },
    MarkPrice {
        symbol: String,
        ts_ms: i64,
        mark_price: String,
        funding_rate: String,
    },
    UserDataEvent {
        ts_ms: i64,
        payload: serde_json::Value,
    },
}

impl TickEvent {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            TickEvent::AggTrade { symbol, .. }
            | TickEvent::BookTicker { symbol, .. }
            | TickEvent::DepthDiff { symbol, .. }
            | TickEvent::ForceOrder { symbol, .. }
            | TickEvent::MarkPrice { symbol, .. } => Some(symbol),
            TickEvent::UserDataEvent { .. } => None,
        }
    }

    pub fn ts_ms(&self) -> i64 {
        match self {
            TickEvent::AggTrade { ts_ms, .. }
            | TickEvent::BookTicker { ts_ms, .. }
            | TickEvent::DepthDiff { ts_ms, .. }
            | TickEvent::ForceOrder { ts_ms, .. }
            | TickEvent::MarkPrice { ts_ms, .. }
            | TickEvent::UserDataEvent { ts_ms, .. } => *ts_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidBar {
    pub symbol: String,
    pub ts_close_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

/// L1 microstructure + volatility feature snapshot. Emitted only when at
/// least one L1 field changed since the previous snapshot for the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub symbol: String,
    pub ts_ms: i64,
    pub mid_price: String,
    pub spread_bps: i64,
    pub natr_bps: i64,
    pub trend_slope_5m_bps: i64,
    pub price_jump_bps_1m: i64,
    pub trade_count_1m: u32,
    pub volume_24h_usd: String,
    pub volume_1h_usd: String,
    pub open_interest_usd: Option<String>,
}

/// L2 order-book feature snapshot, emitted at most every `DEPTH_UPDATE_MS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2FeatureSnapshot {
    pub symbol: String,
    pub ts_ms: i64,
    pub depth_top5_usd: String,
    pub book_imbalance_bps: i64,
    pub ofi_1s: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Range,
    TrendUp,
    TrendDown,
    VolShock,
    ThinBook,
    Toxic,
    Paused,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToxicityBand {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToxicityResult {
    pub score: u8,
    pub band: ToxicityBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResetAction {
    None,
    Soft,
    Hard,
}

/// A deterministic per-tick grid plan. Exactly the fields named below —
/// no more, no fewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPlan {
    pub mode: GridPolicyKind,
    pub center_price: String,
    pub spacing_bps: i64,
    pub levels_up: u32,
    pub levels_down: u32,
    pub size_schedule: Vec<String>,
    pub skew_bps: i64,
    pub regime: Regime,
    pub width_bps: i64,
    pub reset_action: ResetAction,
    pub reason_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridPolicyKind {
    Static,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderIntent {
    IncreaseRisk,
    ReduceRisk,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    PostOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub client_order_id: String,
    pub broker_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub price: String,
    pub qty: String,
    pub r#type: OrderType,
    pub tif: TimeInForce,
    pub reduce_only: bool,
    pub level_idx: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnap {
    pub symbol: String,
    pub qty: String,
    pub avg_entry_price: String,
    pub unrealized_pnl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrderSnap {
    pub broker_order_id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub price: String,
    pub qty: String,
    pub filled_qty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub ts_ms: i64,
    pub equity: String,
    pub available_balance: String,
    pub positions: Vec<PositionSnap>,
    pub open_orders: Vec<OpenOrderSnap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FsmState {
    Init,
    Ready,
    Active,
    Throttled,
    Paused,
    Degraded,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub ts_ms: i64,
    pub from: FsmState,
    pub to: FsmState,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictedRegime {
    Low,
    Mid,
    High,
}

/// Optional external ML signal input (§6). Neutral defaults apply when
/// absent: `spacing_multiplier_x1000 = 1000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlSignalSnapshot {
    pub ts_ms: i64,
    pub symbol: String,
    pub model_version: String,
    pub model_hash: String,
    pub regime_probabilities_bps: Vec<(PredictedRegime, u16)>,
    pub predicted_regime: PredictedRegime,
    pub regime_confidence_bps: u16,
    pub spacing_multiplier_x1000: i64,
    pub top_features: Vec<(String, i64)>,
    pub inference_latency_us: u32,
    pub features_hash: String,
}

impl MlSignalSnapshot {
    pub const NEUTRAL_SPACING_MULTIPLIER_X1000: i64 = 1000;
}
