//! Wire-format message shapes for the inbound perpetual-futures feed.
//!
//! These mirror the combined-stream JSON payloads published by a USDS-M
//! perpetual futures venue: one object per message, tagged by an `"e"`
//! event-type field. Decimal fields stay as strings end to end; nothing in
//! this module parses a price into a number.

use serde::Deserialize;

/// One inbound message from the combined websocket stream, tagged by `"e"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "e")]
pub enum RawMessage {
    #[serde(rename = "aggTrade")]
    AggTrade(RawAggTrade),
    #[serde(rename = "bookTicker")]
    BookTicker(RawBookTicker),
    #[serde(rename = "depthUpdate")]
    DepthUpdate(RawDepthUpdate),
    #[serde(rename = "forceOrder")]
    ForceOrder(RawForceOrderWrapper),
    #[serde(rename = "markPriceUpdate")]
    MarkPriceUpdate(RawMarkPriceUpdate),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAggTrade {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "T")]
    pub trade_ts_ms: i64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub qty: String,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
    #[serde(rename = "a")]
    pub agg_trade_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBookTicker {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "T")]
    pub transaction_ts_ms: i64,
    #[serde(rename = "b")]
    pub bid_price: String,
    #[serde(rename = "B")]
    pub bid_qty: String,
    #[serde(rename = "a")]
    pub ask_price: String,
    #[serde(rename = "A")]
    pub ask_qty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDepthUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "T")]
    pub transaction_ts_ms: i64,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    pub asks: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawForceOrderWrapper {
    #[serde(rename = "T")]
    pub event_ts_ms: i64,
    #[serde(rename = "o")]
    pub order: RawForceOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawForceOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub qty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMarkPriceUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "E")]
    pub event_ts_ms: i64,
    #[serde(rename = "p")]
    pub mark_price: String,
    #[serde(rename = "r")]
    pub funding_rate: String,
}

/// A full depth-book snapshot, fetched once over REST before applying
/// incremental `depthUpdate` diffs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agg_trade_tag_dispatches_correctly() {
        let json = r#"{"e":"aggTrade","s":"BTCUSDT","T":1700000000000,"p":"65000.10","q":"0.005","m":false,"a":42}"#;
        let msg: RawMessage = serde_json::from_str(json).unwrap();
        match msg {
            RawMessage::AggTrade(t) => {
                assert_eq!(t.symbol, "BTCUSDT");
                assert_eq!(t.agg_trade_id, 42);
            }
            other => panic!("expected AggTrade, got {other:?}"),
        }
    }

    #[test]
    fn depth_update_preserves_raw_level_order() {
        let json = r#"{"e":"depthUpdate","s":"ETHUSDT","T":1,"U":10,"u":12,
            "b":[["3000.5","1.0"],["3001.0","2.0"]],
            "a":[["3002.0","1.5"]]}"#;
        let msg: RawMessage = serde_json::from_str(json).unwrap();
        match msg {
            RawMessage::DepthUpdate(d) => {
                assert_eq!(d.first_update_id, 10);
                assert_eq!(d.final_update_id, 12);
                assert_eq!(d.bids.len(), 2);
                assert_eq!(d.asks.len(), 1);
            }
            other => panic!("expected DepthUpdate, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let json = r#"{"e":"kline","s":"BTCUSDT"}"#;
        let result: Result<RawMessage, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
