//! Raw wire message → [`TickEvent`] normalization.
//!
//! Decimal fields are validated (never parsed into a float) and re-rendered
//! in canonical form via [`grinder_types::numeric::parse_decimal`] /
//! [`grinder_types::numeric::render_decimal`], so two venues that format the
//! same price differently (`"65000"` vs `"65000.000000"`) produce identical
//! [`TickEvent`] output. Depth levels are sorted bids-descending,
//! asks-ascending before emission.

use std::fmt;

use grinder_types::numeric::{parse_decimal, render_decimal, DecimalParseError};
use grinder_types::{Side, TickEvent};

use crate::raw::RawMessage;

/// Decimal fields on the wire carry up to this many fractional digits.
/// Perpetual futures venues quote prices and quantities at much coarser
/// precision than this; 8 digits is a safe upper bound that never truncates
/// a real tick/lot size.
const WIRE_SCALE_DIGITS: u32 = 8;

#[derive(Debug, PartialEq, Eq)]
pub enum NormalizeError {
    BadDecimal { field: &'static str, source: DecimalParseError },
    UnknownSide(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::BadDecimal { field, source } => {
                write!(f, "field {field}: {source}")
            }
            NormalizeError::UnknownSide(s) => write!(f, "unknown side '{s}'"),
        }
    }
}

impl std::error::Error for NormalizeError {}

fn canon(field: &'static str, raw: &str) -> Result<String, NormalizeError> {
    let scaled = parse_decimal(raw, WIRE_SCALE_DIGITS)
        .map_err(|source| NormalizeError::BadDecimal { field, source })?;
    Ok(render_decimal(scaled, WIRE_SCALE_DIGITS))
}

fn canon_level(level: &(String, String)) -> Result<(String, String), NormalizeError> {
    Ok((canon("level.price", &level.0)?, canon("level.qty", &level.1)?))
}

fn parse_side(s: &str) -> Result<Side, NormalizeError> {
    match s.to_ascii_uppercase().as_str() {
        "BUY" | "B" => Ok(Side::Buy),
        "SELL" | "S" => Ok(Side::Sell),
        other => Err(NormalizeError::UnknownSide(other.to_string())),
    }
}

/// Sort bids descending by price, asks ascending by price. Ties keep their
/// relative arrival order (stable sort).
fn sort_depth(bids: &mut [(String, String)], asks: &mut [(String, String)]) {
    bids.sort_by(|a, b| price_of(b).cmp(&price_of(a)));
    asks.sort_by(|a, b| price_of(a).cmp(&price_of(b)));
}

/// Canonical decimal strings compare correctly as text once sign, integer
/// width, and fractional width are fixed by [`render_decimal`]; recover the
/// scaled integer for the rare case where two venues pad differently.
fn price_of(level: &(String, String)) -> i64 {
    parse_decimal(&level.0, WIRE_SCALE_DIGITS).unwrap_or(i64::MIN)
}

/// Normalize one raw wire message into a [`TickEvent`].
pub fn normalize(raw: &RawMessage) -> Result<TickEvent, NormalizeError> {
    match raw {
        RawMessage::AggTrade(t) => Ok(TickEvent::AggTrade {
            symbol: t.symbol.clone(),
            ts_ms: t.trade_ts_ms,
            price: canon("price", &t.price)?,
            qty: canon("qty", &t.qty)?,
            side: if t.is_buyer_maker { Side::Sell } else { Side::Buy },
            seq: Some(t.agg_trade_id),
        }),
        RawMessage::BookTicker(b) => Ok(TickEvent::BookTicker {
            symbol: b.symbol.clone(),
            ts_ms: b.transaction_ts_ms,
            bid_price: canon("bid_price", &b.bid_price)?,
            bid_qty: canon("bid_qty", &b.bid_qty)?,
            ask_price: canon("ask_price", &b.ask_price)?,
            ask_qty: canon("ask_qty", &b.ask_qty)?,
        }),
        RawMessage::DepthUpdate(d) => {
            let mut bids = d
                .bids
                .iter()
                .map(canon_level)
                .collect::<Result<Vec<_>, _>>()?;
            let mut asks = d
                .asks
                .iter()
                .map(canon_level)
                .collect::<Result<Vec<_>, _>>()?;
            sort_depth(&mut bids, &mut asks);
            Ok(TickEvent::DepthDiff {
                symbol: d.symbol.clone(),
                ts_ms: d.transaction_ts_ms,
                bids,
                asks,
                first_update_id: d.first_update_id,
                final_update_id: d.final_update_id,
            })
        }
        RawMessage::ForceOrder(w) => Ok(TickEvent::ForceOrder {
            symbol: w.order.symbol.clone(),
            ts_ms: w.event_ts_ms,
            side: parse_side(&w.order.side)?,
            price: canon("price", &w.order.price)?,
            qty: canon("qty", &w.order.qty)?,
        }),
        RawMessage::MarkPriceUpdate(m) => Ok(TickEvent::MarkPrice {
            symbol: m.symbol.clone(),
            ts_ms: m.event_ts_ms,
            mark_price: canon("mark_price", &m.mark_price)?,
            funding_rate: canon("funding_rate", &m.funding_rate)?,
        }),
    }
}

/// Normalize a depth-book REST snapshot's levels into canonical, sorted
/// decimal pairs for the book initializer (not a [`TickEvent`] — snapshots
/// seed book state, they don't cross the feed-adapter boundary as diffs).
pub fn normalize_snapshot_levels(
    bids: &[(String, String)],
    asks: &[(String, String)],
) -> Result<(Vec<(String, String)>, Vec<(String, String)>), NormalizeError> {
    let mut bids = bids.iter().map(canon_level).collect::<Result<Vec<_>, _>>()?;
    let mut asks = asks.iter().map(canon_level).collect::<Result<Vec<_>, _>>()?;
    sort_depth(&mut bids, &mut asks);
    Ok((bids, asks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawAggTrade, RawBookTicker, RawDepthUpdate, RawForceOrder, RawForceOrderWrapper, RawMarkPriceUpdate};

    #[test]
    fn agg_trade_buyer_maker_true_is_sell_taker_side() {
        let raw = RawMessage::AggTrade(RawAggTrade {
            symbol: "BTCUSDT".into(),
            trade_ts_ms: 1,
            price: "65000.1".into(),
            qty: "0.01".into(),
            is_buyer_maker: true,
            agg_trade_id: 7,
        });
        let ev = normalize(&raw).unwrap();
        match ev {
            TickEvent::AggTrade { side, seq, .. } => {
                assert_eq!(side, Side::Sell);
                assert_eq!(seq, Some(7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn price_canonicalization_pads_to_fixed_width() {
        let raw = RawMessage::BookTicker(RawBookTicker {
            symbol: "ETHUSDT".into(),
            transaction_ts_ms: 1,
            bid_price: "3000".into(),
            bid_qty: "1".into(),
            ask_price: "3000.5".into(),
            ask_qty: "2".into(),
        });
        let ev = normalize(&raw).unwrap();
        match ev {
            TickEvent::BookTicker { bid_price, ask_price, .. } => {
                assert_eq!(bid_price, "3000.00000000");
                assert_eq!(ask_price, "3000.50000000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn depth_update_sorts_bids_desc_asks_asc() {
        let raw = RawMessage::DepthUpdate(RawDepthUpdate {
            symbol: "BTCUSDT".into(),
            transaction_ts_ms: 1,
            first_update_id: 10,
            final_update_id: 11,
            bids: vec![
                ("100.0".into(), "1".into()),
                ("102.0".into(), "1".into()),
                ("101.0".into(), "1".into()),
            ],
            asks: vec![
                ("105.0".into(), "1".into()),
                ("103.0".into(), "1".into()),
                ("104.0".into(), "1".into()),
            ],
        });
        let ev = normalize(&raw).unwrap();
        match ev {
            TickEvent::DepthDiff { bids, asks, .. } => {
                let bid_prices: Vec<&str> = bids.iter().map(|(p, _)| p.as_str()).collect();
                let ask_prices: Vec<&str> = asks.iter().map(|(p, _)| p.as_str()).collect();
                assert_eq!(bid_prices, vec!["102.00000000", "101.00000000", "100.00000000"]);
                assert_eq!(ask_prices, vec!["103.00000000", "104.00000000", "105.00000000"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn force_order_side_parses_case_insensitively() {
        let raw = RawMessage::ForceOrder(RawForceOrderWrapper {
            event_ts_ms: 1,
            order: RawForceOrder {
                symbol: "BTCUSDT".into(),
                side: "sell".into(),
                price: "64000".into(),
                qty: "0.5".into(),
            },
        });
        let ev = normalize(&raw).unwrap();
        assert!(matches!(ev, TickEvent::ForceOrder { side: Side::Sell, .. }));
    }

    #[test]
    fn mark_price_roundtrips_funding_rate() {
        let raw = RawMessage::MarkPriceUpdate(RawMarkPriceUpdate {
            symbol: "BTCUSDT".into(),
            event_ts_ms: 1,
            mark_price: "65010.25".into(),
            funding_rate: "0.0001".into(),
        });
        let ev = normalize(&raw).unwrap();
        match ev {
            TickEvent::MarkPrice { funding_rate, .. } => {
                assert_eq!(funding_rate, "0.00010000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_decimal_is_rejected() {
        let raw = RawMessage::AggTrade(RawAggTrade {
            symbol: "BTCUSDT".into(),
            trade_ts_ms: 1,
            price: "65k".into(),
            qty: "0.01".into(),
            is_buyer_maker: false,
            agg_trade_id: 1,
        });
        assert!(normalize(&raw).is_err());
    }

    #[test]
    fn unknown_side_string_is_rejected() {
        let raw = RawMessage::ForceOrder(RawForceOrderWrapper {
            event_ts_ms: 1,
            order: RawForceOrder {
                symbol: "BTCUSDT".into(),
                side: "LONG".into(),
                price: "1".into(),
                qty: "1".into(),
            },
        });
        assert!(matches!(normalize(&raw), Err(NormalizeError::UnknownSide(_))));
    }
}
