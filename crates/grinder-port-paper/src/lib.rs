//! grinder-port-paper
//!
//! Deterministic in-memory `ExchangePort`: no randomness, no timestamps
//! beyond the injected clock, `broker_order_id == client_order_id`. Used
//! for dry-run and fixture replay.

use std::collections::BTreeMap;

use grinder_port::{Ack, AmendOrder, ExchangePort, PlaceOrder, PortError};
use grinder_types::{AccountSnapshot, OpenOrderSnap, PositionSnap, Side};

#[derive(Debug, Clone)]
struct PaperOrder {
    client_order_id: String,
    symbol: String,
    side: Side,
    price_ticks: i64,
    qty_steps: i64,
    filled_steps: i64,
    cancelled: bool,
}

/// In-memory paper broker. `now_ms` is supplied by the caller on
/// construction and advanced explicitly — the adapter never reads a clock.
pub struct PaperBroker {
    orders: BTreeMap<String, PaperOrder>,
    positions: BTreeMap<String, i64>,
    now_ms: i64,
}

impl PaperBroker {
    pub fn new(now_ms: i64) -> Self {
        Self { orders: BTreeMap::new(), positions: BTreeMap::new(), now_ms }
    }

    pub fn advance_clock(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }

    /// Fully or partially fill a resting order, updating the tracked net
    /// position. No-op if the order is unknown or already terminal.
    pub fn fill(&mut self, client_order_id: &str, qty_steps: i64) -> Option<Ack> {
        let order = self.orders.get_mut(client_order_id)?;
        if order.cancelled || order.filled_steps >= order.qty_steps {
            return None;
        }
        let delta = qty_steps.min(order.qty_steps - order.filled_steps);
        order.filled_steps += delta;

        let signed = match order.side {
            Side::Buy => delta,
            Side::Sell => -delta,
        };
        *self.positions.entry(order.symbol.clone()).or_insert(0) += signed;

        Some(ack(client_order_id, self.now_ms))
    }

    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }
}

fn ack(client_order_id: &str, ts_ms: i64) -> Ack {
    Ack { client_order_id: client_order_id.to_string(), broker_order_id: client_order_id.to_string(), ts_ms }
}

impl ExchangePort for PaperBroker {
    fn place(&mut self, order: &PlaceOrder) -> Result<Ack, PortError> {
        if let Some(existing) = self.orders.get(&order.client_order_id) {
            return Ok(ack(&existing.client_order_id, self.now_ms));
        }
        self.orders.insert(
            order.client_order_id.clone(),
            PaperOrder {
                client_order_id: order.client_order_id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
                price_ticks: order.price_ticks,
                qty_steps: order.qty_steps,
                filled_steps: 0,
                cancelled: false,
            },
        );
        Ok(ack(&order.client_order_id, self.now_ms))
    }

    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, PortError> {
        let order = self.orders.get_mut(client_order_id).ok_or(PortError::UnknownClientOrderId)?;
        order.cancelled = true;
        Ok(ack(client_order_id, self.now_ms))
    }

    fn amend(&mut self, order: &AmendOrder) -> Result<Ack, PortError> {
        let existing = self.orders.get_mut(&order.client_order_id).ok_or(PortError::UnknownClientOrderId)?;
        existing.price_ticks = order.price_ticks;
        existing.qty_steps = order.qty_steps;
        Ok(ack(&order.client_order_id, self.now_ms))
    }

    fn fetch_open_orders(&mut self, symbol: &str) -> Result<Vec<OpenOrderSnap>, PortError> {
        Ok(self
            .orders
            .values()
            .filter(|o| o.symbol == symbol && !o.cancelled && o.filled_steps < o.qty_steps)
            .map(|o| OpenOrderSnap {
                broker_order_id: o.client_order_id.clone(),
                client_order_id: Some(o.client_order_id.clone()),
                symbol: o.symbol.clone(),
                side: o.side,
                price: o.price_ticks.to_string(),
                qty: o.qty_steps.to_string(),
                filled_qty: o.filled_steps.to_string(),
            })
            .collect())
    }

    fn fetch_positions(&mut self, symbol: &str) -> Result<Vec<PositionSnap>, PortError> {
        let qty = self.position(symbol);
        if qty == 0 {
            return Ok(vec![]);
        }
        Ok(vec![PositionSnap {
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            avg_entry_price: "0".to_string(),
            unrealized_pnl: "0".to_string(),
        }])
    }

    fn fetch_account_snapshot(&mut self) -> Result<AccountSnapshot, PortError> {
        let mut open_orders = Vec::new();
        for o in self.orders.values() {
            if !o.cancelled && o.filled_steps < o.qty_steps {
                open_orders.push(OpenOrderSnap {
                    broker_order_id: o.client_order_id.clone(),
                    client_order_id: Some(o.client_order_id.clone()),
                    symbol: o.symbol.clone(),
                    side: o.side,
                    price: o.price_ticks.to_string(),
                    qty: o.qty_steps.to_string(),
                    filled_qty: o.filled_steps.to_string(),
                });
            }
        }
        let positions = self
            .positions
            .iter()
            .filter(|(_, qty)| **qty != 0)
            .map(|(symbol, qty)| PositionSnap {
                symbol: symbol.clone(),
                qty: qty.to_string(),
                avg_entry_price: "0".to_string(),
                unrealized_pnl: "0".to_string(),
            })
            .collect();
        Ok(AccountSnapshot { ts_ms: self.now_ms, equity: "0".to_string(), available_balance: "0".to_string(), positions, open_orders })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grinder_types::{OrderType, TimeInForce};

    fn order(client_order_id: &str) -> PlaceOrder {
        PlaceOrder {
            client_order_id: client_order_id.to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price_ticks: 100_000,
            qty_steps: 10,
            order_type: OrderType::Limit,
            tif: TimeInForce::Gtc,
            reduce_only: false,
        }
    }

    #[test]
    fn place_is_idempotent_on_repeat_client_order_id() {
        let mut b = PaperBroker::new(0);
        let a1 = b.place(&order("c1")).unwrap();
        let a2 = b.place(&order("c1")).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(b.fetch_open_orders("BTCUSDT").unwrap().len(), 1);
    }

    #[test]
    fn broker_order_id_equals_client_order_id() {
        let mut b = PaperBroker::new(0);
        let ack = b.place(&order("c1")).unwrap();
        assert_eq!(ack.broker_order_id, "c1");
    }

    #[test]
    fn cancel_unknown_order_is_an_error() {
        let mut b = PaperBroker::new(0);
        assert_eq!(b.cancel("nope"), Err(PortError::UnknownClientOrderId));
    }

    #[test]
    fn fill_updates_position_and_open_orders() {
        let mut b = PaperBroker::new(0);
        b.place(&order("c1")).unwrap();
        b.fill("c1", 10).unwrap();
        assert_eq!(b.position("BTCUSDT"), 10);
        assert!(b.fetch_open_orders("BTCUSDT").unwrap().is_empty());
    }

    #[test]
    fn cancel_then_fill_is_a_no_op() {
        let mut b = PaperBroker::new(0);
        b.place(&order("c1")).unwrap();
        b.cancel("c1").unwrap();
        assert!(b.fill("c1", 10).is_none());
        assert_eq!(b.position("BTCUSDT"), 0);
    }

    #[test]
    fn amend_changes_resting_price_and_qty() {
        let mut b = PaperBroker::new(0);
        b.place(&order("c1")).unwrap();
        b.amend(&AmendOrder { client_order_id: "c1".to_string(), symbol: "BTCUSDT".to_string(), price_ticks: 200_000, qty_steps: 5 }).unwrap();
        let open = b.fetch_open_orders("BTCUSDT").unwrap();
        assert_eq!(open[0].price, "200000");
        assert_eq!(open[0].qty, "5");
    }
}
