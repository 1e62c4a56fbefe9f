//! Wire-level request/response types for the [`crate::ExchangePort`] trait.
//!
//! These sit one layer below `grinder_types::domain`'s decimal-string DTOs:
//! everything here is already in the scaled-integer representation the
//! router and execution engine work in.

use grinder_types::{OrderType, Side, TimeInForce};
use serde::{Deserialize, Serialize};

/// Maximum length of a client order id accepted by any adapter, matching
/// the tightest limit among the exchanges this port family targets.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price_ticks: i64,
    pub qty_steps: i64,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub price_ticks: i64,
    pub qty_steps: i64,
}

/// Acknowledgement returned for place/cancel/amend. A repeated submission
/// of the same `client_order_id` returns the original ack unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub client_order_id: String,
    pub broker_order_id: String,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// `client_order_id` exceeds [`MAX_CLIENT_ORDER_ID_LEN`].
    ClientOrderIdTooLong,
    SymbolNotWhitelisted,
    MainnetNotAllowed,
    MaxOrdersPerRunExceeded,
    MaxNotionalPerOrderExceeded,
    ConstraintViolation,
    /// Internal client id has no known exchange order id; the op (cancel
    /// or amend) was never sent.
    UnknownClientOrderId,
    CircuitOpen,
    Timeout,
    Transport,
}

impl std::fmt::Display for PortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            PortError::ClientOrderIdTooLong => "CLIENT_ORDER_ID_TOO_LONG",
            PortError::SymbolNotWhitelisted => "SYMBOL_NOT_WHITELISTED",
            PortError::MainnetNotAllowed => "MAINNET_NOT_ALLOWED",
            PortError::MaxOrdersPerRunExceeded => "MAX_ORDERS_PER_RUN_EXCEEDED",
            PortError::MaxNotionalPerOrderExceeded => "MAX_NOTIONAL_PER_ORDER_EXCEEDED",
            PortError::ConstraintViolation => "CONSTRAINT_VIOLATION",
            PortError::UnknownClientOrderId => "UNKNOWN_CLIENT_ORDER_ID",
            PortError::CircuitOpen => "PORT_CIRCUIT_OPEN",
            PortError::Timeout => "PORT_TIMEOUT",
            PortError::Transport => "PORT_TRANSPORT_ERROR",
        };
        write!(f, "{code}")
    }
}

impl std::error::Error for PortError {}

pub fn validate_client_order_id(id: &str) -> Result<(), PortError> {
    if id.len() > MAX_CLIENT_ORDER_ID_LEN {
        return Err(PortError::ClientOrderIdTooLong);
    }
    Ok(())
}
