//! Port-level safety pre-checks, run before any adapter touches the wire.
//!
//! Same first-match-blocks discipline as `grinder-safety`'s gate chain, but
//! over a different set of concerns: these are properties of the *order*
//! and the *run*, not of portfolio/FSM state.

use std::collections::HashSet;

use grinder_router::{check_constraints, DesiredLevel, SymbolConstraints};
use grinder_types::Side;
use serde::{Deserialize, Serialize};

use crate::types::{validate_client_order_id, PortError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub symbol_whitelist: HashSet<String>,
    pub allow_mainnet_trade: bool,
    pub max_notional_per_order_x1000: i64,
    pub max_orders_per_run: u32,
    pub http_deadline_place_ms: u64,
    pub http_deadline_cancel_ms: u64,
    pub http_deadline_amend_ms: u64,
    pub http_deadline_fetch_ms: u64,
    pub http_max_attempts_place: u32,
    pub http_max_attempts_cancel: u32,
    pub http_max_attempts_amend: u32,
    pub http_max_attempts_fetch: u32,
    pub circuit_breaker_window_ms: i64,
    pub circuit_breaker_error_rate_bps: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            symbol_whitelist: HashSet::new(),
            allow_mainnet_trade: false,
            max_notional_per_order_x1000: i64::MAX,
            max_orders_per_run: u32::MAX,
            http_deadline_place_ms: 2_000,
            http_deadline_cancel_ms: 2_000,
            http_deadline_amend_ms: 2_000,
            http_deadline_fetch_ms: 3_000,
            http_max_attempts_place: 3,
            http_max_attempts_cancel: 3,
            http_max_attempts_amend: 3,
            http_max_attempts_fetch: 3,
            circuit_breaker_window_ms: 60_000,
            circuit_breaker_error_rate_bps: 5_000,
        }
    }
}

pub struct PreCheckRequest<'a> {
    pub client_order_id: &'a str,
    pub symbol: &'a str,
    pub side: Side,
    pub price_ticks: i64,
    pub qty_steps: i64,
    pub constraints: &'a SymbolConstraints,
    pub orders_placed_this_run: u32,
    pub is_mainnet: bool,
}

/// First-match gate chain run before any place/amend is sent to the wire.
pub fn pre_check(req: &PreCheckRequest, cfg: &PortConfig) -> Result<(), PortError> {
    validate_client_order_id(req.client_order_id)?;

    if !cfg.symbol_whitelist.contains(req.symbol) {
        return Err(PortError::SymbolNotWhitelisted);
    }
    if req.is_mainnet && !cfg.allow_mainnet_trade {
        return Err(PortError::MainnetNotAllowed);
    }
    if req.orders_placed_this_run >= cfg.max_orders_per_run {
        return Err(PortError::MaxOrdersPerRunExceeded);
    }

    let desired = DesiredLevel { price_ticks: req.price_ticks, qty_steps: req.qty_steps, side: req.side };
    if !check_constraints(&desired, req.constraints) {
        return Err(PortError::ConstraintViolation);
    }

    let notional_x1000 = req.qty_steps.saturating_mul(req.price_ticks);
    if notional_x1000 > cfg.max_notional_per_order_x1000 {
        return Err(PortError::MaxNotionalPerOrderExceeded);
    }

    Ok(())
}
