//! grinder-port (C12)
//!
//! The `ExchangePort` trait is the only way an order reaches the outside
//! world. Every implementation — live (`grinder-port-futures`) or paper
//! (`grinder-port-paper`) — shares one contract: idempotent placement,
//! bounded per-op deadlines with jittered-backoff retry, a circuit breaker
//! that bypasses the wire under sustained errors, and a dry-run mode that
//! performs zero IO.
//!
//! This crate only defines the trait, its wire types, and the pure
//! pre-check/backoff/circuit-breaker building blocks every adapter shares.
//! It has no IO of its own.

mod backoff;
mod circuit_breaker;
mod precheck;
mod types;

pub use backoff::backoff_delay_ms;
pub use circuit_breaker::CircuitBreaker;
pub use precheck::{pre_check, PortConfig, PreCheckRequest};
pub use types::{validate_client_order_id, Ack, AmendOrder, PlaceOrder, PortError, MAX_CLIENT_ORDER_ID_LEN};

use grinder_types::{AccountSnapshot, OpenOrderSnap, PositionSnap};

/// The only way an order reaches an exchange (or a paper fill engine).
///
/// Implementations are free to be blocking or to wrap async calls with
/// `block_in_place`; callers drive the engine serially per symbol, so the
/// trait itself stays synchronous.
pub trait ExchangePort {
    fn place(&mut self, order: &PlaceOrder) -> Result<Ack, PortError>;
    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, PortError>;
    fn amend(&mut self, order: &AmendOrder) -> Result<Ack, PortError>;
    fn fetch_open_orders(&mut self, symbol: &str) -> Result<Vec<OpenOrderSnap>, PortError>;
    fn fetch_positions(&mut self, symbol: &str) -> Result<Vec<PositionSnap>, PortError>;
    fn fetch_account_snapshot(&mut self) -> Result<AccountSnapshot, PortError>;
}
