//! Round-trip matcher.
//!
//! Detects when a fill closes a symbol's position back to flat and reports
//! the realized PnL of that closed leg — the win/loss signal that feeds
//! `grinder-risk`'s consecutive-loss counter, which needs a per-round-trip
//! result rather than the ledger's cumulative realized PnL.

use crate::accounting::apply_fill;
use crate::types::{Fill, PortfolioState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripOutcome {
    pub symbol: String,
    pub realized_pnl_delta_micros: i64,
    pub was_loss: bool,
}

/// Apply `fill` to `pf` and report a [`RoundTripOutcome`] if it closed the
/// symbol's position back to flat.
///
/// A fill that flips a position through flat into the opposite side closes
/// the prior leg but is not reported here, since the realized-PnL delta at
/// that instant mixes the closed leg with the newly opened one.
/// TODO: split the flip case into its own outcome once grid sizing allows a
/// single fill to exceed the resting level size.
pub fn apply_fill_tracked(pf: &mut PortfolioState, fill: &Fill) -> Option<RoundTripOutcome> {
    let was_open = pf.positions.get(&fill.symbol).map(|p| !p.is_flat()).unwrap_or(false);
    let pnl_before = pf.realized_pnl_micros;

    apply_fill(pf, fill);

    round_trip_outcome(pf, fill, was_open, pnl_before)
}

/// Shared bookkeeping step used by both [`apply_fill_tracked`] and
/// `Ledger::append_fill_tracked`, which must enforce its own invariants
/// before calling `apply_fill` itself.
pub(crate) fn round_trip_outcome(
    pf: &PortfolioState,
    fill: &Fill,
    was_open: bool,
    pnl_before: i64,
) -> Option<RoundTripOutcome> {
    let is_flat_after = !pf.positions.contains_key(&fill.symbol);
    if !(was_open && is_flat_after) {
        return None;
    }

    let delta = pf.realized_pnl_micros - pnl_before;
    Some(RoundTripOutcome {
        symbol: fill.symbol.clone(),
        realized_pnl_delta_micros: delta,
        was_loss: delta < 0,
    })
}
