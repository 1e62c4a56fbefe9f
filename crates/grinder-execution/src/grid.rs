//! Expands a [`GridPlan`] into concrete per-level price/qty targets.
//!
//! Pure function of `(plan, constraints, scale, position_qty_signed)` — no
//! IO, no clock reads, no state. `level_idx` is negative below the center
//! price (buy levels) and positive above it (sell levels); `0` is never a
//! level (the center itself is never quoted).

use grinder_router::SymbolConstraints;
use grinder_types::{numeric::parse_decimal, DecimalParseError, GridPlan, OrderIntent, Side};

#[derive(Debug, Clone, Copy)]
pub struct SymbolScale {
    pub price_scale_digits: u32,
    pub qty_scale_digits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTarget {
    pub level_idx: i32,
    pub side: Side,
    pub price_ticks: i64,
    pub qty_steps: i64,
    pub intent: OrderIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridExpandError {
    BadDecimal,
}

impl From<DecimalParseError> for GridExpandError {
    fn from(_: DecimalParseError) -> Self {
        GridExpandError::BadDecimal
    }
}

fn round_to_tick(raw_ticks: i64, tick_size_ticks: i64) -> i64 {
    if tick_size_ticks <= 0 {
        return raw_ticks;
    }
    let half = tick_size_ticks / 2;
    let rounded = (raw_ticks + half).div_euclid(tick_size_ticks) * tick_size_ticks;
    rounded
}

fn floor_to_step(raw_steps: i64, step_size_steps: i64) -> i64 {
    if step_size_steps <= 0 {
        return raw_steps;
    }
    (raw_steps / step_size_steps) * step_size_steps
}

fn order_intent_for(side: Side, position_qty_signed: i64) -> OrderIntent {
    match side {
        Side::Buy => {
            if position_qty_signed < 0 {
                OrderIntent::ReduceRisk
            } else {
                OrderIntent::IncreaseRisk
            }
        }
        Side::Sell => {
            if position_qty_signed > 0 {
                OrderIntent::ReduceRisk
            } else {
                OrderIntent::IncreaseRisk
            }
        }
    }
}

/// Expand `plan` into one [`LevelTarget`] per grid level. Level indices run
/// `-levels_down..=-1` (buy, below center) and `1..=levels_up` (sell, above
/// center); `size_schedule` is indexed by distance from the center (index 0
/// = innermost level on either side), falling back to its last entry if the
/// schedule is shorter than the requested level count.
pub fn expand_grid(
    plan: &GridPlan,
    constraints: &SymbolConstraints,
    scale: &SymbolScale,
    position_qty_signed: i64,
) -> Result<Vec<LevelTarget>, GridExpandError> {
    let center_ticks = parse_decimal(&plan.center_price, scale.price_scale_digits)?;

    let qty_at = |distance: usize| -> Result<i64, GridExpandError> {
        let s = plan
            .size_schedule
            .get(distance)
            .or_else(|| plan.size_schedule.last())
            .ok_or(GridExpandError::BadDecimal)?;
        let raw = parse_decimal(s, scale.qty_scale_digits)?;
        Ok(floor_to_step(raw, constraints.step_size_steps))
    };

    let price_at = |level_idx: i32| -> i64 {
        let offset_bps = (level_idx as i64) * plan.spacing_bps + plan.skew_bps;
        let raw = center_ticks + (center_ticks * offset_bps) / 10_000;
        round_to_tick(raw, constraints.tick_size_ticks)
    };

    let mut levels = Vec::with_capacity((plan.levels_up + plan.levels_down) as usize);

    for i in 1..=plan.levels_down {
        let level_idx = -(i as i32);
        let qty_steps = qty_at((i - 1) as usize)?;
        levels.push(LevelTarget {
            level_idx,
            side: Side::Buy,
            price_ticks: price_at(level_idx),
            qty_steps,
            intent: order_intent_for(Side::Buy, position_qty_signed),
        });
    }
    for i in 1..=plan.levels_up {
        let level_idx = i as i32;
        let qty_steps = qty_at((i - 1) as usize)?;
        levels.push(LevelTarget {
            level_idx,
            side: Side::Sell,
            price_ticks: price_at(level_idx),
            qty_steps,
            intent: order_intent_for(Side::Sell, position_qty_signed),
        });
    }

    Ok(levels)
}

/// `<strategy>_<symbol>_<level_idx>_<seq>` — the client-order-id pattern
/// used to index tracked levels against existing broker-side orders.
pub fn make_client_order_id(strategy: &str, symbol: &str, level_idx: i32, seq: u64) -> String {
    format!("{strategy}_{symbol}_{level_idx}_{seq}")
}
