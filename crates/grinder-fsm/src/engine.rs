use grinder_types::{FsmState, OrderIntent, ToxicityBand, TransitionEvent};

use crate::types::{
    FsmConfig, FsmInputs, FsmRuntime, OperatorOverride, REASON_DD_BREACH, REASON_FEEDS_READY, REASON_FEED_STALE,
    REASON_HEALTH_OK, REASON_KILL_SWITCH, REASON_OPERATOR_EMERGENCY, REASON_OPERATOR_PAUSE, REASON_POSITION_REDUCED,
    REASON_TOX_HIGH, REASON_TOX_LOW_COOLDOWN, REASON_TOX_MID,
};

/// Advance the FSM by one tick. Returns `Some(TransitionEvent)` exactly when
/// the state changes; returns `None` otherwise. Pure function — no IO, no
/// clock reads beyond the `ts_ms` the caller supplies in `inputs`.
pub fn tick(rt: &mut FsmRuntime, cfg: &FsmConfig, inputs: &FsmInputs) -> Option<TransitionEvent> {
    rt.ticks_in_state = rt.ticks_in_state.saturating_add(1);
    if inputs.toxicity_band == ToxicityBand::Low {
        rt.low_toxicity_ticks = rt.low_toxicity_ticks.saturating_add(1);
    } else {
        rt.low_toxicity_ticks = 0;
    }

    let from = rt.state;
    let next = next_transition(from, inputs, cfg, rt.low_toxicity_ticks)?;
    let (to, reason) = next;
    if to == from {
        return None;
    }

    rt.state = to;
    rt.ticks_in_state = 0;
    Some(TransitionEvent {
        ts_ms: inputs.ts_ms,
        from,
        to,
        reason: reason.to_string(),
    })
}

/// `is_action_allowed(state, intent)` — thin re-export wrapper kept here so
/// callers needing both `tick` and permission checks can import from one
/// module.
pub fn is_action_allowed(state: FsmState, intent: OrderIntent) -> bool {
    crate::types::is_action_allowed(state, intent)
}

/// Priority-ordered evaluation: kill-switch, DD, operator-emergency,
/// feed-stale, operator-pause, tox-high, tox-mid, then state-specific
/// forward/recovery transitions. First applicable rule wins.
fn next_transition(
    from: FsmState,
    inputs: &FsmInputs,
    cfg: &FsmConfig,
    low_toxicity_ticks: u32,
) -> Option<(FsmState, &'static str)> {
    if inputs.kill_switch_active && from != FsmState::Emergency {
        return Some((FsmState::Emergency, REASON_KILL_SWITCH));
    }
    if inputs.drawdown_pct_bps >= cfg.drawdown_breach_bps && from != FsmState::Emergency {
        return Some((FsmState::Emergency, REASON_DD_BREACH));
    }
    if inputs.operator_override == OperatorOverride::Emergency && from != FsmState::Emergency {
        return Some((FsmState::Emergency, REASON_OPERATOR_EMERGENCY));
    }
    if inputs.feed_staleness_ms >= cfg.max_feed_staleness_ms
        && from != FsmState::Degraded
        && from != FsmState::Emergency
    {
        return Some((FsmState::Degraded, REASON_FEED_STALE));
    }
    if inputs.operator_override == OperatorOverride::Pause
        && !matches!(from, FsmState::Paused | FsmState::Emergency | FsmState::Degraded)
    {
        return Some((FsmState::Paused, REASON_OPERATOR_PAUSE));
    }
    if inputs.toxicity_band == ToxicityBand::High && matches!(from, FsmState::Active | FsmState::Throttled) {
        return Some((FsmState::Paused, REASON_TOX_HIGH));
    }
    if inputs.toxicity_band == ToxicityBand::Mid && from == FsmState::Active {
        return Some((FsmState::Throttled, REASON_TOX_MID));
    }

    match from {
        FsmState::Init => {
            if inputs.health_ok {
                return Some((FsmState::Ready, REASON_HEALTH_OK));
            }
        }
        FsmState::Ready => {
            if inputs.feeds_ready && inputs.topk_ready {
                return Some((FsmState::Active, REASON_FEEDS_READY));
            }
        }
        FsmState::Emergency => {
            let position_reduced = inputs.position_notional_usd_x1000 <= cfg.position_reduced_threshold_usd_x1000;
            if position_reduced {
                return Some((FsmState::Paused, REASON_POSITION_REDUCED));
            }
        }
        FsmState::Paused | FsmState::Throttled => {
            if low_toxicity_ticks >= cfg.cooldown_ticks {
                return Some((FsmState::Active, REASON_TOX_LOW_COOLDOWN));
            }
        }
        FsmState::Active | FsmState::Degraded => {}
    }

    None
}
