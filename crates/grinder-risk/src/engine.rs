use grinder_types::OrderIntent;

use crate::types::{KillSwitchEvent, KillSwitchReason, ReasonCode, RiskConfig, RiskDecision, RiskInput, RiskState};

/// Deterministic tick maintenance: day rollover resets day-start equity and
/// session peak; peak is otherwise monotonic within the day.
pub fn tick(state: &mut RiskState, day_id: u32, equity_micros: i64) {
    if day_id != state.day_id {
        state.day_id = day_id;
        state.day_start_equity_micros = equity_micros;
        state.session_peak_equity_micros = equity_micros;
    }
    if equity_micros > state.session_peak_equity_micros {
        state.session_peak_equity_micros = equity_micros;
    }
}

/// Main evaluator (pure deterministic logic + sticky latches in state).
///
/// Precedence, first match wins:
///   1. a manual kill-switch event in the input always latches
///   2. an active kill-switch latch blocks everything except CANCEL
///   3. an operator-override (consecutive-loss guard) trips the kill switch
///   4. DRAWDOWN latch blocks only INCREASE_RISK
///   5. otherwise ALLOW
pub fn evaluate(state: &mut RiskState, cfg: &RiskConfig, input: &RiskInput) -> RiskDecision {
    tick(state, input.day_id, input.equity_micros);

    if let Some(event) = &input.manual_kill_switch {
        state.kill_switch = Some(event.clone());
    }

    // checked_sub: peak/day-start equity are always >= 0 in steady state, but
    // guard against corrupted upstream state producing a bogus floor.
    let dd_from_peak = state.session_peak_equity_micros.checked_sub(input.equity_micros).unwrap_or(i64::MAX);
    let dd_from_day_start = state.day_start_equity_micros.checked_sub(input.equity_micros).unwrap_or(i64::MAX);
    if cfg.session_drawdown_limit_micros > 0 && dd_from_peak >= cfg.session_drawdown_limit_micros {
        state.drawdown_latched = true;
    }
    if cfg.daily_drawdown_limit_micros > 0 && dd_from_day_start >= cfg.daily_drawdown_limit_micros {
        state.drawdown_latched = true;
    }

    if let Some(kill_switch) = state.kill_switch.clone() {
        return match input.intent {
            OrderIntent::Cancel => RiskDecision::Allow,
            _ => RiskDecision::Block {
                reason: ReasonCode::KillSwitchActive,
                kill_switch: Some(kill_switch),
            },
        };
    }

    if state.operator_override_required {
        let event = KillSwitchEvent::new(KillSwitchReason::Operator)
            .with_evidence("consecutive_losses", state.consecutive_losses.to_string());
        state.kill_switch = Some(event.clone());
        return match input.intent {
            OrderIntent::Cancel => RiskDecision::Allow,
            _ => RiskDecision::Block {
                reason: ReasonCode::KillSwitchActive,
                kill_switch: Some(event),
            },
        };
    }

    if state.drawdown_latched {
        return match input.intent {
            OrderIntent::IncreaseRisk => RiskDecision::Block {
                reason: ReasonCode::DdPortfolioBreach,
                kill_switch: None,
            },
            OrderIntent::ReduceRisk | OrderIntent::Cancel => RiskDecision::Allow,
        };
    }

    RiskDecision::Allow
}
