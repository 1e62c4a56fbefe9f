use grinder_fsm::{tick, FsmConfig, FsmInputs, FsmRuntime, OperatorOverride};
use grinder_types::{FsmState, ToxicityBand};

fn inputs(ts_ms: i64) -> FsmInputs {
    FsmInputs {
        ts_ms,
        toxicity_band: ToxicityBand::Low,
        feed_staleness_ms: 0,
        drawdown_pct_bps: 0,
        kill_switch_active: false,
        position_notional_usd_x1000: 0,
        operator_override: OperatorOverride::None,
        health_ok: true,
        feeds_ready: true,
        topk_ready: true,
    }
}

#[test]
fn dd_breach_from_throttled_goes_straight_to_emergency() {
    let mut rt = FsmRuntime { state: FsmState::Throttled, ticks_in_state: 0, low_toxicity_ticks: 0 };
    let cfg = FsmConfig { drawdown_breach_bps: 500, ..FsmConfig::default() };
    let mut breach = inputs(1);
    breach.drawdown_pct_bps = 600;
    let ev = tick(&mut rt, &cfg, &breach).unwrap();
    assert_eq!(ev.from, FsmState::Throttled);
    assert_eq!(ev.to, FsmState::Emergency);
    assert_eq!(ev.reason, "DD_BREACH");
}

#[test]
fn feed_staleness_degrades_but_emergency_preempts_it() {
    let mut rt = FsmRuntime { state: FsmState::Active, ticks_in_state: 0, low_toxicity_ticks: 0 };
    let cfg = FsmConfig { max_feed_staleness_ms: 1_000, drawdown_breach_bps: 500, ..FsmConfig::default() };
    let mut both = inputs(1);
    both.feed_staleness_ms = 2_000;
    both.drawdown_pct_bps = 600;
    let ev = tick(&mut rt, &cfg, &both).unwrap();
    assert_eq!(ev.to, FsmState::Emergency, "DD breach outranks feed staleness");
}
