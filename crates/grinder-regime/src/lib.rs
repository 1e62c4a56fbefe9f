//! Regime classifier (C3) — precedence-ordered rule evaluation with
//! hysteresis and cooldown against state flapping.

use grinder_types::Regime;

#[derive(Debug, Clone, Copy)]
pub struct RegimeThresholds {
    pub tox_pause: u8,
    pub spread_pause_bps: i64,
    pub depth_min_usd_scaled: i64,
    pub shock_bps: i64,
    pub trend_slope_th_bps: i64,
    pub min_hold_ticks: u32,
    pub switch_cooldown_ticks: u32,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            tox_pause: 60,
            spread_pause_bps: 15,
            depth_min_usd_scaled: 50_000_00,
            shock_bps: 80,
            trend_slope_th_bps: 25,
            min_hold_ticks: 5,
            switch_cooldown_ticks: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegimeInputs {
    pub tox_score: u8,
    pub spread_bps: i64,
    pub depth_top5_usd_scaled: i64,
    pub price_jump_bps_1m: i64,
    pub trend_slope_5m_bps: i64,
}

/// Per-symbol hysteresis state for the regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeState {
    current: Regime,
    ticks_in_current: u32,
    ticks_since_switch: u32,
}

impl RegimeState {
    pub fn new(initial: Regime) -> Self {
        Self {
            current: initial,
            ticks_in_current: 0,
            ticks_since_switch: u32::MAX,
        }
    }

    pub fn current(&self) -> Regime {
        self.current
    }

    /// Evaluate one tick. `force_preempt` types (TOXIC, VOL_SHOCK) may
    /// preempt an active cooldown; all other transitions respect it.
    pub fn evaluate(&mut self, inputs: &RegimeInputs, thresholds: &RegimeThresholds) -> Regime {
        let candidate = classify(inputs, thresholds);

        if candidate == self.current {
            self.ticks_in_current += 1;
            self.ticks_since_switch = self.ticks_since_switch.saturating_add(1);
            return self.current;
        }

        let preempts_cooldown = matches!(candidate, Regime::Toxic | Regime::VolShock);
        let cooldown_active = self.ticks_since_switch < thresholds.switch_cooldown_ticks;
        let held_long_enough = self.ticks_in_current >= thresholds.min_hold_ticks;

        if (cooldown_active && !preempts_cooldown) || !held_long_enough {
            self.ticks_in_current += 1;
            self.ticks_since_switch = self.ticks_since_switch.saturating_add(1);
            return self.current;
        }

        self.current = candidate;
        self.ticks_in_current = 0;
        self.ticks_since_switch = 0;
        self.current
    }
}

/// Stateless precedence-ordered classification, no hysteresis applied.
pub fn classify(inputs: &RegimeInputs, thresholds: &RegimeThresholds) -> Regime {
    if inputs.tox_score as i64 >= thresholds.tox_pause as i64 {
        return Regime::Toxic;
    }
    if inputs.spread_bps >= thresholds.spread_pause_bps || inputs.depth_top5_usd_scaled <= thresholds.depth_min_usd_scaled {
        return Regime::ThinBook;
    }
    if inputs.price_jump_bps_1m.abs() >= thresholds.shock_bps {
        return Regime::VolShock;
    }
    if inputs.trend_slope_5m_bps.abs() >= thresholds.trend_slope_th_bps {
        return if inputs.trend_slope_5m_bps > 0 {
            Regime::TrendUp
        } else {
            Regime::TrendDown
        };
    }
    Regime::Range
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_inputs() -> RegimeInputs {
        RegimeInputs {
            tox_score: 0,
            spread_bps: 2,
            depth_top5_usd_scaled: 1_000_000_00,
            price_jump_bps_1m: 0,
            trend_slope_5m_bps: 0,
        }
    }

    #[test]
    fn toxic_has_highest_precedence() {
        let th = RegimeThresholds::default();
        let mut inputs = quiet_inputs();
        inputs.tox_score = 90;
        inputs.spread_bps = 50; // would also trigger THIN_BOOK
        assert_eq!(classify(&inputs, &th), Regime::Toxic);
    }

    #[test]
    fn thin_book_beats_vol_shock() {
        let th = RegimeThresholds::default();
        let mut inputs = quiet_inputs();
        inputs.spread_bps = 50;
        inputs.price_jump_bps_1m = 200;
        assert_eq!(classify(&inputs, &th), Regime::ThinBook);
    }

    #[test]
    fn trend_sign_selects_direction() {
        let th = RegimeThresholds::default();
        let mut up = quiet_inputs();
        up.trend_slope_5m_bps = 40;
        assert_eq!(classify(&up, &th), Regime::TrendUp);

        let mut down = quiet_inputs();
        down.trend_slope_5m_bps = -40;
        assert_eq!(classify(&down, &th), Regime::TrendDown);
    }

    #[test]
    fn default_is_range() {
        let th = RegimeThresholds::default();
        assert_eq!(classify(&quiet_inputs(), &th), Regime::Range);
    }

    #[test]
    fn hysteresis_blocks_premature_switch() {
        let th = RegimeThresholds {
            min_hold_ticks: 3,
            ..Default::default()
        };
        let mut state = RegimeState::new(Regime::Range);
        let mut shock = quiet_inputs();
        shock.price_jump_bps_1m = 200;
        // First tick after only 0 ticks in current regime: holds at RANGE.
        assert_eq!(state.evaluate(&shock, &th), Regime::Range);
    }

    #[test]
    fn toxic_preempts_cooldown() {
        let th = RegimeThresholds {
            min_hold_ticks: 0,
            switch_cooldown_ticks: 100,
            ..Default::default()
        };
        let mut state = RegimeState::new(Regime::Range);
        let mut shock = quiet_inputs();
        shock.price_jump_bps_1m = 200;
        assert_eq!(state.evaluate(&shock, &th), Regime::VolShock);
        // Now immediately toxic, should preempt the fresh cooldown.
        let mut toxic = quiet_inputs();
        toxic.tox_score = 90;
        assert_eq!(state.evaluate(&toxic, &th), Regime::Toxic);
    }

    #[test]
    fn non_preempting_switch_respects_cooldown() {
        let th = RegimeThresholds {
            min_hold_ticks: 0,
            switch_cooldown_ticks: 100,
            ..Default::default()
        };
        let mut state = RegimeState::new(Regime::Range);
        let mut up = quiet_inputs();
        up.trend_slope_5m_bps = 40;
        assert_eq!(state.evaluate(&up, &th), Regime::TrendUp);
        // Switching TREND_UP -> TREND_DOWN should be blocked by cooldown.
        let mut down = quiet_inputs();
        down.trend_slope_5m_bps = -40;
        assert_eq!(state.evaluate(&down, &th), Regime::TrendUp);
    }
}
