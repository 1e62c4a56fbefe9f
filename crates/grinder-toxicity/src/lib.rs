//! Toxicity evaluator (C4) — composite adverse-selection score with
//! asymmetric decay and a HIGH→LOW cooldown.

use grinder_types::{ToxicityBand, ToxicityResult};

#[derive(Debug, Clone, Copy)]
pub struct ToxicityWeights {
    pub w_vpin: f64,
    pub w_kyle_lambda: f64,
    pub w_amihud: f64,
    pub w_spread_widen: f64,
    pub w_ofi_shock: f64,
    pub w_liq_surge: f64,
}

impl Default for ToxicityWeights {
    fn default() -> Self {
        Self {
            w_vpin: 0.25,
            w_kyle_lambda: 0.2,
            w_amihud: 0.15,
            w_spread_widen: 0.15,
            w_ofi_shock: 0.15,
            w_liq_surge: 0.1,
        }
    }
}

/// Raw z-scored component inputs, already clipped by the caller (feature
/// engine) to a sane range before being passed in here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToxicityComponents {
    pub vpin_z: f64,
    pub kyle_lambda_z: f64,
    pub amihud_z: f64,
    pub spread_widen_z: f64,
    pub ofi_shock_z: f64,
    pub liq_surge_z: f64,
}

const DECAY_ALPHA: f64 = 0.95;
const COOLDOWN_TICKS_DEFAULT: u32 = 60;
const BAND_LOW_MAX: u8 = 30;
const BAND_MID_MAX: u8 = 60;

fn clip(z: f64) -> f64 {
    z.clamp(-3.0, 3.0)
}

/// Compute the raw (pre-decay) composite score in `[0,100]` for one tick.
pub fn composite_score(components: &ToxicityComponents, weights: &ToxicityWeights) -> u8 {
    let raw = weights.w_vpin * clip(components.vpin_z)
        + weights.w_kyle_lambda * clip(components.kyle_lambda_z)
        + weights.w_amihud * clip(components.amihud_z)
        + weights.w_spread_widen * clip(components.spread_widen_z)
        + weights.w_ofi_shock * clip(components.ofi_shock_z)
        + weights.w_liq_surge * clip(components.liq_surge_z);
    // Map clipped z-space [-3,3] composite to [0,100].
    let normalized = ((raw + 3.0) / 6.0 * 100.0).clamp(0.0, 100.0);
    normalized.round() as u8
}

/// Per-symbol toxicity state: asymmetric decay + HIGH cooldown latch.
#[derive(Debug, Clone)]
pub struct ToxicityState {
    current: f64,
    cooldown_ticks_left: u32,
    cooldown_period: u32,
}

impl ToxicityState {
    pub fn new() -> Self {
        Self {
            current: 0.0,
            cooldown_ticks_left: 0,
            cooldown_period: COOLDOWN_TICKS_DEFAULT,
        }
    }

    pub fn with_cooldown_ticks(cooldown_period: u32) -> Self {
        Self {
            cooldown_period,
            ..Self::new()
        }
    }

    /// Feed one tick's raw score; applies spike-immediately /
    /// decay-by-alpha-per-tick and the HIGH cooldown latch.
    pub fn update(&mut self, raw_score: u8) -> ToxicityResult {
        let raw = raw_score as f64;
        if raw > self.current {
            self.current = raw; // spikes immediately
        } else {
            self.current = self.current * DECAY_ALPHA; // decays by alpha per tick
        }

        let was_high = self.current.round() as u8 >= BAND_MID_MAX;
        if was_high {
            self.cooldown_ticks_left = self.cooldown_period;
        } else if self.cooldown_ticks_left > 0 {
            self.cooldown_ticks_left -= 1;
        }

        let score = self.current.round().clamp(0.0, 100.0) as u8;
        let band = if was_high {
            ToxicityBand::High
        } else if self.cooldown_ticks_left > 0 {
            // cannot return to LOW before cooldown elapses; floor to MID
            ToxicityBand::Mid
        } else if score <= BAND_LOW_MAX {
            ToxicityBand::Low
        } else {
            ToxicityBand::Mid
        };

        ToxicityResult { score, band }
    }
}

impl Default for ToxicityState {
    fn default() -> Self {
        Self::new()
    }
}
