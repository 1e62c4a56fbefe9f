//! Rolling error-rate circuit breaker for live adapters.
//!
//! Same rolling-window shape as `grinder-safety`'s `FillProbCircuitBreaker`:
//! once the error rate within the window crosses the configured threshold,
//! the breaker trips and calls are bypassed with [`crate::PortError::CircuitOpen`]
//! rather than sent to the wire, until the window rolls over.

use crate::precheck::PortConfig;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    window_start_ms: i64,
    attempted: u32,
    errored: u32,
}

impl CircuitBreaker {
    pub fn new(now_ms: i64) -> Self {
        Self { window_start_ms: now_ms, attempted: 0, errored: 0 }
    }

    fn roll_window(&mut self, now_ms: i64, cfg: &PortConfig) {
        if now_ms.saturating_sub(self.window_start_ms) >= cfg.circuit_breaker_window_ms {
            self.window_start_ms = now_ms;
            self.attempted = 0;
            self.errored = 0;
        }
    }

    fn error_rate_bps(&self) -> u16 {
        if self.attempted == 0 {
            return 0;
        }
        ((self.errored as u64 * 10_000) / self.attempted as u64) as u16
    }

    /// Whether the breaker is currently open, i.e. calls should be bypassed.
    pub fn is_open(&mut self, now_ms: i64, cfg: &PortConfig) -> bool {
        self.roll_window(now_ms, cfg);
        self.error_rate_bps() >= cfg.circuit_breaker_error_rate_bps
    }

    /// Record the outcome of a call that was actually attempted on the wire.
    /// `is_retryable_error` should be true for 5xx/429-class responses.
    pub fn record(&mut self, now_ms: i64, cfg: &PortConfig, is_retryable_error: bool) {
        self.roll_window(now_ms, cfg);
        self.attempted = self.attempted.saturating_add(1);
        if is_retryable_error {
            self.errored = self.errored.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PortConfig {
        PortConfig { circuit_breaker_window_ms: 1_000, circuit_breaker_error_rate_bps: 5_000, ..PortConfig::default() }
    }

    #[test]
    fn stays_closed_below_threshold() {
        let cfg = cfg();
        let mut cb = CircuitBreaker::new(0);
        cb.record(0, &cfg, true);
        cb.record(0, &cfg, false);
        cb.record(0, &cfg, false);
        assert!(!cb.is_open(0, &cfg));
    }

    #[test]
    fn trips_once_error_rate_crosses_threshold() {
        let cfg = cfg();
        let mut cb = CircuitBreaker::new(0);
        cb.record(0, &cfg, true);
        cb.record(0, &cfg, true);
        assert!(cb.is_open(0, &cfg));
    }

    #[test]
    fn resets_after_window_rolls_over() {
        let cfg = cfg();
        let mut cb = CircuitBreaker::new(0);
        cb.record(0, &cfg, true);
        cb.record(0, &cfg, true);
        assert!(cb.is_open(0, &cfg));
        assert!(!cb.is_open(2_000, &cfg));
    }
}
