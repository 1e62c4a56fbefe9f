//! Top-K prefilter (C5) — hard filter, z-scored composite ranking, and a
//! Top-K selection with enter/hold hysteresis timers plus a diversity cap.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct HardFilterThresholds {
    pub spread_max_bps: i64,
    pub vol_min_24h_usd: f64,
    pub vol_min_1h_usd: f64,
    pub trade_count_min_1m: u32,
    pub oi_min_usd: f64,
}

impl Default for HardFilterThresholds {
    fn default() -> Self {
        Self {
            // Open Question #3 (DESIGN.md): SPREAD_MAX_BPS default = 15.
            spread_max_bps: 15,
            vol_min_24h_usd: 1_000_000.0,
            vol_min_1h_usd: 20_000.0,
            trade_count_min_1m: 5,
            oi_min_usd: 500_000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoreWeights {
    pub w_activity: f64,
    pub w_volatility: f64,
    pub w_cost: f64,
    pub w_idio: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            w_activity: 0.3,
            w_volatility: 0.3,
            w_cost: 0.2,
            w_idio: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub symbol: String,
    pub sector: String,
    pub spread_bps: i64,
    pub volume_24h_usd: f64,
    pub volume_1h_usd: f64,
    pub trade_count_1m: u32,
    pub open_interest_usd: f64,
    pub blacklisted: bool,
    pub delisting: bool,
    pub activity_z: f64,
    pub volatility_z: f64,
    pub cost_z: f64,
    pub idio_z: f64,
    pub correlation_to: HashMap<String, f64>,
}

fn passes_hard_filter(c: &Candidate, th: &HardFilterThresholds) -> bool {
    !c.blacklisted
        && !c.delisting
        && c.spread_bps <= th.spread_max_bps
        && c.volume_24h_usd >= th.vol_min_24h_usd
        && c.volume_1h_usd >= th.vol_min_1h_usd
        && c.trade_count_1m >= th.trade_count_min_1m
        && c.open_interest_usd >= th.oi_min_usd
}

fn score(c: &Candidate, w: &ScoreWeights) -> f64 {
    w.w_activity * c.activity_z + w.w_volatility * c.volatility_z - w.w_cost * c.cost_z + w.w_idio * c.idio_z
}

#[derive(Debug, Clone)]
pub struct PrefilterConfig {
    pub k: usize,
    pub candidate_pool: usize, // "top 2K" candidate set per spec §4.4
    pub t_enter_ticks: u32,
    pub t_hold_ticks: u32,
    pub max_correlated_per_sector: usize,
    pub correlation_skip_threshold: f64,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            k: 20,
            candidate_pool: 40,
            t_enter_ticks: 3,
            t_hold_ticks: 10,
            max_correlated_per_sector: 3,
            correlation_skip_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SymbolTimer {
    candidate_ticks: u32,
    enabled_ticks: u32,
    enabled: bool,
}

/// Cross-tick Top-K selector state.
#[derive(Debug, Clone, Default)]
pub struct PrefilterState {
    timers: HashMap<String, SymbolTimer>,
    current_topk: Vec<String>,
}

impl PrefilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_topk(&self) -> &[String] {
        &self.current_topk
    }

    /// Re-rank on this tick and update the Top-K set subject to
    /// enter/hold hysteresis and a per-sector diversity cap.
    pub fn rerank(&mut self, candidates: &[Candidate], weights: &ScoreWeights, hard: &HardFilterThresholds, cfg: &PrefilterConfig) -> Vec<String> {
        let mut scored: Vec<(String, f64, &Candidate)> = candidates
            .iter()
            .filter(|c| passes_hard_filter(c, hard))
            .map(|c| (c.symbol.clone(), score(c, weights), c))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let candidate_set: HashSet<String> = scored.iter().take(cfg.candidate_pool).map(|(s, _, _)| s.clone()).collect();

        // advance timers
        for sym in self.timers.keys().cloned().collect::<Vec<_>>() {
            let in_candidate_set = candidate_set.contains(&sym);
            let timer = self.timers.get_mut(&sym).unwrap();
            if in_candidate_set {
                timer.candidate_ticks += 1;
            } else {
                timer.candidate_ticks = 0;
                if timer.enabled {
                    timer.enabled_ticks += 1;
                }
            }
        }
        for sym in &candidate_set {
            self.timers.entry(sym.clone()).or_default();
            let timer = self.timers.get_mut(sym).unwrap();
            if timer.candidate_ticks == 0 {
                timer.candidate_ticks = 1;
            }
        }

        let mut selected: Vec<String> = Vec::new();
        let mut sector_counts: HashMap<&str, usize> = HashMap::new();
        let by_symbol: HashMap<&str, &Candidate> = scored.iter().map(|(s, _, c)| (s.as_str(), *c)).collect();

        // Keep symbols already enabled that have not yet satisfied T_HOLD,
        // even if they fell out of the candidate set this tick.
        for sym in &self.current_topk {
            if let Some(timer) = self.timers.get(sym) {
                if timer.enabled && timer.enabled_ticks < cfg.t_hold_ticks {
                    selected.push(sym.clone());
                    if let Some(c) = by_symbol.get(sym.as_str()) {
                        *sector_counts.entry(c.sector.as_str()).or_insert(0) += 1;
                    }
                }
            }
        }

        for (sym, _score, c) in scored.iter() {
            if selected.len() >= cfg.k {
                break;
            }
            if selected.contains(sym) {
                continue;
            }
            let timer = self.timers.entry(sym.clone()).or_default();
            let eligible = timer.enabled || timer.candidate_ticks >= cfg.t_enter_ticks;
            if !eligible {
                continue;
            }
            let sector_count = *sector_counts.get(c.sector.as_str()).unwrap_or(&0);
            if sector_count >= cfg.max_correlated_per_sector {
                continue;
            }
            let correlated_already = selected.iter().any(|s| c.correlation_to.get(s).copied().unwrap_or(0.0) > cfg.correlation_skip_threshold);
            if correlated_already {
                continue;
            }
            selected.push(sym.clone());
            *sector_counts.entry(c.sector.as_str()).or_insert(0) += 1;
        }

        for sym in &selected {
            let timer = self.timers.entry(sym.clone()).or_default();
            if !timer.enabled {
                timer.enabled = true;
                timer.enabled_ticks = 0;
            }
        }
        for (sym, timer) in self.timers.iter_mut() {
            if !selected.contains(sym) {
                timer.enabled = false;
                timer.enabled_ticks = 0;
            }
        }

        self.current_topk = selected.clone();
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(symbol: &str, sector: &str, z: f64) -> Candidate {
        Candidate {
            symbol: symbol.to_string(),
            sector: sector.to_string(),
            spread_bps: 5,
            volume_24h_usd: 10_000_000.0,
            volume_1h_usd: 500_000.0,
            trade_count_1m: 50,
            open_interest_usd: 5_000_000.0,
            blacklisted: false,
            delisting: false,
            activity_z: z,
            volatility_z: z,
            cost_z: 0.0,
            idio_z: 0.0,
            correlation_to: HashMap::new(),
        }
    }

    #[test]
    fn hard_filter_excludes_blacklisted() {
        let th = HardFilterThresholds::default();
        let mut c = candidate("A", "L1", 1.0);
        c.blacklisted = true;
        assert!(!passes_hard_filter(&c, &th));
    }

    #[test]
    fn enter_requires_t_enter_ticks_before_enabling() {
        let cfg = PrefilterConfig {
            k: 1,
            t_enter_ticks: 2,
            ..Default::default()
        };
        let w = ScoreWeights::default();
        let th = HardFilterThresholds::default();
        let mut state = PrefilterState::new();
        let cands = vec![candidate("A", "L1", 2.0)];

        let r1 = state.rerank(&cands, &w, &th, &cfg);
        assert!(r1.is_empty(), "must not enter before T_ENTER ticks elapse");
        let r2 = state.rerank(&cands, &w, &th, &cfg);
        assert_eq!(r2, vec!["A".to_string()]);
    }

    #[test]
    fn cannot_drop_before_t_hold_ticks() {
        let cfg = PrefilterConfig {
            k: 1,
            t_enter_ticks: 1,
            t_hold_ticks: 3,
            ..Default::default()
        };
        let w = ScoreWeights::default();
        let th = HardFilterThresholds::default();
        let mut state = PrefilterState::new();
        let strong = vec![candidate("A", "L1", 3.0)];
        state.rerank(&strong, &w, &th, &cfg);

        // Next tick: A disappears from candidates entirely, but must still
        // be held (fewer than t_hold_ticks have elapsed since it enabled).
        let empty: Vec<Candidate> = vec![];
        let r = state.rerank(&empty, &w, &th, &cfg);
        assert_eq!(r, vec!["A".to_string()]);
    }

    #[test]
    fn diversity_cap_limits_per_sector() {
        let cfg = PrefilterConfig {
            k: 10,
            t_enter_ticks: 1,
            max_correlated_per_sector: 1,
            ..Default::default()
        };
        let w = ScoreWeights::default();
        let th = HardFilterThresholds::default();
        let mut state = PrefilterState::new();
        let cands = vec![candidate("A", "L1", 3.0), candidate("B", "L1", 2.0)];
        let r = state.rerank(&cands, &w, &th, &cfg);
        assert_eq!(r.len(), 1, "sector cap of 1 must exclude the second L1 symbol");
        assert_eq!(r[0], "A");
    }
}
