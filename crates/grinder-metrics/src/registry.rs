use std::collections::BTreeMap;

use parking_lot::RwLock;

/// A metric's label set, stored sorted so two calls with the same labels in
/// a different order collide on the same series.
pub type Labels = BTreeMap<&'static str, String>;

fn labels(pairs: &[(&'static str, &str)]) -> Labels {
    pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SeriesKey {
    pub(crate) name: &'static str,
    pub(crate) labels: Vec<(&'static str, String)>,
}

fn series_key(name: &'static str, labels: &Labels) -> SeriesKey {
    SeriesKey {
        name,
        labels: labels.iter().map(|(k, v)| (*k, v.clone())).collect(),
    }
}

/// Fixed counter/gauge registry. Every series is identified by a static
/// metric name plus a sorted label set; there is no dynamic metric
/// registration, matching the closed surface the rest of the engine
/// references by name.
#[derive(Default)]
pub struct Registry {
    counters: RwLock<BTreeMap<SeriesKey, u64>>,
    gauges: RwLock<BTreeMap<SeriesKey, f64>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by 1.
    pub fn incr(&self, name: &'static str, label_pairs: &[(&'static str, &str)]) {
        self.incr_by(name, label_pairs, 1);
    }

    /// Increment a counter by an arbitrary amount. Counters never decrease;
    /// callers must not pass a value that would represent a reset.
    pub fn incr_by(&self, name: &'static str, label_pairs: &[(&'static str, &str)], delta: u64) {
        let key = series_key(name, &labels(label_pairs));
        let mut counters = self.counters.write();
        *counters.entry(key).or_insert(0) += delta;
    }

    /// Set a gauge to an absolute value, overwriting whatever was there.
    pub fn set(&self, name: &'static str, label_pairs: &[(&'static str, &str)], value: f64) {
        let key = series_key(name, &labels(label_pairs));
        self.gauges.write().insert(key, value);
    }

    /// Current value of a counter, or 0 if it has never been incremented.
    /// Test/diagnostic helper; production code should not need to read its
    /// own counters back.
    pub fn counter_value(&self, name: &'static str, label_pairs: &[(&'static str, &str)]) -> u64 {
        let key = series_key(name, &labels(label_pairs));
        self.counters.read().get(&key).copied().unwrap_or(0)
    }

    /// Current value of a gauge, or `None` if it has never been set.
    pub fn gauge_value(&self, name: &'static str, label_pairs: &[(&'static str, &str)]) -> Option<f64> {
        let key = series_key(name, &labels(label_pairs));
        self.gauges.read().get(&key).copied()
    }

    pub(crate) fn counters_snapshot(&self) -> Vec<(SeriesKey, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub(crate) fn gauges_snapshot(&self) -> Vec<(SeriesKey, f64)> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_accumulates_across_calls() {
        let reg = Registry::new();
        reg.incr("grinder_feed_drop_total", &[("symbol", "BTC-PERP")]);
        reg.incr("grinder_feed_drop_total", &[("symbol", "BTC-PERP")]);
        reg.incr("grinder_feed_drop_total", &[("symbol", "ETH-PERP")]);

        assert_eq!(
            reg.counter_value("grinder_feed_drop_total", &[("symbol", "BTC-PERP")]),
            2
        );
        assert_eq!(
            reg.counter_value("grinder_feed_drop_total", &[("symbol", "ETH-PERP")]),
            1
        );
    }

    #[test]
    fn label_order_does_not_create_distinct_series() {
        let reg = Registry::new();
        reg.incr(
            "grinder_fsm_transitions_total",
            &[("from", "ARMED"), ("to", "LIVE"), ("reason", "none")],
        );
        reg.incr(
            "grinder_fsm_transitions_total",
            &[("reason", "none"), ("to", "LIVE"), ("from", "ARMED")],
        );
        assert_eq!(
            reg.counter_value(
                "grinder_fsm_transitions_total",
                &[("from", "ARMED"), ("to", "LIVE"), ("reason", "none")]
            ),
            2
        );
    }

    #[test]
    fn set_overwrites_rather_than_accumulates() {
        let reg = Registry::new();
        reg.set("grinder_drawdown_pct", &[], 1.5);
        reg.set("grinder_drawdown_pct", &[], 2.5);
        assert_eq!(reg.gauge_value("grinder_drawdown_pct", &[]), Some(2.5));
    }

    #[test]
    fn unset_gauge_reads_as_none_and_unincremented_counter_as_zero() {
        let reg = Registry::new();
        assert_eq!(reg.gauge_value("grinder_drawdown_pct", &[]), None);
        assert_eq!(reg.counter_value("grinder_router_amend_savings_total", &[]), 0);
    }
}
