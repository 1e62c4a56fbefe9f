use std::fmt::Write as _;

use crate::registry::Registry;

/// Render every series in `registry` as Prometheus text-exposition format
/// (the `# TYPE` + `name{labels} value` lines `curl`/scrapers expect).
/// Hand-rolled rather than pulled from a `prometheus` crate: the base
/// workspace does not carry one, and the surface here is a fixed, closed set
/// of counters/gauges rather than an open registry needing that crate's
/// collector abstractions.
///
/// Output is fully deterministic: series are sorted by name then by label
/// set, so two calls against the same registry state always byte-match.
pub fn render_text(registry: &Registry) -> String {
    let mut out = String::new();

    let mut counters = registry.counters_snapshot();
    counters.sort_by(|a, b| a.0.cmp(&b.0));
    let mut gauges = registry.gauges_snapshot();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen_counter_names = Vec::new();
    for (key, value) in &counters {
        if !seen_counter_names.contains(&key.name) {
            let _ = writeln!(out, "# TYPE {} counter", key.name);
            seen_counter_names.push(key.name);
        }
        let _ = writeln!(out, "{}{} {}", key.name, render_labels(&key.labels), value);
    }

    let mut seen_gauge_names = Vec::new();
    for (key, value) in &gauges {
        if !seen_gauge_names.contains(&key.name) {
            let _ = writeln!(out, "# TYPE {} gauge", key.name);
            seen_gauge_names.push(key.name);
        }
        let _ = writeln!(out, "{}{} {}", key.name, render_labels(&key.labels), value);
    }

    out
}

fn render_labels(labels: &[(&'static str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut parts = Vec::with_capacity(labels.len());
    for (k, v) in labels {
        parts.push(format!("{k}=\"{}\"", escape_label_value(v)));
    }
    format!("{{{}}}", parts.join(","))
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_text_emits_type_line_once_per_metric_name() {
        let reg = Registry::new();
        reg.incr("grinder_feed_drop_total", &[("symbol", "BTC-PERP")]);
        reg.incr("grinder_feed_drop_total", &[("symbol", "ETH-PERP")]);

        let rendered = render_text(&reg);
        assert_eq!(rendered.matches("# TYPE grinder_feed_drop_total counter").count(), 1);
        assert!(rendered.contains("grinder_feed_drop_total{symbol=\"BTC-PERP\"} 1"));
        assert!(rendered.contains("grinder_feed_drop_total{symbol=\"ETH-PERP\"} 1"));
    }

    #[test]
    fn render_text_is_deterministic_across_calls() {
        let reg = Registry::new();
        reg.incr("grinder_router_decision_total", &[("decision", "place"), ("reason", "none")]);
        reg.set("grinder_drawdown_pct", &[], 3.25);

        assert_eq!(render_text(&reg), render_text(&reg));
    }

    #[test]
    fn render_text_handles_no_label_series() {
        let reg = Registry::new();
        reg.set("grinder_kill_switch_triggered", &[], 0.0);
        let rendered = render_text(&reg);
        assert!(rendered.contains("grinder_kill_switch_triggered 0"));
    }

    #[test]
    fn escape_label_value_quotes_and_backslashes() {
        assert_eq!(escape_label_value("a\"b\\c"), "a\\\"b\\\\c");
    }
}
