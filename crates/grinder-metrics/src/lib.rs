//! Fixed counter/gauge registry and closed reason-code dictionary.
//!
//! Every decision point in the engine (FSM transitions, router decisions,
//! account-sync reconciliation, port order attempts) reports through the
//! same handful of typed methods on [`Metrics`] rather than touching the
//! registry directly, so the metric surface stays exactly the set
//! enumerated here — no ad hoc series appear at a random call site.

mod export;
mod reason;
mod registry;

pub use export::render_text;
pub use reason::ReasonCode;
pub use registry::Registry;

use std::sync::Arc;

/// Typed façade over [`Registry`]. Cheap to clone (`Arc` inside); one
/// instance is created per engine and handed to every worker.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }

    /// Access the underlying registry, e.g. to render the text-exposition
    /// format for `--metrics-port`.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // -- FSM -----------------------------------------------------------

    pub fn fsm_current_state(&self, state: &str) {
        // Gauge-per-label-value pattern: set the active state to 1 and do
        // not clear prior states here; callers set all known states once
        // per tick so stale series read back as whatever they were last set to.
        self.registry
            .set("grinder_fsm_current_state", &[("state", state)], 1.0);
    }

    pub fn fsm_state_duration_seconds(&self, seconds: f64) {
        self.registry
            .set("grinder_fsm_state_duration_seconds", &[], seconds);
    }

    pub fn fsm_transitions_total(&self, from: &str, to: &str, reason: ReasonCode) {
        self.registry.incr(
            "grinder_fsm_transitions_total",
            &[("from", from), ("to", to), ("reason", reason.as_str())],
        );
    }

    pub fn fsm_action_blocked_total(&self, state: &str, intent: &str) {
        self.registry.incr(
            "grinder_fsm_action_blocked_total",
            &[("state", state), ("intent", intent)],
        );
    }

    // -- Risk / kill-switch ---------------------------------------------

    pub fn drawdown_pct(&self, pct: f64) {
        self.registry.set("grinder_drawdown_pct", &[], pct);
    }

    pub fn kill_switch_triggered(&self, triggered: bool) {
        self.registry
            .set("grinder_kill_switch_triggered", &[], if triggered { 1.0 } else { 0.0 });
    }

    // -- Account sync / reconcile -----------------------------------------

    pub fn account_sync_age_seconds(&self, seconds: f64) {
        self.registry
            .set("grinder_account_sync_age_seconds", &[], seconds);
    }

    pub fn account_sync_errors_total(&self, reason: ReasonCode) {
        self.registry
            .incr("grinder_account_sync_errors_total", &[("reason", reason.as_str())]);
    }

    /// `rule` must be one of the closed four-rule reconcile mismatch set:
    /// `duplicate_key`, `ts_regression`, `negative_qty`, `orphan_order`.
    pub fn account_sync_mismatches_total(&self, rule: ReasonCode) {
        self.registry
            .incr("grinder_account_sync_mismatches_total", &[("rule", rule.as_str())]);
    }

    // -- Router -----------------------------------------------------------

    pub fn router_fill_prob_enforce_enabled(&self, enabled: bool) {
        self.registry.set(
            "grinder_router_fill_prob_enforce_enabled",
            &[],
            if enabled { 1.0 } else { 0.0 },
        );
    }

    pub fn router_decision_total(&self, decision: ReasonCode, reason: ReasonCode) {
        self.registry.incr(
            "grinder_router_decision_total",
            &[("decision", decision.as_str()), ("reason", reason.as_str())],
        );
    }

    pub fn router_amend_savings_total(&self) {
        self.registry.incr("grinder_router_amend_savings_total", &[]);
    }

    pub fn router_constraint_violations_total(&self, check: ReasonCode) {
        self.registry
            .incr("grinder_router_constraint_violations_total", &[("check", check.as_str())]);
    }

    pub fn router_fill_prob_blocks_total(&self) {
        self.registry.incr("grinder_router_fill_prob_blocks_total", &[]);
    }

    pub fn router_fill_prob_cb_trips_total(&self) {
        self.registry.incr("grinder_router_fill_prob_cb_trips_total", &[]);
    }

    // -- Port / exchange I/O -----------------------------------------------

    pub fn port_order_attempts_total(&self, port: &str, op: &str) {
        self.registry
            .incr("grinder_port_order_attempts_total", &[("port", port), ("op", op)]);
    }

    pub fn port_http_requests_total(&self, port: &str, op: &str) {
        self.registry
            .incr("grinder_port_http_requests_total", &[("port", port), ("op", op)]);
    }

    // -- Feed / feature ingestion ------------------------------------------

    pub fn feed_drop_total(&self, symbol: &str) {
        self.registry.incr("grinder_feed_drop_total", &[("symbol", symbol)]);
    }

    pub fn feature_inconsistent_total(&self, symbol: &str) {
        self.registry
            .incr("grinder_feature_inconsistent_total", &[("symbol", symbol)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsm_transitions_total_labels_carry_through_to_the_registry() {
        let m = Metrics::new();
        m.fsm_transitions_total("ARMED", "LIVE", ReasonCode::None);
        assert_eq!(
            m.registry().counter_value(
                "grinder_fsm_transitions_total",
                &[("from", "ARMED"), ("to", "LIVE"), ("reason", "none")]
            ),
            1
        );
    }

    #[test]
    fn account_sync_mismatches_total_accepts_all_four_closed_rules() {
        let m = Metrics::new();
        for rule in [
            ReasonCode::DuplicateKey,
            ReasonCode::TsRegression,
            ReasonCode::NegativeQty,
            ReasonCode::OrphanOrder,
        ] {
            m.account_sync_mismatches_total(rule);
        }
        for rule in ["duplicate_key", "ts_regression", "negative_qty", "orphan_order"] {
            assert_eq!(
                m.registry()
                    .counter_value("grinder_account_sync_mismatches_total", &[("rule", rule)]),
                1
            );
        }
    }

    #[test]
    fn drawdown_pct_and_kill_switch_triggered_are_gauges() {
        let m = Metrics::new();
        m.drawdown_pct(4.5);
        m.kill_switch_triggered(true);
        assert_eq!(m.registry().gauge_value("grinder_drawdown_pct", &[]), Some(4.5));
        assert_eq!(
            m.registry().gauge_value("grinder_kill_switch_triggered", &[]),
            Some(1.0)
        );
    }

    #[test]
    fn metrics_clone_shares_the_same_underlying_registry() {
        let m = Metrics::new();
        let clone = m.clone();
        clone.router_amend_savings_total();
        assert_eq!(
            m.registry().counter_value("grinder_router_amend_savings_total", &[]),
            1
        );
    }

    #[test]
    fn render_text_reflects_metrics_recorded_through_the_facade() {
        let m = Metrics::new();
        m.feed_drop_total("BTC-PERP");
        let rendered = crate::render_text(m.registry());
        assert!(rendered.contains("grinder_feed_drop_total{symbol=\"BTC-PERP\"} 1"));
    }
}
