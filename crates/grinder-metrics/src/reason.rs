use std::fmt;

/// Closed dictionary of reason codes referenced by metric labels and log
/// events. Every counter that carries a `reason`/`rule`/`check` label draws
/// its value from this enum; there is no free-text fallback, so a dashboard
/// built against this dictionary never has to account for unknown strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReasonCode {
    // FSM transition / action-blocked reasons
    None,
    DrawdownBreach,
    KillSwitchManual,
    KillSwitchDdBreach,
    KillSwitchOperator,
    ReconcileDirty,
    Degraded,
    OperatorOverride,
    ConfigReload,
    FeedStale,

    // Router decision reasons
    RouterPlace,
    RouterAmend,
    RouterCancel,
    RouterSkipNoChange,
    RouterSkipConstraint,
    RouterSkipFillProbBlock,
    RouterSkipCircuitBreaker,

    // Router constraint-check names
    CheckTickSize,
    CheckLotSize,
    CheckMinNotional,
    CheckMaxNotionalPerOrder,
    CheckMaxOrdersPerDay,
    CheckMaxNotionalPerDay,

    // Account-sync / reconcile mismatch rules (closed 4-rule set)
    DuplicateKey,
    TsRegression,
    NegativeQty,
    OrphanOrder,

    // Account-sync error reasons (adapter-level, not mismatch rules)
    AdapterError,
    StaleSnapshot,
    HttpError,

    // Transient I/O retry reason
    NetworkTimeout,
    Http5xx,
    Http429,
}

impl ReasonCode {
    /// Stable snake_case label value, matching Prometheus label conventions.
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::None => "none",
            ReasonCode::DrawdownBreach => "drawdown_breach",
            ReasonCode::KillSwitchManual => "kill_switch_manual",
            ReasonCode::KillSwitchDdBreach => "kill_switch_dd_breach",
            ReasonCode::KillSwitchOperator => "kill_switch_operator",
            ReasonCode::ReconcileDirty => "reconcile_dirty",
            ReasonCode::Degraded => "degraded",
            ReasonCode::OperatorOverride => "operator_override",
            ReasonCode::ConfigReload => "config_reload",
            ReasonCode::FeedStale => "feed_stale",

            ReasonCode::RouterPlace => "place",
            ReasonCode::RouterAmend => "amend",
            ReasonCode::RouterCancel => "cancel",
            ReasonCode::RouterSkipNoChange => "skip_no_change",
            ReasonCode::RouterSkipConstraint => "skip_constraint",
            ReasonCode::RouterSkipFillProbBlock => "skip_fill_prob_block",
            ReasonCode::RouterSkipCircuitBreaker => "skip_circuit_breaker",

            ReasonCode::CheckTickSize => "tick_size",
            ReasonCode::CheckLotSize => "lot_size",
            ReasonCode::CheckMinNotional => "min_notional",
            ReasonCode::CheckMaxNotionalPerOrder => "max_notional_per_order",
            ReasonCode::CheckMaxOrdersPerDay => "max_orders_per_day",
            ReasonCode::CheckMaxNotionalPerDay => "max_notional_per_day",

            ReasonCode::DuplicateKey => "duplicate_key",
            ReasonCode::TsRegression => "ts_regression",
            ReasonCode::NegativeQty => "negative_qty",
            ReasonCode::OrphanOrder => "orphan_order",

            ReasonCode::AdapterError => "adapter_error",
            ReasonCode::StaleSnapshot => "stale_snapshot",
            ReasonCode::HttpError => "http_error",

            ReasonCode::NetworkTimeout => "network_timeout",
            ReasonCode::Http5xx => "http_5xx",
            ReasonCode::Http429 => "http_429",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_sync_mismatch_rules_match_the_closed_four_rule_set() {
        let rules = [
            ReasonCode::DuplicateKey,
            ReasonCode::TsRegression,
            ReasonCode::NegativeQty,
            ReasonCode::OrphanOrder,
        ];
        let labels: Vec<&str> = rules.iter().map(|r| r.as_str()).collect();
        assert_eq!(
            labels,
            ["duplicate_key", "ts_regression", "negative_qty", "orphan_order"]
        );
    }

    #[test]
    fn as_str_is_snake_case_and_has_no_whitespace() {
        for code in [
            ReasonCode::DrawdownBreach,
            ReasonCode::RouterSkipFillProbBlock,
            ReasonCode::CheckMaxNotionalPerOrder,
        ] {
            let s = code.as_str();
            assert!(s.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
