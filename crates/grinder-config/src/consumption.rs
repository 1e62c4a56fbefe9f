/// Mirrors `grinder_safety::Mode`; kept separate so this crate does not
/// depend on the safety gate chain just to describe which config subtrees
/// a run mode reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Backtest,
    Paper,
    LiveTrade,
}

/// JSON pointers a given run mode is expected to read from the loaded
/// config. Used by config-hash tooling to report which part of the merged
/// config actually matters for a run, rather than the whole tree.
pub fn consumed_pointers(mode: RunMode) -> &'static [&'static str] {
    match mode {
        RunMode::Backtest => BACKTEST,
        RunMode::Paper => PAPER,
        RunMode::LiveTrade => LIVE_TRADE,
    }
}

static BACKTEST: &[&str] = &["/runtime/mode", "/data/timeframe", "/execution/slippage"];

static PAPER: &[&str] = &["/runtime/mode", "/broker", "/risk", "/execution"];

static LIVE_TRADE: &[&str] = &[
    "/runtime/mode",
    "/broker",
    "/risk",
    "/execution",
    "/integrity",
    "/reconcile",
];
