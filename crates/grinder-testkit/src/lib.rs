//! grinder-testkit (ambient, §8)
//!
//! Fixture loading and the end-to-end replay harness used to exercise the
//! determinism property: feeding the same ordered [`grinder_types::TickEvent`]
//! prefix through [`Orchestrator::run`] twice must yield a bit-identical
//! digest.

use anyhow::{Context, Result};
use grinder_types::TickEvent;
use std::fs;
use std::path::Path;

pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorReport, TickLogEntry};

/// Load a newline-delimited JSON fixture: one [`TickEvent`] per line, blank
/// lines and `#`-comments ignored. This is the `--fixture <path>` input
/// format (spec §6).
pub fn load_fixture_jsonl(path: impl AsRef<Path>) -> Result<Vec<TickEvent>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("read fixture: {}", path.display()))?;

    let mut out = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: TickEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: parse TickEvent", path.display(), lineno + 1))?;
        out.push(event);
    }

    for w in out.windows(2) {
        if w[0].ts_ms() > w[1].ts_ms() {
            anyhow::bail!("fixture not monotonic at ts_ms {} -> {}", w[0].ts_ms(), w[1].ts_ms());
        }
    }

    Ok(out)
}
