//! Persisted order-budget counters (spec §6 "Persisted state").
//!
//! `{orders_today, notional_today_usd_scaled, day_stamp}`, written with the
//! temp-file-then-rename pattern so a crash mid-write never leaves a
//! corrupt budget file behind. Resets when `day_stamp` no longer matches
//! today or the operator passes `--reset-budget`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetState {
    pub day_stamp: String,
    pub orders_today: u32,
    pub notional_today_usd_scaled: i64,
}

impl BudgetState {
    pub fn fresh(day_stamp: impl Into<String>) -> Self {
        Self { day_stamp: day_stamp.into(), orders_today: 0, notional_today_usd_scaled: 0 }
    }

    pub fn record_order(&mut self, notional_usd_scaled: i64) {
        self.orders_today += 1;
        self.notional_today_usd_scaled += notional_usd_scaled;
    }
}

/// Load the budget file at `path`, rolling it over to a fresh state if its
/// `day_stamp` doesn't match `today` or `reset` was requested. Missing file
/// is treated the same as a rollover.
pub fn load_or_reset(path: &Path, today: &str, reset: bool) -> Result<BudgetState> {
    if reset {
        return Ok(BudgetState::fresh(today));
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BudgetState::fresh(today)),
        Err(e) => return Err(e).with_context(|| format!("read budget state: {}", path.display())),
    };

    let state: BudgetState =
        serde_json::from_str(&raw).with_context(|| format!("parse budget state: {}", path.display()))?;

    if state.day_stamp != today {
        Ok(BudgetState::fresh(today))
    } else {
        Ok(state)
    }
}

/// Atomically persist `state` to `path`: write to a sibling temp file, then
/// rename over the target. A reader never observes a partially written file.
pub fn save_atomic(path: &Path, state: &BudgetState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create budget dir: {}", parent.display()))?;
        }
    }

    let tmp_path: PathBuf = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(state).context("serialize budget state")?;
    {
        let mut f = fs::File::create(&tmp_path).with_context(|| format!("create temp budget file: {}", tmp_path.display()))?;
        f.write_all(json.as_bytes()).context("write temp budget file")?;
        f.sync_all().context("fsync temp budget file")?;
    }
    fs::rename(&tmp_path, path).with_context(|| format!("rename budget file into place: {}", path.display()))?;
    Ok(())
}
