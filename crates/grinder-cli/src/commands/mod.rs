//! Command handler modules for the `grinder` CLI.
//!
//! Shared utilities used by multiple command paths live here. Command-
//! specific logic lives in the submodules.

pub mod core;
pub mod run;

use anyhow::Result;
use grinder_config::consumption::RunMode;

/// Parse a CLI `--mode` string into a [`RunMode`].
pub fn parse_run_mode(mode: &str) -> Result<RunMode> {
    match mode.trim().to_uppercase().as_str() {
        "BACKTEST" => Ok(RunMode::Backtest),
        "PAPER" => Ok(RunMode::Paper),
        "LIVE_TRADE" | "LIVE" => Ok(RunMode::LiveTrade),
        other => anyhow::bail!("invalid --mode '{}'. expected one of: BACKTEST | PAPER | LIVE_TRADE", other),
    }
}

/// Best-effort git hash (short). Falls back to `"UNKNOWN"` at call sites.
pub fn git_hash() -> Option<String> {
    let out = std::process::Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    Some(s.trim().to_string())
}

/// Stable-ish, non-sensitive host fingerprint for run attribution. Not a
/// hardware id — just enough to distinguish machines in logs.
pub fn host_fingerprint() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "UNKNOWN_HOST".to_string());
    let username = std::env::var("USER").unwrap_or_else(|_| "UNKNOWN_USER".to_string());
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("{hostname}|{username}|{os}|{arch}")
}

/// Read a comma-separated `--symbols` argument into a cleaned `Vec<String>`.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_ascii_uppercase).collect()
}

/// UTC day stamp in `YYYY-MM-DD`, used both for budget rollover and evidence
/// directory stamping.
pub fn today_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

pub fn utc_stamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}
