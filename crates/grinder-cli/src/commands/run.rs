//! `grinder run start` — print run attribution (run_id, git_hash,
//! config_hash, host_fingerprint) and initialize the evidence/exports
//! directory for a new run. No database: GRINDER's persisted state is the
//! small atomic JSON files under `--state-dir` plus the evidence tree under
//! `$ARTIFACT_DIR`.

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use super::{git_hash, host_fingerprint};

pub fn run_start(engine: String, mode: String, config_paths: Vec<String>, exports_root: String) -> Result<()> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = grinder_config::load_layered_yaml(&path_refs)?;

    let git = git_hash().unwrap_or_else(|| "UNKNOWN".to_string());
    let host_fp = host_fingerprint();
    let run_id = derive_cli_run_id(&engine, &mode, &loaded.config_hash, &git);

    let art = grinder_artifacts::init_run_artifacts(grinder_artifacts::InitRunArtifactsArgs {
        exports_root: Path::new(&exports_root),
        schema_version: 1,
        run_id,
        engine_id: &engine,
        mode: &mode,
        git_hash: &git,
        config_hash: &loaded.config_hash,
        host_fingerprint: &host_fp,
    })?;

    println!("run_id={run_id}");
    println!("engine_id={engine}");
    println!("mode={mode}");
    println!("git_hash={git}");
    println!("config_hash={}", loaded.config_hash);
    println!("host_fingerprint={host_fp}");
    println!("run_dir={}", art.run_dir.display());

    Ok(())
}

/// Deterministic run id: `Uuid::new_v5` over engine/mode/config/git — no
/// RNG, no wall clock, so two operators launching the same artifact compute
/// the same id.
fn derive_cli_run_id(engine_id: &str, mode: &str, config_hash: &str, git_hash: &str) -> Uuid {
    let data = format!("grinder-cli.run.v1|{engine_id}|{mode}|{config_hash}|{git_hash}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
}
