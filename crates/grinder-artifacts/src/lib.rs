use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub engine_id: String,
    pub mode: String,
    pub git_hash: String,
    pub config_hash: String,
    pub host_fingerprint: String,
    pub created_at_utc: DateTime<Utc>,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub audit_jsonl: String,
    pub manifest_json: String,
    pub orders_csv: String,
    pub fills_csv: String,
    pub equity_curve_csv: String,
    pub metrics_json: String,
}

pub struct InitRunArtifactsArgs<'a> {
    pub exports_root: &'a Path, // e.g. ../exports
    pub schema_version: i32,
    pub run_id: Uuid,
    pub engine_id: &'a str,
    pub mode: &'a str,
    pub git_hash: &'a str,
    pub config_hash: &'a str,
    pub host_fingerprint: &'a str,
}

pub struct InitRunArtifactsResult {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

pub fn init_run_artifacts(args: InitRunArtifactsArgs<'_>) -> Result<InitRunArtifactsResult> {
    // exports/<run_id>/
    let run_dir = args.exports_root.join(args.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    // Create placeholder files if missing (do not overwrite existing).
    ensure_file_exists_with(&run_dir.join("audit.jsonl"), "")?;
    ensure_file_exists_with(
        &run_dir.join("orders.csv"),
        "ts_utc,order_id,symbol,side,qty,order_type,limit_price,stop_price,status\n",
    )?;
    ensure_file_exists_with(
        &run_dir.join("fills.csv"),
        "ts_utc,fill_id,order_id,symbol,side,qty,price,fee\n",
    )?;
    ensure_file_exists_with(&run_dir.join("equity_curve.csv"), "ts_utc,equity\n")?;
    ensure_file_exists_with(&run_dir.join("metrics.json"), "{}\n")?;

    // Write manifest.json (overwrite is OK; it's deterministic for a run start).
    let manifest = RunManifest {
        schema_version: args.schema_version,
        run_id: args.run_id,
        engine_id: args.engine_id.to_string(),
        mode: args.mode.to_string(),
        git_hash: args.git_hash.to_string(),
        config_hash: args.config_hash.to_string(),
        host_fingerprint: args.host_fingerprint.to_string(),
        created_at_utc: Utc::now(),
        artifacts: ArtifactList {
            audit_jsonl: "audit.jsonl".to_string(),
            manifest_json: "manifest.json".to_string(),
            orders_csv: "orders.csv".to_string(),
            fills_csv: "fills.csv".to_string(),
            equity_curve_csv: "equity_curve.csv".to_string(),
            metrics_json: "metrics.json".to_string(),
        },
    };

    let manifest_path = run_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest).context("serialize manifest failed")?;
    fs::write(&manifest_path, format!("{json}\n"))
        .with_context(|| format!("write manifest failed: {}", manifest_path.display()))?;

    Ok(InitRunArtifactsResult {
        run_dir,
        manifest_path,
    })
}

fn ensure_file_exists_with(path: &Path, contents_if_create: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents_if_create)
        .with_context(|| format!("create placeholder failed: {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Evidence directories (fsm halts, account-sync mismatches)
// ---------------------------------------------------------------------------

/// One timestamped evidence directory under `$ARTIFACT_DIR/<kind>/<utc_stamp>/`.
///
/// `kind` is typically `"fsm"` or `"account_sync"`. The caller supplies
/// `utc_stamp` (no wall-clock read happens in this crate, so the same inputs
/// always produce the same directory) along with a human-readable
/// `summary.txt` body and the set of component JSON files to embed.
pub struct WriteEvidenceArgs<'a> {
    pub artifact_root: &'a Path,
    pub kind: &'a str,
    pub utc_stamp: &'a str,
    pub summary: &'a str,
    pub files: &'a [(&'a str, &'a str)],
}

pub struct EvidenceDirResult {
    pub dir: PathBuf,
    pub sha256sums_path: PathBuf,
}

/// Write an evidence directory: `summary.txt`, every named component file,
/// and a `sha256sums.txt` manifest covering all of them.
///
/// Mirrors [`init_run_artifacts`]'s manifest-hashing approach, scoped to a
/// single timestamped directory instead of a whole run.
pub fn write_evidence_dir(args: WriteEvidenceArgs<'_>) -> Result<EvidenceDirResult> {
    let dir = args.artifact_root.join(args.kind).join(args.utc_stamp);
    fs::create_dir_all(&dir)
        .with_context(|| format!("create evidence dir failed: {}", dir.display()))?;

    fs::write(dir.join("summary.txt"), args.summary)
        .with_context(|| format!("write summary.txt failed in {}", dir.display()))?;

    let mut names: Vec<&str> = vec!["summary.txt"];
    for (name, content) in args.files {
        fs::write(dir.join(name), content)
            .with_context(|| format!("write {name} failed in {}", dir.display()))?;
        names.push(name);
    }
    names.sort();

    let mut sums = String::new();
    for name in &names {
        let bytes = fs::read(dir.join(name))
            .with_context(|| format!("read {name} back for hashing in {}", dir.display()))?;
        let hash = hex::encode(Sha256::digest(&bytes));
        sums.push_str(&format!("{hash}  {name}\n"));
    }
    let sha256sums_path = dir.join("sha256sums.txt");
    fs::write(&sha256sums_path, sums)
        .with_context(|| format!("write sha256sums.txt failed in {}", dir.display()))?;

    Ok(EvidenceDirResult {
        dir,
        sha256sums_path,
    })
}

/// Outcome of [`verify_evidence_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceVerifyResult {
    /// Every file listed in `sha256sums.txt` matches its recorded digest.
    Valid { files: usize },
    /// A listed file is missing, unreadable, or its digest no longer matches.
    Mismatch { file: String, reason: String },
}

/// Re-hash every file named in `<dir>/sha256sums.txt` and compare against the
/// recorded digest. Read-only; used to detect tampering with evidence after
/// the fact.
pub fn verify_evidence_dir(dir: &Path) -> Result<EvidenceVerifyResult> {
    let manifest_path = dir.join("sha256sums.txt");
    let manifest = fs::read_to_string(&manifest_path)
        .with_context(|| format!("read sha256sums.txt failed: {}", manifest_path.display()))?;

    let mut count = 0usize;
    for line in manifest.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((expected_hash, name)) = line.split_once("  ") else {
            return Ok(EvidenceVerifyResult::Mismatch {
                file: line.to_string(),
                reason: "malformed sha256sums.txt line".to_string(),
            });
        };

        let file_path = dir.join(name);
        let bytes = match fs::read(&file_path) {
            Ok(b) => b,
            Err(e) => {
                return Ok(EvidenceVerifyResult::Mismatch {
                    file: name.to_string(),
                    reason: format!("unreadable: {e}"),
                })
            }
        };
        let actual_hash = hex::encode(Sha256::digest(&bytes));
        if actual_hash != expected_hash {
            return Ok(EvidenceVerifyResult::Mismatch {
                file: name.to_string(),
                reason: format!("digest mismatch: recorded {expected_hash}, actual {actual_hash}"),
            });
        }
        count += 1;
    }

    Ok(EvidenceVerifyResult::Valid { files: count })
}
