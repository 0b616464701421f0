use crate::error::ArchivistError;
use crate::ingest::config::ArchiveConfig;
use crate::ingest::exiftool::ExifTool;
use crate::ingest::ledger::{LEDGER_FILE_NAME, Ledger};
use crate::ingest::notify::{NotificationService, RunSummary, WebhookNotifier};
use crate::ingest::pathplan;
use crate::ingest::transfer::{CandidateFile, FileOutcome, TransferEngine};
use crate::ingest::util;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub candidates: usize,
    /// Ledger rows after the run finished.
    pub ledger_entries: u64,
    /// Per-file failures; these never abort the run.
    pub file_errors: Vec<String>,
}

fn collect_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            out.push(path);
            continue;
        }
        if path.is_dir() {
            collect_files(&path, out)?;
        }
    }
    Ok(())
}

/// Enumerate candidate files under the source root: regular files whose
/// extension belongs to a configured category. The ledger and its lock
/// file never qualify (their extensions are not media extensions).
fn enumerate_candidates(cfg: &ArchiveConfig) -> Result<Vec<CandidateFile>> {
    let allowed: BTreeSet<String> = pathplan::allowed_extensions(cfg).into_iter().collect();

    let mut files = Vec::new();
    collect_files(&cfg.transfer.source_dir, &mut files)?;
    files.sort();

    let mut out = Vec::new();
    for path in files {
        let Some(extension) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
        else {
            continue;
        };
        if !allowed.contains(&extension) {
            continue;
        }
        let mtime = util::mtime_epoch(&path)?;
        out.push(CandidateFile {
            source_path: path,
            extension,
            mtime,
        });
    }
    Ok(out)
}

fn apply_ownership(cfg: &ArchiveConfig) {
    let target = &cfg.transfer.target_dir;
    if !cfg.ownership.user.is_empty() && !cfg.ownership.group.is_empty() {
        let owner = format!("{}:{}", cfg.ownership.user, cfg.ownership.group);
        tracing::info!(owner = %owner, target = %target.display(), "setting ownership");
        match Command::new("chown").arg("-R").arg(&owner).arg(target).status() {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(%status, "chown failed; continuing"),
            Err(err) => tracing::warn!(error = %err, "chown could not run; continuing"),
        }
    }
    if !cfg.ownership.permissions.is_empty() {
        tracing::info!(mode = %cfg.ownership.permissions, target = %target.display(), "setting permissions");
        match Command::new("chmod")
            .arg("-R")
            .arg(&cfg.ownership.permissions)
            .arg(target)
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(%status, "chmod failed; continuing"),
            Err(err) => tracing::warn!(error = %err, "chmod could not run; continuing"),
        }
    }
}

fn run_success_hook(cfg: &ArchiveConfig) {
    let hook = cfg.hooks.exec_on_success.trim();
    if hook.is_empty() {
        return;
    }
    tracing::info!(command = hook, "running post-run hook");
    match Command::new("sh").arg("-c").arg(hook).status() {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(%status, "post-run hook failed; continuing"),
        Err(err) => tracing::warn!(error = %err, "post-run hook could not run; continuing"),
    }
}

pub fn ledger_path(cfg: &ArchiveConfig) -> PathBuf {
    cfg.transfer.source_dir.join(LEDGER_FILE_NAME)
}

/// Validate the configured roots. Fatal on failure: nothing has been
/// touched yet and the operator has to fix the config.
pub fn check_roots(cfg: &ArchiveConfig) -> Result<(), ArchivistError> {
    if !cfg.transfer.source_dir.is_dir() {
        return Err(ArchivistError::SourceRootInvalid(
            cfg.transfer.source_dir.display().to_string(),
        ));
    }
    if !cfg.transfer.target_dir.is_dir() {
        return Err(ArchivistError::TargetRootInvalid(
            cfg.transfer.target_dir.display().to_string(),
        ));
    }
    Ok(())
}

/// One full ingestion run: busy gate, enumeration, sequential per-file
/// processing, then the post-run collaborators.
pub fn run(cfg: &ArchiveConfig) -> Result<RunOutcome> {
    check_roots(cfg)?;

    let ledger = Ledger::open(&ledger_path(cfg), cfg.pacing.ledger_min_idle_secs)?;
    let candidates = enumerate_candidates(cfg)?;
    tracing::info!(
        source = %cfg.transfer.source_dir.display(),
        target = %cfg.transfer.target_dir.display(),
        candidates = candidates.len(),
        "starting transfer"
    );

    let exiftool = ExifTool::new(&cfg.exiftool.bin, cfg.exiftool.timeout_secs);
    let engine = TransferEngine::new(cfg, &ledger, &exiftool);

    let mut outcome = RunOutcome {
        candidates: candidates.len(),
        ..RunOutcome::default()
    };

    for candidate in &candidates {
        match engine.process(candidate, &mut outcome.summary) {
            Ok(FileOutcome::AlreadyKnown) => outcome.summary.skipped_known += 1,
            Ok(FileOutcome::SkippedExisting { target }) => {
                outcome.summary.skipped_existing += 1;
                tracing::debug!(target = %target.display(), "left existing target untouched");
            }
            Ok(FileOutcome::Transferred { target }) => {
                tracing::debug!(target = %target.display(), "transferred");
            }
            Err(err) => {
                outcome.summary.failed += 1;
                let detail = format!("{}: {err:#}", candidate.source_path.display());
                tracing::error!(file = %candidate.source_path.display(), error = %err, "file failed");
                outcome.file_errors.push(detail);
            }
        }
    }

    outcome.ledger_entries = ledger.entry_count()?;

    if outcome.summary.changed_anything() {
        apply_ownership(cfg);
        run_success_hook(cfg);
    }

    if let Some(notifier) = WebhookNotifier::from_config(cfg) {
        if let Err(err) = notifier.notify(&outcome.summary) {
            tracing::warn!(error = %err, "run notification failed; continuing");
        }
    }

    Ok(outcome)
}
