use crate::ingest::config::ArchiveConfig;
use crate::ingest::datetime::{self, ResolvedDate};
use crate::ingest::exiftool::MetadataTool;
use crate::ingest::ledger::Ledger;
use crate::ingest::notify::RunSummary;
use crate::ingest::pathplan;
use crate::ingest::util;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// One file found during enumeration. The mtime is captured at scan time
/// and is what the ledger entry will carry.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub source_path: PathBuf,
    pub extension: String,
    pub mtime: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Ledger already has this path with this mtime; nothing to do.
    AlreadyKnown,
    Transferred {
        target: PathBuf,
    },
    /// Target existed and overwrite is disabled; the file is still
    /// recorded as known so it is not re-examined every run.
    SkippedExisting {
        target: PathBuf,
    },
}

/// Drives one file through the pipeline: staleness check, age wait, date
/// resolution, path construction, transfer, optional metadata backfill,
/// ledger commit. Failures abort only the file at hand.
pub struct TransferEngine<'a> {
    cfg: &'a ArchiveConfig,
    ledger: &'a Ledger,
    metadata: &'a dyn MetadataTool,
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
                fs::remove_file(from)
                    .with_context(|| format!("failed to remove {}", from.display()))?;
                Ok(())
            } else {
                Err(rename_err).with_context(|| {
                    format!("failed to move {} to {}", from.display(), to.display())
                })
            }
        }
    }
}

impl<'a> TransferEngine<'a> {
    pub fn new(cfg: &'a ArchiveConfig, ledger: &'a Ledger, metadata: &'a dyn MetadataTool) -> Self {
        Self {
            cfg,
            ledger,
            metadata,
        }
    }

    /// Block until the file has stopped changing for at least the
    /// configured minimum age. This is the only deliberate wait in the
    /// pipeline; a file that keeps being written holds up its own
    /// processing indefinitely.
    fn wait_until_settled(&self, path: &Path) -> Result<()> {
        loop {
            let age = util::file_age_secs(path)?;
            if age >= self.cfg.pacing.min_file_age_secs {
                return Ok(());
            }
            tracing::debug!(
                path = %path.display(),
                age_secs = age,
                min_age_secs = self.cfg.pacing.min_file_age_secs,
                "file still settling, waiting"
            );
            thread::sleep(Duration::from_secs(1));
        }
    }

    fn backfill_date(&self, target: &Path, date: &ResolvedDate) {
        match self
            .metadata
            .write_date_tag(target, "CreateDate", &date.exif_stamp())
        {
            Ok(_) => {
                tracing::info!(target = %target.display(), "wrote CreateDate into target file");
            }
            Err(err) => {
                tracing::warn!(
                    target = %target.display(),
                    error = %err,
                    "date backfill failed; transfer and ledger entry stand"
                );
            }
        }
    }

    pub fn process(
        &self,
        candidate: &CandidateFile,
        summary: &mut RunSummary,
    ) -> Result<FileOutcome> {
        let source = candidate.source_path.as_path();
        let source_key = source.display().to_string();

        if self.ledger.known(&source_key, candidate.mtime)? {
            return Ok(FileOutcome::AlreadyKnown);
        }

        tracing::info!(file = %source.display(), "ingesting");
        self.wait_until_settled(source)?;

        let date = datetime::resolve(source, self.metadata);
        let target_dir = pathplan::build_target_dir(self.cfg, &date, &candidate.extension);
        let target_name =
            pathplan::build_file_name(&date, source, self.cfg.transfer.rename_files);
        let target = target_dir.join(&target_name);

        if !target_dir.is_dir() {
            fs::create_dir_all(&target_dir)
                .with_context(|| format!("failed to create {}", target_dir.display()))?;
            summary.dirs_created += 1;
        }

        let outcome = if target.exists() && !self.cfg.transfer.overwrite_existing {
            tracing::info!(
                target = %target.display(),
                "target exists and overwrite is disabled, skipping transfer"
            );
            FileOutcome::SkippedExisting { target }
        } else {
            if self.cfg.transfer.move_files {
                tracing::info!(from = %source.display(), to = %target.display(), "moving");
                move_file(source, &target)?;
            } else {
                tracing::info!(from = %source.display(), to = %target.display(), "copying");
                fs::copy(source, &target).with_context(|| {
                    format!("failed to copy {} to {}", source.display(), target.display())
                })?;
            }

            if date.synthesized {
                self.backfill_date(&target, &date);
            }

            summary.files_processed += 1;
            let relative_dir = target_dir
                .strip_prefix(&self.cfg.transfer.target_dir)
                .unwrap_or(&target_dir)
                .display()
                .to_string();
            summary.record_placement(relative_dir, target_name);
            FileOutcome::Transferred { target }
        };

        // Always recorded after the transfer attempt, with the mtime seen
        // at enumeration. If this write fails the file stays unknown and
        // the next run retries it; a retried file whose target already
        // exists lands in the skip-and-record path, so retries converge.
        self.ledger.record(&source_key, candidate.mtime)?;

        Ok(outcome)
    }
}
