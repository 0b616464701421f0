use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::ingest::config;
use crate::ingest::run;

pub fn run(config_path: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("ingest");

    let cfg = config::load_config(config_path)?;
    let outcome = run::run(&cfg)?;

    report.detail(format!("source={}", cfg.transfer.source_dir.display()));
    report.detail(format!("target={}", cfg.transfer.target_dir.display()));
    report.detail(format!(
        "mode={}",
        if cfg.transfer.move_files { "move" } else { "copy" }
    ));
    report.detail(format!("candidates={}", outcome.candidates));
    report.detail(format!(
        "files_processed={}",
        outcome.summary.files_processed
    ));
    report.detail(format!("dirs_created={}", outcome.summary.dirs_created));
    report.detail(format!("skipped_known={}", outcome.summary.skipped_known));
    report.detail(format!(
        "skipped_existing={}",
        outcome.summary.skipped_existing
    ));
    report.detail(format!("failed={}", outcome.summary.failed));
    report.detail(format!("ledger_entries={}", outcome.ledger_entries));
    for (dir, files) in &outcome.summary.placed {
        report.detail(format!("placed dir={} files={}", dir, files.join(",")));
    }
    for error in &outcome.file_errors {
        report.detail(format!("file_error {error}"));
    }

    Ok(report)
}
