use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::ingest::config;
use crate::ingest::ledger;
use crate::ingest::run::ledger_path;

pub fn run(config_path: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    let cfg = config::load_config(config_path)?;
    report.detail(format!("source={}", cfg.transfer.source_dir.display()));
    report.detail(format!("target={}", cfg.transfer.target_dir.display()));
    report.detail(format!("source_exists={}", cfg.transfer.source_dir.is_dir()));
    report.detail(format!("target_exists={}", cfg.transfer.target_dir.is_dir()));

    let db = ledger_path(&cfg);
    report.detail(format!("ledger={}", db.display()));
    match ledger::inspect(&db)? {
        Some(stats) => {
            report.detail(format!("ledger.entries={}", stats.entries));
            report.detail(format!("ledger.schema_version={}", stats.schema_version));
            report.detail(format!("ledger.idle_secs={}", stats.idle_secs));
            report.detail(format!(
                "ledger.idle={}",
                stats.idle_secs >= cfg.pacing.ledger_min_idle_secs
            ));
        }
        None => {
            report.detail("ledger.entries=0");
            report.detail("ledger.exists=false");
        }
    }

    Ok(report)
}
