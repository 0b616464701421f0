use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::ingest::config;

const CONFIRMATION: &str = "YES";
const GRACE_SECS: u64 = 5;

/// Destructive maintenance: wipes the whole source tree, ledger
/// included, then recreates the empty root. Demands the literal `YES` on
/// stdin and waits five seconds before touching anything.
pub fn run(config_path: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("wipe-source");

    let cfg = config::load_config(config_path)?;
    let source = &cfg.transfer.source_dir;

    if source.as_os_str().is_empty() || source == Path::new("/") {
        report.issue(format!(
            "refusing to wipe source dir `{}`",
            source.display()
        ));
        return Ok(report);
    }
    if !source.is_dir() {
        report.issue(format!(
            "source dir {} does not exist; nothing to wipe",
            source.display()
        ));
        return Ok(report);
    }

    print!(
        "Wipe source tree '{}' including the ledger. To proceed type '{CONFIRMATION}': ",
        source.display()
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    if answer.trim_end() != CONFIRMATION {
        report.detail("aborted: confirmation not given");
        return Ok(report);
    }

    println!("Starting in {GRACE_SECS} seconds ...");
    thread::sleep(Duration::from_secs(GRACE_SECS));

    fs::remove_dir_all(source)
        .with_context(|| format!("failed to remove {}", source.display()))?;
    fs::create_dir_all(source)
        .with_context(|| format!("failed to recreate {}", source.display()))?;

    report.detail(format!("wiped {}", source.display()));
    Ok(report)
}
