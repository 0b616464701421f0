use anyhow::{Result, anyhow};
use std::fs;
use std::path::Path;

use crate::commands::CommandReport;
use crate::ingest::config;

pub fn run(config_path: Option<&Path>, force: bool) -> Result<CommandReport> {
    let mut report = CommandReport::new("init-config");

    let Some(path) = config::resolve_config_path(config_path) else {
        return Err(anyhow!("could not resolve a config path (no home directory)"));
    };

    if path.exists() && !force {
        report.issue(format!(
            "config {} already exists; pass --force to overwrite",
            path.display()
        ));
        return Ok(report);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, config::default_config_toml())?;

    report.detail(format!("wrote {}", path.display()));
    report.detail("edit source_dir and target_dir before the first run");
    Ok(report)
}
