use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::commands::CommandReport;

#[derive(Debug, Parser)]
#[command(
    name = "archivist",
    version,
    about = "Ingests media files into a date-partitioned archive tree, exactly once each"
)]
struct Cli {
    /// Config file (default: ~/.archivist/archivist.toml, or
    /// ARCHIVIST_CONFIG_PATH)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the command report as JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run one ingestion pass over the source tree
    Ingest,
    /// Report ledger and configuration state without changing anything
    Status,
    /// Write a commented default config file
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Destructively wipe the source tree, ledger included (asks for
    /// confirmation)
    WipeSource,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "[{}] {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        eprintln!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let report = match cli.command {
        CliCommand::Ingest => commands::ingest::run(config)?,
        CliCommand::Status => commands::status::run(config)?,
        CliCommand::InitConfig { force } => commands::init_config::run(config, force)?,
        CliCommand::WipeSource => commands::wipe_source::run(config)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        bail!("{} reported issues", report.command);
    }
    Ok(())
}
