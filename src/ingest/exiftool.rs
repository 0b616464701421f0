use crate::ingest::util::run_command_with_optional_timeout;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Date format handed to exiftool so every tag value arrives in the
/// canonical separator layout the parser expects.
const DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("exiftool binary not found in config or PATH")]
    BinaryUnavailable(#[source] which::Error),
    #[error("exiftool failed on {path}: {detail}")]
    Tool { path: String, detail: String },
    #[error("exiftool did not finish: {0}")]
    Runner(String),
}

/// External metadata reader/writer. The pipeline only ever needs two
/// operations; failures on the read side degrade to the next date source,
/// failures on the write side are logged by the caller.
pub trait MetadataTool {
    fn read_date_tags(
        &self,
        path: &Path,
        tags: &[&str],
    ) -> Result<BTreeMap<String, String>, MetadataError>;

    fn write_date_tag(&self, path: &Path, tag: &str, value: &str) -> Result<(), MetadataError>;
}

/// `exiftool` driven as an opaque child process.
pub struct ExifTool {
    bin: PathBuf,
    timeout_secs: u64,
}

impl ExifTool {
    pub fn new(configured_bin: &str, timeout_secs: u64) -> Self {
        Self {
            bin: PathBuf::from(configured_bin),
            timeout_secs,
        }
    }

    fn resolve_bin(&self) -> Result<PathBuf, MetadataError> {
        if !self.bin.as_os_str().is_empty() && self.bin.exists() {
            return Ok(self.bin.clone());
        }
        which::which("exiftool").map_err(MetadataError::BinaryUnavailable)
    }

    fn run(&self, cmd: &mut Command, path: &Path) -> Result<std::process::Output, MetadataError> {
        let output = run_command_with_optional_timeout(cmd, Some(self.timeout_secs))
            .map_err(|err| MetadataError::Runner(format!("{err:#}")))?;
        if output.status.success() {
            return Ok(output);
        }
        Err(MetadataError::Tool {
            path: path.display().to_string(),
            detail: format!(
                "status {}\nstdout: {}\nstderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        })
    }
}

impl MetadataTool for ExifTool {
    fn read_date_tags(
        &self,
        path: &Path,
        tags: &[&str],
    ) -> Result<BTreeMap<String, String>, MetadataError> {
        let bin = self.resolve_bin()?;
        let mut cmd = Command::new(&bin);
        cmd.arg(path).arg("-dateFormat").arg(DATE_FORMAT);
        for tag in tags {
            cmd.arg(format!("-{tag}"));
        }
        cmd.arg("-S");

        let output = self.run(&mut cmd, path)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut out = BTreeMap::new();
        for line in stdout.lines() {
            let Some((tag, value)) = line.split_once(':') else {
                continue;
            };
            let tag = tag.trim();
            let value = value.trim();
            if !tag.is_empty() && !value.is_empty() {
                out.insert(tag.to_string(), value.to_string());
            }
        }
        Ok(out)
    }

    fn write_date_tag(&self, path: &Path, tag: &str, value: &str) -> Result<(), MetadataError> {
        let bin = self.resolve_bin()?;
        let mut cmd = Command::new(&bin);
        cmd.arg("-overwrite_original")
            .arg(format!("-{tag}={value}"))
            .arg(path);
        self.run(&mut cmd, path)?;
        Ok(())
    }
}
