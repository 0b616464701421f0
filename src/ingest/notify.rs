use crate::ingest::config::ArchiveConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// What a single run did, handed to the notification service at the end
/// and echoed in the command report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_processed: u64,
    pub dirs_created: u64,
    pub skipped_known: u64,
    pub skipped_existing: u64,
    pub failed: u64,
    /// Target directory (relative to the target root) → filenames placed
    /// there this run.
    pub placed: BTreeMap<String, Vec<String>>,
}

impl RunSummary {
    pub fn record_placement(&mut self, relative_dir: String, file_name: String) {
        self.placed.entry(relative_dir).or_default().push(file_name);
    }

    /// The post-run collaborators (ownership pass, success hook) only run
    /// when the run changed something.
    pub fn changed_anything(&self) -> bool {
        self.files_processed > 0 || self.dirs_created > 0
    }
}

pub trait NotificationService {
    fn notify(&self, summary: &RunSummary) -> Result<()>;
}

/// Posts the run summary as JSON to a configured webhook. Rendering the
/// payload into mail or chat is the receiver's concern.
pub struct WebhookNotifier {
    url: String,
    timeout_secs: u64,
}

impl WebhookNotifier {
    pub fn from_config(cfg: &ArchiveConfig) -> Option<Self> {
        let url = cfg.notify.url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            timeout_secs: cfg.notify.timeout_secs,
        })
    }
}

impl NotificationService for WebhookNotifier {
    fn notify(&self, summary: &RunSummary) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("failed to build notification client")?;
        client
            .post(&self.url)
            .json(summary)
            .send()
            .with_context(|| format!("failed to post run summary to {}", self.url))?
            .error_for_status()
            .with_context(|| format!("run summary rejected by {}", self.url))?;
        Ok(())
    }
}
