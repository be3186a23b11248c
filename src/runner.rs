//! Campaign execution
//!
//! Entries run strictly one at a time in ID order. Each attempt produces a
//! [`ResultEntry`] that is written to the results file before the next
//! entry starts.

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::campaign::{Campaign, CampaignEntry};
use crate::client::{build_payload, PollOutcome, TaskClient};
use crate::results::{ResultEntry, ResultStatus, ResultStore};

/// Which entries of a campaign to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Ids(BTreeSet<u64>),
    /// Inclusive ID range.
    Range { start: u64, end: u64 },
    /// Entries of one test, matched case-insensitively.
    Name(String),
}

impl Selection {
    /// Parse `A-B` (or a single `A`) into an inclusive range.
    pub fn parse_range(text: &str) -> Result<Self> {
        let (start, end) = match text.split_once('-') {
            Some((a, b)) => (a.trim().parse::<u64>()?, b.trim().parse::<u64>()?),
            None => {
                let id = text.trim().parse::<u64>()?;
                (id, id)
            }
        };
        if start > end {
            return Err(anyhow!("Invalid range {}: start is after end", text));
        }
        Ok(Self::Range { start, end })
    }

    pub fn matches(&self, entry: &CampaignEntry) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&entry.id),
            Self::Range { start, end } => (*start..=*end).contains(&entry.id),
            Self::Name(name) => entry.name.eq_ignore_ascii_case(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub selection: Selection,
    /// Run entries already recorded as completed again.
    pub rerun: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            selection: Selection::All,
            rerun: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub skipped_completed: usize,
    pub completed: usize,
    pub polling_failed: usize,
    pub submission_failed: usize,
    pub errors: usize,
}

impl RunSummary {
    fn count(&mut self, status: ResultStatus) {
        match status {
            ResultStatus::Completed => self.completed += 1,
            ResultStatus::PollingFailed => self.polling_failed += 1,
            ResultStatus::SubmissionFailed => self.submission_failed += 1,
            ResultStatus::Error => self.errors += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.completed + self.polling_failed + self.submission_failed + self.errors
    }
}

/// Submit one entry and wait for its outcome. Never fails: every problem
/// ends up as a status in the returned record, stamped when the attempt
/// finished.
pub async fn run_entry(client: &TaskClient, entry: &CampaignEntry) -> ResultEntry {
    let mut record = attempt(client, entry).await;
    record.timestamp = Some(Utc::now());
    record
}

async fn attempt(client: &TaskClient, entry: &CampaignEntry) -> ResultEntry {
    let mut record = ResultEntry::new(
        ResultStatus::Error,
        &entry.name,
        entry.worker_1.name(),
        entry.worker_2.name(),
    );

    let payload = build_payload(entry, client.api());
    let task_id = match client.submit(&payload).await {
        Ok(Some(task_id)) => task_id,
        Ok(None) => {
            warn!("No task ID returned for test {}", entry.id);
            record.error = Some("No task ID in response".to_string());
            return record;
        }
        Err(e) => {
            warn!("Submission failed for test {}: {}", entry.id, e);
            record.status = ResultStatus::SubmissionFailed;
            record.error = Some(e.to_string());
            return record;
        }
    };

    let status_url = client.status_url(&task_id);
    record.task_id = Some(task_id);
    record.polling_url = Some(status_url.clone());

    match client.poll(&status_url).await {
        PollOutcome::Completed(result) if is_present(&result) => {
            record.status = ResultStatus::Completed;
            record.result = Some(result);
        }
        PollOutcome::Completed(_) => {
            record.status = ResultStatus::PollingFailed;
            record.error = Some("Task completed without a result".to_string());
        }
        PollOutcome::Failed(error) => {
            record.status = ResultStatus::PollingFailed;
            record.error = Some(match error {
                Some(Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => "Task failed".to_string(),
            });
        }
        PollOutcome::TimedOut => {
            record.status = ResultStatus::PollingFailed;
            record.error = Some("Polling timed out".to_string());
        }
        PollOutcome::Aborted(message) => {
            record.status = ResultStatus::PollingFailed;
            record.error = Some(message);
        }
    }
    record
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

pub struct CampaignRunner<'a> {
    client: &'a TaskClient,
    store: &'a mut ResultStore,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(client: &'a TaskClient, store: &'a mut ResultStore) -> Self {
        Self { client, store }
    }

    pub async fn run(&mut self, campaign: &Campaign, options: &RunOptions) -> Result<RunSummary> {
        self.run_with(campaign, options, |_, _| {}).await
    }

    /// Run the selected entries, calling `on_result` after each attempt has
    /// been persisted.
    pub async fn run_with<F>(
        &mut self,
        campaign: &Campaign,
        options: &RunOptions,
        mut on_result: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&CampaignEntry, &ResultEntry),
    {
        let mut summary = RunSummary::default();

        for entry in campaign
            .entries
            .iter()
            .filter(|e| options.selection.matches(e))
        {
            summary.selected += 1;

            if !options.rerun && self.store.is_completed(entry.id) {
                info!("Skipping test {}: already completed", entry.id);
                summary.skipped_completed += 1;
                continue;
            }

            info!(
                "Submitting test {} - {} ({} -> {})",
                entry.id,
                entry.name,
                entry.worker_1.name(),
                entry.worker_2.name()
            );
            let record = run_entry(self.client, entry).await;
            summary.count(record.status);
            self.store.record(entry.id, record.clone())?;
            on_result(entry, &record);
        }

        info!(
            "Run finished: {} attempted, {} completed, {} skipped",
            summary.attempted(),
            summary.completed,
            summary.skipped_completed
        );
        Ok(summary)
    }
}
