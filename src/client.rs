//! Task API client
//!
//! One POST submits a test tree run; the returned task is then polled at a
//! fixed interval until it completes, fails, or the timeout elapses. There
//! is no retry: a transport error ends polling for that task.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::campaign::CampaignEntry;
use crate::config::{ApiConfig, PollConfig};
use crate::expand::CONTROLLER_CONF_KEY;

/// Body of a task submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub master: String,
    #[serde(rename = "first-worker")]
    pub first_worker: String,
    #[serde(rename = "second-worker")]
    pub second_worker: String,
    pub repository: String,
    #[serde(rename = "tests-tree")]
    pub tests_tree: String,
    pub variables: Value,
}

/// Build the submission payload for one campaign entry.
///
/// Each worker's variables are its own fields, then the controller
/// configuration file, then every other parameter (shared by both workers).
pub fn build_payload(entry: &CampaignEntry, api: &ApiConfig) -> TaskPayload {
    let controller_conf = entry
        .parameters
        .get(CONTROLLER_CONF_KEY)
        .cloned()
        .unwrap_or(Value::Null);
    let shared: Map<String, Value> = entry
        .parameters
        .iter()
        .filter(|(key, _)| key.as_str() != CONTROLLER_CONF_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let worker_variables = |fields: Map<String, Value>| {
        let mut vars = fields;
        vars.insert(CONTROLLER_CONF_KEY.to_string(), controller_conf.clone());
        for (key, value) in &shared {
            vars.insert(key.clone(), value.clone());
        }
        Value::Object(vars)
    };

    TaskPayload {
        master: api.master.clone(),
        first_worker: worker_host(entry.worker_1.name(), api),
        second_worker: worker_host(entry.worker_2.name(), api),
        repository: api.repository.clone(),
        tests_tree: format!("{}.png", entry.name),
        variables: json!({
            "Root": {
                "Worker_1": worker_variables(entry.worker_1.to_fields()),
                "Worker_2": worker_variables(entry.worker_2.to_fields()),
            }
        }),
    }
}

fn worker_host(name: &str, api: &ApiConfig) -> String {
    if api.worker_domain_suffix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, api.worker_domain_suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&PollConfig> for PollSettings {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(Value),
    Failed(Option<Value>),
    TimedOut,
    /// A request failed; polling stopped without retrying.
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Task API returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct TaskClient {
    http: reqwest::Client,
    api: ApiConfig,
    poll: PollSettings,
}

impl TaskClient {
    pub fn new(api: ApiConfig, poll: PollSettings) -> Result<Self, SubmitError> {
        let http = reqwest::Client::builder()
            .timeout(api.request_timeout())
            .build()?;
        Ok(Self { http, api, poll })
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    pub fn status_url(&self, task_id: &str) -> String {
        format!("{}/{}", self.api.task_url.trim_end_matches('/'), task_id)
    }

    /// Submit `payload`. `Ok(None)` means the API accepted the request but
    /// returned no task ID.
    pub async fn submit(&self, payload: &TaskPayload) -> Result<Option<String>, SubmitError> {
        let response = self
            .http
            .post(&self.api.task_url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Status(status));
        }

        let body: Value = response.json().await?;
        let task_id = match body.get("task_id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        debug!("Task API accepted submission, task_id={:?}", task_id);
        Ok(task_id)
    }

    async fn fetch_status(&self, status_url: &str) -> Result<TaskStatus, reqwest::Error> {
        self.http
            .get(status_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Poll `status_url` until a terminal state or the timeout.
    pub async fn poll(&self, status_url: &str) -> PollOutcome {
        let started = Instant::now();

        while started.elapsed() < self.poll.timeout {
            match self.fetch_status(status_url).await {
                Ok(status) => match status.status.as_deref() {
                    Some("completed") => {
                        info!("Task completed: {}", status_url);
                        return PollOutcome::Completed(status.result.unwrap_or(Value::Null));
                    }
                    Some("failed") => {
                        warn!("Task failed: {} ({:?})", status_url, status.error);
                        return PollOutcome::Failed(status.error);
                    }
                    other => {
                        debug!(
                            "Task status {:?}, checking again in {:?}",
                            other, self.poll.interval
                        );
                    }
                },
                Err(e) => {
                    warn!("Polling failed for {}: {}", status_url, e);
                    return PollOutcome::Aborted(e.to_string());
                }
            }
            tokio::time::sleep(self.poll.interval).await;
        }

        warn!("Polling timed out after {:?}: {}", self.poll.timeout, status_url);
        PollOutcome::TimedOut
    }
}
