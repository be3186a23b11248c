//! Runner configuration
//!
//! Loaded from `campaign.toml`:
//! - `[paths]`: profile, test-tree and reference directories, campaign and results files
//! - `[generator]`: reference prefix and controller configuration file name
//! - `[api]`: task API endpoint and payload constants
//! - `[poll]`: status polling interval and timeout
//!
//! Every field has a default, so the file itself is optional.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::expand::{ExpandOptions, DEFAULT_CONTROLLER_CONF, DEFAULT_REFERENCE_PREFIX};

pub const DEFAULT_CONFIG_FILE: &str = "campaign.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
    #[serde(default = "default_tests_dir")]
    pub tests_dir: PathBuf,
    /// Base directory for relative `@file:` references.
    #[serde(default = "default_references_dir")]
    pub references_dir: PathBuf,
    #[serde(default = "default_campaign_file")]
    pub campaign_file: PathBuf,
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
}

fn default_profiles_dir() -> PathBuf {
    PathBuf::from("profiles")
}
fn default_tests_dir() -> PathBuf {
    PathBuf::from("tests-trees")
}
fn default_references_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_campaign_file() -> PathBuf {
    PathBuf::from("campaign.yml")
}
fn default_results_file() -> PathBuf {
    PathBuf::from("results.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            profiles_dir: default_profiles_dir(),
            tests_dir: default_tests_dir(),
            references_dir: default_references_dir(),
            campaign_file: default_campaign_file(),
            results_file: default_results_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    #[serde(default = "default_controller_conf")]
    pub controller_conf_filename: String,
}

fn default_reference_prefix() -> String {
    DEFAULT_REFERENCE_PREFIX.to_string()
}
fn default_controller_conf() -> String {
    DEFAULT_CONTROLLER_CONF.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            reference_prefix: default_reference_prefix(),
            controller_conf_filename: default_controller_conf(),
        }
    }
}

impl GeneratorConfig {
    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            reference_prefix: self.reference_prefix.clone(),
            controller_conf_filename: self.controller_conf_filename.clone(),
        }
    }
}

/// Task API endpoint and the constant parts of every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_task_url")]
    pub task_url: String,
    /// Master node host name; required to submit.
    #[serde(default)]
    pub master: String,
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Appended to the worker name to form its host name.
    #[serde(default = "default_worker_domain_suffix")]
    pub worker_domain_suffix: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_task_url() -> String {
    "https://www.nopasaran.org/api/v1/tests-trees/task".to_string()
}
fn default_repository() -> String {
    "https://github.com/nopasaran-org/nopasaran-tests-trees".to_string()
}
fn default_worker_domain_suffix() -> String {
    "admin.worker.nopasaran.org".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            task_url: default_task_url(),
            master: String::new(),
            repository: default_repository(),
            worker_domain_suffix: default_worker_domain_suffix(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_url.trim().is_empty() {
            return Err(anyhow!("api.task_url must be set"));
        }
        if self.master.trim().is_empty() {
            return Err(anyhow!("api.master must be set to submit tasks"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_poll_timeout() -> u64 {
    120
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl RunnerConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))
    }

    /// Load an explicit config file, else `campaign.toml` when present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            debug!("Using {}", DEFAULT_CONFIG_FILE);
            return Self::from_path(default_path);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: RunnerConfig = toml::from_str(
            r#"
[api]
master = "master.example.org"

[poll]
timeout_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.api.master, "master.example.org");
        assert_eq!(config.api.worker_domain_suffix, "admin.worker.nopasaran.org");
        assert_eq!(config.poll.timeout_secs, 30);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.paths.campaign_file, PathBuf::from("campaign.yml"));
        assert_eq!(config.generator.reference_prefix, "@file:");
    }

    #[test]
    fn test_master_required_to_submit() {
        let mut api = ApiConfig::default();
        assert!(api.validate().is_err());
        api.master = "master.example.org".to_string();
        assert!(api.validate().is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RunnerConfig::load(Some(&dir.path().join("none.toml"))).is_err());
    }
}
