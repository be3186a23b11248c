//! Result records and the results file
//!
//! The results file is a JSON object keyed by campaign entry ID (as a
//! string). [`ResultStore`] owns one such file: it is read once, updated in
//! memory and rewritten wholesale on every [`ResultStore::record`], which
//! makes interrupted runs resumable.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::util::files::{read_json, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    PollingFailed,
    SubmissionFailed,
    Error,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PollingFailed => "polling_failed",
            Self::SubmissionFailed => "submission_failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub status: ResultStatus,
    #[serde(default)]
    pub test_name: String,
    pub worker_1: String,
    pub worker_2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fields added by other tools (e.g. enrichment) are kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEntry {
    pub fn new(status: ResultStatus, test_name: &str, worker_1: &str, worker_2: &str) -> Self {
        Self {
            status,
            test_name: test_name.to_string(),
            worker_1: worker_1.to_string(),
            worker_2: worker_2.to_string(),
            task_id: None,
            polling_url: None,
            timestamp: Some(Utc::now()),
            result: None,
            error: None,
            extra: Map::new(),
        }
    }

    /// Value of one of the filterable fields.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "worker_1" => Some(self.worker_1.clone()),
            "worker_2" => Some(self.worker_2.clone()),
            "status" => Some(self.status.as_str().to_string()),
            "test_name" => Some(self.test_name.clone()),
            other => self.extra.get(other).map(|v| match v {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }
    }
}

/// Results keyed by campaign entry ID, iterated in numeric order.
pub type ResultMap = BTreeMap<u64, ResultEntry>;

/// `field=value` condition on a result record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFilter {
    pub field: String,
    pub value: String,
}

impl ResultFilter {
    pub const FIELDS: [&'static str; 4] = ["worker_1", "worker_2", "status", "test_name"];

    pub fn parse(expr: &str) -> Result<Self> {
        let (field, value) = expr
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid filter '{}', expected field=value", expr))?;
        let field = field.trim();
        if !Self::FIELDS.contains(&field) {
            return Err(anyhow!(
                "Unknown filter field '{}' (expected one of: {})",
                field,
                Self::FIELDS.join(", ")
            ));
        }
        Ok(Self {
            field: field.to_string(),
            value: value.trim().to_string(),
        })
    }

    pub fn matches(&self, entry: &ResultEntry) -> bool {
        entry.field(&self.field).as_deref() == Some(self.value.as_str())
    }
}

/// Default output name for a filtered results file.
pub fn filtered_file_name(filters: &[ResultFilter], now: DateTime<Utc>) -> String {
    if filters.is_empty() {
        return "filtered_results.json".to_string();
    }
    let filter_part = filters
        .iter()
        .map(|f| format!("{}={}", f.field, f.value))
        .collect::<Vec<_>>()
        .join("_");
    format!(
        "filtered_{}_{}.json",
        filter_part,
        now.format("%Y%m%d_%H%M%S")
    )
    .replace(' ', "_")
}

/// Sibling of `results` that receives remapped results, e.g.
/// `out/results.json` becomes `out/results_mapped.json`.
pub fn mapped_file_path(results: &Path) -> PathBuf {
    let stem = results
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    results.with_file_name(format!("{}_mapped.json", stem))
}

/// The results file of a campaign run.
pub struct ResultStore {
    path: PathBuf,
    entries: ResultMap,
}

impl ResultStore {
    /// Load `path`, or start empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            read_json(&path).with_context(|| format!("Invalid results file: {:?}", path))?
        } else {
            debug!("No results file at {:?}, starting empty", path);
            ResultMap::new()
        };
        Ok(Self { path, entries })
    }

    /// A store over `entries` that will be written to `path`.
    pub fn with_entries(path: impl Into<PathBuf>, entries: ResultMap) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &ResultMap {
        &self.entries
    }

    pub fn into_entries(self) -> ResultMap {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&ResultEntry> {
        self.entries.get(&id)
    }

    pub fn is_completed(&self, id: u64) -> bool {
        self.get(id)
            .map(|e| e.status == ResultStatus::Completed)
            .unwrap_or(false)
    }

    /// Insert or overwrite the record for `id` and persist immediately.
    pub fn record(&mut self, id: u64, entry: ResultEntry) -> Result<()> {
        self.entries.insert(id, entry);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        write_json(&self.path, &self.entries)?;
        debug!("Saved {} results to {:?}", self.entries.len(), self.path);
        Ok(())
    }

    /// Drop records involving a worker outside `workers`. Returns the number
    /// of records removed.
    pub fn retain_workers(&mut self, workers: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| workers.contains(&e.worker_1) && workers.contains(&e.worker_2));
        let removed = before - self.entries.len();
        info!("Pruned {} results with unknown workers", removed);
        removed
    }

    /// Records matching every filter.
    pub fn filtered(&self, filters: &[ResultFilter]) -> ResultMap {
        self.entries
            .iter()
            .filter(|(_, e)| filters.iter().all(|f| f.matches(e)))
            .map(|(id, e)| (*id, e.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(status: ResultStatus, w1: &str, w2: &str) -> ResultEntry {
        ResultEntry::new(status, "https_sni", w1, w2)
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("results.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_persists_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut store = ResultStore::open(&path).unwrap();

        store
            .record(10, sample(ResultStatus::Completed, "a", "b"))
            .unwrap();
        store
            .record(2, sample(ResultStatus::PollingFailed, "a", "b"))
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.find("\"2\"").unwrap() < raw.find("\"10\"").unwrap());

        let reopened = ResultStore::open(&path).unwrap();
        assert!(reopened.is_completed(10));
        assert!(!reopened.is_completed(2));
        assert!(!reopened.is_completed(3));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "7": {
                "status": "completed",
                "worker_1": "a",
                "worker_2": "b",
                "protocol": "https",
                "result": {"Worker_1": null}
            }
        });
        let entries: ResultMap = serde_json::from_value(raw).unwrap();
        let entry = &entries[&7];

        assert_eq!(entry.extra["protocol"], json!("https"));
        assert_eq!(entry.test_name, "");
        let back = serde_json::to_value(&entries).unwrap();
        assert_eq!(back["7"]["protocol"], json!("https"));
    }

    #[test]
    fn test_non_numeric_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"{"abc": {"status": "error", "worker_1": "a", "worker_2": "b"}}"#)
            .unwrap();
        assert!(ResultStore::open(&path).is_err());
    }

    #[test]
    fn test_filters() {
        let mut entries = ResultMap::new();
        entries.insert(1, sample(ResultStatus::Completed, "a", "b"));
        entries.insert(2, sample(ResultStatus::SubmissionFailed, "a", "c"));
        entries.insert(3, sample(ResultStatus::Completed, "c", "b"));
        let store = ResultStore::with_entries("unused.json", entries);

        let filters = vec![
            ResultFilter::parse("status=completed").unwrap(),
            ResultFilter::parse("worker_2 = b").unwrap(),
        ];
        let kept: Vec<_> = store.filtered(&filters).keys().copied().collect();
        assert_eq!(kept, vec![1, 3]);

        assert!(ResultFilter::parse("colour=red").is_err());
        assert!(ResultFilter::parse("status").is_err());
    }

    #[test]
    fn test_mapped_file_path_is_a_sibling() {
        assert_eq!(
            mapped_file_path(Path::new("out/results.json")),
            PathBuf::from("out/results_mapped.json")
        );
        assert_eq!(
            mapped_file_path(Path::new("results.json")),
            PathBuf::from("results_mapped.json")
        );
        assert_ne!(
            mapped_file_path(Path::new("out/results.json")),
            PathBuf::from("out/results.json")
        );
    }

    #[test]
    fn test_filtered_file_name() {
        let now = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        let filters = vec![
            ResultFilter::parse("worker_1=vps 3").unwrap(),
            ResultFilter::parse("status=completed").unwrap(),
        ];
        assert_eq!(
            filtered_file_name(&filters, now),
            "filtered_worker_1=vps_3_status=completed_20250304_050607.json"
        );
        assert_eq!(filtered_file_name(&[], now), "filtered_results.json");
    }

    #[test]
    fn test_retain_workers() {
        let mut entries = ResultMap::new();
        entries.insert(1, sample(ResultStatus::Completed, "a", "b"));
        entries.insert(2, sample(ResultStatus::Completed, "a", "gone"));
        let mut store = ResultStore::with_entries("unused.json", entries);

        let workers: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.retain_workers(&workers), 1);
        assert_eq!(store.len(), 1);
    }
}
