//! Campaign entries and the campaign file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use crate::expand::ParameterSet;
use crate::kind::TestKind;
use crate::profile::WorkerProfile;
use crate::util::hash::sha256_hex;

/// A worker as it appears inside a campaign entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    #[serde(flatten)]
    pub profile: WorkerProfile,
    pub role: String,
}

impl WorkerAssignment {
    /// Template fields override profile fields of the same name. The
    /// assigned role replaces any `role` the profile carries.
    pub fn new(profile: &WorkerProfile, role: &str, fields: &Map<String, Value>) -> Self {
        let mut profile = profile.clone();
        for (key, value) in fields {
            profile.set_field(key, value.clone());
        }
        profile.extra.remove("role");
        Self {
            profile,
            role: role.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn ip(&self) -> &str {
        &self.profile.ip
    }

    /// Every field of the worker as a flat JSON mapping.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// One generated test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignEntry {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Worker_1")]
    pub worker_1: WorkerAssignment,
    #[serde(rename = "Worker_2")]
    pub worker_2: WorkerAssignment,
    pub parameters: ParameterSet,
}

impl CampaignEntry {
    pub fn kind(&self) -> TestKind {
        TestKind::from_name(&self.name)
    }
}

/// The ordered list of entries of one campaign revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Campaign {
    pub entries: Vec<CampaignEntry>,
}

impl Campaign {
    pub fn new(entries: Vec<CampaignEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&CampaignEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.entries).context("Failed to serialize campaign")
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<Vec<CampaignEntry>> =
            serde_yaml::from_str(content).context("Failed to parse campaign")?;
        Ok(Self::new(entries.unwrap_or_default()))
    }

    /// SHA-256 of the serialized campaign. Two generations over the same
    /// inputs must produce the same digest.
    pub fn digest(&self) -> Result<String> {
        Ok(sha256_hex(self.to_yaml()?))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read campaign file: {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid campaign file: {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write campaign file: {:?}", path))?;
        info!("Wrote {} campaign entries to {:?}", self.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: u64) -> CampaignEntry {
        let mut w1 = WorkerProfile::new("alpha", "10.0.0.1");
        w1.extra.insert("region".into(), json!("eu"));
        let w2 = WorkerProfile::new("beta", "10.0.0.2");
        CampaignEntry {
            id,
            name: "https_sni".to_string(),
            worker_1: WorkerAssignment::new(&w1, "client", &Map::new()),
            worker_2: WorkerAssignment::new(&w2, "server", &Map::new()),
            parameters: json!({"port": 443, "domain": "x.test"})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn test_yaml_layout_uses_worker_keys() {
        let campaign = Campaign::new(vec![entry(1)]);
        let yaml = campaign.to_yaml().unwrap();

        assert!(yaml.contains("Worker_1:"));
        assert!(yaml.contains("role: client"));
        assert!(yaml.contains("region: eu"));
        assert_eq!(Campaign::from_yaml(&yaml).unwrap(), campaign);
    }

    #[test]
    fn test_worker_fields_merge_extras() {
        let profile = WorkerProfile::new("beta", "10.0.0.2");
        let fields = json!({"filter": "udp port 53"}).as_object().cloned().unwrap();
        let assignment = WorkerAssignment::new(&profile, "server", &fields);

        let flat = assignment.to_fields();
        assert_eq!(flat["name"], json!("beta"));
        assert_eq!(flat["role"], json!("server"));
        assert_eq!(flat["filter"], json!("udp port 53"));
    }

    #[test]
    fn test_overlapping_fields_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.yml");

        let mut w1 = WorkerProfile::new("alpha", "10.0.0.1");
        w1.extra.insert("role".into(), json!("legacy"));
        let w2 = WorkerProfile::new("beta", "10.0.0.2");
        let w2_fields = json!({"ip": "9.9.9.9", "internet_accessible": true, "filter": "tcp"})
            .as_object()
            .cloned()
            .unwrap();

        let campaign = Campaign::new(vec![CampaignEntry {
            id: 1,
            name: "http_request".to_string(),
            worker_1: WorkerAssignment::new(&w1, "client", &Map::new()),
            worker_2: WorkerAssignment::new(&w2, "server", &w2_fields),
            parameters: Map::new(),
        }]);
        campaign.save(&path).unwrap();

        let yaml = std::fs::read_to_string(&path).unwrap();
        assert_eq!(yaml.matches("role:").count(), 2);
        assert!(!yaml.contains("legacy"));
        assert!(!yaml.contains("10.0.0.2"));

        let loaded = Campaign::load(&path).unwrap();
        let entry = &loaded.entries[0];
        assert_eq!(entry.worker_1.role, "client");
        assert_eq!(entry.worker_2.ip(), "9.9.9.9");
        assert_eq!(entry.worker_2.profile.internet_accessible, Some(true));
        assert_eq!(entry.worker_2.profile.extra.get("filter"), Some(&json!("tcp")));
        assert_eq!(loaded, campaign);
    }

    #[test]
    fn test_empty_campaign_file() {
        assert!(Campaign::from_yaml("").unwrap().is_empty());
        assert!(Campaign::from_yaml("[]").unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/campaign.yml");
        let campaign = Campaign::new(vec![entry(1), entry(2)]);

        campaign.save(&path).unwrap();
        let loaded = Campaign::load(&path).unwrap();

        assert_eq!(loaded.get(2).map(|e| e.id), Some(2));
        assert_eq!(loaded.digest().unwrap(), campaign.digest().unwrap());
    }
}
