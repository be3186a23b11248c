//! Worker profiles

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::util::files::{read_yaml, yaml_files};

/// A measurement endpoint, loaded from one file in the profiles directory.
///
/// Fields other than the ones named here are kept in `extra` and copied
/// verbatim into every campaign entry the worker takes part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub name: String,
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_accessible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intranet_accessible: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkerProfile {
    pub fn new(name: &str, ip: &str) -> Self {
        Self {
            name: name.to_string(),
            ip: ip.to_string(),
            internet_accessible: None,
            intranet_accessible: None,
            extra: Map::new(),
        }
    }

    pub fn is_internet_accessible(&self) -> bool {
        self.internet_accessible.unwrap_or(false)
    }

    pub fn is_intranet_accessible(&self) -> bool {
        self.intranet_accessible.unwrap_or(false)
    }

    /// Set one field by key. Named fields are updated in place so a key
    /// never lands in `extra` as well.
    pub fn set_field(&mut self, key: &str, value: Value) {
        match key {
            "name" => self.name = scalar_string(value),
            "ip" => self.ip = scalar_string(value),
            "internet_accessible" => self.internet_accessible = value.as_bool(),
            "intranet_accessible" => self.intranet_accessible = value.as_bool(),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }
}

fn scalar_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Load every profile in `dir`, ordered by file name.
///
/// Fails on the first unreadable file and on duplicate worker names.
pub fn load_profiles(dir: &Path) -> Result<Vec<WorkerProfile>> {
    let mut profiles = Vec::new();
    let mut seen = HashSet::new();

    for path in yaml_files(dir)? {
        let profile: WorkerProfile = read_yaml(&path)?;
        if !seen.insert(profile.name.clone()) {
            return Err(anyhow!(
                "Duplicate worker name '{}' in {:?}",
                profile.name,
                path
            ));
        }
        debug!("Loaded worker profile {} from {:?}", profile.name, path);
        profiles.push(profile);
    }

    Ok(profiles)
}
