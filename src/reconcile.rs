//! Result reconciliation across campaign revisions
//!
//! When the campaign is regenerated (a worker added or removed, a list
//! edited) entry IDs shift. Results already collected are carried over by
//! matching each old entry to the new entry with the same [`Fingerprint`].

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

use crate::campaign::CampaignEntry;
use crate::kind::{TestKind, PROTOCOL_FLAG};
use crate::results::ResultMap;

/// Identity of a test case independent of its ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub test_name: String,
    pub worker_1: String,
    pub worker_2: String,
    pub ip: Option<String>,
    pub port: Option<String>,
    pub discriminator: Vec<Option<String>>,
}

impl Fingerprint {
    pub fn of(entry: &CampaignEntry) -> Self {
        let params = &entry.parameters;
        let discriminator = match entry.kind() {
            TestKind::HttpsSni => vec![render(params.get("domain"))],
            TestKind::Http1Conformance => vec![render(
                params.get("request-data").and_then(|data| data.get("host")),
            )],
            TestKind::UdpDnsQnameProber => vec![render(params.get("qname"))],
            TestKind::HttpSimpleRequest => vec![
                render(params.get("hostname")),
                render(params.get(PROTOCOL_FLAG)),
            ],
            // Unknown kinds fall back to the whole parameter mapping, which
            // can miss matches silently when unrelated fields change.
            TestKind::DnsQnameProbing | TestKind::Other(_) => {
                vec![serde_json::to_string(params).ok()]
            }
        };

        Self {
            test_name: entry.name.clone(),
            worker_1: entry.worker_1.name().to_string(),
            worker_2: entry.worker_2.name().to_string(),
            ip: render(params.get("ip")),
            port: render(params.get("port")),
            discriminator,
        }
    }
}

fn render(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// What to do when two entries of one campaign share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// The later entry shadows the earlier one.
    #[default]
    LastWriteWins,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignSide {
    Old,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub side: CampaignSide,
    pub shadowed_id: u64,
    pub kept_id: u64,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Fingerprint collision in {side:?} campaign: entries {first} and {second}")]
    FingerprintCollision {
        side: CampaignSide,
        first: u64,
        second: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    /// Old ID to new ID.
    pub mapping: BTreeMap<u64, u64>,
    /// Old entries with no counterpart in the new campaign.
    pub missing: Vec<CampaignEntry>,
    pub collisions: Vec<Collision>,
}

impl IdMapping {
    pub fn missing_ids(&self) -> BTreeSet<u64> {
        self.missing.iter().map(|e| e.id).collect()
    }
}

fn index_by_fingerprint<'a>(
    entries: &'a [CampaignEntry],
    side: CampaignSide,
    policy: CollisionPolicy,
    collisions: &mut Vec<Collision>,
) -> Result<IndexMap<Fingerprint, &'a CampaignEntry>, ReconcileError> {
    let mut index: IndexMap<Fingerprint, &CampaignEntry> = IndexMap::new();
    for entry in entries {
        if let Some(previous) = index.insert(Fingerprint::of(entry), entry) {
            if policy == CollisionPolicy::Reject {
                return Err(ReconcileError::FingerprintCollision {
                    side,
                    first: previous.id,
                    second: entry.id,
                });
            }
            warn!(
                "Fingerprint collision in {:?} campaign: entry {} shadows {}",
                side, entry.id, previous.id
            );
            collisions.push(Collision {
                side,
                shadowed_id: previous.id,
                kept_id: entry.id,
            });
        }
    }
    Ok(index)
}

/// Match every old entry to a new entry by fingerprint.
pub fn build_id_mapping(
    old: &[CampaignEntry],
    new: &[CampaignEntry],
    policy: CollisionPolicy,
) -> Result<IdMapping, ReconcileError> {
    let mut collisions = Vec::new();
    let old_index = index_by_fingerprint(old, CampaignSide::Old, policy, &mut collisions)?;
    let new_index = index_by_fingerprint(new, CampaignSide::New, policy, &mut collisions)?;

    let mut mapping = BTreeMap::new();
    let mut missing = Vec::new();
    for (fingerprint, old_entry) in &old_index {
        match new_index.get(fingerprint) {
            Some(new_entry) => {
                mapping.insert(old_entry.id, new_entry.id);
            }
            None => missing.push((*old_entry).clone()),
        }
    }

    info!(
        "Mapped {} entries, {} missing from the new campaign",
        mapping.len(),
        missing.len()
    );
    Ok(IdMapping {
        mapping,
        missing,
        collisions,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapReport {
    pub remapped: usize,
    pub removed: usize,
    /// Records whose ID belongs to neither the mapped nor the missing set.
    pub orphaned: usize,
    /// Workers seen in removed records.
    pub skipped_workers: BTreeSet<String>,
}

/// Re-key `results` under new IDs.
pub fn remap_results(results: &ResultMap, ids: &IdMapping) -> (ResultMap, RemapReport) {
    let missing = ids.missing_ids();
    let mut remapped = ResultMap::new();
    let mut report = RemapReport::default();

    for (old_id, entry) in results {
        if missing.contains(old_id) {
            report.removed += 1;
            report.skipped_workers.insert(entry.worker_1.clone());
            report.skipped_workers.insert(entry.worker_2.clone());
            continue;
        }
        match ids.mapping.get(old_id) {
            Some(new_id) => {
                remapped.insert(*new_id, entry.clone());
                report.remapped += 1;
            }
            None => report.orphaned += 1,
        }
    }

    (remapped, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::WorkerAssignment;
    use crate::profile::WorkerProfile;
    use crate::results::{ResultEntry, ResultStatus};
    use serde_json::{json, Map};

    fn entry(id: u64, name: &str, w1: &str, w2: &str, params: Value) -> CampaignEntry {
        CampaignEntry {
            id,
            name: name.to_string(),
            worker_1: WorkerAssignment::new(&WorkerProfile::new(w1, "10.0.0.1"), "c", &Map::new()),
            worker_2: WorkerAssignment::new(&WorkerProfile::new(w2, "10.0.0.2"), "s", &Map::new()),
            parameters: params.as_object().cloned().unwrap(),
        }
    }

    fn campaign() -> Vec<CampaignEntry> {
        vec![
            entry(1, "https_sni", "a", "b", json!({"ip": "10.0.0.2", "port": 443, "domain": "x.test"})),
            entry(2, "https_sni", "a", "b", json!({"ip": "10.0.0.2", "port": 443, "domain": "y.test"})),
            entry(3, "http_simple_request", "a", "b", json!({"hostname": "x.test", "use_https": "0"})),
            entry(4, "http_simple_request", "a", "b", json!({"hostname": "x.test", "use_https": "1"})),
            entry(5, "udp_dns_qname_prober", "a", "gone", json!({"ip": "10.0.0.3", "qname": "x.test"})),
        ]
    }

    fn result(w1: &str, w2: &str) -> ResultEntry {
        ResultEntry::new(ResultStatus::Completed, "t", w1, w2)
    }

    #[test]
    fn test_identical_campaigns_map_to_identity() {
        let ids = build_id_mapping(&campaign(), &campaign(), CollisionPolicy::Reject).unwrap();

        assert!(ids.missing.is_empty());
        assert!(ids.collisions.is_empty());
        assert!(ids.mapping.iter().all(|(old, new)| old == new));
        assert_eq!(ids.mapping.len(), 5);
    }

    #[test]
    fn test_protocol_flag_distinguishes_simple_requests() {
        let old = campaign();
        assert_ne!(Fingerprint::of(&old[2]), Fingerprint::of(&old[3]));
    }

    #[test]
    fn test_dropped_entry_is_missing_and_its_result_removed() {
        let old = campaign();
        let new: Vec<_> = old
            .iter()
            .filter(|e| e.id != 5)
            .cloned()
            .enumerate()
            .map(|(i, mut e)| {
                e.id = i as u64 + 11;
                e
            })
            .collect();

        let ids = build_id_mapping(&old, &new, CollisionPolicy::Reject).unwrap();
        assert_eq!(ids.missing_ids(), BTreeSet::from([5]));
        assert_eq!(ids.mapping.get(&1), Some(&11));

        let mut results = ResultMap::new();
        results.insert(1, result("a", "b"));
        results.insert(5, result("a", "gone"));
        results.insert(99, result("x", "y"));

        let (remapped, report) = remap_results(&results, &ids);
        assert_eq!(remapped.keys().copied().collect::<Vec<_>>(), vec![11]);
        assert_eq!(report.remapped, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.orphaned, 1);
        assert!(report.skipped_workers.contains("gone"));
        assert!(!remapped.contains_key(&5));
    }

    #[test]
    fn test_unknown_kind_falls_back_to_parameters() {
        let a = entry(1, "custom", "a", "b", json!({"x": 1}));
        let b = entry(2, "custom", "a", "b", json!({"x": 2}));
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_collisions_reported_or_rejected() {
        let mut old = campaign();
        old.push(entry(6, "https_sni", "a", "b", json!({"ip": "10.0.0.2", "port": 443, "domain": "x.test", "extra": 1})));

        let ids = build_id_mapping(&old, &campaign(), CollisionPolicy::LastWriteWins).unwrap();
        assert_eq!(
            ids.collisions,
            vec![Collision {
                side: CampaignSide::Old,
                shadowed_id: 1,
                kept_id: 6
            }]
        );
        assert_eq!(ids.mapping.get(&6), Some(&1));
        assert!(!ids.mapping.contains_key(&1));

        let err = build_id_mapping(&old, &campaign(), CollisionPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::FingerprintCollision { first: 1, second: 6, .. }
        ));
    }
}
