//! Campaign lookups used by the operator to locate test IDs.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::campaign::{Campaign, CampaignEntry};

fn target_text(entry: &CampaignEntry) -> Option<String> {
    match entry.kind().target(&entry.parameters)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// Distinct test names, sorted.
pub fn list_tests(campaign: &Campaign) -> Vec<String> {
    campaign
        .entries
        .iter()
        .map(|e| e.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every worker appearing on either side, sorted.
pub fn list_workers(campaign: &Campaign) -> Vec<String> {
    campaign
        .entries
        .iter()
        .flat_map(|e| [e.worker_1.name().to_string(), e.worker_2.name().to_string()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct targets (qname, hostname, domain or request host), optionally
/// restricted to one test.
pub fn list_targets(campaign: &Campaign, test: Option<&str>) -> Vec<String> {
    campaign
        .entries
        .iter()
        .filter(|e| test.map_or(true, |t| e.name == t))
        .filter_map(target_text)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// IDs of the entries of `test` between `worker_1` and `worker_2` that
/// target `target`, in campaign order.
pub fn find_test_ids(
    campaign: &Campaign,
    test: &str,
    worker_1: &str,
    worker_2: &str,
    target: &str,
) -> Vec<u64> {
    campaign
        .entries
        .iter()
        .filter(|e| e.name == test)
        .filter(|e| e.worker_1.name() == worker_1 && e.worker_2.name() == worker_2)
        .filter(|e| target_text(e).as_deref() == Some(target))
        .map(|e| e.id)
        .collect()
}
