//! Post-run inspection of result files: enrichment with campaign
//! parameters, dict/sync discrepancies and DNS domain coverage.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::campaign::Campaign;
use crate::kind::PROTOCOL_FLAG;
use crate::results::ResultMap;

const WORKERS: [&str; 2] = ["Worker_1", "Worker_2"];

/// Copy `protocol` and `hostname` from the campaign into matching records.
/// Returns the number of records enriched.
pub fn enrich(results: &mut ResultMap, campaign: &Campaign) -> usize {
    let mut enriched = 0;
    for (id, record) in results.iter_mut() {
        let Some(entry) = campaign.get(*id) else {
            continue;
        };
        let https = entry.parameters.get(PROTOCOL_FLAG).and_then(Value::as_str) == Some("1");
        let hostname = entry
            .parameters
            .get("hostname")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));

        record.extra.insert(
            "protocol".to_string(),
            Value::from(if https { "https" } else { "http" }),
        );
        record.extra.insert("hostname".to_string(), hostname);
        enriched += 1;
    }
    enriched
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn section<'a>(vars: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    vars?.get(name)?.get("result")
}

/// Whether the dict and sync_dict sections of either worker disagree on
/// `results` or `errors`, keyed by `hostname_protocol` in ID order. A later
/// record with the same key replaces the earlier verdict.
pub fn discrepancies(results: &ResultMap) -> IndexMap<String, bool> {
    let mut verdicts = IndexMap::new();
    for record in results.values() {
        let key = format!(
            "{}_{}",
            text(record.extra.get("hostname")),
            text(record.extra.get("protocol"))
        );

        let result = match &record.result {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => {
                verdicts.insert(key, false);
                continue;
            }
        };

        let differs = WORKERS.iter().any(|worker| {
            let vars = result.get(*worker).and_then(|w| w.get("Variables"));
            let dict = section(vars, "dict");
            let sync = section(vars, "sync_dict");
            ["results", "errors"]
                .iter()
                .any(|field| dict.and_then(|d| d.get(*field)) != sync.and_then(|s| s.get(*field)))
        });
        verdicts.insert(key, differs);
    }
    verdicts
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainCoverage {
    pub expected: BTreeSet<String>,
    pub seen: BTreeSet<String>,
}

impl DomainCoverage {
    pub fn missing(&self) -> Vec<&String> {
        self.expected.difference(&self.seen).collect()
    }

    pub fn unexpected(&self) -> Vec<&String> {
        self.seen.difference(&self.expected).collect()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase().trim_end_matches('.').to_string()
}

/// Qname of the first question Worker_2 received, if any.
fn received_qname(result: &Value) -> Option<String> {
    let received = result
        .get("Worker_2")?
        .get("Variables")?
        .get("dict")?
        .get("received")?;
    let qname = received.get("questions")?.get(0)?.get("qname")?.as_str()?;
    Some(normalize_domain(qname)).filter(|q| !q.is_empty())
}

/// Compare the expected domains against the qnames the responder saw
/// across one or more result sets.
pub fn domain_coverage<'a>(
    expected: &[String],
    result_sets: impl IntoIterator<Item = &'a ResultMap>,
) -> DomainCoverage {
    let seen = result_sets
        .into_iter()
        .flat_map(|results| results.values())
        .filter_map(|record| record.result.as_ref().and_then(received_qname))
        .collect();

    DomainCoverage {
        expected: expected.iter().map(|d| normalize_domain(d)).collect(),
        seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{CampaignEntry, WorkerAssignment};
    use crate::profile::WorkerProfile;
    use crate::results::{ResultEntry, ResultStatus};
    use serde_json::{json, Map};

    fn record(result: Option<Value>) -> ResultEntry {
        let mut e = ResultEntry::new(ResultStatus::Completed, "http_simple_request", "a", "b");
        e.result = result;
        e
    }

    fn simple(id: u64, hostname: &str, flag: &str) -> CampaignEntry {
        CampaignEntry {
            id,
            name: "http_simple_request".into(),
            worker_1: WorkerAssignment::new(&WorkerProfile::new("a", "10.0.0.1"), "c", &Map::new()),
            worker_2: WorkerAssignment::new(&WorkerProfile::new("b", "10.0.0.2"), "s", &Map::new()),
            parameters: json!({"hostname": hostname, "use_https": flag})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn test_enrich_from_campaign() {
        let campaign = Campaign::new(vec![simple(1, "x.test", "0"), simple(2, "x.test", "1")]);
        let mut results = ResultMap::new();
        results.insert(2, record(None));
        results.insert(9, record(None));

        assert_eq!(enrich(&mut results, &campaign), 1);
        assert_eq!(results[&2].extra["protocol"], json!("https"));
        assert_eq!(results[&2].extra["hostname"], json!("x.test"));
        assert!(results[&9].extra.get("protocol").is_none());
    }

    #[test]
    fn test_discrepancies() {
        let same = json!({"Variables": {
            "dict": {"result": {"results": {"HTTP": 1}, "errors": []}},
            "sync_dict": {"result": {"results": {"HTTP": 1}, "errors": []}}
        }});
        let changed = json!({"Variables": {
            "dict": {"result": {"results": {"HTTP": 1}, "errors": ["reset"]}},
            "sync_dict": {"result": {"results": {"HTTP": 1}, "errors": []}}
        }});

        let mut results = ResultMap::new();
        let mut a = record(Some(json!({"Worker_1": same.clone(), "Worker_2": same.clone()})));
        a.extra.insert("hostname".into(), json!("x.test"));
        a.extra.insert("protocol".into(), json!("http"));
        let mut b = record(Some(json!({"Worker_1": same, "Worker_2": changed})));
        b.extra.insert("hostname".into(), json!("x.test"));
        b.extra.insert("protocol".into(), json!("https"));
        let mut c = record(None);
        c.extra.insert("hostname".into(), json!("y.test"));
        c.extra.insert("protocol".into(), json!("http"));
        results.insert(1, a);
        results.insert(2, b);
        results.insert(3, c);

        let verdicts = discrepancies(&results);
        assert_eq!(verdicts["x.test_http"], false);
        assert_eq!(verdicts["x.test_https"], true);
        assert_eq!(verdicts["y.test_http"], false);
        assert_eq!(verdicts.keys().next().unwrap(), "x.test_http");
    }

    #[test]
    fn test_domain_coverage() {
        let received = |qname: &str| {
            record(Some(json!({"Worker_2": {"Variables": {"dict": {
                "received": {"questions": [{"qname": qname}]}
            }}}})))
        };
        let mut run_1 = ResultMap::new();
        run_1.insert(1, received("X.test."));
        run_1.insert(2, record(None));
        let mut run_2 = ResultMap::new();
        run_2.insert(1, received("extra.test"));

        let expected = vec!["x.test".to_string(), " y.test ".to_string()];
        let coverage = domain_coverage(&expected, [&run_1, &run_2]);

        assert_eq!(coverage.missing(), vec!["y.test"]);
        assert_eq!(coverage.unexpected(), vec!["extra.test"]);
    }
}
