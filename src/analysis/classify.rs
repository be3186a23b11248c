//! Outcome classification of result records.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::results::{ResultEntry, ResultStatus};

const SINKHOLE_HOST: &str = "sinkhole.paloaltonetworks.com.";
const LOOPBACK_ANSWER: &str = "127.0.0.1";

/// Error substrings recognised for simple requests, checked in order.
const SIMPLE_ERROR_PATTERNS: [(&str, Outcome); 4] = [
    ("handshake operation timed out", Outcome::HandshakeTimeout),
    ("Connection reset by peer", Outcome::ConnReset),
    ("HTTP request failed: timed out", Outcome::HttpTimeout),
    ("HTTPS request failed: timed out", Outcome::HttpsTimeout),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Match,
    Received,
    Status503,
    Status403,
    HandshakeTimeout,
    ConnReset,
    HttpTimeout,
    HttpsTimeout,
    Empty,
    Sinkhole,
    NoResponse,
    Failure,
    WorkerMissing,
    SubmissionFailed,
    PollingFailed,
    Other,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Match => "Match",
            Self::Received => "Received",
            Self::Status503 => "503",
            Self::Status403 => "403",
            Self::HandshakeTimeout => "HandshakeTimeout",
            Self::ConnReset => "ConnReset",
            Self::HttpTimeout => "HTTPTimeout",
            Self::HttpsTimeout => "HTTPSTimeout",
            Self::Empty => "Empty",
            Self::Sinkhole => "Sinkhole",
            Self::NoResponse => "No Response",
            Self::Failure => "Failure",
            Self::WorkerMissing => "WorkerMissing",
            Self::SubmissionFailed => "SubmissionFailed",
            Self::PollingFailed => "PollingFailed",
            Self::Other => "Other",
        }
    }

    /// One-character cell used when rendering a vector.
    pub fn symbol(&self) -> char {
        match self {
            Self::Match | Self::Received => '✓',
            Self::Status503 => '5',
            Self::Status403 => '4',
            Self::HandshakeTimeout => 'H',
            Self::ConnReset => 'R',
            Self::HttpTimeout | Self::HttpsTimeout => 'T',
            Self::Empty => '∅',
            Self::Sinkhole => 'S',
            Self::NoResponse => 'N',
            Self::Failure => 'F',
            Self::WorkerMissing => 'W',
            Self::SubmissionFailed => 'X',
            Self::PollingFailed => 'P',
            Self::Other => '?',
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Match | Self::Received)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which classifier a report applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    HttpSimple,
    HttpConformance,
    Dns,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpSimple => "http-simple",
            Self::HttpConformance => "http-conformance",
            Self::Dns => "dns",
        }
    }

    pub fn classify(&self, entry: &ResultEntry) -> Outcome {
        match self {
            Self::HttpSimple => classify_http_simple(entry),
            Self::HttpConformance => classify_http_conformance(entry),
            Self::Dns => classify_dns(entry),
        }
    }

    /// Simple-request entries come in HTTP/HTTPS pairs and are reported as
    /// two vectors.
    pub fn splits_protocols(&self) -> bool {
        matches!(self, Self::HttpSimple)
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http-simple" => Ok(Self::HttpSimple),
            "http-conformance" => Ok(Self::HttpConformance),
            "dns" => Ok(Self::Dns),
            other => Err(format!("Unknown report kind: {}", other)),
        }
    }
}

/// Walk `keys` from `value`, treating `null` as absent.
fn lookup<'a>(value: Option<&'a Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(value?, |current, key| current.get(*key))
        .filter(|v| !v.is_null())
}

fn worker<'a>(entry: &'a ResultEntry, name: &str) -> Option<&'a Value> {
    lookup(entry.result.as_ref(), &[name])
}

fn variables(worker: Option<&Value>) -> Option<&Value> {
    lookup(worker, &["Variables"])
}

fn status_outcome(entry: &ResultEntry) -> Option<Outcome> {
    match entry.status {
        ResultStatus::SubmissionFailed => Some(Outcome::SubmissionFailed),
        ResultStatus::PollingFailed => Some(Outcome::PollingFailed),
        _ => None,
    }
}

/// A missing section compares equal to an empty one.
fn section_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    let empty = |v: Option<&Value>| match v {
        None => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    };
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (a, b) => empty(a) && empty(b),
    }
}

fn errors_of(section: Option<&Value>) -> Vec<&str> {
    lookup(section, &["errors"])
        .and_then(Value::as_array)
        .map(|errors| errors.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

pub fn classify_http_simple(entry: &ResultEntry) -> Outcome {
    if let Some(outcome) = status_outcome(entry) {
        return outcome;
    }

    let (w1, w2) = (worker(entry, "Worker_1"), worker(entry, "Worker_2"));
    if w1.is_none() || w2.is_none() {
        return Outcome::WorkerMissing;
    }
    let (vars1, vars2) = (variables(w1), variables(w2));

    let dict1 = lookup(vars1, &["dict", "result"]);
    let sync1 = lookup(vars1, &["sync_dict", "result"]);
    let dict2 = lookup(vars2, &["dict", "result"]);
    let sync2 = lookup(vars2, &["sync_dict", "result"]);

    if section_eq(dict1, sync1) && section_eq(dict2, sync2) {
        return Outcome::Match;
    }

    let status1 = lookup(dict1, &["results", "HTTP", "status"]).and_then(Value::as_u64);
    let status2 = lookup(dict2, &["results", "HTTP", "status"]).and_then(Value::as_u64);

    if status1.is_some() && status1 == status2 {
        return Outcome::Match;
    }
    if status1 == Some(503) || status2 == Some(503) {
        return Outcome::Status503;
    }
    if status1 == Some(403) || status2 == Some(403) {
        return Outcome::Status403;
    }

    errors_of(dict1)
        .into_iter()
        .chain(errors_of(dict2))
        .find_map(|error| {
            SIMPLE_ERROR_PATTERNS
                .iter()
                .find(|(pattern, _)| error.contains(pattern))
                .map(|(_, outcome)| *outcome)
        })
        .unwrap_or(Outcome::Other)
}

/// `received` with falsy values normalised to the empty string.
fn received_of(vars: Option<&Value>) -> Value {
    match lookup(vars, &["received"]) {
        Some(Value::String(s)) if s.is_empty() => Value::String(String::new()),
        Some(Value::Bool(false)) | None => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}

pub fn classify_http_conformance(entry: &ResultEntry) -> Outcome {
    if let Some(outcome) = status_outcome(entry) {
        return outcome;
    }

    let (w1, w2) = (worker(entry, "Worker_1"), worker(entry, "Worker_2"));
    if w1.is_none() || w2.is_none() {
        return Outcome::WorkerMissing;
    }
    let (vars1, vars2) = (variables(w1), variables(w2));

    let received1 = received_of(vars1);
    let received2 = received_of(vars2);
    let sync1 = lookup(vars1, &["sync_received"]).cloned().unwrap_or(Value::Null);
    let sync2 = lookup(vars2, &["sync_received"]).cloned().unwrap_or(Value::Null);

    match &received1 {
        Value::String(s) if s.is_empty() => return Outcome::Empty,
        Value::String(s) if s.contains("503") => return Outcome::Status503,
        _ => {}
    }
    if sync1 == received2 && sync2 == received1 {
        return Outcome::Match;
    }
    Outcome::Failure
}

pub fn classify_dns(entry: &ResultEntry) -> Outcome {
    if let Some(outcome) = status_outcome(entry) {
        return outcome;
    }

    let w1 = worker(entry, "Worker_1");
    let present = match w1 {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
        None => false,
    };
    if !present {
        return Outcome::Failure;
    }
    let vars1 = variables(w1);

    if lookup(vars1, &["event"]).and_then(Value::as_str) == Some("TIMEOUT") {
        return Outcome::NoResponse;
    }

    // An absent response reads as an empty mapping.
    let response = lookup(vars1, &["dict", "response"]);
    let is_mapping = response.map_or(true, Value::is_object);
    if !is_mapping {
        return Outcome::Failure;
    }

    match lookup(response, &["received"]) {
        None => Outcome::NoResponse,
        Some(received @ Value::Object(_)) => {
            let answer = lookup(Some(received), &["response"])
                .and_then(Value::as_str)
                .unwrap_or_default();
            if answer.contains(SINKHOLE_HOST) {
                Outcome::Sinkhole
            } else if answer.contains(LOOPBACK_ANSWER) {
                Outcome::Received
            } else {
                Outcome::Failure
            }
        }
        Some(_) => Outcome::Failure,
    }
}
