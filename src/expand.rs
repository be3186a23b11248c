//! Parameter expansion
//!
//! A template's `parameters` mapping is walked recursively. String leaves
//! carrying the reference prefix (`@file:` by default) are *dynamic*: each is
//! replaced by the list stored in the referenced file. Everything else is
//! *static* and copied into every produced set.
//!
//! Dynamic lists are combined in one of two ways:
//!
//! - all lists have the same length: they are zipped, so index `i` of every
//!   list ends up in the same set (correlated lists such as hostname/IP
//!   pairs rely on this);
//! - otherwise: full cartesian product, first reference outermost.
//!
//! A single reference always takes the zip path. The rule is implicit in
//! the campaign files already in use and must not change.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::kind::{TestKind, PROTOCOL_FLAG, PROTOCOL_FLAG_VALUES};

/// A fully resolved parameter mapping.
pub type ParameterSet = Map<String, Value>;

pub const DEFAULT_REFERENCE_PREFIX: &str = "@file:";
pub const DEFAULT_CONTROLLER_CONF: &str = "controller_configuration.json";
pub const CONTROLLER_CONF_KEY: &str = "controller_conf_filename";

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("Referenced file not found: {0}")]
    ReferenceNotFound(String),
    #[error("File {0} does not contain a list")]
    NotAList(String),
    #[error("Failed to parse referenced file {reference}: {message}")]
    Malformed { reference: String, message: String },
}

/// Resolves the target of a file reference to a list of values.
pub trait ListSource {
    fn load_list(&self, reference: &str) -> Result<Vec<Value>, ExpandError>;
}

/// Reads referenced YAML lists from disk. Relative references resolve
/// against `base_dir`.
#[derive(Debug, Clone)]
pub struct FsListSource {
    base_dir: PathBuf,
}

impl FsListSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ListSource for FsListSource {
    fn load_list(&self, reference: &str) -> Result<Vec<Value>, ExpandError> {
        let path = self.base_dir.join(reference);
        if !path.is_file() {
            return Err(ExpandError::ReferenceNotFound(reference.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ExpandError::Malformed {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;
        let value: Value = serde_yaml::from_str(&content).map_err(|e| ExpandError::Malformed {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;

        match value {
            Value::Array(items) => Ok(items),
            _ => Err(ExpandError::NotAList(reference.to_string())),
        }
    }
}

/// In-memory lists keyed by reference, mostly for tests and dry runs.
impl ListSource for HashMap<String, Value> {
    fn load_list(&self, reference: &str) -> Result<Vec<Value>, ExpandError> {
        match self.get(reference) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(ExpandError::NotAList(reference.to_string())),
            None => Err(ExpandError::ReferenceNotFound(reference.to_string())),
        }
    }
}

/// A dynamic leaf found during traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRef {
    /// Key segments from the root of the parameter mapping.
    pub path: Vec<String>,
    pub values: Vec<Value>,
}

impl DynamicRef {
    /// Dotted form of the path, e.g. `request-data.host`.
    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone)]
pub struct ExpandOptions {
    pub reference_prefix: String,
    pub controller_conf_filename: String,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            controller_conf_filename: DEFAULT_CONTROLLER_CONF.to_string(),
        }
    }
}

pub struct ParameterExpander<S> {
    source: S,
    options: ExpandOptions,
}

impl<S: ListSource> ParameterExpander<S> {
    pub fn new(source: S, options: ExpandOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    /// Expand `params` into the ordered list of parameter sets for a test
    /// of the given kind.
    pub fn expand(
        &self,
        params: &Map<String, Value>,
        kind: &TestKind,
    ) -> Result<Vec<ParameterSet>, ExpandError> {
        let mut skeleton = Map::new();
        let mut dynamic = Vec::new();
        self.partition(params, &mut Vec::new(), &mut skeleton, &mut dynamic)?;

        skeleton.insert(
            CONTROLLER_CONF_KEY.to_string(),
            Value::String(self.options.controller_conf_filename.clone()),
        );

        let combos = combine(&dynamic);
        debug!(
            "Expanding {} with {} dynamic field(s) into {} combination(s)",
            kind,
            dynamic.len(),
            combos.len()
        );

        let mut expanded = Vec::with_capacity(combos.len());
        for combo in combos {
            let mut set = skeleton.clone();
            for (dynamic_ref, value) in dynamic.iter().zip(combo) {
                set_path(&mut set, &dynamic_ref.path, value.clone());
            }
            align_request_host(&mut set);

            if kind.doubles_protocol() {
                for flag in PROTOCOL_FLAG_VALUES {
                    let mut variant = set.clone();
                    variant.insert(PROTOCOL_FLAG.to_string(), Value::from(flag));
                    expanded.push(variant);
                }
            } else {
                expanded.push(set);
            }
        }

        Ok(expanded)
    }

    /// Split one nesting level into the static skeleton and dynamic refs.
    ///
    /// Dynamic leaves keep a `null` placeholder in the skeleton so the
    /// resolved value lands back at its original key position.
    fn partition(
        &self,
        params: &Map<String, Value>,
        prefix: &mut Vec<String>,
        skeleton: &mut Map<String, Value>,
        dynamic: &mut Vec<DynamicRef>,
    ) -> Result<(), ExpandError> {
        for (key, value) in params {
            prefix.push(key.clone());
            match value {
                Value::String(s) if s.starts_with(&self.options.reference_prefix) => {
                    let reference = &s[self.options.reference_prefix.len()..];
                    let values = self.source.load_list(reference)?;
                    dynamic.push(DynamicRef {
                        path: prefix.clone(),
                        values,
                    });
                    skeleton.insert(key.clone(), Value::Null);
                }
                Value::Object(nested) => {
                    let mut nested_skeleton = Map::new();
                    self.partition(nested, prefix, &mut nested_skeleton, dynamic)?;
                    skeleton.insert(key.clone(), Value::Object(nested_skeleton));
                }
                other => {
                    skeleton.insert(key.clone(), other.clone());
                }
            }
            prefix.pop();
        }
        Ok(())
    }
}

/// True when every dynamic list has the same length (vacuously for zero or
/// one list).
pub fn equal_lengths(dynamic: &[DynamicRef]) -> bool {
    dynamic
        .windows(2)
        .all(|pair| pair[0].values.len() == pair[1].values.len())
}

/// Combine the dynamic lists into rows of values, one value per ref.
///
/// No refs yields a single empty row.
pub fn combine(dynamic: &[DynamicRef]) -> Vec<Vec<&Value>> {
    if dynamic.is_empty() {
        return vec![Vec::new()];
    }

    if equal_lengths(dynamic) {
        let len = dynamic[0].values.len();
        return (0..len)
            .map(|i| dynamic.iter().map(|d| &d.values[i]).collect())
            .collect();
    }

    let mut rows: Vec<Vec<&Value>> = vec![Vec::new()];
    for dynamic_ref in dynamic {
        let mut next = Vec::with_capacity(rows.len() * dynamic_ref.values.len());
        for row in &rows {
            for value in &dynamic_ref.values {
                let mut extended = row.clone();
                extended.push(value);
                next.push(extended);
            }
        }
        rows = next;
    }
    rows
}

fn set_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(inner) => inner,
            _ => return,
        };
    }
    current.insert(last.clone(), value);
}

/// A `domain` next to a `request-data` mapping overrides the request host.
fn align_request_host(set: &mut ParameterSet) {
    let Some(domain) = set.get("domain").cloned() else {
        return;
    };
    if let Some(Value::Object(request)) = set.get_mut("request-data") {
        request.insert("host".to_string(), domain);
    }
}
