//! Per worker pair outcome vectors.
//!
//! Records are grouped by `(worker_1, worker_2)` and ordered by test ID, so
//! position `i` of every vector refers to the same target. Simple-request
//! campaigns alternate HTTP and HTTPS entries and are split in two groups.

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

use super::classify::{Outcome, ReportKind};
use crate::results::ResultMap;
use crate::util::files::read_json;

const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

/// Display names for workers, e.g. anonymised names for publication.
#[derive(Debug, Clone, Default)]
pub struct WorkerNames {
    names: HashMap<String, String>,
}

impl WorkerNames {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let names: HashMap<String, String> =
            read_json(path).with_context(|| format!("Invalid name map: {:?}", path))?;
        Ok(Self { names })
    }

    /// Mapped name with its digits moved to the end as subscripts.
    pub fn display(&self, worker: &str) -> String {
        let mapped = self.names.get(worker).map(String::as_str).unwrap_or(worker);
        if !mapped.chars().any(|c| c.is_ascii_digit()) {
            return mapped.to_string();
        }
        let base: String = mapped.chars().filter(|c| !c.is_ascii_digit()).collect();
        let digits: String = mapped
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| SUBSCRIPT_DIGITS[d as usize])
            .collect();
        base + &digits
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairVector {
    pub worker_1: String,
    pub worker_2: String,
    /// `(test ID, outcome)` in ID order.
    pub cells: Vec<(u64, Outcome)>,
}

impl PairVector {
    pub fn successes(&self) -> usize {
        self.cells.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn render(&self) -> String {
        self.cells.iter().map(|(_, o)| o.symbol()).collect()
    }
}

/// One vector per worker pair, sorted by pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorGroup {
    pub label: String,
    pub pairs: Vec<PairVector>,
}

impl VectorGroup {
    pub fn outcomes(&self) -> BTreeSet<Outcome> {
        self.pairs
            .iter()
            .flat_map(|p| p.cells.iter().map(|(_, o)| *o))
            .collect()
    }
}

/// Classify `results` and arrange them into vectors.
pub fn build_vectors(results: &ResultMap, kind: ReportKind) -> Vec<VectorGroup> {
    let mut by_pair: BTreeMap<(String, String), Vec<(u64, Outcome)>> = BTreeMap::new();
    for (id, entry) in results {
        by_pair
            .entry((entry.worker_1.clone(), entry.worker_2.clone()))
            .or_default()
            .push((*id, kind.classify(entry)));
    }

    let labels: &[&str] = if kind.splits_protocols() {
        &["HTTP", "HTTPS"]
    } else {
        &[kind.as_str()]
    };

    let groups: Vec<VectorGroup> = labels
        .iter()
        .enumerate()
        .map(|(index, label)| VectorGroup {
            label: label.to_string(),
            pairs: by_pair
                .iter()
                .map(|((worker_1, worker_2), cells)| PairVector {
                    worker_1: worker_1.clone(),
                    worker_2: worker_2.clone(),
                    cells: cells
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| i % labels.len() == index)
                        .map(|(_, cell)| *cell)
                        .collect(),
                })
                .collect(),
        })
        .collect();

    info!(
        "Classified {} results into {} pairs",
        results.len(),
        by_pair.len()
    );
    groups
}

/// Legend order: Match first, Other last, the rest by label.
fn legend(outcomes: &BTreeSet<Outcome>) -> Vec<Outcome> {
    let mut sorted: Vec<Outcome> = outcomes.iter().copied().collect();
    sorted.sort_by_key(|o| match o {
        Outcome::Match => (0, ""),
        Outcome::Other => (2, ""),
        other => (1, other.label()),
    });
    sorted
}

pub fn render_table(group: &VectorGroup, names: &WorkerNames) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Pair", "Tests", "OK", "Vector"]);

    for pair in &group.pairs {
        table.add_row(vec![
            Cell::new(format!(
                "{} ↔ {}",
                names.display(&pair.worker_1),
                names.display(&pair.worker_2)
            )),
            Cell::new(pair.cells.len()),
            Cell::new(pair.successes()),
            Cell::new(pair.render()),
        ]);
    }

    let legend = legend(&group.outcomes())
        .iter()
        .map(|o| format!("{} {}", o.symbol(), o.label()))
        .collect::<Vec<_>>()
        .join("  ");

    format!("{}\n{}\nLegend: {}\n", group.label, table, legend)
}

pub fn to_csv(groups: &[VectorGroup]) -> String {
    let mut csv = String::new();
    csv.push_str("group,worker_1,worker_2,position,test_id,outcome\n");
    for group in groups {
        for pair in &group.pairs {
            for (position, (id, outcome)) in pair.cells.iter().enumerate() {
                csv.push_str(&format!(
                    "{},{},{},{},{},{}\n",
                    group.label, pair.worker_1, pair.worker_2, position, id, outcome
                ));
            }
        }
    }
    csv
}

pub fn export_csv(groups: &[VectorGroup], path: &Path) -> Result<()> {
    std::fs::write(path, to_csv(groups))
        .with_context(|| format!("Failed to write CSV: {:?}", path))?;
    info!("Exported vectors to {:?}", path);
    Ok(())
}
