//! Reconcile command - remap results onto a regenerated campaign

use crate::print_banner;
use crate::style::*;
use anyhow::{anyhow, Result};
use campaign_runner::results::mapped_file_path;
use campaign_runner::{
    build_id_mapping, remap_results, Campaign, CollisionPolicy, ResultStore, RunnerConfig,
};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Campaign the results were collected with
    #[arg(long)]
    old: PathBuf,

    /// Regenerated campaign
    #[arg(long)]
    new: PathBuf,

    /// Results keyed by old IDs
    #[arg(long)]
    results: Option<PathBuf>,

    /// Output file (defaults to <results stem>_mapped.json next to the results)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail when two entries of one campaign share a fingerprint
    #[arg(long)]
    strict: bool,
}

pub fn run(config: &RunnerConfig, args: ReconcileArgs) -> Result<()> {
    print_banner();
    print_header("Result Reconciliation");

    let results_path = args
        .results
        .unwrap_or_else(|| config.paths.results_file.clone());
    let output = args
        .output
        .unwrap_or_else(|| mapped_file_path(&results_path));
    if output == results_path {
        return Err(anyhow!(
            "Refusing to overwrite {} with remapped results",
            results_path.display()
        ));
    }
    let policy = if args.strict {
        CollisionPolicy::Reject
    } else {
        CollisionPolicy::LastWriteWins
    };

    let old = Campaign::load(&args.old)?;
    let new = Campaign::load(&args.new)?;
    let results = ResultStore::open(&results_path)?;

    let ids = build_id_mapping(&old.entries, &new.entries, policy)?;
    for collision in &ids.collisions {
        print_warning(&format!(
            "{:?} campaign: entry {} shadows entry {} (same fingerprint)",
            collision.side, collision.kept_id, collision.shadowed_id
        ));
    }

    let (remapped, report) = remap_results(results.entries(), &ids);
    ResultStore::with_entries(&output, remapped).save()?;

    print_field("Old entries", &old.len().to_string());
    print_field("New entries", &new.len().to_string());
    print_field("Mapped IDs", &ids.mapping.len().to_string());
    print_field("Missing from new", &ids.missing.len().to_string());

    print_section("Results");
    print_field("Remapped", &report.remapped.to_string());
    print_field("Removed", &report.removed.to_string());
    print_field("Orphaned", &report.orphaned.to_string());
    if !report.skipped_workers.is_empty() {
        let workers: Vec<&str> = report.skipped_workers.iter().map(String::as_str).collect();
        print_field("Workers in removed", &workers.join(", "));
    }
    println!();

    print_success(&format!("Reconciled results written to {}", output.display()));
    Ok(())
}
