//! Report command - classify results into per pair vectors

use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use campaign_runner::analysis::vectors::{export_csv, render_table};
use campaign_runner::analysis::{build_vectors, ReportKind, WorkerNames};
use campaign_runner::{ResultStore, RunnerConfig};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    HttpSimple,
    HttpConformance,
    Dns,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::HttpSimple => ReportKind::HttpSimple,
            KindArg::HttpConformance => ReportKind::HttpConformance,
            KindArg::Dns => ReportKind::Dns,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Classifier to apply
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Results file
    #[arg(long)]
    results: Option<PathBuf>,

    /// JSON map of worker names to display names
    #[arg(long)]
    names: Option<PathBuf>,

    /// Also export every cell as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

pub fn run(config: &RunnerConfig, args: ReportArgs) -> Result<()> {
    print_banner();

    let kind = ReportKind::from(args.kind);
    let results_path = args
        .results
        .unwrap_or_else(|| config.paths.results_file.clone());
    let store = ResultStore::open(&results_path)?;
    let names = match &args.names {
        Some(path) => WorkerNames::load(path)?,
        None => WorkerNames::default(),
    };

    print_header(&format!("Classification: {}", kind.as_str()));
    print_field("Results", &format!("{} ({} records)", results_path.display(), store.len()));
    println!();

    if store.is_empty() {
        print_warning("No results to classify");
        return Ok(());
    }

    let groups = build_vectors(store.entries(), kind);
    for group in &groups {
        println!("{}", render_table(group, &names));
    }

    if let Some(path) = &args.csv {
        export_csv(&groups, path)?;
        print_success(&format!("CSV saved to {}", path.display()));
    }
    Ok(())
}
