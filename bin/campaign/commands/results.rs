//! Results commands - maintain and inspect results files

use crate::style::*;
use anyhow::{anyhow, Result};
use campaign_runner::analysis::{discrepancies, domain_coverage, enrich};
use campaign_runner::results::filtered_file_name;
use campaign_runner::util::files::{read_yaml, write_json};
use campaign_runner::{load_profiles, Campaign, ResultFilter, ResultStore, RunnerConfig};
use chrono::Utc;
use clap::Subcommand;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ResultsCommand {
    /// Rewrite results files in numeric ID order
    Sort {
        /// Results files (defaults to the configured one)
        files: Vec<PathBuf>,
    },
    /// Drop records whose workers have no profile anymore
    Prune {
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(long)]
        profiles: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Keep the records matching every filter
    Filter {
        #[arg(long)]
        results: Option<PathBuf>,
        /// field=value on worker_1, worker_2, status or test_name (repeatable)
        #[arg(long = "where", value_name = "FIELD=VALUE", required = true)]
        filters: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add protocol and hostname from the campaign to each record
    Enrich {
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(long)]
        campaign: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report hosts whose dict and sync results disagree (enriched records)
    Discrepancies {
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare expected domains with the qnames Worker_2 received
    Coverage {
        /// YAML list of expected domains
        #[arg(long)]
        expected: PathBuf,
        /// Results files to scan (repeatable)
        #[arg(long = "results")]
        results: Vec<PathBuf>,
    },
}

pub fn run(config: &RunnerConfig, command: ResultsCommand) -> Result<()> {
    let default_results = || config.paths.results_file.clone();

    match command {
        ResultsCommand::Sort { files } => {
            let files = if files.is_empty() {
                vec![default_results()]
            } else {
                files
            };
            for path in files {
                if !path.exists() {
                    print_warning(&format!("Not found: {}", path.display()));
                    continue;
                }
                // Loading re-keys by number; saving writes in order.
                let store = ResultStore::open(&path)?;
                store.save()?;
                print_success(&format!("Sorted {} ({} records)", path.display(), store.len()));
            }
        }

        ResultsCommand::Prune {
            results,
            profiles,
            output,
        } => {
            let results = results.unwrap_or_else(default_results);
            let profiles_dir = profiles.unwrap_or_else(|| config.paths.profiles_dir.clone());
            let workers: BTreeSet<String> = load_profiles(&profiles_dir)?
                .into_iter()
                .map(|p| p.name)
                .collect();

            let mut store = ResultStore::open(&results)?;
            let removed = store.retain_workers(&workers);
            let output = output.unwrap_or(results);
            ResultStore::with_entries(&output, store.into_entries()).save()?;
            print_success(&format!(
                "Removed {} records, saved to {}",
                removed,
                output.display()
            ));
        }

        ResultsCommand::Filter {
            results,
            filters,
            output,
        } => {
            let filters = filters
                .iter()
                .map(|f| ResultFilter::parse(f))
                .collect::<Result<Vec<_>>>()?;
            let store = ResultStore::open(results.unwrap_or_else(default_results))?;
            let kept = store.filtered(&filters);
            if kept.is_empty() {
                print_warning("No records matched the filters");
                return Ok(());
            }
            let output =
                output.unwrap_or_else(|| PathBuf::from(filtered_file_name(&filters, Utc::now())));
            let count = kept.len();
            ResultStore::with_entries(&output, kept).save()?;
            print_success(&format!("Saved {} records to {}", count, output.display()));
        }

        ResultsCommand::Enrich {
            results,
            campaign,
            output,
        } => {
            let results = results.unwrap_or_else(default_results);
            let campaign =
                Campaign::load(&campaign.unwrap_or_else(|| config.paths.campaign_file.clone()))?;
            let mut entries = ResultStore::open(&results)?.into_entries();
            let enriched = enrich(&mut entries, &campaign);
            let output = output.unwrap_or(results);
            ResultStore::with_entries(&output, entries).save()?;
            print_success(&format!(
                "Enriched {} records, saved to {}",
                enriched,
                output.display()
            ));
        }

        ResultsCommand::Discrepancies { results, output } => {
            let store = ResultStore::open(results.unwrap_or_else(default_results))?;
            let verdicts = discrepancies(store.entries());

            print_header("Dict / Sync Discrepancies");
            for (key, differs) in &verdicts {
                let label = if *differs { "yes" } else { "no" };
                print_field_toned(key, label, Tone::for_verdict(*differs));
            }
            println!();

            if let Some(output) = output {
                let rendered: serde_json::Map<String, Value> = verdicts
                    .iter()
                    .map(|(key, differs)| {
                        (key.clone(), Value::from(if *differs { "yes" } else { "no" }))
                    })
                    .collect();
                write_json(&output, &rendered)?;
                print_success(&format!("Saved to {}", output.display()));
            }
        }

        ResultsCommand::Coverage { expected, results } => {
            let expected_domains: Vec<String> = read_yaml(&expected)?;
            let results = if results.is_empty() {
                vec![default_results()]
            } else {
                results
            };
            let sets = results
                .iter()
                .map(|path| ResultStore::open(path).map(ResultStore::into_entries))
                .collect::<Result<Vec<_>>>()?;
            if sets.iter().all(|s| s.is_empty()) {
                return Err(anyhow!("No results to scan"));
            }

            let coverage = domain_coverage(&expected_domains, &sets);
            let missing = coverage.missing();
            let unexpected = coverage.unexpected();

            print_header("Domain Coverage");
            print_field("Expected domains", &coverage.expected.len().to_string());
            print_field("Domains seen", &coverage.seen.len().to_string());
            print_field("Missing", &missing.len().to_string());
            print_field("Unexpected", &unexpected.len().to_string());

            if !missing.is_empty() {
                print_section("Missing domains");
                for domain in missing {
                    println!("    - {}", domain);
                }
            }
            if !unexpected.is_empty() {
                print_section("Unexpected domains");
                for domain in unexpected {
                    println!("    - {}", domain);
                }
            }
            println!();
        }
    }
    Ok(())
}
