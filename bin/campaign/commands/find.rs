//! Find command - locate test IDs in the campaign

use crate::print_banner;
use crate::style::*;
use crate::wizard::{run_find_wizard, FindQuery};
use anyhow::{anyhow, Result};
use campaign_runner::{lookup, Campaign, RunnerConfig};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Campaign file
    #[arg(long)]
    campaign: Option<PathBuf>,

    /// Test name
    #[arg(long)]
    test: Option<String>,

    /// Worker_1 name
    #[arg(long)]
    worker_1: Option<String>,

    /// Worker_2 name
    #[arg(long)]
    worker_2: Option<String>,

    /// Target domain (qname, hostname, SNI domain or request host)
    #[arg(long)]
    target: Option<String>,

    /// Only list the tests, workers and targets in the campaign
    #[arg(long)]
    list: bool,
}

pub fn run(config: &RunnerConfig, args: FindArgs) -> Result<()> {
    print_banner();

    let path = args
        .campaign
        .clone()
        .unwrap_or_else(|| config.paths.campaign_file.clone());
    let campaign = Campaign::load(&path)?;

    if args.list {
        print_section("Tests");
        for test in lookup::list_tests(&campaign) {
            println!("    {}", test);
        }
        print_section("Workers");
        for worker in lookup::list_workers(&campaign) {
            println!("    {}", worker);
        }
        print_section("Targets");
        for target in lookup::list_targets(&campaign, args.test.as_deref()) {
            println!("    {}", target);
        }
        println!();
        return Ok(());
    }

    let query = run_find_wizard(
        &campaign,
        FindQuery {
            test: args.test,
            worker_1: args.worker_1,
            worker_2: args.worker_2,
            target: args.target,
        },
    )?;
    let (Some(test), Some(worker_1), Some(worker_2), Some(target)) =
        (query.test, query.worker_1, query.worker_2, query.target)
    else {
        return Err(anyhow!("Incomplete query"));
    };

    print_header("Matching Tests");
    print_field("Test", &test);
    print_field("Pair", &format!("{} → {}", worker_1, worker_2));
    print_field("Target", &target);
    println!();

    let ids = lookup::find_test_ids(&campaign, &test, &worker_1, &worker_2, &target);
    if ids.is_empty() {
        print_warning("No matching test found");
    } else {
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        print_success(&format!("Matching test ID(s): {}", ids.join(", ")));
    }
    Ok(())
}
