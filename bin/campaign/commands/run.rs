//! Run command - submit campaign entries and record their results

use crate::print_banner;
use crate::style::*;
use crate::wizard::run_selection_wizard;
use anyhow::{anyhow, Result};
use campaign_runner::{
    Campaign, CampaignRunner, PollSettings, ResultStore, RunOptions, RunnerConfig, Selection,
    TaskClient,
};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Campaign file
    #[arg(long)]
    campaign: Option<PathBuf>,

    /// Results file
    #[arg(long)]
    results: Option<PathBuf>,

    /// Run only this test ID (repeatable)
    #[arg(long = "id", conflicts_with_all = ["range", "name"])]
    ids: Vec<u64>,

    /// Run an inclusive ID range, e.g. 10-25
    #[arg(long, conflicts_with = "name")]
    range: Option<String>,

    /// Run every entry of one test
    #[arg(long)]
    name: Option<String>,

    /// Re-run entries already recorded as completed
    #[arg(long)]
    rerun: bool,

    /// Choose the selection interactively
    #[arg(short, long)]
    interactive: bool,

    /// Master node host name
    #[arg(long, env = "CAMPAIGN_MASTER")]
    master: Option<String>,

    /// Task API endpoint
    #[arg(long, env = "CAMPAIGN_TASK_URL")]
    task_url: Option<String>,

    /// Polling timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl RunArgs {
    fn options(&self) -> Result<RunOptions> {
        let selection = if !self.ids.is_empty() {
            Selection::Ids(self.ids.iter().copied().collect())
        } else if let Some(range) = &self.range {
            Selection::parse_range(range)?
        } else if let Some(name) = &self.name {
            Selection::Name(name.clone())
        } else {
            Selection::All
        };
        Ok(RunOptions {
            selection,
            rerun: self.rerun,
        })
    }
}

pub async fn run(config: &RunnerConfig, args: RunArgs) -> Result<()> {
    print_banner();
    print_header("Campaign Run");

    let mut api = config.api.clone();
    if let Some(master) = &args.master {
        api.master = master.clone();
    }
    if let Some(task_url) = &args.task_url {
        api.task_url = task_url.clone();
    }
    api.validate()?;

    let mut poll = PollSettings::from(&config.poll);
    if let Some(timeout) = args.timeout {
        poll.timeout = Duration::from_secs(timeout);
    }

    let campaign_path = args
        .campaign
        .clone()
        .unwrap_or_else(|| config.paths.campaign_file.clone());
    let results_path = args
        .results
        .clone()
        .unwrap_or_else(|| config.paths.results_file.clone());

    let campaign = Campaign::load(&campaign_path)?;
    if campaign.is_empty() {
        return Err(anyhow!("Campaign {} has no entries", campaign_path.display()));
    }

    let options = if args.interactive {
        run_selection_wizard(&campaign)?
    } else {
        args.options()?
    };

    let mut store = ResultStore::open(&results_path)?;
    print_field("Campaign", &format!("{} ({} entries)", campaign_path.display(), campaign.len()));
    print_field("Results", &format!("{} ({} recorded)", results_path.display(), store.len()));
    print_field("Master", &api.master);
    print_field("Task API", &api.task_url);
    println!();

    let client = TaskClient::new(api, poll)?;
    let mut runner = CampaignRunner::new(&client, &mut store);
    let summary = runner
        .run_with(&campaign, &options, |entry, record| {
            let pair = format!("{} → {}", entry.worker_1.name(), entry.worker_2.name());
            print_status_line(entry.id, &entry.name, &pair, record.status);
        })
        .await?;

    print_section("Summary");
    print_field("Selected", &summary.selected.to_string());
    print_field("Skipped (completed)", &summary.skipped_completed.to_string());
    print_field_toned(
        "Completed",
        &summary.completed.to_string(),
        Tone::for_count(summary.completed, Tone::Good),
    );
    print_field_toned(
        "Polling failed",
        &summary.polling_failed.to_string(),
        Tone::for_count(summary.polling_failed, Tone::Warn),
    );
    print_field_toned(
        "Submission failed",
        &summary.submission_failed.to_string(),
        Tone::for_count(summary.submission_failed, Tone::Bad),
    );
    print_field_toned(
        "Errors",
        &summary.errors.to_string(),
        Tone::for_count(summary.errors, Tone::Bad),
    );
    println!();

    if summary.selected == 0 {
        print_warning("No entries matched the selection");
    } else if summary.attempted() == summary.completed {
        print_success("All attempted entries completed");
    } else {
        print_hint("Re-run the command to retry entries that did not complete");
    }
    Ok(())
}
