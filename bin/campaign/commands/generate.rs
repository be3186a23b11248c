//! Generate command - build the campaign file

use crate::print_banner;
use crate::style::*;
use anyhow::{Context, Result};
use campaign_runner::{
    load_profiles, load_templates, CampaignBuilder, FsListSource, ParameterExpander, RunnerConfig,
};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Worker profiles directory
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Test tree templates directory
    #[arg(long)]
    tests: Option<PathBuf>,

    /// Output campaign file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(config: &RunnerConfig, args: GenerateArgs) -> Result<()> {
    print_banner();
    print_header("Campaign Generation");

    let profiles_dir = args.profiles.unwrap_or_else(|| config.paths.profiles_dir.clone());
    let tests_dir = args.tests.unwrap_or_else(|| config.paths.tests_dir.clone());
    let output = args.output.unwrap_or_else(|| config.paths.campaign_file.clone());

    let profiles = load_profiles(&profiles_dir)?;
    let templates = load_templates(&tests_dir)?;
    print_field("Profiles", &format!("{} ({})", profiles.len(), profiles_dir.display()));
    print_field("Test trees", &format!("{} ({})", templates.len(), tests_dir.display()));

    let expander = ParameterExpander::new(
        FsListSource::new(&config.paths.references_dir),
        config.generator.expand_options(),
    );
    let (campaign, stats) = CampaignBuilder::new(expander)
        .build_with_stats(&profiles, &templates)
        .context("Campaign generation failed")?;

    campaign.save(&output)?;

    print_section("Summary");
    print_field("Worker pairs", &stats.pairs.to_string());
    for (reason, count) in &stats.skipped {
        print_field(&format!("Skipped ({})", reason), &count.to_string());
    }
    print_field("Entries", &campaign.len().to_string());
    print_field("SHA-256", &campaign.digest()?);
    println!();

    if campaign.is_empty() {
        print_warning("Campaign is empty");
    } else {
        print_success(&format!("Campaign written to {}", output.display()));
    }
    Ok(())
}
