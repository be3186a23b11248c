//! Campaign CLI
//!
//! Generates the campaign matrix, runs it against the task API and works
//! with the collected results.

mod commands;
mod style;
mod wizard;

use anyhow::Result;
use campaign_runner::RunnerConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use style::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "campaign")]
#[command(about = "Generate, run and analyse network measurement campaigns")]
struct Cli {
    /// Configuration file (defaults to ./campaign.toml when present)
    #[arg(short, long, global = true, env = "CAMPAIGN_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the campaign from profiles and test trees
    Generate(commands::generate::GenerateArgs),
    /// Submit campaign entries and collect their results
    Run(commands::run::RunArgs),
    /// Carry results over to a regenerated campaign
    Reconcile(commands::reconcile::ReconcileArgs),
    /// Find the IDs of a test between two workers
    Find(commands::find::FindArgs),
    /// Maintain results files
    Results {
        #[command(subcommand)]
        command: commands::results::ResultsCommand,
    },
    /// Classify results into per pair vectors
    Report(commands::report::ReportArgs),
}

pub fn print_banner() {
    print_banner_line("campaign · network measurement campaign runner");
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RunnerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate(args) => commands::generate::run(&config, args),
        Commands::Run(args) => commands::run::run(&config, args).await,
        Commands::Reconcile(args) => commands::reconcile::run(&config, args),
        Commands::Find(args) => commands::find::run(&config, args),
        Commands::Results { command } => commands::results::run(&config, command),
        Commands::Report(args) => commands::report::run(&config, args),
    }
}
