//! Run wizard - choose which entries to submit

use anyhow::Result;
use campaign_runner::{lookup, Campaign, RunOptions, Selection};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

pub fn run_selection_wizard(campaign: &Campaign) -> Result<RunOptions> {
    let theme = ColorfulTheme::default();

    println!();
    println!("  {}", style("Select Campaign Entries").cyan().bold());
    println!(
        "  {}",
        style(format!("{} entries in the campaign", campaign.len())).dim()
    );
    println!();

    let modes = ["All entries", "Single test ID", "ID range", "Test name"];
    let mode = Select::with_theme(&theme)
        .with_prompt("  Run mode")
        .items(&modes)
        .default(0)
        .interact()?;

    let selection = match mode {
        1 => {
            let id: u64 = Input::with_theme(&theme)
                .with_prompt("  Test ID")
                .validate_with(|id: &u64| -> Result<(), &str> {
                    if campaign.get(*id).is_some() {
                        Ok(())
                    } else {
                        Err("No entry with this ID")
                    }
                })
                .interact_text()?;
            Selection::Ids([id].into_iter().collect())
        }
        2 => {
            let range: String = Input::with_theme(&theme)
                .with_prompt("  Range (start-end)")
                .validate_with(|input: &String| -> Result<(), String> {
                    Selection::parse_range(input)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()?;
            Selection::parse_range(&range)?
        }
        3 => {
            let tests = lookup::list_tests(campaign);
            let index = Select::with_theme(&theme)
                .with_prompt("  Test")
                .items(&tests)
                .default(0)
                .interact()?;
            Selection::Name(tests[index].clone())
        }
        _ => Selection::All,
    };

    let rerun = Confirm::with_theme(&theme)
        .with_prompt("  Re-run entries that already completed?")
        .default(false)
        .interact()?;

    println!(
        "  {} Selection: {}",
        style("✓").green(),
        style(format!("{:?}", selection)).cyan()
    );

    Ok(RunOptions { selection, rerun })
}
