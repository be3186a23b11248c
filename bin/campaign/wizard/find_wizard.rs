//! Find wizard - pick a test, worker pair and target

use anyhow::{anyhow, Result};
use campaign_runner::{lookup, Campaign};
use console::style;
use dialoguer::{theme::ColorfulTheme, Select};

#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub test: Option<String>,
    pub worker_1: Option<String>,
    pub worker_2: Option<String>,
    pub target: Option<String>,
}

fn choose(theme: &ColorfulTheme, prompt: &str, items: &[String]) -> Result<String> {
    if items.is_empty() {
        return Err(anyhow!("Nothing to choose for {}", prompt.trim()));
    }
    let index = Select::with_theme(theme)
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?;
    Ok(items[index].clone())
}

/// Prompt for every field of `query` that is still unset.
pub fn run_find_wizard(campaign: &Campaign, query: FindQuery) -> Result<FindQuery> {
    let theme = ColorfulTheme::default();
    println!();
    println!("  {}", style("Find Test IDs").cyan().bold());
    println!();

    let test = match query.test {
        Some(test) => test,
        None => choose(&theme, "  Test", &lookup::list_tests(campaign))?,
    };
    let workers = lookup::list_workers(campaign);
    let worker_1 = match query.worker_1 {
        Some(worker) => worker,
        None => choose(&theme, "  Worker 1", &workers)?,
    };
    let worker_2 = match query.worker_2 {
        Some(worker) => worker,
        None => choose(&theme, "  Worker 2", &workers)?,
    };
    let target = match query.target {
        Some(target) => target,
        None => choose(&theme, "  Target", &lookup::list_targets(campaign, Some(&test)))?,
    };

    Ok(FindQuery {
        test: Some(test),
        worker_1: Some(worker_1),
        worker_2: Some(worker_2),
        target: Some(target),
    })
}
