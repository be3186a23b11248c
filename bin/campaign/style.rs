//! Console output for the campaign CLI
//!
//! Every command prints a header, a block of `key: value` fields and a
//! closing verdict line. Colours go through [`Tone`] so result statuses,
//! run counters and discrepancy verdicts share one palette.

use campaign_runner::ResultStatus;
use console::{style, StyledObject};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warn,
    Bad,
    Plain,
}

impl Tone {
    pub fn for_status(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Completed => Tone::Good,
            ResultStatus::PollingFailed => Tone::Warn,
            ResultStatus::SubmissionFailed | ResultStatus::Error => Tone::Bad,
        }
    }

    /// Zero counters stay plain.
    pub fn for_count(count: usize, tone: Tone) -> Self {
        if count == 0 {
            Tone::Plain
        } else {
            tone
        }
    }

    pub fn for_verdict(differs: bool) -> Self {
        if differs {
            Tone::Bad
        } else {
            Tone::Good
        }
    }

    pub fn paint<D: Display>(self, value: D) -> StyledObject<D> {
        let styled = style(value);
        match self {
            Tone::Good => styled.green(),
            Tone::Warn => styled.yellow(),
            Tone::Bad => styled.red(),
            Tone::Plain => styled,
        }
    }
}

pub fn print_banner_line(text: &str) {
    println!("{}", style(text).cyan().bold());
}

pub fn print_header(title: &str) {
    let rule = "─".repeat(50usize.saturating_sub(title.chars().count()));
    println!();
    println!("{}", style(format!(" {} {}", title, rule)).cyan().bold());
    println!();
}

pub fn print_section(title: &str) {
    println!();
    println!("  {}", style(title).bold());
    println!("  {}", style("─".repeat(40)).dim());
}

pub fn print_field(key: &str, value: &str) {
    println!("  {} {}", style(format!("{}:", key)).dim(), value);
}

pub fn print_field_toned(key: &str, value: &str, tone: Tone) {
    println!("  {} {}", style(format!("{}:", key)).dim(), tone.paint(value));
}

/// One line per finished campaign entry during `run`.
pub fn print_status_line(id: u64, name: &str, pair: &str, status: ResultStatus) {
    println!(
        "  {} {} {:<24} {:<40} {}",
        style("→").cyan(),
        style(format!("#{:<5}", id)).bold(),
        name,
        style(pair).dim(),
        Tone::for_status(status).paint(status)
    );
}

pub fn print_success(msg: &str) {
    println!("{} {}", Tone::Good.paint("✓"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", Tone::Warn.paint("⚠"), Tone::Warn.paint(msg));
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", Tone::Bad.paint("✗"), Tone::Bad.paint(msg));
}

pub fn print_hint(msg: &str) {
    println!("{} {}", style("ℹ").blue(), msg);
}
