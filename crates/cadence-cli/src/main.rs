//! `cadence` CLI — validate and expand recurrence rules from the command
//! line.
//!
//! ## Usage
//!
//! ```sh
//! # Parse and validate a rule, printing its normalized form
//! cadence check --rule "RRULE:FREQ=DAILY;COUNT=3"
//!
//! # Expand a rule inside a window (anchor span fixes the duration)
//! cadence expand --rule "FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=5" \
//!     --start 2025-01-06T09:00:00Z --end 2025-01-06T09:30:00Z \
//!     --from 2025-01-01T00:00:00Z --to 2025-02-01T00:00:00Z
//!
//! # First occurrence strictly after a point in time
//! cadence next --rule "FREQ=MONTHLY" \
//!     --start 2025-01-31T10:00:00Z --end 2025-01-31T11:00:00Z \
//!     --after 2025-02-01T00:00:00Z
//! ```

use anyhow::{Context, Result};
use cadence_engine::{
    expand_in_window, next_occurrence, ExpandOptions, Occurrence, RecurrenceRule,
    DEFAULT_MAX_OCCURRENCES,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Recurrence rule expansion and validation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a rule, printing its normalized form
    Check {
        /// Rule text, with or without the "RRULE:" prefix
        #[arg(short, long)]
        rule: String,
    },
    /// Expand a rule into concrete occurrences inside a window
    Expand {
        /// Rule text, with or without the "RRULE:" prefix
        #[arg(short, long)]
        rule: String,
        /// Anchor start — the series' first occurrence (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Anchor end — fixes the duration of every occurrence
        #[arg(long)]
        end: DateTime<Utc>,
        /// Window start, inclusive
        #[arg(long)]
        from: DateTime<Utc>,
        /// Window end, exclusive
        #[arg(long)]
        to: DateTime<Utc>,
        /// Cap on the number of returned occurrences
        #[arg(long, default_value_t = DEFAULT_MAX_OCCURRENCES)]
        max: usize,
        /// Emit a JSON array instead of plain lines
        #[arg(long)]
        json: bool,
    },
    /// Print the first occurrence strictly after a point in time
    Next {
        /// Rule text, with or without the "RRULE:" prefix
        #[arg(short, long)]
        rule: String,
        /// Anchor start — the series' first occurrence (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Anchor end — fixes the duration of every occurrence
        #[arg(long)]
        end: DateTime<Utc>,
        /// Lower bound, exclusive
        #[arg(long)]
        after: DateTime<Utc>,
        /// Emit JSON instead of a plain line
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { rule } => {
            let parsed = parse_rule(&rule)?;
            println!("{parsed}");
        }
        Commands::Expand {
            rule,
            start,
            end,
            from,
            to,
            max,
            json,
        } => {
            let parsed = parse_rule(&rule)?;
            let options = ExpandOptions {
                max_occurrences: max,
                ..ExpandOptions::default()
            };
            let occurrences = expand_in_window(&parsed, start, end, from, to, &options)
                .context("Failed to expand rule")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&occurrences)?);
            } else {
                for occurrence in &occurrences {
                    print_occurrence(occurrence);
                }
            }
        }
        Commands::Next {
            rule,
            start,
            end,
            after,
            json,
        } => {
            let parsed = parse_rule(&rule)?;
            let next = next_occurrence(&parsed, start, end, after)
                .context("Failed to compute next occurrence")?;
            match next {
                Some(occurrence) if json => {
                    println!("{}", serde_json::to_string_pretty(&occurrence)?);
                }
                Some(occurrence) => print_occurrence(&occurrence),
                None => println!("none"),
            }
        }
    }

    Ok(())
}

/// Parse and validate in one step; `check` prints the normalized result,
/// the other commands only want a usable rule.
fn parse_rule(text: &str) -> Result<RecurrenceRule> {
    let rule = RecurrenceRule::parse(text).context("Failed to parse rule")?;
    rule.validate().context("Rule failed validation")?;
    Ok(rule)
}

fn print_occurrence(occurrence: &Occurrence) {
    println!(
        "{} {}",
        occurrence.start.to_rfc3339(),
        occurrence.end.to_rfc3339()
    );
}
