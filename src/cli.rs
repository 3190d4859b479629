//! CLI interface for prebox.
//!
//! Every subcommand is non-interactive: arguments in, plain text (or JSON with
//! `--json`) out. Status messages and warnings go to stderr so stdout stays
//! pipeable.
//!
//! Commands split into groups:
//!
//! - `prebox status` and `prebox report`: read-only views.
//! - `prebox bay …` and `prebox trip …`: edit the registry and the trip log.
//! - `prebox shift …`, `prebox backup …`, `prebox settings …`, `prebox log`.
//!
//! Trips are referenced by full id, unambiguous id prefix, or trip number.

mod backup;
mod bay;
mod format;
mod report;
mod settings;
mod shift;
mod trip;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jiff::Timestamp;
use jiff::civil::{Date, Time};
use tracing::debug;

use crate::config::{Config, resolve_home};
use crate::model::{parse_date, parse_time};
use crate::storage::Storage;
use crate::store::Store;

use format::{format_timestamp, print_notices, print_standing_warnings};

/// prebox: track pré-box bays against the trip log.
#[derive(Debug, Parser)]
#[command(name = "prebox", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Data directory. Defaults to `$PREBOX_HOME`, then `~/.prebox`.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: a trip through a pré-box
  1. prebox trip add 508938 --bay 331 --quantity 11 --region S
     → bay 331 becomes occupied
  2. prebox status
  3. prebox trip release 508938
     → bay 331 is free again
  4. prebox shift close --bays-verified --pending-documented --incidents-recorded

Reports:
  prebox report --from 2025-02-01 --to 2025-02-07
  prebox trip list --filter region=sul --filter shift=1
  prebox trip export --out trips.csv"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the bay grid, counts and standing warnings.
    Status {
        /// Print JSON instead of the grid.
        #[arg(long)]
        json: bool,
    },

    /// Manage bays: add, remove, cycle, block.
    Bay {
        #[command(subcommand)]
        command: bay::BayCommand,
    },

    /// Manage the trip log.
    Trip {
        #[command(subcommand)]
        command: trip::TripCommand,
    },

    /// Dashboard statistics over bays and (filtered) trips.
    Report(report::ReportArgs),

    /// Shift summary and shift close.
    Shift {
        #[command(subcommand)]
        command: shift::ShiftCommand,
    },

    /// Create, list, prune and restore backups.
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommand,
    },

    /// Show or reset configuration.
    Settings {
        #[command(subcommand)]
        command: settings::SettingsCommand,
    },

    /// Show the change journal, newest last.
    Log {
        /// How many recent changes to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    let home = resolve_home(cli.home.as_deref())?;
    debug!(home = %home.display(), "resolved home");

    // Settings work on the file alone; a broken config must stay fixable.
    let command = match cli.command {
        Command::Settings { command } => return settings::run(&home, command),
        other => other,
    };

    let config = Config::load(&home)?;
    let storage = Storage::open(&home, &config.storage)
        .map_err(|e| format!("failed to initialize storage at {}: {e}", home.display()))?;
    let (mut store, notices) = Store::open(storage, &config, Timestamp::now());
    print_notices(&notices, &config.notifications);

    match store.auto_backup(&config.backup, Timestamp::now()) {
        Ok(Some(info)) => eprintln!("Automatic backup: {}", info.name),
        Ok(None) => {}
        Err(e) => eprintln!("warning: automatic backup failed: {e}"),
    }

    let result = match command {
        Command::Status { json } => report::cmd_status(&store, &config, json),
        Command::Bay { command } => bay::run(&mut store, &config, command),
        Command::Trip { command } => trip::run(&mut store, &config, command),
        Command::Report(args) => report::cmd_report(&store, &args),
        Command::Shift { command } => shift::run(&store, &config, command),
        Command::Backup { command } => backup::run(&mut store, &config, command),
        Command::Log { limit } => cmd_log(&store, limit),
        Command::Settings { command } => settings::run(&home, command),
    };

    print_standing_warnings(&store);
    result
}

fn cmd_log(store: &Store, limit: usize) -> Result<(), String> {
    let changes = store
        .storage()
        .load_changes()
        .map_err(|e| format!("failed to read change journal: {e}"))?;

    if changes.is_empty() {
        println!("No changes recorded");
        return Ok(());
    }

    let skip = changes.len().saturating_sub(limit);
    for change in &changes[skip..] {
        println!(
            "{}  {:<6}  {:<5}  {}",
            format_timestamp(change.at),
            change.kind.as_str(),
            change.collection.key(),
            change.key
        );
    }
    Ok(())
}

/// Today in the local time zone.
fn today() -> Date {
    jiff::Zoned::now().date()
}

fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{s}' (use yyyy-mm-dd or dd/mm/yyyy)"))
}

fn parse_time_arg(s: &str) -> Result<Time, String> {
    parse_time(s).ok_or_else(|| format!("invalid time '{s}' (use HH:MM)"))
}
