//! `prebox shift …`: shift summary, close and history.

use clap::Subcommand;
use jiff::{Timestamp, Zoned};
use jiff::civil::Date;

use crate::config::Config;
use crate::identity::resolve_operator;
use crate::model::{Checklist, ShiftSummary};
use crate::report::shift_summary;
use crate::store::Store;

use super::format::{format_bay_stats, format_timestamp};
use super::{parse_date_arg, today};

#[derive(Debug, Subcommand)]
pub enum ShiftCommand {
    /// Trips of the day and the registry as it stands.
    Summary {
        /// Day to summarize. Defaults to today.
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },

    /// Close the shift. Every checklist item must be confirmed.
    Close {
        /// Day being closed. Defaults to today.
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,

        /// Incidents and observations.
        #[arg(long)]
        notes: Option<String>,

        /// Who is closing. Defaults to `$PREBOX_OPERATOR`, then the config.
        #[arg(long)]
        operator: Option<String>,

        /// Every bay was checked against the floor.
        #[arg(long)]
        bays_verified: bool,

        /// Pending trips were handed over.
        #[arg(long)]
        pending_documented: bool,

        /// Incidents were written down.
        #[arg(long)]
        incidents_recorded: bool,
    },

    /// Past shift closes, oldest first.
    History {
        /// How many recent closes to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

pub(super) fn run(store: &Store, config: &Config, command: ShiftCommand) -> Result<(), String> {
    match command {
        ShiftCommand::Summary { date } => {
            let now = Zoned::now();
            let shift = config.current_shift(now.time()).map(|s| s.name.clone());
            let summary = shift_summary(
                store.bays(),
                store.trips(),
                date.unwrap_or_else(today),
                shift,
            );
            print_summary(&summary);
            Ok(())
        }
        ShiftCommand::Close {
            date,
            notes,
            operator,
            bays_verified,
            pending_documented,
            incidents_recorded,
        } => {
            let checklist = Checklist {
                bays_verified,
                pending_documented,
                incidents_recorded,
            };
            let operator = resolve_operator(operator.as_deref(), config);
            let close = store
                .close_shift(
                    config,
                    date.unwrap_or_else(today),
                    checklist,
                    notes,
                    operator,
                    Timestamp::now(),
                )
                .map_err(|e| format!("failed to close shift: {e}"))?;

            print_summary(&close.summary);
            eprintln!("Shift closed ({})", close.id);
            Ok(())
        }
        ShiftCommand::History { limit } => {
            let closes = store
                .storage()
                .load_shift_closes()
                .map_err(|e| format!("failed to read shift history: {e}"))?;
            if closes.is_empty() {
                println!("No shift closes recorded");
                return Ok(());
            }
            let skip = closes.len().saturating_sub(limit);
            for close in &closes[skip..] {
                let summary = &close.summary;
                println!(
                    "{}  {}  {:<16} {:<12} {} trips, {} pending",
                    format_timestamp(close.closed_at),
                    summary.day,
                    summary.shift.as_deref().unwrap_or("-"),
                    close.operator.as_deref().unwrap_or("-"),
                    summary.total_trips,
                    summary.pending_trips,
                );
                if let Some(notes) = &close.notes {
                    println!("    {notes}");
                }
            }
            Ok(())
        }
    }
}

fn print_summary(summary: &ShiftSummary) {
    match &summary.shift {
        Some(shift) => println!("{} · {shift}", summary.day),
        None => println!("{}", summary.day),
    }
    println!(
        "  trips      {} ({} released, {} pending)",
        summary.total_trips, summary.completed_trips, summary.pending_trips
    );
    println!("  {}", format_bay_stats(&summary.bays));
}
