//! `prebox trip …`: the trip log.

use std::fs;
use std::io;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use jiff::Timestamp;
use jiff::civil::{Date, Time};

use crate::config::Config;
use crate::export::{read_csv, to_csv_string, write_csv};
use crate::model::{TripDraft, TripField, TripPatch};
use crate::store::Store;

use super::format::{format_trip_line, print_notices};
use super::report::FilterArgs;
use super::{parse_date_arg, parse_time_arg};

#[derive(Debug, Subcommand)]
pub enum TripCommand {
    /// List trips, optionally filtered.
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one trip with every field.
    Show {
        /// Trip id, id prefix or trip number.
        trip: String,
    },

    /// Add a trip. Date and time default to now.
    Add(AddArgs),

    /// Edit fields of a trip. An empty value clears an optional field.
    Edit(EditArgs),

    /// Release a trip's bay: the load has left the pré-box.
    Release {
        /// Trip id, id prefix or trip number.
        trip: String,

        /// Where the load went (the "Box-D" marker).
        #[arg(long = "to")]
        marker: Option<String>,
    },

    /// Remove a trip.
    Remove {
        /// Trip id, id prefix or trip number.
        trip: String,
    },

    /// Append trips from a CSV file with a header row.
    Import { path: PathBuf },

    /// Write trips as CSV.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Remove every trip.
    Clear {
        /// Required: confirms the whole log is dropped.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Trip number.
    trip_number: String,

    /// Pré-box the trip is parked in.
    #[arg(long)]
    bay: Option<String>,

    #[arg(long, value_parser = parse_date_arg)]
    date: Option<Date>,

    #[arg(long, value_parser = parse_time_arg)]
    time: Option<Time>,

    #[arg(long, default_value_t = 0)]
    quantity: u32,

    /// Shift number, 1 to 6. Defaults to 1.
    #[arg(long)]
    shift: Option<u8>,

    #[arg(long)]
    cargo_type: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    status: Option<String>,

    /// Previous trip number.
    #[arg(long)]
    previous: Option<String>,

    /// Next manifest date. Defaults to the trip date.
    #[arg(long, value_parser = parse_date_arg)]
    manifest_date: Option<Date>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Trip id, id prefix or trip number.
    trip: String,

    /// New trip number.
    #[arg(long)]
    number: Option<String>,

    #[arg(long)]
    bay: Option<String>,

    /// Released marker. Empty puts the trip back in its bay.
    #[arg(long)]
    marker: Option<String>,

    #[arg(long, value_parser = parse_date_arg)]
    date: Option<Date>,

    #[arg(long, value_parser = parse_time_arg)]
    time: Option<Time>,

    #[arg(long)]
    quantity: Option<u32>,

    #[arg(long)]
    shift: Option<u8>,

    #[arg(long)]
    cargo_type: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    status: Option<String>,

    #[arg(long)]
    previous: Option<String>,
}

pub(super) fn run(store: &mut Store, config: &Config, command: TripCommand) -> Result<(), String> {
    let now = Timestamp::now();
    let outcome = match command {
        TripCommand::List { filter, json } => return cmd_list(store, &filter, json),
        TripCommand::Show { trip } => return cmd_show(store, &trip),
        TripCommand::Export { out, filter } => return cmd_export(store, out, &filter),
        TripCommand::Add(args) => {
            let (id, outcome) = store
                .add_trip(args.into_draft(), now)
                .map_err(|e| format!("failed to add trip: {e}"))?;
            println!("{id}");
            outcome
        }
        TripCommand::Edit(args) => {
            let (reference, patch) = args.into_patch();
            store
                .update_trip(&reference, patch, now)
                .map_err(|e| format!("failed to edit trip: {e}"))?
        }
        TripCommand::Release { trip, marker } => store
            .release_trip(&trip, marker.as_deref(), now)
            .map_err(|e| format!("failed to release trip: {e}"))?,
        TripCommand::Remove { trip } => store
            .remove_trip(&trip, now)
            .map_err(|e| format!("failed to remove trip: {e}"))?,
        TripCommand::Import { path } => {
            let file = fs::File::open(&path)
                .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
            let trips = read_csv(io::BufReader::new(file))
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            store
                .import_trips(trips, now)
                .map_err(|e| format!("failed to import trips: {e}"))?
        }
        TripCommand::Clear { yes } => {
            if !yes {
                return Err(format!(
                    "this drops all {} trips; pass --yes to confirm",
                    store.trips().len()
                ));
            }
            store.clear_trips(now)
        }
    };

    print_notices(&outcome.notices, &config.notifications);
    Ok(())
}

fn cmd_list(store: &Store, filter: &FilterArgs, json: bool) -> Result<(), String> {
    let trips = filter.to_filter()?.apply(store.trips());

    if json {
        let out = serde_json::to_string_pretty(&trips)
            .map_err(|e| format!("failed to serialize trips: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    if trips.is_empty() {
        println!("No trips");
        return Ok(());
    }
    for trip in &trips {
        println!("{}", format_trip_line(trip));
    }
    eprintln!("{} of {} trips", trips.len(), store.trips().len());
    Ok(())
}

fn cmd_show(store: &Store, reference: &str) -> Result<(), String> {
    let trip = store.find_trip(reference).map_err(|e| e.to_string())?;
    for field in TripField::ALL {
        println!("{:<18} {}", field.name(), trip.field(field));
    }
    Ok(())
}

fn cmd_export(store: &Store, out: Option<PathBuf>, filter: &FilterArgs) -> Result<(), String> {
    let trips = filter.to_filter()?.apply(store.trips());

    match out {
        Some(path) => {
            let file = fs::File::create(&path)
                .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
            write_csv(trips.iter().copied(), io::BufWriter::new(file))
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            eprintln!("Exported {} trips → {}", trips.len(), path.display());
        }
        None => {
            let csv = to_csv_string(trips.iter().copied())
                .map_err(|e| format!("failed to write CSV: {e}"))?;
            print!("{csv}");
        }
    }
    Ok(())
}

impl AddArgs {
    fn into_draft(self) -> TripDraft {
        TripDraft {
            trip_number: self.trip_number,
            date: self.date,
            time: self.time,
            previous_trip_number: self.previous,
            assigned_bay: self.bay,
            secondary_bay_marker: None,
            quantity: self.quantity,
            shift: self.shift,
            cargo_type: self.cargo_type,
            region: self.region,
            status: self.status,
            next_manifest_date: self.manifest_date,
        }
    }
}

impl EditArgs {
    fn into_patch(self) -> (String, TripPatch) {
        let patch = TripPatch {
            trip_number: self.number,
            date: self.date,
            time: self.time,
            previous_trip_number: self.previous,
            assigned_bay: self.bay,
            secondary_bay_marker: self.marker,
            quantity: self.quantity,
            shift: self.shift,
            cargo_type: self.cargo_type,
            region: self.region,
            status: self.status,
        };
        (self.trip, patch)
    }
}
