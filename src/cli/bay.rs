//! `prebox bay …`: the bay registry.

use clap::Subcommand;
use jiff::Timestamp;

use crate::config::Config;
use crate::model::BayStatus;
use crate::store::Store;

use super::format::{format_bay_line, print_notices};

#[derive(Debug, Subcommand)]
pub enum BayCommand {
    /// List bays with status, linked trip and last update.
    List {
        /// Only bays with this status (free, occupied, blocked).
        #[arg(long)]
        status: Option<BayStatus>,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add one or more bays.
    Add {
        /// Bay ids, e.g. `101 102 103`.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Remove a bay. Trips pointing at it are kept.
    Remove { id: String },

    /// Step a bay through occupied → free → blocked → occupied.
    Cycle { id: String },

    /// Block a bay. Blocked bays are never changed by the trip log.
    Block { id: String },

    /// Lift a block.
    Unblock { id: String },

    /// Create bays numbered 1 to COUNT that don't exist yet.
    Seed {
        /// Defaults to the configured initial bay count.
        count: Option<usize>,
    },
}

pub(super) fn run(store: &mut Store, config: &Config, command: BayCommand) -> Result<(), String> {
    let now = Timestamp::now();
    let outcome = match command {
        BayCommand::List { status, json } => return cmd_list(store, status, json),
        BayCommand::Add { ids } => {
            let mut notices = Vec::new();
            for id in &ids {
                match store.add_bay(id, now) {
                    Ok(outcome) => notices.extend(outcome.notices),
                    Err(e) => {
                        print_notices(&notices, &config.notifications);
                        return Err(format!("failed to add bay: {e}"));
                    }
                }
            }
            print_notices(&notices, &config.notifications);
            return Ok(());
        }
        BayCommand::Remove { id } => store.remove_bay(&id, now),
        BayCommand::Cycle { id } => store.cycle_bay(&id, now),
        BayCommand::Block { id } => store.block_bay(&id, now),
        BayCommand::Unblock { id } => store.unblock_bay(&id, now),
        BayCommand::Seed { count } => {
            Ok(store.seed_bays(count.unwrap_or(config.general.initial_bays), now))
        }
    }
    .map_err(|e| e.to_string())?;

    print_notices(&outcome.notices, &config.notifications);
    Ok(())
}

fn cmd_list(store: &Store, status: Option<BayStatus>, json: bool) -> Result<(), String> {
    let bays: Vec<_> = store
        .bays()
        .iter()
        .filter(|b| status.is_none_or(|s| b.status == s))
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&bays)
            .map_err(|e| format!("failed to serialize bays: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    if bays.is_empty() {
        println!("No bays");
        return Ok(());
    }
    for bay in bays {
        println!("{}", format_bay_line(bay));
    }
    Ok(())
}
