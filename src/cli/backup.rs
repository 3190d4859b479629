//! `prebox backup …`: snapshot backups.

use clap::Subcommand;
use jiff::Timestamp;

use crate::config::Config;
use crate::store::Store;

use super::format::{format_timestamp, print_notices};

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Back up bays and trips now.
    Create,

    /// List backups, oldest first.
    List,

    /// Replace bays and trips with a backup.
    ///
    /// Unless disabled in settings, the backup's checksum is verified and the
    /// current data is backed up first.
    Restore {
        /// Backup file name, with or without extension.
        name: String,
    },

    /// Delete all but the newest backups.
    Prune {
        /// How many to keep. Defaults to the configured keep count.
        #[arg(long)]
        keep: Option<usize>,
    },
}

pub(super) fn run(
    store: &mut Store,
    config: &Config,
    command: BackupCommand,
) -> Result<(), String> {
    let settings = &config.backup;
    match command {
        BackupCommand::Create => {
            let info = store
                .storage()
                .create_backup(&store.snapshot(), settings.compression, Timestamp::now())
                .map_err(|e| format!("failed to create backup: {e}"))?;
            println!("{}", info.name);
            eprintln!(
                "Backed up {} bays and {} trips ({})",
                store.bays().len(),
                store.trips().len(),
                format_size(info.size_bytes)
            );
        }
        BackupCommand::List => {
            let backups = store
                .storage()
                .list_backups()
                .map_err(|e| format!("failed to list backups: {e}"))?;
            if backups.is_empty() {
                println!("No backups");
                return Ok(());
            }
            for info in &backups {
                let modified = info.modified.map_or_else(|| "-".to_string(), format_timestamp);
                println!("{:<44} {:>10}  {modified}", info.name, format_size(info.size_bytes));
            }
        }
        BackupCommand::Restore { name } => {
            let outcome = store
                .restore_backup(&name, settings, Timestamp::now())
                .map_err(|e| format!("failed to restore {name}: {e}"))?;
            print_notices(&outcome.notices, &config.notifications);
        }
        BackupCommand::Prune { keep } => {
            let removed = store
                .storage()
                .prune_backups(keep.unwrap_or(settings.keep_count))
                .map_err(|e| format!("failed to prune backups: {e}"))?;
            for info in &removed {
                println!("removed {}", info.name);
            }
            eprintln!("{} backup(s) removed", removed.len());
        }
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_pick_a_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
