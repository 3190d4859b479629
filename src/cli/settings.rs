//! `prebox settings …`: the config file.
//!
//! Runs before the store is opened so a broken config can still be inspected
//! and reset.

use std::path::Path;

use clap::Subcommand;

use crate::config::Config;

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the effective configuration as TOML.
    Show,

    /// Write the default configuration if no config file exists.
    Init,

    /// Overwrite the config file with defaults.
    Reset {
        /// Required: confirms the current settings are dropped.
        #[arg(long)]
        yes: bool,
    },

    /// Print the config file path.
    Path,
}

pub(super) fn run(home: &Path, command: SettingsCommand) -> Result<(), String> {
    let path = Config::path(home);
    match command {
        SettingsCommand::Show => {
            let config = Config::load(home)?;
            let out =
                toml::to_string(&config).map_err(|e| format!("failed to serialize config: {e}"))?;
            print!("{out}");
            if !path.exists() {
                eprintln!("(defaults; {} does not exist)", path.display());
            }
        }
        SettingsCommand::Init => {
            if path.exists() {
                return Err(format!("{} already exists", path.display()));
            }
            Config::default().save(home)?;
            eprintln!("Wrote {}", path.display());
        }
        SettingsCommand::Reset { yes } => {
            if !yes {
                return Err("this overwrites the current settings; pass --yes to confirm".into());
            }
            Config::default().save(home)?;
            eprintln!("Reset {}", path.display());
        }
        SettingsCommand::Path => println!("{}", path.display()),
    }
    Ok(())
}
