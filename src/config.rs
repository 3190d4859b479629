//! prebox configuration.
//!
//! Loaded from `<home>/config.toml`. Every key is optional: a missing file or
//! section means defaults. The home directory is resolved through a chain:
//!
//! 1. `--home <dir>`: explicit per-command override
//! 2. `PREBOX_HOME` env var
//! 3. `~/.prebox`

use std::fs;
use std::path::{Path, PathBuf};

use jiff::civil::Time;
use serde::{Deserialize, Serialize};

use crate::model::parse_time;

/// prebox configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub general: General,
    pub notifications: Notifications,
    pub storage: StorageSettings,
    pub backup: BackupSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct General {
    pub company_name: String,
    /// Bays created the first time the registry is loaded.
    pub initial_bays: usize,
    /// Default operator recorded on shift closes.
    pub operator: Option<String>,
    pub shifts: Vec<ShiftWindow>,
}

impl Default for General {
    fn default() -> Self {
        Self {
            company_name: "ControleCabine".into(),
            initial_bays: 70,
            operator: None,
            shifts: vec![
                ShiftWindow::new("Primeiro Turno", "06:00", "14:00"),
                ShiftWindow::new("Segundo Turno", "14:00", "22:00"),
                ShiftWindow::new("Terceiro Turno", "22:00", "06:00"),
            ],
        }
    }
}

/// A named working window. `end` before `start` wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShiftWindow {
    pub name: String,
    /// `HH:MM`.
    pub start: String,
    /// `HH:MM`.
    pub end: String,
    #[serde(default = "yes")]
    pub active: bool,
}

impl ShiftWindow {
    pub fn new(name: &str, start: &str, end: &str) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            active: true,
        }
    }

    /// Whether `time` falls inside the window. Start is inclusive, end exclusive.
    ///
    /// Windows with unreadable times never match.
    pub fn contains(&self, time: Time) -> bool {
        let (Some(start), Some(end)) = (parse_time(&self.start), parse_time(&self.end)) else {
            return false;
        };
        if start <= end {
            start <= time && time < end
        } else {
            time >= start || time < end
        }
    }
}

/// Which notices are shown after a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Notifications {
    pub enabled: bool,
    /// A bay became occupied.
    pub bay_occupied: bool,
    /// A trip released its bay.
    pub trip_released: bool,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            enabled: true,
            bay_occupied: true,
            trip_released: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageSettings {
    pub primary: BackendKind,
    /// Keep the other backend as a fallback and local cache.
    pub fallback: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            primary: BackendKind::Sqlite,
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl BackupFrequency {
    pub fn hours(self) -> i64 {
        match self {
            Self::Hourly => 1,
            Self::Daily => 24,
            Self::Weekly => 24 * 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BackupSettings {
    /// Take a backup before a command when the newest one is older than `frequency`.
    pub auto_backup: bool,
    pub frequency: BackupFrequency,
    pub keep_count: usize,
    pub compression: bool,
    pub validate_before_restore: bool,
    pub create_backup_before_restore: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            auto_backup: false,
            frequency: BackupFrequency::Daily,
            keep_count: 7,
            compression: true,
            validate_before_restore: true,
            create_backup_before_restore: true,
        }
    }
}

fn yes() -> bool {
    true
}

impl Config {
    /// Loads config from `<home>/config.toml`, or defaults if there is none.
    pub fn load(home: &Path) -> Result<Self, String> {
        let path = Self::path(home);
        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// Writes the config to `<home>/config.toml`, replacing any existing file.
    pub fn save(&self, home: &Path) -> Result<(), String> {
        let path = Self::path(home);
        let contents =
            toml::to_string(self).map_err(|e| format!("failed to serialize config: {e}"))?;
        fs::create_dir_all(home).map_err(|e| format!("failed to create {}: {e}", home.display()))?;
        fs::write(&path, contents).map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    /// The config file path: `<home>/config.toml`.
    pub fn path(home: &Path) -> PathBuf {
        home.join("config.toml")
    }

    /// The configured shift running at `time`, if any.
    pub fn current_shift(&self, time: Time) -> Option<&ShiftWindow> {
        self.general
            .shifts
            .iter()
            .find(|s| s.active && s.contains(time))
    }
}

/// Resolves the home directory from the tiered chain.
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    if let Some(dir) = std::env::var_os("PREBOX_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    dirs::home_dir()
        .map(|h| h.join(".prebox"))
        .ok_or_else(|| "could not determine home directory; pass --home or set PREBOX_HOME".into())
}
