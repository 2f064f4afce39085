use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::paths::config_dir;

/// User-level settings read from `settings.toml` in the config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub watcher: WatcherSettings,
    #[serde(default)]
    pub recent: RecentSettings,
}

/// Timing knobs for the filesystem watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Quiet period before a create/content change is delivered.
    pub debounce_ms: u64,
    /// How often to try opening a file before giving up on its event.
    pub availability_retries: u32,
    pub retry_delay_ms: u64,
    /// How long a rename "from" half waits for its "to" half.
    pub rename_pair_ms: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        WatcherSettings {
            debounce_ms: 300,
            availability_retries: 3,
            retry_delay_ms: 500,
            rename_pair_ms: 100,
        }
    }
}

impl WatcherSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rename_window(&self) -> Duration {
        Duration::from_millis(self.rename_pair_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentSettings {
    /// Maximum number of remembered boards.
    pub limit: usize,
}

impl Default for RecentSettings {
    fn default() -> Self {
        RecentSettings { limit: 10 }
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

/// Read settings from a specific path. Missing or unparsable files yield defaults.
pub fn read_settings_from(path: &Path) -> Settings {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return Settings::default(),
    };
    match toml::from_str::<Settings>(&text) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse settings, using defaults");
            Settings::default()
        }
    }
}

pub fn read_settings() -> Settings {
    read_settings_from(&settings_path())
}
