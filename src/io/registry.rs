use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::io::item_io::atomic_write;
use crate::util::paths::config_dir;

/// A board folder that was opened before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentBoard {
    pub name: String,
    pub path: String,
    pub last_opened: DateTime<Utc>,
}

/// Most-recently-opened boards, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentBoards {
    #[serde(default)]
    pub boards: Vec<RecentBoard>,
}

pub fn recent_path() -> PathBuf {
    config_dir().join("recent.toml")
}

/// Read the registry. Missing file → empty; corrupt file → backed up as
/// `.toml.bak` and treated as empty. Entries whose folder is gone are dropped.
pub fn read_recent_from(path: &Path) -> RecentBoards {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return RecentBoards::default(),
    };
    let mut reg = match toml::from_str::<RecentBoards>(&text) {
        Ok(reg) => reg,
        Err(e) => {
            let bak = path.with_extension("toml.bak");
            let _ = fs::copy(path, &bak);
            tracing::warn!(
                path = %path.display(),
                backup = %bak.display(),
                error = %e,
                "could not parse recent boards, starting fresh"
            );
            return RecentBoards::default();
        }
    };
    reg.boards.retain(|b| Path::new(&b.path).is_dir());
    reg
}

pub fn write_recent_to(path: &Path, reg: &RecentBoards) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(reg).map_err(|e| std::io::Error::other(e.to_string()))?;
    atomic_write(path, content.as_bytes())
}

/// Move (or insert) a board to the front of the registry, keeping at most `limit`.
pub fn record_open_in(path: &Path, name: &str, board_dir: &Path, limit: usize) -> Result<(), std::io::Error> {
    let path_str = board_dir.to_string_lossy().to_string();
    let mut reg = read_recent_from(path);
    reg.boards.retain(|b| b.path != path_str);
    reg.boards.insert(
        0,
        RecentBoard {
            name: name.to_string(),
            path: path_str,
            last_opened: Utc::now(),
        },
    );
    reg.boards.truncate(limit.max(1));
    write_recent_to(path, &reg)
}

pub fn record_open(name: &str, board_dir: &Path, limit: usize) {
    if let Err(e) = record_open_in(&recent_path(), name, board_dir, limit) {
        tracing::debug!(error = %e, "could not update recent boards");
    }
}

/// Forget a board by path (as given, or canonicalized). Returns the removed entry.
pub fn remove_from(path: &Path, board: &str) -> Option<RecentBoard> {
    let mut reg = read_recent_from(path);
    let canonical = fs::canonicalize(board)
        .ok()
        .map(|p| p.to_string_lossy().to_string());
    let idx = reg
        .boards
        .iter()
        .position(|b| b.path == board || canonical.as_deref() == Some(b.path.as_str()))?;
    let removed = reg.boards.remove(idx);
    let _ = write_recent_to(path, &reg);
    Some(removed)
}

/// Replace a leading $HOME with `~`.
pub fn abbreviate_path(path: &str) -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => match path.strip_prefix(&home) {
            Some(rest) => format!("~{}", rest),
            None => path.to_string(),
        },
        _ => path.to_string(),
    }
}

/// Coarse "how long ago" text for listings.
pub fn relative_time(dt: &DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(*dt);
    match elapsed.num_seconds() {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => format!("{} min ago", s / 60),
        s if s < 86_400 => format!("{} hr ago", s / 3600),
        s if s < 2 * 86_400 => "yesterday".to_string(),
        s => format!("{} days ago", s / 86_400),
    }
}
