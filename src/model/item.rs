use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A card: one file inside a column folder.
///
/// Items are never persisted as records; they are rebuilt from disk on load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Folder name of the owning column.
    pub column: String,
    pub file_name: String,
    pub path: PathBuf,
    /// File stem.
    pub title: String,
    pub preview: String,
    /// Full text for text files; empty for binary files.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    pub modified: DateTime<Utc>,
    pub is_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Item {
    /// Point this item at a new file name (and path) in the same folder.
    pub fn rename_to(&mut self, file_name: &str) {
        self.path = self.path.with_file_name(file_name);
        self.file_name = file_name.to_string();
        self.title = title_of(file_name);
    }
}

/// Title shown for a file: its name without the final extension.
pub fn title_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}
