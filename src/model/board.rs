use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::tags::TagsConfig;

/// The board descriptor persisted as `.kanban.json` at the board root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default = "default_board_name")]
    pub name: String,
    /// Folder the board was opened from. Never serialized; set at load time.
    #[serde(skip)]
    pub root_path: PathBuf,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<FileFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsConfig>,
}

fn default_board_name() -> String {
    "Kanban Board".to_string()
}

impl Board {
    pub fn new(name: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Board {
            name: name.into(),
            root_path: root_path.into(),
            columns: Vec::new(),
            file_filter: None,
            tags: None,
        }
    }

    /// Absolute path of a column folder.
    pub fn column_path(&self, folder_name: &str) -> PathBuf {
        self.root_path.join(folder_name)
    }

    pub fn descriptor(&self, folder_name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.folder_name == folder_name)
    }

    pub fn descriptor_mut(&mut self, folder_name: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.folder_name == folder_name)
    }

    /// Column descriptors ordered by their sort order (stable for ties).
    pub fn sorted_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut cols: Vec<&ColumnDescriptor> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.sort_order);
        cols
    }
}

/// One column of the board: a folder plus the declared order of its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub folder_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub sort_order: i32,
    /// Declared item order. May drift from what is on disk.
    #[serde(default)]
    pub item_order: Vec<String>,
}

impl ColumnDescriptor {
    pub fn new(folder_name: impl Into<String>, display_name: impl Into<String>, sort_order: i32) -> Self {
        ColumnDescriptor {
            folder_name: folder_name.into(),
            display_name: display_name.into(),
            sort_order,
            item_order: Vec::new(),
        }
    }
}

/// Extension filter applied when enumerating column folders.
///
/// A non-empty include list wins; otherwise the exclude list applies.
/// Extensions are compared case-insensitively, with or without a leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFilter {
    #[serde(default)]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
}

impl FileFilter {
    pub fn is_empty(&self) -> bool {
        self.include_extensions.is_empty() && self.exclude_extensions.is_empty()
    }

    /// Whether a file name passes this filter.
    pub fn allows(&self, file_name: &str) -> bool {
        let ext = extension_of(file_name);
        if !self.include_extensions.is_empty() {
            return self
                .include_extensions
                .iter()
                .any(|e| normalize_extension(e) == ext);
        }
        if !self.exclude_extensions.is_empty() {
            return !self
                .exclude_extensions
                .iter()
                .any(|e| normalize_extension(e) == ext);
        }
        true
    }
}

/// Lowercased extension without the dot; empty when the name has none.
pub fn extension_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}
