use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a drag gesture carries from its source. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragPayload {
    pub file_path: PathBuf,
    pub source_column_path: PathBuf,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

/// Where a payload was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    /// Folder name of the target column.
    pub column: String,
    /// `None` drops into the ungrouped area.
    pub group: Option<String>,
    /// Position in the target column's item list; appended when `None`.
    pub index: Option<usize>,
}
