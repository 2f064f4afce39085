use serde::Serialize;

use crate::model::board::FileFilter;
use crate::model::column::Column;
use crate::model::group::Group;
use crate::model::item::Item;
use crate::model::tags::TagDefinition;
use crate::sync::Reconciler;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct BoardJson {
    pub name: String,
    pub root: String,
    pub columns: Vec<ColumnJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<FileFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagDefinition>,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub folder: String,
    pub name: String,
    pub ungrouped: Vec<ItemJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupJson>,
}

#[derive(Serialize)]
pub struct GroupJson {
    pub name: String,
    pub collapsed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct ItemJson {
    pub file: String,
    pub title: String,
    pub preview: String,
    pub is_text: bool,
    pub modified: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct TagJson {
    pub name: String,
    pub color: String,
    pub uses: usize,
}

#[derive(Serialize)]
pub struct RecentJson {
    pub name: String,
    pub path: String,
    pub last_opened: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn item_to_json(rec: &Reconciler, item: &Item) -> ItemJson {
    ItemJson {
        file: item.file_name.clone(),
        title: item.title.clone(),
        preview: item.preview.clone(),
        is_text: item.is_text,
        modified: item.modified.to_rfc3339(),
        tags: rec.item_tags(&item.column, &item.file_name),
    }
}

fn group_to_json(rec: &Reconciler, col: &Column, group: &Group) -> GroupJson {
    GroupJson {
        name: group.name.clone(),
        collapsed: group.is_collapsed,
        tags: rec.group_tags(&col.folder_name, &group.name),
        items: col
            .group_items(&group.name)
            .map(|i| item_to_json(rec, i))
            .collect(),
    }
}

pub fn column_to_json(rec: &Reconciler, col: &Column) -> ColumnJson {
    ColumnJson {
        folder: col.folder_name.clone(),
        name: col.display_name.clone(),
        ungrouped: col.ungrouped().map(|i| item_to_json(rec, i)).collect(),
        groups: col
            .groups
            .iter()
            .map(|g| group_to_json(rec, col, g))
            .collect(),
    }
}

pub fn board_to_json(rec: &Reconciler, only: Option<&str>) -> BoardJson {
    let board = rec.board();
    BoardJson {
        name: board.name.clone(),
        root: board.root_path.display().to_string(),
        columns: rec
            .columns()
            .iter()
            .filter(|c| only.is_none_or(|f| c.folder_name == f))
            .map(|c| column_to_json(rec, c))
            .collect(),
        file_filter: board.file_filter.clone(),
        tags: rec.tag_definitions().to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn tag_suffix(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", tags.join(", "))
    }
}

fn item_line(rec: &Reconciler, item: &Item, indent: &str) -> String {
    let tags = rec.item_tags(&item.column, &item.file_name);
    if item.preview.is_empty() {
        format!("{}{}{}", indent, item.file_name, tag_suffix(&tags))
    } else {
        format!(
            "{}{}  {}{}",
            indent,
            item.file_name,
            item.preview,
            tag_suffix(&tags)
        )
    }
}

/// Human-readable listing of one column.
pub fn format_column(rec: &Reconciler, col: &Column) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("{} ({})", col.display_name, col.items.len()));
    for item in col.ungrouped() {
        lines.push(item_line(rec, item, "  "));
    }
    for group in &col.groups {
        let count = col.group_items(&group.name).count();
        let tags = rec.group_tags(&col.folder_name, &group.name);
        if group.is_collapsed {
            lines.push(format!("  + {} ({}){}", group.name, count, tag_suffix(&tags)));
            continue;
        }
        lines.push(format!("  - {} ({}){}", group.name, count, tag_suffix(&tags)));
        for item in col.group_items(&group.name) {
            lines.push(item_line(rec, item, "      "));
        }
    }
    lines
}
