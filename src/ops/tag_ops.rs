use indexmap::IndexMap;

use crate::model::board::Board;
use crate::model::tags::{DEFAULT_TAG_COLOR, TagDefinition, TagsConfig};
use crate::util::names::unique_name;

/// Error type for tag operations
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("tag not found: {0}")]
    NotFound(String),
    #[error("tag name cannot be empty")]
    EmptyName,
}

fn config(board: &mut Board) -> &mut TagsConfig {
    board.tags.get_or_insert_with(TagsConfig::default)
}

/// Drop the tag section entirely once it holds nothing.
fn normalize(board: &mut Board) {
    if board.tags.as_ref().is_some_and(|t| t.is_empty()) {
        board.tags = None;
    }
}

pub fn definitions(board: &Board) -> &[TagDefinition] {
    board
        .tags
        .as_ref()
        .map(|t| t.definitions.as_slice())
        .unwrap_or(&[])
}

fn unique_tag_name(board: &Board, base: &str, exclude: Option<&str>) -> String {
    unique_name(definitions(board).iter().map(|t| t.name.as_str()), base, exclude)
}

/// Define a new tag. Returns the definition actually stored (the name may be suffixed).
pub fn create_tag(board: &mut Board, name: &str, color: Option<&str>) -> TagDefinition {
    let base = match name.trim() {
        "" => "Tag",
        trimmed => trimmed,
    };
    let tag = TagDefinition {
        name: unique_tag_name(board, base, None),
        color: color.unwrap_or(DEFAULT_TAG_COLOR).to_string(),
    };
    config(board).definitions.push(tag.clone());
    tag
}

/// Remove a tag definition and every assignment of it.
pub fn delete_tag(board: &mut Board, name: &str) -> Result<(), TagError> {
    let cfg = config(board);
    let before = cfg.definitions.len();
    cfg.definitions.retain(|t| t.name != name);
    if cfg.definitions.len() == before {
        normalize(board);
        return Err(TagError::NotFound(name.to_string()));
    }
    for tags in cfg.assignments.values_mut() {
        tags.retain(|t| t != name);
    }
    cfg.assignments.retain(|_, tags| !tags.is_empty());
    normalize(board);
    Ok(())
}

/// Rename a tag everywhere. Returns the stored name.
pub fn rename_tag(board: &mut Board, old: &str, new: &str) -> Result<String, TagError> {
    let new = new.trim();
    if new.is_empty() {
        return Err(TagError::EmptyName);
    }
    if !definitions(board).iter().any(|t| t.name == old) {
        return Err(TagError::NotFound(old.to_string()));
    }
    let actual = unique_tag_name(board, new, Some(old));
    let cfg = config(board);
    if let Some(def) = cfg.definitions.iter_mut().find(|t| t.name == old) {
        def.name = actual.clone();
    }
    for tags in cfg.assignments.values_mut() {
        for t in tags.iter_mut().filter(|t| *t == old) {
            *t = actual.clone();
        }
    }
    Ok(actual)
}

pub fn set_tag_color(board: &mut Board, name: &str, color: &str) -> Result<(), TagError> {
    let def = board
        .tags
        .as_mut()
        .and_then(|t| t.definitions.iter_mut().find(|d| d.name == name))
        .ok_or_else(|| TagError::NotFound(name.to_string()))?;
    def.color = color.to_string();
    Ok(())
}

/// Flip one tag on an entity key. Returns true if the tag is now assigned.
pub fn toggle_tag(board: &mut Board, key: &str, tag: &str) -> Result<bool, TagError> {
    if !definitions(board).iter().any(|t| t.name == tag) {
        return Err(TagError::NotFound(tag.to_string()));
    }
    let cfg = config(board);
    let tags = cfg.assignments.entry(key.to_string()).or_default();
    let assigned = match tags.iter().position(|t| t == tag) {
        Some(idx) => {
            tags.remove(idx);
            false
        }
        None => {
            tags.push(tag.to_string());
            true
        }
    };
    if tags.is_empty() {
        cfg.assignments.shift_remove(key);
    }
    normalize(board);
    Ok(assigned)
}

/// Tag names assigned to a key, in assignment order.
pub fn tags_for(board: &Board, key: &str) -> Vec<String> {
    board
        .tags
        .as_ref()
        .and_then(|t| t.assignments.get(key))
        .cloned()
        .unwrap_or_default()
}

/// Move a key's assignments to a new key. Returns true if anything moved.
pub fn rekey(board: &mut Board, old_key: &str, new_key: &str) -> bool {
    if old_key == new_key {
        return false;
    }
    let Some(cfg) = board.tags.as_mut() else {
        return false;
    };
    match cfg.assignments.shift_remove(old_key) {
        Some(tags) => {
            cfg.assignments.insert(new_key.to_string(), tags);
            true
        }
        None => false,
    }
}

/// Forget a key's assignments. Returns true if it had any.
pub fn drop_key(board: &mut Board, key: &str) -> bool {
    let removed = board
        .tags
        .as_mut()
        .is_some_and(|cfg| cfg.assignments.shift_remove(key).is_some());
    normalize(board);
    removed
}

/// Rekey every item and group assignment of a renamed column folder.
pub fn rekey_column(board: &mut Board, old_folder: &str, new_folder: &str) -> bool {
    let Some(cfg) = board.tags.as_mut() else {
        return false;
    };
    let item_prefix = format!("{}/", old_folder);
    let group_prefix = format!("group:{}/", old_folder);
    let mut changed = false;
    let rekeyed: IndexMap<String, Vec<String>> = std::mem::take(&mut cfg.assignments)
        .into_iter()
        .map(|(k, v)| {
            let new_key = if let Some(rest) = k.strip_prefix(&group_prefix) {
                format!("group:{}/{}", new_folder, rest)
            } else if let Some(rest) = k.strip_prefix(&item_prefix) {
                format!("{}/{}", new_folder, rest)
            } else {
                return (k, v);
            };
            changed = true;
            (new_key, v)
        })
        .collect();
    cfg.assignments = rekeyed;
    changed
}

/// Forget every assignment belonging to a column folder.
pub fn drop_column(board: &mut Board, folder: &str) -> bool {
    let Some(cfg) = board.tags.as_mut() else {
        return false;
    };
    let item_prefix = format!("{}/", folder);
    let group_prefix = format!("group:{}/", folder);
    let before = cfg.assignments.len();
    cfg.assignments
        .retain(|k, _| !k.starts_with(&item_prefix) && !k.starts_with(&group_prefix));
    let changed = cfg.assignments.len() != before;
    normalize(board);
    changed
}
