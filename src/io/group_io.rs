use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::item_io::{CONFIG_FILE_NAME, LEGACY_GROUPS_FILE_NAME, StoreError, atomic_write, with_retry};
use crate::io::suppress::Suppressor;
use crate::model::group::{Group, LegacyGroups};
use crate::util::names::{is_hidden_name, sanitize_name, unique_name};

const GROUP_EXTENSION: &str = "json";

/// Stems that a group file must not take, or it would shadow a reserved file.
const RESERVED_STEMS: [&str; 2] = [".kanban", "groups"];

/// Sidecar path of a group: sanitized name + `.json`, inside the column folder.
pub fn group_file_path(column_dir: &Path, group_name: &str) -> PathBuf {
    column_dir.join(format!(
        "{}.{}",
        sanitize_name(group_name, "Group"),
        GROUP_EXTENSION
    ))
}

pub fn is_reserved_file(file_name: &str) -> bool {
    file_name.eq_ignore_ascii_case(CONFIG_FILE_NAME)
        || file_name.eq_ignore_ascii_case(LEGACY_GROUPS_FILE_NAME)
}

/// Load every group sidecar in a column folder, ordered by sort order.
///
/// A legacy `groups.json` is migrated first. Malformed sidecars are skipped.
pub fn load_groups(column_dir: &Path, suppressor: &Suppressor) -> Result<Vec<Group>, StoreError> {
    if !column_dir.is_dir() {
        return Ok(Vec::new());
    }
    migrate_legacy_groups(column_dir, suppressor);

    let entries = fs::read_dir(column_dir).map_err(|e| StoreError::io(column_dir, e))?;
    let mut groups = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(GROUP_EXTENSION));
        if !is_json || is_reserved_file(name) || is_hidden_name(name) {
            continue;
        }
        match read_group_file(&path) {
            Ok(group) => groups.push(group),
            Err(e) => tracing::warn!(error = %e, "skipping unreadable group file"),
        }
    }
    groups.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    Ok(groups)
}

fn read_group_file(path: &Path) -> Result<Group, StoreError> {
    let text = with_retry(path, || fs::read_to_string(path))?;
    let mut group: Group = serde_json::from_str(&text).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        group.name = stem.to_string();
    }
    Ok(group)
}

/// Split a legacy `groups.json` into one sidecar per group. Failures are logged.
fn migrate_legacy_groups(column_dir: &Path, suppressor: &Suppressor) {
    let legacy = column_dir.join(LEGACY_GROUPS_FILE_NAME);
    if !legacy.is_file() {
        return;
    }
    let result = (|| -> Result<usize, StoreError> {
        let text = with_retry(&legacy, || fs::read_to_string(&legacy))?;
        let parsed: LegacyGroups = serde_json::from_str(&text).map_err(|e| StoreError::Json {
            path: legacy.clone(),
            source: e,
        })?;
        let mut migrated = 0;
        for (i, mut group) in parsed.groups.into_iter().enumerate() {
            if group.name.trim().is_empty() {
                continue;
            }
            group.sort_order = i as i32;
            save_group(column_dir, &group, suppressor)?;
            migrated += 1;
        }
        suppressor.suppress_next(&legacy);
        with_retry(&legacy, || fs::remove_file(&legacy))?;
        Ok(migrated)
    })();

    match result {
        Ok(n) => tracing::info!(dir = %column_dir.display(), groups = n, "migrated legacy groups.json"),
        Err(e) => tracing::warn!(dir = %column_dir.display(), error = %e, "could not migrate legacy groups.json"),
    }
}

pub fn save_group(column_dir: &Path, group: &Group, suppressor: &Suppressor) -> Result<(), StoreError> {
    let path = group_file_path(column_dir, &group.name);
    let json = serde_json::to_string_pretty(group).map_err(|e| StoreError::Serialize {
        path: path.clone(),
        source: e,
    })?;
    suppressor.suppress_next(&path);
    with_retry(&path, || atomic_write(&path, json.as_bytes()))
}

pub fn delete_group_file(column_dir: &Path, group_name: &str, suppressor: &Suppressor) -> Result<(), StoreError> {
    let path = group_file_path(column_dir, group_name);
    if !path.exists() {
        return Ok(());
    }
    suppressor.suppress_next(&path);
    with_retry(&path, || fs::remove_file(&path))
}

/// Rewrite a group under a new name. The old file is removed unless the two
/// names differ only by case.
pub fn rename_group_file(
    column_dir: &Path,
    old_name: &str,
    new_name: &str,
    suppressor: &Suppressor,
) -> Result<(), StoreError> {
    let old_path = group_file_path(column_dir, old_name);
    if !old_path.exists() {
        return Ok(());
    }
    let mut group = read_group_file(&old_path)?;
    group.name = new_name.to_string();
    let new_path = group_file_path(column_dir, new_name);
    let same_file = old_path
        .to_string_lossy()
        .eq_ignore_ascii_case(&new_path.to_string_lossy());
    if same_file && old_path != new_path {
        // Case-only rename: remove first so case-sensitive filesystems don't keep both.
        suppressor.suppress_next(&old_path);
        with_retry(&old_path, || fs::remove_file(&old_path))?;
    }
    save_group(column_dir, &group, suppressor)?;
    if !same_file {
        suppressor.suppress_next(&old_path);
        with_retry(&old_path, || fs::remove_file(&old_path))?;
    }
    Ok(())
}

/// Make `file_name` a member of `group_name` and of no other group in the column.
pub fn add_item_to_group(
    column_dir: &Path,
    group_name: &str,
    file_name: &str,
    suppressor: &Suppressor,
) -> Result<(), StoreError> {
    remove_item_from_group(column_dir, file_name, suppressor)?;
    let path = group_file_path(column_dir, group_name);
    if !path.exists() {
        return Ok(());
    }
    let mut group = read_group_file(&path)?;
    if group.add_member(file_name) {
        save_group(column_dir, &group, suppressor)?;
    }
    Ok(())
}

/// Remove `file_name` from every group in the column. Returns true if any changed.
pub fn remove_item_from_group(column_dir: &Path, file_name: &str, suppressor: &Suppressor) -> Result<bool, StoreError> {
    let mut changed = false;
    for mut group in load_groups(column_dir, suppressor)? {
        if group.remove_member(file_name) {
            save_group(column_dir, &group, suppressor)?;
            changed = true;
        }
    }
    Ok(changed)
}

/// Rewrite sort orders to match `ordered_names`, touching only groups that change.
pub fn reorder_groups(column_dir: &Path, ordered_names: &[String], suppressor: &Suppressor) -> Result<(), StoreError> {
    let groups = load_groups(column_dir, suppressor)?;
    for (i, name) in ordered_names.iter().enumerate() {
        if let Some(group) = groups.iter().find(|g| &g.name == name)
            && group.sort_order != i as i32
        {
            let mut group = group.clone();
            group.sort_order = i as i32;
            save_group(column_dir, &group, suppressor)?;
        }
    }
    Ok(())
}

/// Drop member names that have no backing file. Returns how many were dropped.
pub fn cleanup_stale_references(
    column_dir: &Path,
    current_files: &[String],
    suppressor: &Suppressor,
) -> Result<usize, StoreError> {
    let present: HashSet<&str> = current_files.iter().map(|s| s.as_str()).collect();
    let mut dropped = 0;
    for mut group in load_groups(column_dir, suppressor)? {
        let before = group.item_file_names.len();
        group.item_file_names.retain(|f| present.contains(f.as_str()));
        let removed = before - group.item_file_names.len();
        if removed > 0 {
            save_group(column_dir, &group, suppressor)?;
            dropped += removed;
        }
    }
    Ok(dropped)
}

/// A group name free in `existing` (case-insensitive), suffixed ` (n)` if needed.
pub fn unique_group_name(existing: &[Group], base: &str, exclude: Option<&str>) -> String {
    let names = existing
        .iter()
        .map(|g| g.name.as_str())
        .chain(RESERVED_STEMS);
    unique_name(names, base, exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn quiet() -> Suppressor {
        Suppressor::inactive()
    }

    fn names(groups: &[Group]) -> Vec<&str> {
        groups.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_load_ignores_reserved_hidden_and_malformed() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        save_group(dir, &Group::new("B", 1), &quiet()).unwrap();
        save_group(dir, &Group::new("A", 0), &quiet()).unwrap();
        fs::write(dir.join(".kanban.json"), "{}").unwrap();
        fs::write(dir.join(".hidden.json"), "{}").unwrap();
        fs::write(dir.join("broken.json"), "{ nope").unwrap();
        fs::write(dir.join("card.md"), "# card").unwrap();

        let groups = load_groups(dir, &quiet()).unwrap();
        assert_eq!(names(&groups), vec!["A", "B"]);
    }

    #[test]
    fn test_name_comes_from_file_stem() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("Real.json"),
            r#"{"name":"Stale","sortOrder":0,"itemFileNames":[],"isCollapsed":false}"#,
        )
        .unwrap();
        let groups = load_groups(tmp.path(), &quiet()).unwrap();
        assert_eq!(names(&groups), vec!["Real"]);
    }

    #[test]
    fn test_legacy_groups_are_migrated() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(
            dir.join("groups.json"),
            r#"{"groups":[{"name":"Later","itemFileNames":["b.md"]},{"name":"Now","itemFileNames":["a.md"],"isCollapsed":true}]}"#,
        )
        .unwrap();

        let groups = load_groups(dir, &quiet()).unwrap();
        assert!(!dir.join("groups.json").exists());
        assert!(dir.join("Later.json").exists());
        assert!(dir.join("Now.json").exists());
        let summary: Vec<(&str, i32, bool)> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.sort_order, g.is_collapsed))
            .collect();
        assert_eq!(summary, vec![("Later", 0, false), ("Now", 1, true)]);
        assert_eq!(groups[1].item_file_names, vec!["a.md"]);
    }

    #[test]
    fn test_malformed_legacy_file_is_left_alone() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("groups.json"), "garbage").unwrap();
        let groups = load_groups(tmp.path(), &quiet()).unwrap();
        assert!(groups.is_empty());
        assert!(tmp.path().join("groups.json").exists());
    }

    #[test]
    fn test_add_item_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        save_group(dir, &Group::new("A", 0), &quiet()).unwrap();
        save_group(dir, &Group::new("B", 1), &quiet()).unwrap();

        add_item_to_group(dir, "A", "x.md", &quiet()).unwrap();
        add_item_to_group(dir, "B", "x.md", &quiet()).unwrap();

        let groups = load_groups(dir, &quiet()).unwrap();
        assert!(!groups[0].contains("x.md"));
        assert_eq!(groups[1].item_file_names, vec!["x.md"]);
    }

    #[test]
    fn test_rename_group_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let mut g = Group::new("Old", 3);
        g.add_member("a.md");
        save_group(dir, &g, &quiet()).unwrap();

        rename_group_file(dir, "Old", "New", &quiet()).unwrap();
        assert!(!dir.join("Old.json").exists());
        let groups = load_groups(dir, &quiet()).unwrap();
        assert_eq!(names(&groups), vec!["New"]);
        assert_eq!(groups[0].sort_order, 3);
        assert_eq!(groups[0].item_file_names, vec!["a.md"]);
    }

    #[test]
    fn test_case_only_rename_keeps_one_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        save_group(dir, &Group::new("urgent", 0), &quiet()).unwrap();
        rename_group_file(dir, "urgent", "Urgent", &quiet()).unwrap();
        let groups = load_groups(dir, &quiet()).unwrap();
        assert_eq!(names(&groups), vec!["Urgent"]);
    }

    #[test]
    fn test_reorder_and_cleanup() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let mut a = Group::new("A", 0);
        a.add_member("gone.md");
        a.add_member("here.md");
        save_group(dir, &a, &quiet()).unwrap();
        save_group(dir, &Group::new("B", 1), &quiet()).unwrap();

        reorder_groups(dir, &["B".to_string(), "A".to_string()], &quiet()).unwrap();
        let dropped = cleanup_stale_references(dir, &["here.md".to_string()], &quiet()).unwrap();
        assert_eq!(dropped, 1);

        let groups = load_groups(dir, &quiet()).unwrap();
        assert_eq!(names(&groups), vec!["B", "A"]);
        assert_eq!(groups[1].item_file_names, vec!["here.md"]);
    }

    #[test]
    fn test_unique_group_name() {
        let mut existing = vec![Group::new("Todo", 0)];
        let first = unique_group_name(&existing, "Todo", None);
        assert_eq!(first, "Todo (1)");
        existing.push(Group::new(first, 1));
        assert_eq!(unique_group_name(&existing, "todo", None), "todo (2)");
        assert_eq!(unique_group_name(&existing, "groups", None), "groups (1)");
        assert_eq!(unique_group_name(&existing, "Todo", Some("Todo")), "Todo");
    }

    #[test]
    fn test_sidecar_format() {
        let tmp = TempDir::new().unwrap();
        let mut g = Group::new("Urgent", 2);
        g.add_member("a.md");
        save_group(tmp.path(), &g, &quiet()).unwrap();
        let text = fs::read_to_string(tmp.path().join("Urgent.json")).unwrap();
        insta::assert_snapshot!(text, @r#"
{
  "name": "Urgent",
  "sortOrder": 2,
  "itemFileNames": [
    "a.md"
  ],
  "isCollapsed": false
}
"#);
    }
}
