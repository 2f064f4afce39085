use std::collections::{HashMap, HashSet};

use crate::io::group_io;
use crate::io::item_io::{self, StoreError};
use crate::io::suppress::Suppressor;
use crate::model::board::{Board, ColumnDescriptor};
use crate::model::column::Column;
use crate::model::group::Group;
use crate::model::item::Item;

/// Declared order first (skipping names that are gone), then undeclared files
/// in the order they were found.
pub fn order_items(declared: &[String], present: &[String]) -> Vec<String> {
    let present_set: HashSet<&str> = present.iter().map(|s| s.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(present.len());
    for name in declared {
        if present_set.contains(name.as_str()) && seen.insert(name.as_str()) {
            ordered.push(name.clone());
        }
    }
    for name in present {
        if seen.insert(name.as_str()) {
            ordered.push(name.clone());
        }
    }
    ordered
}

/// File name → owning group. Groups must already be in sort order; the first
/// group listing a file wins.
pub fn membership_index(groups: &[Group]) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for group in groups {
        for file in &group.item_file_names {
            index
                .entry(file.clone())
                .or_insert_with(|| group.name.clone());
        }
    }
    index
}

/// Set each item's group from the index. Unknown groups fall back to ungrouped.
pub fn assign_groups(items: &mut [Item], groups: &[Group], index: &HashMap<String, String>) {
    for item in items.iter_mut() {
        item.group = index
            .get(&item.file_name)
            .filter(|g| groups.iter().any(|grp| &grp.name == *g))
            .cloned();
    }
}

/// Make in-memory membership exclusive: a file stays only in its indexed group.
fn dedupe_members(groups: &mut [Group], index: &HashMap<String, String>) {
    for group in groups.iter_mut() {
        let name = group.name.clone();
        group
            .item_file_names
            .retain(|f| index.get(f).is_none_or(|owner| *owner == name));
    }
}

/// Partition items by the given groups (already in sort order).
pub fn attach_groups(items: &mut [Item], groups: &mut [Group]) {
    let index = membership_index(groups);
    dedupe_members(groups, &index);
    assign_groups(items, groups, &index);
}

/// Full load of one column: enumerate files, merge with declared order and
/// group sidecars, and drop group members whose files are gone.
pub fn load_column(board: &Board, desc: &ColumnDescriptor, suppressor: &Suppressor) -> Result<Column, StoreError> {
    let dir = board.column_path(&desc.folder_name);
    let mut groups = group_io::load_groups(&dir, suppressor)?;

    // Stale members are judged against every card file, not just filtered ones.
    let on_disk: HashSet<String> = item_io::list_item_files(&dir, None)?.into_iter().collect();
    for group in groups.iter_mut() {
        let before = group.item_file_names.len();
        group.item_file_names.retain(|f| on_disk.contains(f));
        if group.item_file_names.len() != before {
            tracing::debug!(group = %group.name, dropped = before - group.item_file_names.len(), "cleaning stale group members");
            if let Err(e) = group_io::save_group(&dir, group, suppressor) {
                tracing::warn!(group = %group.name, error = %e, "could not clean group file");
            }
        }
    }

    let present = item_io::list_item_files(&dir, board.file_filter.as_ref())?;
    let ordered = order_items(&desc.item_order, &present);
    let mut items = Vec::with_capacity(ordered.len());
    for name in &ordered {
        match item_io::read_item(&desc.folder_name, &dir.join(name)) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(file = %name, error = %e, "skipping unreadable item"),
        }
    }
    attach_groups(&mut items, &mut groups);

    Ok(Column {
        folder_name: desc.folder_name.clone(),
        display_name: if desc.display_name.is_empty() {
            desc.folder_name.clone()
        } else {
            desc.display_name.clone()
        },
        path: dir,
        sort_order: desc.sort_order,
        items,
        groups,
    })
}

/// Load every declared column in sort order. Columns that fail to load are
/// logged and skipped.
pub fn load_columns(board: &Board, suppressor: &Suppressor) -> Vec<Column> {
    board
        .sorted_columns()
        .into_iter()
        .filter_map(|desc| match load_column(board, desc, suppressor) {
            Ok(col) => Some(col),
            Err(e) => {
                tracing::warn!(column = %desc.folder_name, error = %e, "could not load column");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::group_io::save_group;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_order_declared_then_new() {
        let ordered = order_items(&strings(&["b.md"]), &strings(&["a.md", "b.md"]));
        assert_eq!(ordered, strings(&["b.md", "a.md"]));
    }

    #[test]
    fn test_order_drops_missing_and_duplicates() {
        let ordered = order_items(
            &strings(&["gone.md", "c.md", "c.md", "a.md"]),
            &strings(&["a.md", "b.md", "c.md"]),
        );
        assert_eq!(ordered, strings(&["c.md", "a.md", "b.md"]));
    }

    #[test]
    fn test_membership_first_group_wins() {
        let mut a = Group::new("A", 0);
        a.add_member("x.md");
        let mut b = Group::new("B", 1);
        b.add_member("x.md");
        b.add_member("y.md");
        let index = membership_index(&[a, b]);
        assert_eq!(index["x.md"], "A");
        assert_eq!(index["y.md"], "B");
    }

    fn setup() -> (TempDir, Board) {
        let tmp = TempDir::new().unwrap();
        let col = tmp.path().join("To Do");
        fs::create_dir(&col).unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            fs::write(col.join(name), format!("# {}\n\nbody {}\n", name, name)).unwrap();
        }
        let mut board = Board::new("b", tmp.path());
        let mut desc = ColumnDescriptor::new("To Do", "To Do", 0);
        desc.item_order = strings(&["c.md", "a.md"]);
        board.columns.push(desc);
        (tmp, board)
    }

    #[test]
    fn test_load_column_orders_and_groups() {
        let (tmp, board) = setup();
        let dir = tmp.path().join("To Do");
        let mut g = Group::new("Urgent", 0);
        g.add_member("a.md");
        g.add_member("deleted.md");
        save_group(&dir, &g, &Suppressor::inactive()).unwrap();

        let col = load_column(&board, &board.columns[0], &Suppressor::inactive()).unwrap();
        assert_eq!(col.file_names(), strings(&["c.md", "a.md", "b.md"]));
        assert_eq!(col.item("a.md").unwrap().group.as_deref(), Some("Urgent"));
        assert_eq!(col.ungrouped().count(), 2);
        assert_eq!(col.groups[0].item_file_names, strings(&["a.md"]));

        // The stale member was removed from disk too.
        let on_disk = group_io::load_groups(&dir, &Suppressor::inactive()).unwrap();
        assert_eq!(on_disk[0].item_file_names, strings(&["a.md"]));
    }

    #[test]
    fn test_load_column_is_idempotent() {
        let (tmp, board) = setup();
        let mut g = Group::new("G", 0);
        g.add_member("b.md");
        save_group(&tmp.path().join("To Do"), &g, &Suppressor::inactive()).unwrap();

        let first = load_column(&board, &board.columns[0], &Suppressor::inactive()).unwrap();
        let second = load_column(&board, &board.columns[0], &Suppressor::inactive()).unwrap();
        assert_eq!(first.file_names(), second.file_names());
        assert_eq!(first.groups, second.groups);
    }

    #[test]
    fn test_duplicate_membership_is_exclusive_in_memory() {
        let (tmp, board) = setup();
        let dir = tmp.path().join("To Do");
        let mut a = Group::new("A", 0);
        a.add_member("b.md");
        let mut b = Group::new("B", 1);
        b.add_member("b.md");
        save_group(&dir, &a, &Suppressor::inactive()).unwrap();
        save_group(&dir, &b, &Suppressor::inactive()).unwrap();

        let col = load_column(&board, &board.columns[0], &Suppressor::inactive()).unwrap();
        assert_eq!(col.item("b.md").unwrap().group.as_deref(), Some("A"));
        assert!(col.group("B").unwrap().item_file_names.is_empty());
    }

    #[test]
    fn test_filtered_files_are_not_stale() {
        let (tmp, mut board) = setup();
        let dir = tmp.path().join("To Do");
        fs::write(dir.join("pic.png"), [0u8; 4]).unwrap();
        let mut g = Group::new("G", 0);
        g.add_member("pic.png");
        save_group(&dir, &g, &Suppressor::inactive()).unwrap();
        board.file_filter = Some(crate::model::board::FileFilter {
            include_extensions: strings(&["md"]),
            exclude_extensions: vec![],
        });

        let col = load_column(&board, &board.columns[0], &Suppressor::inactive()).unwrap();
        assert!(col.item("pic.png").is_none());
        assert_eq!(col.groups[0].item_file_names, strings(&["pic.png"]));
    }
}
