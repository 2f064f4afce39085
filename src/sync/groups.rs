use super::{BoardError, Reconciler};
use crate::io::group_io;
use crate::io::item_io;
use crate::model::group::Group;
use crate::model::tags::{group_key, item_key};
use crate::ops::tag_ops;
use crate::util::names::sanitize_name;

impl Reconciler {
    /// Create an empty group after the existing ones. Returns the stored name,
    /// suffixed ` (n)` when the name is taken.
    pub fn create_group(&mut self, column: &str, name: &str) -> Result<String, BoardError> {
        let col_idx = self.column_index(column)?;
        let col = &mut self.columns[col_idx];
        let base = sanitize_name(name.trim(), "Group");
        let name = group_io::unique_group_name(&col.groups, &base, None);
        let group = Group::new(name.clone(), next_sort_order(&col.groups));
        group_io::save_group(&col.path, &group, &self.suppressor)?;
        col.groups.push(group);
        col.sort_groups();
        Ok(name)
    }

    /// Rename a group and its sidecar. Returns the stored name.
    pub fn rename_group(&mut self, column: &str, old: &str, new: &str) -> Result<String, BoardError> {
        let col_idx = self.column_index(column)?;
        self.ensure_group(col_idx, old)?;
        let col = &mut self.columns[col_idx];
        let base = sanitize_name(new.trim(), "Group");
        let name = group_io::unique_group_name(&col.groups, &base, Some(old));
        if name == old {
            return Ok(name);
        }
        group_io::rename_group_file(&col.path, old, &name, &self.suppressor)?;

        if let Some(group) = col.group_mut(old) {
            group.name = name.clone();
        }
        for item in col.items.iter_mut().filter(|i| i.group.as_deref() == Some(old)) {
            item.group = Some(name.clone());
        }
        if tag_ops::rekey(&mut self.board, &group_key(column, old), &group_key(column, &name)) {
            self.save_board()?;
        }
        Ok(name)
    }

    /// Delete a group. Its members become ungrouped; their files stay.
    pub fn delete_group(&mut self, column: &str, name: &str) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        self.ensure_group(col_idx, name)?;
        let col = &mut self.columns[col_idx];
        group_io::delete_group_file(&col.path, name, &self.suppressor)?;
        col.groups.retain(|g| g.name != name);
        for item in col.items.iter_mut().filter(|i| i.group.as_deref() == Some(name)) {
            item.group = None;
        }
        if tag_ops::drop_key(&mut self.board, &group_key(column, name)) {
            self.save_board()?;
        }
        Ok(())
    }

    /// Renumber groups in the given order. Groups not named keep their
    /// relative order after the named ones.
    pub fn reorder_groups(&mut self, column: &str, ordered: &[String]) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        for name in ordered {
            self.ensure_group(col_idx, name)?;
        }
        let col = &mut self.columns[col_idx];
        let mut names: Vec<String> = Vec::with_capacity(col.groups.len());
        for name in ordered.iter().chain(col.groups.iter().map(|g| &g.name)) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        group_io::reorder_groups(&col.path, &names, &self.suppressor)?;
        for group in col.groups.iter_mut() {
            if let Some(pos) = names.iter().position(|n| *n == group.name) {
                group.sort_order = pos as i32;
            }
        }
        col.sort_groups();
        Ok(())
    }

    pub fn set_group_collapsed(&mut self, column: &str, name: &str, collapsed: bool) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        self.ensure_group(col_idx, name)?;
        let col = &mut self.columns[col_idx];
        let Some(group) = col.group_mut(name) else {
            return Ok(());
        };
        if group.is_collapsed == collapsed {
            return Ok(());
        }
        group.is_collapsed = collapsed;
        let snapshot = group.clone();
        group_io::save_group(&col.path, &snapshot, &self.suppressor)?;
        Ok(())
    }

    /// Move a group with all its member files to another column.
    ///
    /// Members that fail to move stay behind in the source group; the source
    /// sidecar is removed once it is empty. Returns the group's name in the
    /// target column.
    pub fn move_group(&mut self, column: &str, name: &str, target: &str) -> Result<String, BoardError> {
        let src_idx = self.column_index(column)?;
        self.ensure_group(src_idx, name)?;
        let dst_idx = self.column_index(target)?;
        if src_idx == dst_idx {
            return Ok(name.to_string());
        }

        let dst_dir = self.columns[dst_idx].path.clone();
        let new_name = group_io::unique_group_name(&self.columns[dst_idx].groups, name, None);
        let source = match self.columns[src_idx].group(name) {
            Some(g) => g.clone(),
            None => return Ok(name.to_string()),
        };

        let mut moved = Group::new(new_name.clone(), next_sort_order(&self.columns[dst_idx].groups));
        moved.is_collapsed = source.is_collapsed;
        let mut left_behind = Vec::new();

        for file in &source.item_file_names {
            let src_path = self.columns[src_idx].path.join(file);
            let dest = match item_io::move_file(&src_path, &dst_dir, &self.suppressor) {
                Ok(dest) => dest,
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "could not move group member");
                    if src_path.exists() {
                        left_behind.push(file.clone());
                    }
                    continue;
                }
            };
            let new_file = dest
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            moved.add_member(&new_file);

            if let Some(pos) = self.columns[src_idx].position(file) {
                let mut item = self.columns[src_idx].items.remove(pos);
                item.column = target.to_string();
                item.rename_to(&new_file);
                item.path = dest.clone();
                if let Ok(fresh) = item_io::read_item(target, &dest) {
                    item = fresh;
                }
                item.group = Some(new_name.clone());
                self.columns[dst_idx].items.push(item);
            }
            tag_ops::rekey(&mut self.board, &item_key(column, file), &item_key(target, &new_file));
        }

        group_io::save_group(&dst_dir, &moved, &self.suppressor)?;
        let dst = &mut self.columns[dst_idx];
        dst.groups.push(moved);
        dst.sort_groups();

        let src = &mut self.columns[src_idx];
        if left_behind.is_empty() {
            group_io::delete_group_file(&src.path, name, &self.suppressor)?;
            src.groups.retain(|g| g.name != name);
            tag_ops::rekey(&mut self.board, &group_key(column, name), &group_key(target, &new_name));
        } else if let Some(group) = src.group_mut(name) {
            group.item_file_names = left_behind;
            let snapshot = group.clone();
            group_io::save_group(&src.path, &snapshot, &self.suppressor)?;
        }

        self.sync_order(src_idx);
        self.sync_order(dst_idx);
        self.save_board()?;
        tracing::info!(group = %name, from = %column, to = %target, "moved group");
        Ok(new_name)
    }
}

fn next_sort_order(groups: &[Group]) -> i32 {
    groups.iter().map(|g| g.sort_order + 1).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, Reconciler) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir(root.join("A")).unwrap();
        fs::create_dir(root.join("B")).unwrap();
        for name in ["x.md", "y.md", "z.md"] {
            fs::write(root.join("A").join(name), name).unwrap();
        }
        let rec = Reconciler::open_unwatched(&root).unwrap();
        (tmp, root, rec)
    }

    fn group_names(rec: &Reconciler, col: &str) -> Vec<String> {
        rec.column(col)
            .unwrap()
            .groups
            .iter()
            .map(|g| g.name.clone())
            .collect()
    }

    #[test]
    fn test_create_group_uniquifies() {
        let (_tmp, root, mut rec) = setup();
        assert_eq!(rec.create_group("A", "Todo").unwrap(), "Todo");
        assert_eq!(rec.create_group("A", "Todo").unwrap(), "Todo (1)");
        assert_eq!(rec.create_group("A", "todo").unwrap(), "todo (2)");
        assert!(root.join("A/Todo (1).json").is_file());
        assert_eq!(rec.create_group("A", "groups").unwrap(), "groups (1)");
        let orders: Vec<i32> = rec.column("A").unwrap().groups.iter().map(|g| g.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_rename_group_keeps_members_and_tags() {
        let (_tmp, root, mut rec) = setup();
        rec.create_group("A", "G").unwrap();
        rec.create_group("A", "H").unwrap();
        rec.move_item_to_group("A", "x.md", Some("G")).unwrap();
        rec.create_tag("bug", None).unwrap();
        rec.toggle_group_tag("A", "G", "bug").unwrap();

        assert_eq!(rec.rename_group("A", "G", "h").unwrap(), "h (1)");
        assert!(!root.join("A/G.json").exists());
        let col = rec.column("A").unwrap();
        assert_eq!(col.item("x.md").unwrap().group.as_deref(), Some("h (1)"));
        assert_eq!(rec.group_tags("A", "h (1)"), vec!["bug"]);

        // Case-only rename of its own name is allowed.
        assert_eq!(rec.rename_group("A", "h (1)", "H (1)").unwrap(), "H (1)");
        assert_eq!(group_names(&rec, "A"), vec!["H (1)", "H"]);
        let on_disk = group_io::load_groups(&root.join("A"), rec.suppressor()).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[test]
    fn test_delete_group_ungroups_members() {
        let (_tmp, root, mut rec) = setup();
        rec.create_group("A", "G").unwrap();
        rec.move_item_to_group("A", "y.md", Some("G")).unwrap();
        rec.delete_group("A", "G").unwrap();
        assert!(!root.join("A/G.json").exists());
        assert!(root.join("A/y.md").exists());
        assert!(rec.column("A").unwrap().item("y.md").unwrap().group.is_none());
        assert!(matches!(
            rec.delete_group("A", "G"),
            Err(BoardError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn test_reorder_and_collapse() {
        let (_tmp, root, mut rec) = setup();
        for name in ["One", "Two", "Three"] {
            rec.create_group("A", name).unwrap();
        }
        rec.reorder_groups("A", &["Three".to_string()]).unwrap();
        assert_eq!(group_names(&rec, "A"), vec!["Three", "One", "Two"]);

        rec.set_group_collapsed("A", "Two", true).unwrap();
        let on_disk = group_io::load_groups(&root.join("A"), rec.suppressor()).unwrap();
        let names: Vec<&str> = on_disk.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Three", "One", "Two"]);
        assert!(on_disk[2].is_collapsed);
    }

    #[test]
    fn test_move_group_moves_sidecar_and_members() {
        let (_tmp, root, mut rec) = setup();
        rec.create_group("A", "G").unwrap();
        rec.move_item_to_group("A", "x.md", Some("G")).unwrap();
        rec.move_item_to_group("A", "z.md", Some("G")).unwrap();
        fs::write(root.join("B/x.md"), "taken").unwrap();
        rec.reload_column("B");

        assert_eq!(rec.move_group("A", "G", "B").unwrap(), "G");
        assert!(!root.join("A/G.json").exists());
        assert!(!root.join("A/x.md").exists());
        assert_eq!(rec.column("A").unwrap().file_names(), vec!["y.md"]);

        let b = rec.column("B").unwrap();
        assert_eq!(b.file_names(), vec!["x.md", "x-1.md", "z.md"]);
        assert_eq!(b.group("G").unwrap().item_file_names, vec!["x-1.md", "z.md"]);
        assert_eq!(b.item("x-1.md").unwrap().group.as_deref(), Some("G"));
        assert_eq!(rec.board().descriptor("B").unwrap().item_order, b.file_names());
    }
}
