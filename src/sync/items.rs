use std::path::Path;

use super::{BoardError, Reconciler};
use crate::io::group_io;
use crate::io::item_io::{self, StoreError};
use crate::model::drag::{DragPayload, DropTarget};
use crate::model::tags::item_key;
use crate::ops::tag_ops;

/// Result of a cross-column move.
///
/// The file has moved once an outcome exists. `persist_error` holds the first
/// config or sidecar save that failed afterwards; the move is not rolled back.
#[derive(Debug)]
pub struct MoveOutcome {
    /// Name of the file at its destination (suffixed on collision).
    pub file_name: String,
    pub persist_error: Option<StoreError>,
}

impl Reconciler {
    /// Create a markdown card in `column`. Returns the new file name.
    pub fn create_item(&mut self, column: &str, title: &str) -> Result<String, BoardError> {
        let col_idx = self.column_index(column)?;
        let path = item_io::create_item_file(&self.columns[col_idx].path, title, &self.suppressor)?;
        let name = file_name_of(&path);
        if !item_io::is_card_file(&path, self.board.file_filter.as_ref()) {
            tracing::debug!(file = %name, "created item is hidden by the file filter");
            return Ok(name);
        }
        let item = item_io::read_item(column, &path)?;
        self.columns[col_idx].items.push(item);
        self.sync_order(col_idx);
        self.save_board()?;
        Ok(name)
    }

    /// Delete a card's file and forget it, including its group slot and tags.
    pub fn delete_item(&mut self, column: &str, file: &str) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        item_io::delete_item_file(&self.columns[col_idx].items[pos].path, &self.suppressor)?;

        let col = &mut self.columns[col_idx];
        let item = col.items.remove(pos);
        let mut grouped = false;
        if let Some(group) = item.group.as_deref().and_then(|g| col.group_mut(g)) {
            grouped = group.remove_member(file);
        }
        tag_ops::drop_key(&mut self.board, &item_key(column, file));
        self.sync_order(col_idx);

        if grouped {
            group_io::remove_item_from_group(&self.columns[col_idx].path, file, &self.suppressor)?;
        }
        self.save_board()?;
        Ok(())
    }

    /// Rename a card to `title`. Returns the resulting file name.
    pub fn rename_item(&mut self, column: &str, file: &str, title: &str) -> Result<String, BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        let old_path = self.columns[col_idx].items[pos].path.clone();
        let new_path = item_io::rename_item_file(&old_path, title, &self.suppressor)?;
        let new_name = file_name_of(&new_path);
        if new_name == file {
            self.reload_item(column, file)?;
        } else {
            self.rename_in_place(col_idx, file, &new_name)?;
        }
        Ok(new_name)
    }

    /// Point a known card at a new name in the same column, keeping its
    /// position, declared-order slot, group membership and tags.
    pub(super) fn rename_in_place(&mut self, col_idx: usize, from: &str, to: &str) -> Result<(), StoreError> {
        let col = &mut self.columns[col_idx];
        let folder = col.folder_name.clone();
        let Some(item) = col.item_mut(from) else {
            return Ok(());
        };
        item.rename_to(to);
        match item_io::read_item(&folder, &item.path) {
            Ok(mut fresh) => {
                fresh.group = item.group.take();
                *item = fresh;
            }
            Err(e) => tracing::debug!(file = %to, error = %e, "keeping cached content after rename"),
        }

        let group = item.group.clone();
        let mut sidecar = None;
        if let Some(g) = group.as_deref().and_then(|g| col.group_mut(g))
            && g.rename_member(from, to)
        {
            sidecar = Some(g.clone());
        }

        let slot = self
            .board
            .descriptor_mut(&folder)
            .and_then(|d| d.item_order.iter_mut().find(|n| *n == from));
        match slot {
            Some(slot) => *slot = to.to_string(),
            None => self.sync_order(col_idx),
        }
        tag_ops::rekey(&mut self.board, &item_key(&folder, from), &item_key(&folder, to));

        if let Some(g) = sidecar {
            group_io::save_group(&self.columns[col_idx].path, &g, &self.suppressor)?;
        }
        self.save_board()
    }

    /// Replace a card's content and refresh the cached copy.
    pub fn write_item_content(&mut self, column: &str, file: &str, content: &str) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        item_io::write_item_content(&self.columns[col_idx].items[pos].path, content, &self.suppressor)?;
        self.reload_item(column, file)
    }

    /// Move a card to `index` within its column (clamped to the end).
    pub fn reorder_item(&mut self, column: &str, file: &str, index: usize) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        let col = &mut self.columns[col_idx];
        let item = col.items.remove(pos);
        let index = index.min(col.items.len());
        col.items.insert(index, item);
        self.sync_order(col_idx);
        self.save_board()?;
        Ok(())
    }

    /// Move a card to `target`, into `group` (or ungrouped) at `index`.
    ///
    /// Within one column this only changes group membership and position.
    /// Across columns the file is moved first; if that fails nothing changes.
    pub fn move_item(
        &mut self,
        column: &str,
        file: &str,
        target: &str,
        group: Option<&str>,
        index: Option<usize>,
    ) -> Result<MoveOutcome, BoardError> {
        let src_idx = self.column_index(column)?;
        let pos = self.item_position(src_idx, file)?;
        let dst_idx = self.column_index(target)?;
        if let Some(g) = group {
            self.ensure_group(dst_idx, g)?;
        }

        if src_idx == dst_idx {
            self.move_item_to_group(column, file, group)?;
            if let Some(index) = index {
                self.reorder_item(column, file, index)?;
            }
            return Ok(MoveOutcome {
                file_name: file.to_string(),
                persist_error: None,
            });
        }

        let src_path = self.columns[src_idx].items[pos].path.clone();
        let dest = item_io::move_file(&src_path, &self.columns[dst_idx].path, &self.suppressor)?;
        let new_name = file_name_of(&dest);
        let mut persist_error = None;

        // Detach from the source column.
        let src = &mut self.columns[src_idx];
        let mut item = src.items.remove(pos);
        if let Some(old_group) = item.group.take()
            && let Some(g) = src.group_mut(&old_group)
        {
            g.remove_member(file);
            let snapshot = g.clone();
            keep_first(
                &mut persist_error,
                group_io::save_group(&src.path, &snapshot, &self.suppressor),
            );
        }

        // Reattach to the target.
        item.column = target.to_string();
        item.rename_to(&new_name);
        item.path = dest.clone();
        if let Ok(fresh) = item_io::read_item(target, &dest) {
            item = fresh;
        }
        let dst = &mut self.columns[dst_idx];
        let dst_dir = dst.path.clone();
        let index = index.unwrap_or(dst.items.len()).min(dst.items.len());
        dst.items.insert(index, item);

        // Membership is exclusive on disk too: clear any stale entry for the
        // name in the target column's other groups, then re-partition.
        let placed = match group {
            Some(g) => group_io::add_item_to_group(&dst_dir, g, &new_name, &self.suppressor),
            None => group_io::remove_item_from_group(&dst_dir, &new_name, &self.suppressor).map(|_| ()),
        };
        keep_first(&mut persist_error, placed);
        keep_first(&mut persist_error, self.refresh_groups(dst_idx));

        tag_ops::rekey(&mut self.board, &item_key(column, file), &item_key(target, &new_name));
        self.sync_order(src_idx);
        self.sync_order(dst_idx);
        keep_first(&mut persist_error, self.save_board());

        tracing::info!(from = %src_path.display(), to = %dest.display(), "moved item");
        Ok(MoveOutcome {
            file_name: new_name,
            persist_error,
        })
    }

    /// Make a card a member of `group`, or ungrouped with `None`.
    pub fn move_item_to_group(&mut self, column: &str, file: &str, group: Option<&str>) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        self.item_position(col_idx, file)?;
        let dir = self.columns[col_idx].path.clone();
        match group {
            Some(g) => {
                self.ensure_group(col_idx, g)?;
                group_io::add_item_to_group(&dir, g, file, &self.suppressor)?;
            }
            None => {
                group_io::remove_item_from_group(&dir, file, &self.suppressor)?;
            }
        }
        self.refresh_groups(col_idx)?;
        Ok(())
    }

    /// Whether the file on disk no longer matches the cached card.
    /// A card whose file is gone has diverged.
    pub fn has_diverged(&self, column: &str, file: &str) -> Result<bool, BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        let cached = &self.columns[col_idx].items[pos];
        match item_io::read_item(column, &cached.path) {
            Ok(disk) => Ok(disk.modified != cached.modified || disk.content != cached.content),
            Err(StoreError::NotFound { .. }) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read a card from disk, keeping its place and group.
    pub fn reload_item(&mut self, column: &str, file: &str) -> Result<(), BoardError> {
        let col_idx = self.column_index(column)?;
        let pos = self.item_position(col_idx, file)?;
        let slot = &mut self.columns[col_idx].items[pos];
        let mut fresh = item_io::read_item(column, &slot.path)?;
        fresh.group = slot.group.take();
        *slot = fresh;
        Ok(())
    }

    /// Apply a completed drag gesture.
    pub fn drop_payload(&mut self, payload: &DragPayload, target: &DropTarget) -> Result<MoveOutcome, BoardError> {
        let source = self
            .locate(&payload.source_column_path)
            .and_then(|parts| match parts.as_slice() {
                [folder] => Some(folder.clone()),
                _ => None,
            })
            .ok_or_else(|| BoardError::UnknownColumn(payload.source_column_path.display().to_string()))?;
        self.move_item(
            &source,
            &payload.file_name,
            &target.column,
            target.group.as_deref(),
            target.index,
        )
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn keep_first(slot: &mut Option<StoreError>, result: Result<(), StoreError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "could not persist move");
        slot.get_or_insert(e);
    }
}
