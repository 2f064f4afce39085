use std::path::Path;

use super::Reconciler;
use crate::io::group_io;
use crate::io::item_io::{self, CONFIG_FILE_NAME};
use crate::model::board::{ColumnDescriptor, extension_of};
use crate::model::event::BoardEvent;
use crate::ops::reconcile;
use crate::util::names::is_hidden_name;

/// Where an event path sits on the board.
enum Target {
    Config,
    /// A `.json` sidecar inside a column.
    Sidecar { column: String },
    Card { column: String, file: String },
    Column { folder: String },
    Elsewhere,
}

impl Reconciler {
    /// Apply one watcher event as a narrow in-memory update.
    pub fn apply_event(&mut self, event: &BoardEvent) {
        tracing::debug!(event = %event, "applying");
        match event {
            BoardEvent::ItemCreated { path } => self.on_item_created(path),
            BoardEvent::ItemDeleted { path } => self.on_item_deleted(path),
            BoardEvent::ItemRenamed { from, to } => self.on_item_renamed(from, to),
            BoardEvent::ItemContentChanged { path } => self.on_item_changed(path),
            BoardEvent::ColumnCreated { path } => self.on_column_created(path),
            BoardEvent::ColumnDeleted { path } => self.on_column_deleted(path),
        }
    }

    fn classify(&self, path: &Path) -> Target {
        let Some(parts) = self.locate(path) else {
            return Target::Elsewhere;
        };
        match parts.as_slice() {
            [name] if name == CONFIG_FILE_NAME => Target::Config,
            [folder] => Target::Column {
                folder: folder.clone(),
            },
            [column, file] if extension_of(file) == "json" && !is_hidden_name(file) => Target::Sidecar {
                column: column.clone(),
            },
            [column, file] => Target::Card {
                column: column.clone(),
                file: file.clone(),
            },
            _ => Target::Elsewhere,
        }
    }

    fn on_item_created(&mut self, path: &Path) {
        match self.classify(path) {
            Target::Config => self.reload(),
            Target::Sidecar { column } => self.reload_column(&column),
            Target::Card { column, file } => self.add_or_refresh(&column, &file, path),
            _ => {}
        }
    }

    fn on_item_changed(&mut self, path: &Path) {
        // Unknown items are treated as creates, so the two share a path.
        self.on_item_created(path);
    }

    fn on_item_deleted(&mut self, path: &Path) {
        match self.classify(path) {
            Target::Config => self.reload(),
            Target::Sidecar { column } => self.reload_column(&column),
            Target::Card { column, file } => self.remove_known(&column, &file),
            _ => {}
        }
    }

    fn on_item_renamed(&mut self, from: &Path, to: &Path) {
        let (from_target, to_target) = (self.classify(from), self.classify(to));
        let (from_col, from_file, to_col, to_file) = match (from_target, to_target) {
            (Target::Card { column: fc, file: ff }, Target::Card { column: tc, file: tf }) if fc == tc => {
                (fc, ff, tc, tf)
            }
            _ => {
                self.on_item_deleted(from);
                self.on_item_created(to);
                return;
            }
        };

        let Ok(col_idx) = self.column_index(&from_col) else {
            return;
        };
        let filter = self.board.file_filter.clone();
        let to_visible = item_io::is_card_file(to, filter.as_ref());
        let known = self.columns[col_idx].item(&from_file).is_some();

        if !to_visible {
            if known {
                self.remove_known(&from_col, &from_file);
            }
            return;
        }
        if !known {
            self.add_or_refresh(&to_col, &to_file, to);
            return;
        }

        // Renamed onto an existing card: the old card at the destination is gone.
        if from_file != to_file && self.columns[col_idx].item(&to_file).is_some() {
            self.remove_known(&to_col, &to_file);
        }
        if let Err(e) = self.rename_in_place(col_idx, &from_file, &to_file) {
            tracing::warn!(error = %e, "could not apply external rename");
        }
    }

    fn on_column_created(&mut self, path: &Path) {
        let Target::Column { folder } = self.classify(path) else {
            return;
        };
        if is_hidden_name(&folder) || self.board.descriptor(&folder).is_some() || !path.is_dir() {
            return;
        }
        let sort_order = self
            .board
            .columns
            .iter()
            .map(|c| c.sort_order + 1)
            .max()
            .unwrap_or(0);
        let desc = ColumnDescriptor::new(folder.clone(), folder.clone(), sort_order);
        self.board.columns.push(desc.clone());
        if let Err(e) = self.save_board() {
            tracing::warn!(error = %e, "could not save board after new column");
        }
        match reconcile::load_column(&self.board, &desc, &self.suppressor) {
            Ok(col) => {
                self.columns.push(col);
                self.sort_columns();
            }
            Err(e) => tracing::warn!(column = %folder, error = %e, "could not load new column"),
        }
    }

    fn on_column_deleted(&mut self, path: &Path) {
        let Target::Column { folder } = self.classify(path) else {
            return;
        };
        let Ok(idx) = self.column_index(&folder) else {
            return;
        };
        self.columns.remove(idx);
        self.board.columns.retain(|c| c.folder_name != folder);
        if let Err(e) = self.save_board() {
            tracing::warn!(error = %e, "could not save board after column removal");
        }
    }

    /// Refresh a known card, or append an unknown one ungrouped.
    fn add_or_refresh(&mut self, column: &str, file: &str, path: &Path) {
        let Ok(col_idx) = self.column_index(column) else {
            return;
        };
        if !item_io::is_card_file(path, self.board.file_filter.as_ref()) {
            return;
        }
        let mut item = match item_io::read_item(column, &self.columns[col_idx].path.join(file)) {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!(file = %file, error = %e, "could not read item");
                return;
            }
        };
        let col = &mut self.columns[col_idx];
        match col.item_mut(file) {
            Some(existing) => {
                item.group = existing.group.take();
                *existing = item;
            }
            None => {
                col.items.push(item);
                self.sync_order(col_idx);
                if let Err(e) = self.save_board() {
                    tracing::warn!(error = %e, "could not save item order");
                }
            }
        }
    }

    /// Drop a card from its column, the declared order and its in-memory group.
    fn remove_known(&mut self, column: &str, file: &str) {
        let Ok(col_idx) = self.column_index(column) else {
            return;
        };
        let col = &mut self.columns[col_idx];
        let Some(pos) = col.position(file) else {
            return;
        };
        let item = col.items.remove(pos);
        let grouped = item
            .group
            .as_deref()
            .and_then(|g| col.group_mut(g))
            .is_some_and(|g| g.remove_member(file));
        let dir = col.path.clone();
        self.sync_order(col_idx);

        if grouped && let Err(e) = group_io::remove_item_from_group(&dir, file, &self.suppressor) {
            tracing::warn!(file = %file, error = %e, "could not save group membership");
        }
        if let Err(e) = self.save_board() {
            tracing::warn!(error = %e, "could not save item order");
        }
    }
}
