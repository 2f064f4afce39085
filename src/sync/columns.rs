use super::{BoardError, Reconciler};
use crate::io::item_io;
use crate::model::board::{ColumnDescriptor, FileFilter};
use crate::ops::{reconcile, tag_ops};
use crate::util::names::sanitize_name;

impl Reconciler {
    /// Create a column folder and declare it as the last column.
    /// Returns the folder name.
    pub fn create_column(&mut self, name: &str) -> Result<String, BoardError> {
        let folder = sanitize_name(name.trim(), "New Column");
        if self.folder_taken(&folder, None) {
            return Err(BoardError::DuplicateColumn(folder));
        }
        item_io::create_column_folder(&self.board.root_path, &folder, &self.suppressor)?;

        let sort_order = self.board.columns.iter().map(|c| c.sort_order + 1).max().unwrap_or(0);
        let desc = ColumnDescriptor::new(folder.clone(), display_name(name, &folder), sort_order);
        self.board.columns.push(desc.clone());
        self.save_board()?;
        let col = reconcile::load_column(&self.board, &desc, &self.suppressor)?;
        self.columns.push(col);
        self.sort_columns();
        tracing::info!(column = %folder, "created column");
        Ok(folder)
    }

    /// Rename a column, renaming its folder when the sanitized name differs.
    /// Returns the (possibly new) folder name.
    pub fn rename_column(&mut self, folder: &str, name: &str) -> Result<String, BoardError> {
        let col_idx = self.column_index(folder)?;
        let new_folder = sanitize_name(name.trim(), "Column");
        let display = display_name(name, &new_folder);

        if new_folder != folder {
            if self.folder_taken(&new_folder, Some(folder)) {
                return Err(BoardError::DuplicateColumn(new_folder));
            }
            let from = self.board.column_path(folder);
            let to = self.board.column_path(&new_folder);
            item_io::rename_column_folder(&from, &to, &self.suppressor)?;

            let col = &mut self.columns[col_idx];
            col.folder_name = new_folder.clone();
            col.path = to.clone();
            for item in col.items.iter_mut() {
                item.column = new_folder.clone();
                item.path = to.join(&item.file_name);
            }
            if let Some(desc) = self.board.descriptor_mut(folder) {
                desc.folder_name = new_folder.clone();
            }
            tag_ops::rekey_column(&mut self.board, folder, &new_folder);
        }

        self.columns[col_idx].display_name = display.clone();
        if let Some(desc) = self.board.descriptor_mut(&new_folder) {
            desc.display_name = display;
        }
        self.save_board()?;
        Ok(new_folder)
    }

    /// Delete a column and everything in its folder.
    pub fn delete_column(&mut self, folder: &str) -> Result<(), BoardError> {
        let col_idx = self.column_index(folder)?;
        item_io::delete_column_folder(&self.columns[col_idx].path, &self.suppressor)?;
        self.columns.remove(col_idx);
        self.board.columns.retain(|c| c.folder_name != folder);
        tag_ops::drop_column(&mut self.board, folder);
        self.save_board()?;
        tracing::info!(column = %folder, "deleted column");
        Ok(())
    }

    /// Move a column to `index` among the columns and renumber sort orders.
    pub fn reorder_column(&mut self, folder: &str, index: usize) -> Result<(), BoardError> {
        let col_idx = self.column_index(folder)?;
        let col = self.columns.remove(col_idx);
        let index = index.min(self.columns.len());
        self.columns.insert(index, col);
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.sort_order = i as i32;
            if let Some(desc) = self.board.descriptor_mut(&col.folder_name) {
                desc.sort_order = i as i32;
            }
        }
        self.save_board()?;
        Ok(())
    }

    /// Replace the extension filter, persist it and reload every column.
    pub fn set_file_filter(&mut self, filter: Option<FileFilter>) -> Result<(), BoardError> {
        self.board.file_filter = filter.filter(|f| !f.is_empty());
        self.save_board()?;
        self.columns = reconcile::load_columns(&self.board, &self.suppressor);
        Ok(())
    }

    /// Whether `folder` is declared or present on disk, ignoring case.
    /// `current` is the folder being renamed, which never counts as taken.
    fn folder_taken(&self, folder: &str, current: Option<&str>) -> bool {
        if current.is_some_and(|c| c.eq_ignore_ascii_case(folder)) {
            return false;
        }
        let declared = self
            .board
            .columns
            .iter()
            .any(|c| c.folder_name.eq_ignore_ascii_case(folder));
        declared || self.board.column_path(folder).exists()
    }
}

fn display_name(name: &str, folder: &str) -> String {
    match name.trim() {
        "" => folder.to_string(),
        trimmed => trimmed.to_string(),
    }
}
