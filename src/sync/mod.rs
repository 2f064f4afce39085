//! The board engine: owns the in-memory board, keeps it in step with the
//! folder tree, and exposes every mutation as a typed command.

mod columns;
mod events;
mod groups;
mod items;
mod tags;

pub use items::MoveOutcome;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::board_io::BoardConfigStore;
use crate::io::group_io;
use crate::io::item_io::StoreError;
use crate::io::settings::WatcherSettings;
use crate::io::suppress::Suppressor;
use crate::io::watcher::{PathWatcher, WatchError};
use crate::model::board::Board;
use crate::model::column::Column;
use crate::model::event::BoardEvent;
use crate::ops::reconcile;
use crate::ops::tag_ops::TagError;
use crate::util::paths::relative_components;

/// Error type for board commands
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("not a board folder: {0}")]
    InvalidRoot(PathBuf),
    #[error("column not found: {0}")]
    UnknownColumn(String),
    #[error("item not found: {column}/{file}")]
    UnknownItem { column: String, file: String },
    #[error("group not found: {column}/{group}")]
    UnknownGroup { column: String, group: String },
    #[error("column folder already exists: {0}")]
    DuplicateColumn(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Tag(#[from] TagError),
}

/// An open board.
///
/// All board state is mutated through `&mut self`: watcher events are pulled
/// with [`Reconciler::process_events`] on the same thread that issues commands.
pub struct Reconciler {
    board: Board,
    /// In sort order.
    columns: Vec<Column>,
    store: BoardConfigStore,
    suppressor: Suppressor,
    watcher: Option<PathWatcher>,
    canonical_root: PathBuf,
}

impl Reconciler {
    /// Open a board with a live watcher. Failing to watch is fatal.
    pub fn open(root: &Path, settings: &WatcherSettings) -> Result<Self, BoardError> {
        let canonical_root = canonical_root(root)?;
        let suppressor = Suppressor::new();
        let watcher = PathWatcher::start(root, settings, suppressor.clone())?;
        Ok(Self::load(root, canonical_root, suppressor, Some(watcher)))
    }

    /// Open a board without watching it. Suppression is inactive.
    pub fn open_unwatched(root: &Path) -> Result<Self, BoardError> {
        let canonical_root = canonical_root(root)?;
        Ok(Self::load(root, canonical_root, Suppressor::inactive(), None))
    }

    fn load(root: &Path, canonical_root: PathBuf, suppressor: Suppressor, watcher: Option<PathWatcher>) -> Self {
        let mut store = BoardConfigStore::new(suppressor.clone());
        let board = store.load_or_initialize(root);
        let columns = reconcile::load_columns(&board, &suppressor);
        tracing::info!(board = %board.name, columns = columns.len(), "opened board");
        Reconciler {
            board,
            columns,
            store,
            suppressor,
            watcher,
            canonical_root,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn root(&self) -> &Path {
        &self.board.root_path
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, folder: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.folder_name == folder)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn suppressor(&self) -> &Suppressor {
        &self.suppressor
    }

    /// True once after a corrupt board config was replaced.
    pub fn take_corruption_flag(&mut self) -> bool {
        self.store.take_corruption_flag()
    }

    /// Re-read the board config and every column from disk.
    pub fn reload(&mut self) {
        self.board = self.store.load_or_initialize(&self.board.root_path);
        self.columns = reconcile::load_columns(&self.board, &self.suppressor);
    }

    /// Re-read one column from disk. Untracked folders are ignored.
    pub fn reload_column(&mut self, folder: &str) {
        let Some(desc) = self.board.descriptor(folder).cloned() else {
            return;
        };
        match reconcile::load_column(&self.board, &desc, &self.suppressor) {
            Ok(col) => match self.column_index(folder) {
                Ok(idx) => self.columns[idx] = col,
                Err(_) => {
                    self.columns.push(col);
                    self.sort_columns();
                }
            },
            Err(e) => tracing::warn!(column = %folder, error = %e, "could not reload column"),
        }
    }

    /// Apply every event the watcher has queued. Returns what was applied.
    pub fn process_events(&mut self) -> Vec<BoardEvent> {
        let events = match &self.watcher {
            Some(w) => w.poll(),
            None => Vec::new(),
        };
        for evt in &events {
            self.apply_event(evt);
        }
        events
    }

    /// Block up to `timeout` for at least one event, then apply everything queued.
    pub fn wait_for_events(&mut self, timeout: Duration) -> Vec<BoardEvent> {
        let first = match &self.watcher {
            Some(w) => w.recv_timeout(timeout),
            None => None,
        };
        let Some(first) = first else {
            return Vec::new();
        };
        self.apply_event(&first);
        let mut applied = vec![first];
        applied.extend(self.process_events());
        applied
    }

    /// Stop the watcher, if any. The board stays usable.
    pub fn stop_watching(&mut self) {
        if let Some(mut w) = self.watcher.take() {
            w.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers shared by the command modules
    // -----------------------------------------------------------------------

    fn column_index(&self, folder: &str) -> Result<usize, BoardError> {
        self.columns
            .iter()
            .position(|c| c.folder_name == folder)
            .ok_or_else(|| BoardError::UnknownColumn(folder.to_string()))
    }

    fn item_position(&self, col_idx: usize, file: &str) -> Result<usize, BoardError> {
        let col = &self.columns[col_idx];
        col.position(file).ok_or_else(|| BoardError::UnknownItem {
            column: col.folder_name.clone(),
            file: file.to_string(),
        })
    }

    fn ensure_group(&self, col_idx: usize, group: &str) -> Result<(), BoardError> {
        let col = &self.columns[col_idx];
        match col.group(group) {
            Some(_) => Ok(()),
            None => Err(BoardError::UnknownGroup {
                column: col.folder_name.clone(),
                group: group.to_string(),
            }),
        }
    }

    /// Copy a column's display order into its descriptor (not saved).
    fn sync_order(&mut self, col_idx: usize) {
        let col = &self.columns[col_idx];
        let names = col.file_names();
        if let Some(desc) = self.board.descriptor_mut(&col.folder_name) {
            desc.item_order = names;
        }
    }

    fn save_board(&self) -> Result<(), StoreError> {
        self.store.save(&self.board)
    }

    /// Re-read a column's group sidecars and re-partition its items.
    fn refresh_groups(&mut self, col_idx: usize) -> Result<(), StoreError> {
        let col = &mut self.columns[col_idx];
        let mut groups = group_io::load_groups(&col.path, &self.suppressor)?;
        reconcile::attach_groups(&mut col.items, &mut groups);
        col.groups = groups;
        Ok(())
    }

    fn sort_columns(&mut self) {
        self.columns.sort_by_key(|c| c.sort_order);
    }

    /// Components of `path` below the board root.
    fn locate(&self, path: &Path) -> Option<Vec<String>> {
        relative_components(&[&self.board.root_path, &self.canonical_root], path)
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, BoardError> {
    if !root.is_dir() {
        return Err(BoardError::InvalidRoot(root.to_path_buf()));
    }
    root.canonicalize()
        .map_err(|_| BoardError::InvalidRoot(root.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_rejects_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = Reconciler::open_unwatched(&tmp.path().join("nope")).err().unwrap();
        assert!(matches!(err, BoardError::InvalidRoot(_)));
    }

    #[test]
    fn test_open_keeps_root_as_given() {
        let tmp = TempDir::new().unwrap();
        let rec = Reconciler::open_unwatched(tmp.path()).unwrap();
        assert_eq!(rec.root(), tmp.path());
        assert_eq!(rec.columns().len(), 3);
        assert!(!rec.is_watching());
    }

    #[test]
    fn test_reload_column_picks_up_external_files() {
        let tmp = TempDir::new().unwrap();
        let mut rec = Reconciler::open_unwatched(tmp.path()).unwrap();
        fs::write(tmp.path().join("Done/x.md"), "x").unwrap();
        assert!(rec.column("Done").unwrap().items.is_empty());
        rec.reload_column("Done");
        assert_eq!(rec.column("Done").unwrap().file_names(), vec!["x.md"]);
        rec.reload_column("Missing");
    }
}
