use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::io::item_io::{CONFIG_FILE_NAME, StoreError, atomic_write, with_retry};
use crate::io::suppress::Suppressor;
use crate::model::board::{Board, ColumnDescriptor};
use crate::util::names::is_hidden_name;

/// Columns created for an empty board folder.
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Loads and saves the board descriptor (`.kanban.json`).
#[derive(Debug, Default)]
pub struct BoardConfigStore {
    suppressor: Suppressor,
    corrupted: bool,
}

impl BoardConfigStore {
    pub fn new(suppressor: Suppressor) -> Self {
        BoardConfigStore {
            suppressor,
            corrupted: false,
        }
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Whether the last load found an unparsable descriptor.
    pub fn was_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Read and clear the corruption flag.
    pub fn take_corruption_flag(&mut self) -> bool {
        std::mem::take(&mut self.corrupted)
    }

    /// Load the descriptor, synthesizing (and saving) a fresh one when it is
    /// missing or corrupt. Never fails; problems are logged.
    pub fn load_or_initialize(&mut self, root: &Path) -> Board {
        let path = Self::config_path(root);
        if path.exists() {
            match with_retry(&path, || fs::read_to_string(&path)) {
                Ok(text) => match serde_json::from_str::<Board>(&text) {
                    Ok(mut board) => {
                        board.root_path = root.to_path_buf();
                        self.prune_missing_columns(&mut board);
                        return board;
                    }
                    Err(e) => {
                        let backup = backup_corrupt_config(&path);
                        self.corrupted = true;
                        tracing::warn!(
                            path = %path.display(),
                            backup = ?backup.as_ref().map(|p| p.display().to_string()),
                            error = %e,
                            "corrupt board config, regenerating"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read board config");
                    return synthesize(root);
                }
            }
        }

        let board = self.initialize(root);
        if let Err(e) = self.save(&board) {
            tracing::warn!(path = %path.display(), error = %e, "could not save new board config");
        }
        board
    }

    /// Write the descriptor atomically. The watcher echo is suppressed.
    pub fn save(&self, board: &Board) -> Result<(), StoreError> {
        let path = Self::config_path(&board.root_path);
        let mut on_disk = board.clone();
        if on_disk.tags.as_ref().is_some_and(|t| t.is_empty()) {
            on_disk.tags = None;
        }
        if on_disk.file_filter.as_ref().is_some_and(|f| f.is_empty()) {
            on_disk.file_filter = None;
        }
        let json = serde_json::to_string_pretty(&on_disk).map_err(|e| StoreError::Serialize {
            path: path.clone(),
            source: e,
        })?;
        self.suppressor.suppress_next(&path);
        with_retry(&path, || atomic_write(&path, json.as_bytes()))?;
        tracing::debug!(path = %path.display(), "saved board config");
        Ok(())
    }

    fn initialize(&self, root: &Path) -> Board {
        let mut board = synthesize(root);
        if board.columns.is_empty() {
            for (order, name) in DEFAULT_COLUMNS.iter().enumerate() {
                let dir = root.join(name);
                self.suppressor.suppress_next(&dir);
                if let Err(e) = fs::create_dir_all(&dir) {
                    tracing::warn!(path = %dir.display(), error = %e, "could not create column folder");
                    continue;
                }
                board
                    .columns
                    .push(ColumnDescriptor::new(*name, *name, order as i32));
            }
        }
        board
    }

    fn prune_missing_columns(&self, board: &mut Board) {
        let before = board.columns.len();
        let root = board.root_path.clone();
        board.columns.retain(|c| {
            let keep = !c.folder_name.is_empty() && root.join(&c.folder_name).is_dir();
            if !keep {
                tracing::info!(folder = %c.folder_name, "dropping column whose folder is gone");
            }
            keep
        });
        for col in &mut board.columns {
            if col.display_name.is_empty() {
                col.display_name = col.folder_name.clone();
            }
        }
        if board.columns.len() != before
            && let Err(e) = self.save(board)
        {
            tracing::warn!(error = %e, "could not save pruned board config");
        }
    }
}

/// A board declaring the existing non-hidden subfolders, alphabetically.
fn synthesize(root: &Path) -> Board {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("Kanban Board");
    let mut board = Board::new(name, root);

    let mut folders: Vec<String> = match fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|n| !is_hidden_name(n))
            .collect(),
        Err(_) => Vec::new(),
    };
    folders.sort();
    board.columns = folders
        .into_iter()
        .enumerate()
        .map(|(i, f)| ColumnDescriptor::new(f.clone(), f, i as i32))
        .collect();
    board
}

/// Copy the corrupt bytes next to the original as `.kanban.json.YYYYMMDD_HHMMSS.bak`.
fn backup_corrupt_config(path: &Path) -> Option<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.file_name()?.to_os_string();
    name.push(format!(".{}.bak", stamp));
    let backup = path.with_file_name(name);
    match fs::copy(path, &backup) {
        Ok(_) => Some(backup),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "could not back up corrupt config");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::FileFilter;
    use crate::model::tags::{TagDefinition, TagsConfig};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> BoardConfigStore {
        BoardConfigStore::new(Suppressor::inactive())
    }

    fn backups(root: &Path) -> Vec<String> {
        fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".kanban.json.") && n.ends_with(".bak"))
            .collect()
    }

    #[test]
    fn test_empty_root_gets_default_columns() {
        let tmp = TempDir::new().unwrap();
        let board = store().load_or_initialize(tmp.path());
        let names: Vec<&str> = board.columns.iter().map(|c| c.folder_name.as_str()).collect();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
        for name in DEFAULT_COLUMNS {
            assert!(tmp.path().join(name).is_dir());
        }
        assert!(tmp.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_existing_folders_declared_alphabetically() {
        let tmp = TempDir::new().unwrap();
        for name in ["To Do", "In Progress", "Done", ".git"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        let board = store().load_or_initialize(tmp.path());
        let cols: Vec<(&str, i32)> = board
            .columns
            .iter()
            .map(|c| (c.folder_name.as_str(), c.sort_order))
            .collect();
        assert_eq!(cols, vec![("Done", 0), ("In Progress", 1), ("To Do", 2)]);
        assert!(board.columns.iter().all(|c| c.item_order.is_empty()));
        let expected_name = tmp.path().file_name().unwrap().to_str().unwrap();
        assert_eq!(board.name, expected_name);
    }

    #[test]
    fn test_corrupt_config_is_backed_up_and_flagged_once() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let mut store = store();
        let board = store.load_or_initialize(tmp.path());
        assert_eq!(board.columns.len(), 3);
        assert!(store.was_corrupted());
        assert!(store.take_corruption_flag());
        assert!(!store.take_corruption_flag());

        let found = backups(tmp.path());
        assert_eq!(found.len(), 1);
        let bytes = fs::read_to_string(tmp.path().join(&found[0])).unwrap();
        assert_eq!(bytes, "{ not json");
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("Backlog")).unwrap();
        let mut board = Board::new("Work", tmp.path());
        let mut col = ColumnDescriptor::new("Backlog", "Backlog items", 0);
        col.item_order = vec!["b.md".into(), "a.md".into()];
        board.columns.push(col);
        board.file_filter = Some(FileFilter {
            include_extensions: vec![".md".into()],
            exclude_extensions: vec![],
        });
        let mut tags = TagsConfig::default();
        tags.definitions.push(TagDefinition {
            name: "bug".into(),
            color: "#E74C3C".into(),
        });
        tags.assignments.insert("Backlog/a.md".into(), vec!["bug".into()]);
        board.tags = Some(tags);

        let mut store = store();
        store.save(&board).unwrap();
        let loaded = store.load_or_initialize(tmp.path());
        assert_eq!(loaded, board);
        assert!(!store.was_corrupted());
    }

    #[test]
    fn test_missing_column_folders_are_pruned() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("Keep")).unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{"name":"b","columns":[{"folderName":"Keep"},{"folderName":"Gone","sortOrder":1}]}"#,
        )
        .unwrap();
        let board = store().load_or_initialize(tmp.path());
        assert_eq!(board.columns.len(), 1);
        assert_eq!(board.columns[0].display_name, "Keep");

        let text = fs::read_to_string(tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(!text.contains("Gone"));
    }

    #[test]
    fn test_empty_tags_and_filter_are_omitted() {
        let tmp = TempDir::new().unwrap();
        let mut board = Board::new("b", tmp.path());
        board.tags = Some(TagsConfig::default());
        board.file_filter = Some(FileFilter::default());
        store().save(&board).unwrap();
        let text = fs::read_to_string(tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        insta::assert_snapshot!(text, @r#"
{
  "name": "b",
  "columns": []
}
"#);
    }

    #[test]
    fn test_save_suppresses_config_path() {
        let tmp = TempDir::new().unwrap();
        let s = Suppressor::new();
        let store = BoardConfigStore::new(s.clone());
        store.save(&Board::new("b", tmp.path())).unwrap();
        assert!(s.is_pending(&tmp.path().join(CONFIG_FILE_NAME)));
    }
}
