use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A logical filesystem change delivered by the watcher. Paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    ItemCreated { path: PathBuf },
    ItemDeleted { path: PathBuf },
    ItemRenamed { from: PathBuf, to: PathBuf },
    ItemContentChanged { path: PathBuf },
    ColumnCreated { path: PathBuf },
    ColumnDeleted { path: PathBuf },
}

impl BoardEvent {
    /// The path the event is about (the destination, for renames).
    pub fn path(&self) -> &Path {
        match self {
            BoardEvent::ItemCreated { path }
            | BoardEvent::ItemDeleted { path }
            | BoardEvent::ItemContentChanged { path }
            | BoardEvent::ColumnCreated { path }
            | BoardEvent::ColumnDeleted { path } => path,
            BoardEvent::ItemRenamed { to, .. } => to,
        }
    }
}

impl fmt::Display for BoardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardEvent::ItemCreated { path } => write!(f, "created {}", path.display()),
            BoardEvent::ItemDeleted { path } => write!(f, "deleted {}", path.display()),
            BoardEvent::ItemRenamed { from, to } => {
                write!(f, "renamed {} -> {}", from.display(), to.display())
            }
            BoardEvent::ItemContentChanged { path } => write!(f, "changed {}", path.display()),
            BoardEvent::ColumnCreated { path } => write!(f, "column created {}", path.display()),
            BoardEvent::ColumnDeleted { path } => write!(f, "column deleted {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let evt = BoardEvent::ItemRenamed {
            from: PathBuf::from("/b/c/a.md"),
            to: PathBuf::from("/b/c/b.md"),
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert_eq!(
            json,
            r#"{"type":"item_renamed","from":"/b/c/a.md","to":"/b/c/b.md"}"#
        );
        assert_eq!(evt.path(), Path::new("/b/c/b.md"));
    }
}
