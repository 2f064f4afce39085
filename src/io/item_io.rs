use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::io::suppress::Suppressor;
use crate::model::board::{FileFilter, extension_of};
use crate::model::item::{Item, title_of};
use crate::util::names::{is_hidden_name, numbered_file_name, sanitize_name};

/// Board descriptor file at the root of a board folder.
pub const CONFIG_FILE_NAME: &str = ".kanban.json";
/// Pre-sidecar aggregate group file inside a column folder.
pub const LEGACY_GROUPS_FILE_NAME: &str = "groups.json";

const EXCLUDED_EXTENSIONS: &[&str] = &["json", "kanban"];

const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "text", "log", "csv", "tsv", "xml", "yaml", "yml", "toml", "ini",
    "cfg", "conf", "properties", "html", "htm", "css", "scss", "less", "sass", "js", "ts", "jsx",
    "tsx", "mjs", "cjs", "cs", "vb", "fs", "fsx", "py", "rb", "lua", "pl", "pm", "r", "java", "kt",
    "kts", "groovy", "scala", "c", "cpp", "h", "hpp", "cc", "cxx", "go", "rs", "swift", "dart",
    "sh", "bash", "zsh", "bat", "cmd", "ps1", "psm1", "sql", "graphql", "env", "gitignore",
    "gitattributes", "editorconfig", "vue", "svelte", "astro", "rst", "adoc", "tex", "tf", "hcl",
    "cmake", "makefile", "sln", "csproj", "vbproj", "fsproj", "props", "targets",
];

const RETRY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Error type for file and sidecar I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },
    #[error("not found: {path}")]
    NotFound { path: PathBuf },
    #[error("{path} is locked by another process")]
    Locked { path: PathBuf },
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Classify an I/O error against the path it happened on.
    pub fn io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied { path },
            io::ErrorKind::NotFound => StoreError::NotFound { path },
            k if is_transient(k) => StoreError::Locked { path },
            _ => StoreError::Io { path, source: err },
        }
    }
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::ResourceBusy)
}

/// Run `op`, retrying transient lock contention a few times before giving up.
pub fn with_retry<T>(path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Result<T, StoreError> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(e.kind()) && attempt < RETRY_ATTEMPTS => {
                tracing::debug!(path = %path.display(), attempt, "file busy, retrying");
                attempt += 1;
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }
}

/// Write `content` to `path` atomically: temp file in the same directory, then rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Names that are never cards: hidden files, config and group sidecars.
pub fn is_excluded_name(file_name: &str) -> bool {
    if is_hidden_name(file_name) || file_name.eq_ignore_ascii_case(LEGACY_GROUPS_FILE_NAME) {
        return true;
    }
    let ext = extension_of(file_name);
    EXCLUDED_EXTENSIONS.contains(&ext.as_str())
}

pub fn is_text_file(file_name: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension_of(file_name).as_str())
}

/// First two non-empty, non-heading lines, joined by a space.
pub fn content_preview(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary shown instead of content for binary files, e.g. `PNG file · 1.2 KB`.
pub fn file_type_preview(file_name: &str, size: Option<u64>) -> String {
    let ext = match extension_of(file_name) {
        e if e.is_empty() => "UNKNOWN".to_string(),
        e => e.to_uppercase(),
    };
    match size {
        Some(size) => format!("{} file \u{b7} {}", ext, format_size(size)),
        None => format!("{} file", ext),
    }
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const HIDDEN: u32 = 0x2;
    const SYSTEM: u32 = 0x4;
    fs::metadata(path)
        .map(|m| m.file_attributes() & (HIDDEN | SYSTEM) != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

/// Whether a file in a column folder shows up as a card.
pub fn is_card_file(path: &Path, filter: Option<&FileFilter>) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if is_excluded_name(name) || has_hidden_attribute(path) {
        return false;
    }
    filter.is_none_or(|f| f.allows(name))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Card file names in a column folder, ascending by name.
pub fn list_item_files(dir: &Path, filter: Option<&FileFilter>) -> Result<Vec<String>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let path = entry.path();
        if !is_card_file(&path, filter) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Read one card from disk.
pub fn read_item(column: &str, path: &Path) -> Result<Item, StoreError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StoreError::NotFound {
            path: path.to_path_buf(),
        })?
        .to_string();
    let meta = with_retry(path, || fs::metadata(path))?;
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let is_text = is_text_file(&file_name);
    let (content, preview) = if is_text {
        let bytes = with_retry(path, || fs::read(path))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let preview = content_preview(&content);
        (content, preview)
    } else {
        (String::new(), file_type_preview(&file_name, Some(meta.len())))
    };

    Ok(Item {
        column: column.to_string(),
        title: title_of(&file_name),
        file_name,
        path: path.to_path_buf(),
        preview,
        content,
        modified,
        is_text,
        group: None,
    })
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// A free name for `file_name` in `dir`, suffixing `-n` before the extension on collision.
pub fn unique_destination(dir: &Path, file_name: &str) -> (String, PathBuf) {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return (file_name.to_string(), candidate);
    }
    let p = Path::new(file_name);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
    let ext = p.extension().and_then(|e| e.to_str());
    let mut n = 1;
    loop {
        let name = numbered_file_name(stem, ext, n);
        let path = dir.join(&name);
        if !path.exists() {
            return (name, path);
        }
        n += 1;
    }
}

/// Create a markdown card titled `title`. Returns the new file's path.
pub fn create_item_file(dir: &Path, title: &str, suppressor: &Suppressor) -> Result<PathBuf, StoreError> {
    if !dir.is_dir() {
        return Err(StoreError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let base = format!("{}.md", sanitize_name(title, "untitled"));
    let (_, path) = unique_destination(dir, &base);
    let content = format!("# {}\n\n", title);
    suppressor.suppress_next(&path);
    with_retry(&path, || atomic_write(&path, content.as_bytes()))?;
    Ok(path)
}

pub fn delete_item_file(path: &Path, suppressor: &Suppressor) -> Result<(), StoreError> {
    if !path.exists() {
        return Ok(());
    }
    suppressor.suppress_next(path);
    with_retry(path, || fs::remove_file(path))
}

pub fn write_item_content(path: &Path, content: &str, suppressor: &Suppressor) -> Result<(), StoreError> {
    suppressor.suppress_next(path);
    with_retry(path, || atomic_write(path, content.as_bytes()))
}

/// Move a file into `target_dir`, keeping its name unless taken. Returns the new path.
pub fn move_file(src: &Path, target_dir: &Path, suppressor: &Suppressor) -> Result<PathBuf, StoreError> {
    if !src.is_file() {
        return Err(StoreError::NotFound {
            path: src.to_path_buf(),
        });
    }
    if !target_dir.is_dir() {
        return Err(StoreError::NotFound {
            path: target_dir.to_path_buf(),
        });
    }
    let file_name = src
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let (_, dest) = unique_destination(target_dir, &file_name);
    suppressor.suppress_next(src);
    suppressor.suppress_next(&dest);
    with_retry(src, || fs::rename(src, &dest))?;
    Ok(dest)
}

/// Rename a card to `new_title`, keeping its extension.
///
/// Markdown files whose first line is a `# ` heading get the heading rewritten.
/// Returns the new path, which equals the old one when nothing moved.
pub fn rename_item_file(path: &Path, new_title: &str, suppressor: &Suppressor) -> Result<PathBuf, StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let ext = Path::new(file_name).extension().and_then(|e| e.to_str());
    let stem = sanitize_name(new_title, "untitled");
    let wanted = match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.clone(),
    };

    let mut new_path = dir.join(&wanted);
    let mut n = 1;
    while new_path.exists() && new_path != path {
        new_path = dir.join(numbered_file_name(&stem, ext, n));
        n += 1;
    }

    let rewritten = if extension_of(file_name) == "md" {
        let content = with_retry(path, || fs::read_to_string(path))?;
        rewrite_heading(&content, new_title)
    } else {
        None
    };

    match rewritten {
        Some(content) => {
            suppressor.suppress_next(&new_path);
            with_retry(&new_path, || atomic_write(&new_path, content.as_bytes()))?;
            if new_path != path {
                suppressor.suppress_next(path);
                with_retry(path, || fs::remove_file(path))?;
            }
        }
        None if new_path != path => {
            suppressor.suppress_next(path);
            suppressor.suppress_next(&new_path);
            with_retry(path, || fs::rename(path, &new_path))?;
        }
        None => {}
    }
    Ok(new_path)
}

/// Replace a leading `# ` heading line. `None` if the content has none.
fn rewrite_heading(content: &str, title: &str) -> Option<String> {
    if !content.starts_with("# ") {
        return None;
    }
    let rest = match content.find('\n') {
        Some(idx) => &content[idx..],
        None => "",
    };
    Some(format!("# {}{}", title, rest))
}

pub fn create_column_folder(root: &Path, folder_name: &str, suppressor: &Suppressor) -> Result<PathBuf, StoreError> {
    let path = root.join(folder_name);
    suppressor.suppress_next(&path);
    fs::create_dir(&path).map_err(|e| StoreError::io(&path, e))?;
    Ok(path)
}

pub fn rename_column_folder(from: &Path, to: &Path, suppressor: &Suppressor) -> Result<(), StoreError> {
    suppressor.suppress_next(from);
    suppressor.suppress_next(to);
    with_retry(from, || fs::rename(from, to))
}

pub fn delete_column_folder(path: &Path, suppressor: &Suppressor) -> Result<(), StoreError> {
    if !path.exists() {
        return Ok(());
    }
    suppressor.suppress_next(path);
    with_retry(path, || fs::remove_dir_all(path))
}
