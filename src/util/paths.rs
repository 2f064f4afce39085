use std::path::{Component, Path, PathBuf};

/// Key under which a path is suppressed and matched.
///
/// The path is made absolute, its parent directory is canonicalized when it
/// exists (so symlinked roots match the paths the OS reports), and the whole
/// string is lowercased.
pub fn normalize_for_match(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let absolute = lexically_clean(&absolute);

    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(canonical) => canonical.join(name),
            Err(_) => absolute.clone(),
        },
        _ => absolute.clone(),
    };
    PathBuf::from(resolved.to_string_lossy().to_lowercase())
}

/// Drop `.` components and fold `..` without touching the filesystem.
fn lexically_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Components of `path` below `root`, as strings. Tries each root in turn,
/// so callers can pass both the root as given and its canonical form.
pub fn relative_components(roots: &[&Path], path: &Path) -> Option<Vec<String>> {
    for root in roots {
        if let Ok(rest) = path.strip_prefix(root) {
            return Some(
                rest.components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect(),
            );
        }
    }
    None
}

/// Per-user config directory, respecting XDG_CONFIG_HOME.
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("kanban-files")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}
