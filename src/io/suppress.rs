use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::util::paths::normalize_for_match;

/// One-shot suppression of watcher events the process caused itself.
///
/// Writers call [`Suppressor::suppress_next`] right before touching a path;
/// the watcher calls [`Suppressor::consume`] for every raw event and drops the
/// event on a hit. Clones share the same set.
#[derive(Clone, Debug, Default)]
pub struct Suppressor {
    inner: Option<Arc<Mutex<HashSet<PathBuf>>>>,
}

impl Suppressor {
    pub fn new() -> Self {
        Suppressor {
            inner: Some(Arc::new(Mutex::new(HashSet::new()))),
        }
    }

    /// A suppressor that records nothing. Used when no watcher is running.
    pub fn inactive() -> Self {
        Suppressor { inner: None }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Drop the next event for `path`. Registering twice is the same as once.
    pub fn suppress_next(&self, path: &Path) {
        if let Some(mut set) = self.lock() {
            set.insert(normalize_for_match(path));
        }
    }

    /// Returns true, and clears the entry, if `path` was suppressed.
    pub fn consume(&self, path: &Path) -> bool {
        match self.lock() {
            Some(mut set) => set.remove(&normalize_for_match(path)),
            None => false,
        }
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        match self.lock() {
            Some(set) => set.contains(&normalize_for_match(path)),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Option<MutexGuard<'_, HashSet<PathBuf>>> {
        self.inner
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
