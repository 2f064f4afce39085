use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::item_io::CONFIG_FILE_NAME;
use crate::io::settings::WatcherSettings;
use crate::io::suppress::Suppressor;
use crate::model::event::BoardEvent;
use crate::util::names::is_hidden_name;

/// Longest the pump sleeps when nothing is pending.
const IDLE_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("cannot watch {path}: {source}")]
    InvalidRoot { path: PathBuf, source: io::Error },
    #[error("could not start watching {path}: {source}")]
    Start {
        path: PathBuf,
        source: notify::Error,
    },
    #[error("could not spawn watcher thread: {0}")]
    Thread(io::Error),
}

/// Watches a board root recursively and delivers debounced, de-duplicated
/// [`BoardEvent`]s on a single queue.
pub struct PathWatcher {
    watcher: Option<RecommendedWatcher>,
    pump: Option<JoinHandle<()>>,
    rx: Receiver<BoardEvent>,
    suppressor: Suppressor,
    root: PathBuf,
}

impl PathWatcher {
    /// Start watching `root`. Events for paths registered with `suppressor`
    /// are swallowed once.
    pub fn start(root: &Path, settings: &WatcherSettings, suppressor: Suppressor) -> Result<Self, WatchError> {
        let canonical = root.canonicalize().map_err(|e| WatchError::InvalidRoot {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !canonical.is_dir() {
            return Err(WatchError::InvalidRoot {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(raw_tx, Config::default()).map_err(|e| WatchError::Start {
            path: canonical.clone(),
            source: e,
        })?;
        watcher
            .watch(&canonical, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Start {
                path: canonical.clone(),
                source: e,
            })?;

        let (tx, rx) = mpsc::channel();
        let router = EventRouter::new(canonical.clone(), suppressor.clone());
        let settings = settings.clone();
        let pump = thread::Builder::new()
            .name("kb-watch".to_string())
            .spawn(move || pump_events(raw_rx, tx, router, settings))
            .map_err(WatchError::Thread)?;

        tracing::info!(root = %canonical.display(), "watching board");
        Ok(PathWatcher {
            watcher: Some(watcher),
            pump: Some(pump),
            rx,
            suppressor,
            root: canonical,
        })
    }

    /// Canonical root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suppressor(&self) -> &Suppressor {
        &self.suppressor
    }

    pub fn suppress_next(&self, path: &Path) {
        self.suppressor.suppress_next(path);
    }

    /// Non-blocking poll for pending events.
    pub fn poll(&self) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BoardEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop watching. Pending debounced events are discarded.
    pub fn stop(&mut self) {
        // Dropping the OS watcher closes the raw channel, which ends the pump.
        if self.watcher.take().is_some() {
            tracing::info!(root = %self.root.display(), "stopped watching board");
        }
        if let Some(handle) = self.pump.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump_events(
    raw_rx: Receiver<notify::Result<Event>>,
    tx: Sender<BoardEvent>,
    mut router: EventRouter,
    settings: WatcherSettings,
) {
    let mut debouncer = Debouncer::new(settings.debounce());
    let window = settings.rename_window();

    loop {
        let now = Instant::now();
        let wake = [debouncer.next_deadline(), router.next_rename_deadline(window)]
            .into_iter()
            .flatten()
            .min();
        let timeout = wake
            .map(|w| w.saturating_duration_since(now).min(IDLE_TICK))
            .unwrap_or(IDLE_TICK);

        let mut routed = Vec::new();
        match raw_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => routed.extend(router.route(event, Instant::now())),
            Ok(Err(e)) => tracing::warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        let now = Instant::now();
        routed.extend(router.flush_unpaired(now, window));

        for r in routed {
            match r {
                Routed::Dispatch(evt) => {
                    tracing::debug!(event = %evt, "dispatch");
                    if tx.send(evt).is_err() {
                        return;
                    }
                }
                Routed::Debounce(path, kind) => debouncer.schedule(path, kind, now),
                Routed::Cancel(path) => debouncer.cancel(&path),
            }
        }

        for (path, kind) in debouncer.due(now) {
            deliver_when_available(path, kind, &tx, &settings);
        }
    }
}

/// Send a debounced event once its file can be opened. The first attempt runs
/// inline; retries move to a short-lived thread so the pump keeps going.
fn deliver_when_available(path: PathBuf, kind: PendingKind, tx: &Sender<BoardEvent>, settings: &WatcherSettings) {
    let event = kind.into_event(path.clone());
    match try_open(&path) {
        Availability::Ready => {
            let _ = tx.send(event);
        }
        Availability::Gone => tracing::debug!(path = %path.display(), "file gone before dispatch"),
        Availability::Denied => tracing::debug!(path = %path.display(), "file not readable, dropping event"),
        Availability::Busy => {
            let tx = tx.clone();
            let retries = settings.availability_retries.saturating_sub(1);
            let delay = settings.retry_delay();
            thread::spawn(move || match retry_until_settled(retries, delay, || try_open(&path)) {
                Availability::Ready => {
                    let _ = tx.send(event);
                }
                Availability::Busy => tracing::debug!(path = %path.display(), "file stayed locked, dropping event"),
                _ => {}
            });
        }
    }
}

/// Re-check a busy file up to `retries` times, `delay` apart. Stops at the
/// first answer other than `Busy`; `Busy` means the retries ran out.
fn retry_until_settled(retries: u32, delay: Duration, mut check: impl FnMut() -> Availability) -> Availability {
    for _ in 0..retries {
        thread::sleep(delay);
        match check() {
            Availability::Busy => {}
            settled => return settled,
        }
    }
    Availability::Busy
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Ready,
    Busy,
    Gone,
    /// Permission denied. Never retried.
    Denied,
}

fn try_open(path: &Path) -> Availability {
    if path.is_dir() {
        return Availability::Gone;
    }
    match File::open(path) {
        Ok(_) => Availability::Ready,
        Err(e) => open_error_availability(e.kind()),
    }
}

fn open_error_availability(kind: io::ErrorKind) -> Availability {
    match kind {
        io::ErrorKind::NotFound => Availability::Gone,
        io::ErrorKind::PermissionDenied => Availability::Denied,
        _ => Availability::Busy,
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// The debounced kinds. A create that coalesces with a change stays a create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Created,
    ContentChanged,
}

impl PendingKind {
    fn into_event(self, path: PathBuf) -> BoardEvent {
        match self {
            PendingKind::Created => BoardEvent::ItemCreated { path },
            PendingKind::ContentChanged => BoardEvent::ItemContentChanged { path },
        }
    }
}

/// What the pump should do with one logical change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Dispatch(BoardEvent),
    Debounce(PathBuf, PendingKind),
    Cancel(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    /// A folder directly under the root.
    Column,
    /// The board descriptor at the root.
    Config,
    /// A file directly inside a column folder.
    Card,
    Ignored,
}

impl Place {
    fn is_item(self) -> bool {
        matches!(self, Place::Config | Place::Card)
    }
}

/// Turns raw notify events into [`Routed`] actions. Holds no OS resources,
/// so it can be driven directly in tests.
pub struct EventRouter {
    root: PathBuf,
    suppressor: Suppressor,
    rename_from: HashMap<Option<usize>, (PathBuf, Instant)>,
    paired: HashSet<usize>,
}

impl EventRouter {
    pub fn new(root: PathBuf, suppressor: Suppressor) -> Self {
        EventRouter {
            root,
            suppressor,
            rename_from: HashMap::new(),
            paired: HashSet::new(),
        }
    }

    pub fn route(&mut self, event: Event, now: Instant) -> Vec<Routed> {
        let tracker = event.tracker();
        match event.kind {
            EventKind::Create(kind) => {
                let folder = matches!(kind, notify::event::CreateKind::Folder);
                event
                    .paths
                    .into_iter()
                    .flat_map(|p| {
                        let is_dir = folder || p.is_dir();
                        self.on_create(p, is_dir)
                    })
                    .collect()
            }
            EventKind::Modify(ModifyKind::Name(mode)) => self.on_rename(mode, tracker, event.paths, now),
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .into_iter()
                .flat_map(|p| self.on_modify(p))
                .collect(),
            EventKind::Remove(kind) => event
                .paths
                .into_iter()
                .flat_map(|p| self.on_remove(p, kind))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Earliest moment an unpaired rename half expires.
    pub fn next_rename_deadline(&self, window: Duration) -> Option<Instant> {
        self.rename_from.values().map(|(_, at)| *at + window).min()
    }

    /// Rename halves whose partner never arrived become deletes.
    pub fn flush_unpaired(&mut self, now: Instant, window: Duration) -> Vec<Routed> {
        let expired: Vec<Option<usize>> = self
            .rename_from
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= window)
            .map(|(k, _)| *k)
            .collect();
        let mut out = Vec::new();
        for key in expired {
            if let Some((from, _)) = self.rename_from.remove(&key) {
                out.extend(self.renamed_away(from));
            }
        }
        out
    }

    fn place(&self, path: &Path, is_dir: Option<bool>) -> Place {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return Place::Ignored;
        };
        let depth = rel.components().count();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match depth {
            1 if name == CONFIG_FILE_NAME => Place::Config,
            1 => match is_dir {
                Some(false) => Place::Ignored,
                _ if is_hidden_name(name) => Place::Ignored,
                _ => Place::Column,
            },
            2 => match is_dir {
                Some(true) => Place::Ignored,
                _ => Place::Card,
            },
            _ => Place::Ignored,
        }
    }

    /// Card events for dot-files are noise from temp files; renames still see them.
    fn is_noise(&self, path: &Path, place: Place) -> bool {
        place == Place::Card
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_hidden_name)
    }

    fn on_create(&mut self, path: PathBuf, is_dir: bool) -> Vec<Routed> {
        if self.suppressor.consume(&path) {
            return Vec::new();
        }
        match self.place(&path, Some(is_dir)) {
            Place::Column => vec![Routed::Dispatch(BoardEvent::ColumnCreated { path })],
            p if p.is_item() && !self.is_noise(&path, p) => {
                vec![Routed::Debounce(path, PendingKind::Created)]
            }
            _ => Vec::new(),
        }
    }

    fn on_modify(&mut self, path: PathBuf) -> Vec<Routed> {
        if self.suppressor.consume(&path) {
            return Vec::new();
        }
        if path.is_dir() {
            return Vec::new();
        }
        match self.place(&path, Some(false)) {
            p if p.is_item() && !self.is_noise(&path, p) => {
                vec![Routed::Debounce(path, PendingKind::ContentChanged)]
            }
            _ => Vec::new(),
        }
    }

    fn on_remove(&mut self, path: PathBuf, kind: RemoveKind) -> Vec<Routed> {
        let cancel = Routed::Cancel(path.clone());
        if self.suppressor.consume(&path) {
            return vec![cancel];
        }
        let is_dir = match kind {
            RemoveKind::File => Some(false),
            RemoveKind::Folder => Some(true),
            _ => None,
        };
        match self.place(&path, is_dir) {
            Place::Column => vec![cancel, Routed::Dispatch(BoardEvent::ColumnDeleted { path })],
            p if p.is_item() && !self.is_noise(&path, p) => {
                vec![cancel, Routed::Dispatch(BoardEvent::ItemDeleted { path })]
            }
            _ => vec![cancel],
        }
    }

    fn on_rename(&mut self, mode: RenameMode, tracker: Option<usize>, paths: Vec<PathBuf>, now: Instant) -> Vec<Routed> {
        let mut paths = paths.into_iter();
        match mode {
            RenameMode::From => {
                let Some(from) = paths.next() else {
                    return Vec::new();
                };
                // A second "from" under the same key means the first never paired.
                let mut out = Vec::new();
                if let Some((stale, _)) = self.rename_from.remove(&tracker) {
                    out.extend(self.renamed_away(stale));
                }
                out.push(Routed::Cancel(from.clone()));
                self.rename_from.insert(tracker, (from, now));
                out
            }
            RenameMode::To => {
                let Some(to) = paths.next() else {
                    return Vec::new();
                };
                match self.rename_from.remove(&tracker) {
                    Some((from, _)) => {
                        if let Some(t) = tracker {
                            self.paired.insert(t);
                        }
                        self.renamed(from, to)
                    }
                    None => self.renamed_in(to),
                }
            }
            RenameMode::Both => {
                if let Some(t) = tracker
                    && self.paired.remove(&t)
                {
                    return Vec::new();
                }
                let (Some(from), Some(to)) = (paths.next(), paths.next()) else {
                    return Vec::new();
                };
                self.rename_from.remove(&tracker);
                self.renamed(from, to)
            }
            _ => paths
                .flat_map(|p| {
                    if p.exists() {
                        self.renamed_in(p)
                    } else {
                        self.renamed_away(p)
                    }
                })
                .collect(),
        }
    }

    fn renamed(&mut self, from: PathBuf, to: PathBuf) -> Vec<Routed> {
        let from_hit = self.suppressor.consume(&from);
        let to_hit = self.suppressor.consume(&to);
        let mut out = vec![Routed::Cancel(from.clone())];
        if from_hit || to_hit {
            return out;
        }

        let to_is_dir = to.is_dir();
        let from_place = self.place(&from, Some(to_is_dir));
        let to_place = self.place(&to, Some(to_is_dir));
        match (from_place, to_place) {
            (Place::Column, Place::Column) => {
                out.push(Routed::Dispatch(BoardEvent::ColumnDeleted { path: from }));
                out.push(Routed::Dispatch(BoardEvent::ColumnCreated { path: to }));
            }
            (f, t) if f.is_item() && t.is_item() => {
                out.push(Routed::Dispatch(BoardEvent::ItemRenamed { from, to }));
            }
            (f, t) => {
                match f {
                    Place::Column => out.push(Routed::Dispatch(BoardEvent::ColumnDeleted { path: from })),
                    f if f.is_item() => out.push(Routed::Dispatch(BoardEvent::ItemDeleted { path: from })),
                    _ => {}
                }
                match t {
                    Place::Column => out.push(Routed::Dispatch(BoardEvent::ColumnCreated { path: to })),
                    t if t.is_item() => out.push(Routed::Debounce(to, PendingKind::Created)),
                    _ => {}
                }
            }
        }
        out
    }

    fn renamed_in(&mut self, to: PathBuf) -> Vec<Routed> {
        if self.suppressor.consume(&to) {
            return Vec::new();
        }
        match self.place(&to, Some(to.is_dir())) {
            Place::Column => vec![Routed::Dispatch(BoardEvent::ColumnCreated { path: to })],
            p if p.is_item() => vec![Routed::Debounce(to, PendingKind::Created)],
            _ => Vec::new(),
        }
    }

    fn renamed_away(&mut self, from: PathBuf) -> Vec<Routed> {
        let cancel = Routed::Cancel(from.clone());
        if self.suppressor.consume(&from) {
            return vec![cancel];
        }
        match self.place(&from, None) {
            Place::Column => vec![cancel, Routed::Dispatch(BoardEvent::ColumnDeleted { path: from })],
            p if p.is_item() => vec![cancel, Routed::Dispatch(BoardEvent::ItemDeleted { path: from })],
            _ => vec![cancel],
        }
    }
}

// ---------------------------------------------------------------------------
// Debouncing
// ---------------------------------------------------------------------------

/// Per-path quiet-period timers.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, (PendingKind, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            pending: HashMap::new(),
        }
    }

    /// (Re)start the timer for `path`.
    pub fn schedule(&mut self, path: PathBuf, kind: PendingKind, now: Instant) {
        let deadline = now + self.window;
        let kind = match self.pending.get(&path) {
            Some((PendingKind::Created, _)) => PendingKind::Created,
            _ => kind,
        };
        self.pending.insert(path, (kind, deadline));
    }

    pub fn cancel(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, at)| *at).min()
    }

    /// Remove and return every entry whose quiet period is over, oldest first.
    pub fn due(&mut self, now: Instant) -> Vec<(PathBuf, PendingKind)> {
        let mut ready: Vec<(PathBuf, PendingKind, Instant)> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| *at <= now)
            .map(|(p, (k, at))| (p.clone(), *k, *at))
            .collect();
        ready.sort_by_key(|(_, _, at)| *at);
        for (p, _, _) in &ready {
            self.pending.remove(p);
        }
        ready.into_iter().map(|(p, k, _)| (p, k)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
