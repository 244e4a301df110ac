//! Shader source watcher
//!
//! We watch the **directory** (not the file) because save-on-write in many editors is
//! write temp → rename/replace → delete old. Directory watching is the most reliable
//! cross-platform approach; events are filtered down to our file name.
//!
//! The notify callback only sends a timestamp over a channel. Reading the file and
//! compiling stay on the render thread, which calls [`SourceWatcher::poll`] once per
//! frame. When notify cannot be set up we fall back to comparing mtime + length.
//!
//! Debounce is trailing-edge: a burst of writes produces one event once the file
//! has been quiet for the debounce window, carrying the final content.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;

use crate::error::PreviewError;
use crate::source::ShaderSource;
use crate::{logi, logw};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Notify,
    Poll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// File changed and was read successfully.
    Changed(ShaderSource),
    /// File is gone or unreadable. Reported once per outage.
    SourceUnavailable { path: PathBuf, error: String },
}

/// Collapses a burst of change notifications into one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_change: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last_change: None }
    }

    pub fn note(&mut self, at: Instant) {
        self.last_change = Some(self.last_change.map_or(at, |prev| prev.max(at)));
    }

    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }

    /// Drop a pending change without firing.
    pub fn clear(&mut self) {
        self.last_change = None;
    }

    /// True once, when the last change is at least `window` old.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_change {
            Some(t) if now.saturating_duration_since(t) >= self.window => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
    exists: bool,
}

impl Stamp {
    fn read(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(m) => Self { modified: m.modified().ok(), len: m.len(), exists: true },
            Err(_) => Self { modified: None, len: 0, exists: false },
        }
    }
}

enum Feed {
    Notify {
        _watcher: RecommendedWatcher,
        rx: Receiver<Instant>,
    },
    Poll {
        last_seen: Stamp,
        interval: Duration,
        next_check: Option<Instant>,
    },
}

pub struct SourceWatcher {
    path: PathBuf,
    feed: Feed,
    debounce: Debouncer,
    forced: bool,
    unavailable: bool,
}

impl SourceWatcher {
    /// Create a watcher in the requested mode; notify failures fall back to polling.
    pub fn new(path: &Path, mode: WatchMode, debounce: Duration, poll_interval: Duration) -> Self {
        match mode {
            WatchMode::Poll => Self::polling(path, debounce, poll_interval),
            WatchMode::Notify => match Self::with_notify(path, debounce, poll_interval) {
                Ok(w) => w,
                Err(e) => {
                    logw!("WATCH", "notify unavailable ({e}); polling {} instead", path.display());
                    Self::polling(path, debounce, poll_interval)
                }
            },
        }
    }

    pub fn polling(path: &Path, debounce: Duration, interval: Duration) -> Self {
        let feed = Feed::Poll { last_seen: Stamp::read(path), interval, next_check: None };
        Self::with_feed(path, feed, debounce)
    }

    pub fn with_notify(path: &Path, debounce: Duration, poll_interval: Duration) -> Result<Self, PreviewError> {
        let (tx, rx) = unbounded::<Instant>();
        let wanted = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(ev) => {
                    // Editors often emit several events per save (modify/create/remove/rename).
                    let kind_ok = matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_));
                    let hit = ev.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == wanted);
                    if kind_ok && hit {
                        let _ = tx.send(Instant::now());
                    }
                }
                Err(e) => logw!("WATCH", "notify error: {e}"),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&parent_dir(path), RecursiveMode::NonRecursive)?;

        let feed = Feed::Notify { _watcher: watcher, rx };
        Ok(Self::with_feed(path, feed, debounce))
    }

    fn with_feed(path: &Path, feed: Feed, debounce: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            feed,
            debounce: Debouncer::new(debounce),
            forced: false,
            unavailable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WatchMode {
        match self.feed {
            Feed::Notify { .. } => WatchMode::Notify,
            Feed::Poll { .. } => WatchMode::Poll,
        }
    }

    /// Re-read the file on the next poll regardless of change state.
    pub fn request_reload(&mut self) {
        self.forced = true;
    }

    /// Non-blocking. Returns at most one event per (debounced) modification.
    pub fn poll(&mut self, now: Instant) -> Option<WatchEvent> {
        self.collect(now);

        let settled = self.debounce.ready(now);
        if !(settled || self.forced) {
            return None;
        }
        self.forced = false;
        // whatever was pending is covered by this read
        self.debounce.clear();
        self.resync();

        match ShaderSource::load(&self.path) {
            Ok(src) => {
                if self.unavailable {
                    logi!("WATCH", "{} is readable again", self.path.display());
                }
                self.unavailable = false;
                logi!("WATCH", "change detected: {}", self.path.display());
                Some(WatchEvent::Changed(src))
            }
            Err(e) => {
                if self.unavailable {
                    return None;
                }
                self.unavailable = true;
                let error = match e {
                    PreviewError::SourceUnavailable { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                logw!("WATCH", "{} unavailable: {error}", self.path.display());
                Some(WatchEvent::SourceUnavailable { path: self.path.clone(), error })
            }
        }
    }

    /// Take the current stamp as seen, so the content about to be read is not
    /// reported again by a later metadata check.
    fn resync(&mut self) {
        if let Feed::Poll { last_seen, .. } = &mut self.feed {
            *last_seen = Stamp::read(&self.path);
        }
    }

    fn collect(&mut self, now: Instant) {
        match &mut self.feed {
            Feed::Notify { rx, .. } => {
                for at in rx.try_iter() {
                    self.debounce.note(at);
                }
            }
            Feed::Poll { last_seen, interval, next_check } => {
                if next_check.is_some_and(|t| now < t) {
                    return;
                }
                *next_check = Some(now + *interval);
                let stamp = Stamp::read(&self.path);
                if stamp != *last_seen {
                    *last_seen = stamp;
                    self.debounce.note(now);
                }
            }
        }
    }
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
