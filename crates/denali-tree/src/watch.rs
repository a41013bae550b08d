//! Source change detection for watch mode.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::TreeError;

/// Reports which watched directories changed since the previous call.
pub trait ChangeDetector {
    /// Directories whose contents changed since the last call, sorted.
    ///
    /// # Errors
    /// Returns an error if the underlying watcher failed.
    fn detect_changes(&mut self) -> Result<Vec<PathBuf>, TreeError>;
}

#[derive(Debug)]
struct WatchedDir {
    dir: PathBuf,
    /// Event paths are reported resolved on some platforms.
    canonical: PathBuf,
}

/// Collects filesystem events for a set of directories from the platform's
/// native watcher.
pub struct NotifyDetector {
    dirs: Vec<WatchedDir>,
    events: Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl NotifyDetector {
    /// Start watching `dirs` recursively. Directories that do not exist are
    /// skipped.
    ///
    /// # Errors
    /// Returns an error if the native watcher cannot be created or a
    /// directory cannot be watched.
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Result<Self, TreeError> {
        let (tx, events) = channel();
        let mut watcher = notify::recommended_watcher(tx).map_err(watch_error)?;

        let mut watched = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                tracing::debug!(dir = %dir.display(), "not watching missing directory");
                continue;
            }
            watcher.watch(&dir, RecursiveMode::Recursive).map_err(watch_error)?;
            let canonical = dir.canonicalize().map_err(|source| TreeError::io(&dir, source))?;
            watched.push(WatchedDir { dir, canonical });
        }
        tracing::debug!(dirs = watched.len(), "watching sources");

        Ok(Self {
            dirs: watched,
            events,
            _watcher: watcher,
        })
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(|w| w.dir.as_path())
    }

    /// The innermost watched directory containing `path`.
    fn owning_dir(&self, path: &Path) -> Option<&Path> {
        self.dirs
            .iter()
            .filter_map(|w| {
                if path.starts_with(&w.dir) {
                    Some((w.dir.components().count(), w))
                } else if path.starts_with(&w.canonical) {
                    Some((w.canonical.components().count(), w))
                } else {
                    None
                }
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, w)| w.dir.as_path())
    }
}

impl ChangeDetector for NotifyDetector {
    fn detect_changes(&mut self) -> Result<Vec<PathBuf>, TreeError> {
        let mut changed = BTreeSet::new();
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    for path in event.paths {
                        tracing::trace!(path = %path.display(), "source changed");
                        let dir = match self.owning_dir(&path) {
                            Some(dir) => dir.to_path_buf(),
                            None => path,
                        };
                        changed.insert(dir);
                    }
                }
                Ok(Err(e)) => return Err(watch_error(e)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(TreeError::Watch {
                        message: "the file watcher stopped".to_owned(),
                    })
                }
            }
        }
        Ok(changed.into_iter().collect())
    }
}

impl std::fmt::Debug for NotifyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyDetector")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

fn watch_error(e: notify::Error) -> TreeError {
    TreeError::Watch {
        message: e.to_string(),
    }
}
