//! Change detection that holds rebuilds until a caller-supplied
//! precondition is met.
//!
//! When sources change, the watcher first runs a `before_rebuild` callback
//! (for example, stopping a test process that is reading the current build
//! output). It reports changes only once that callback has resolved and a
//! further change arrives; the change that triggered the wait is not itself
//! reported.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};

use denali_tree::{ChangeDetector, TreeError};

/// Outcome of a `before_rebuild` callback.
#[derive(Debug)]
pub enum Prebuild {
    /// The rebuild may proceed immediately.
    Ready,
    /// The rebuild may proceed once the sender sends or is dropped.
    Deferred(Receiver<()>),
}

#[derive(Debug)]
enum State {
    Idle,
    PrebuildPending(Receiver<()>),
    Ready,
}

/// Wraps a [`ChangeDetector`], gating rebuilds on a prebuild callback.
pub struct PausingWatcher<D> {
    detector: D,
    state: State,
    before_rebuild: Box<dyn FnMut() -> Prebuild>,
}

impl<D: ChangeDetector> PausingWatcher<D> {
    pub fn new(detector: D, before_rebuild: impl FnMut() -> Prebuild + 'static) -> Self {
        Self {
            detector,
            state: State::Idle,
            before_rebuild: Box::new(before_rebuild),
        }
    }

    /// A watcher whose prebuild step always resolves immediately.
    pub fn without_prebuild(detector: D) -> Self {
        Self::new(detector, || Prebuild::Ready)
    }

    /// Whether a prebuild is still outstanding.
    pub fn is_paused(&self) -> bool {
        matches!(self.state, State::PrebuildPending(_))
    }

    /// Whether the next change will be reported.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready)
    }

    /// Check for changes. Returns the changed directories when a rebuild
    /// should start now.
    ///
    /// # Errors
    /// Returns an error if the underlying detector fails.
    pub fn poll(&mut self) -> Result<Option<Vec<PathBuf>>, TreeError> {
        if let State::PrebuildPending(rx) = &self.state {
            match rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    tracing::debug!("prebuild resolved, ready for rebuild");
                    self.state = State::Ready;
                }
                Err(TryRecvError::Empty) => {}
            }
        }

        let changed = self.detector.detect_changes()?;
        if changed.is_empty() {
            return Ok(None);
        }

        match self.state {
            State::Ready => {
                self.state = State::Idle;
                Ok(Some(changed))
            }
            State::Idle => {
                tracing::debug!(dirs = changed.len(), "changes seen, running prebuild");
                self.state = match (self.before_rebuild)() {
                    Prebuild::Ready => State::Ready,
                    Prebuild::Deferred(rx) => State::PrebuildPending(rx),
                };
                Ok(None)
            }
            State::PrebuildPending(_) => Ok(None),
        }
    }
}

impl<D> std::fmt::Debug for PausingWatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PausingWatcher")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
