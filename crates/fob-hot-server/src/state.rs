//! Live renderer state shared between the done listener and requests.
//!
//! The cell has a single writer (the build-completion listener) and many
//! readers (in-flight requests). Writes replace the whole state, so readers
//! see either the previous or the next state and never a mix.

use crate::error::{HotServerError, SharedError};
use parking_lot::RwLock;
use std::sync::Arc;

/// The renderer currently serving requests.
pub enum LiveState<R> {
    /// No build has completed yet
    Pending,
    /// The latest build produced this renderer
    Ready(R),
    /// The latest build failed
    Failed(SharedError),
}

impl<R> LiveState<R> {
    pub fn is_pending(&self) -> bool {
        matches!(self, LiveState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LiveState::Ready(_))
    }

    pub fn error(&self) -> Option<&SharedError> {
        match self {
            LiveState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn renderer(&self) -> Option<&R> {
        match self {
            LiveState::Ready(renderer) => Some(renderer),
            _ => None,
        }
    }

    /// Short state name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            LiveState::Pending => "pending",
            LiveState::Ready(_) => "ready",
            LiveState::Failed(_) => "failed",
        }
    }
}

impl<R: Clone> LiveState<R> {
    /// Resolve the state for one request.
    ///
    /// `Pending` is reported as [`HotServerError::NotReady`] without being stored.
    pub fn current(&self) -> Result<R, SharedError> {
        match self {
            LiveState::Ready(renderer) => Ok(renderer.clone()),
            LiveState::Failed(error) => Err(Arc::clone(error)),
            LiveState::Pending => Err(Arc::new(HotServerError::NotReady)),
        }
    }
}

/// Owner of the live state.
pub struct LiveStateCell<R> {
    state: RwLock<Arc<LiveState<R>>>,
}

impl<R> LiveStateCell<R> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(LiveState::Pending)),
        }
    }

    /// Snapshot of the current state.
    ///
    /// The lock is released before returning; callers keep the snapshot alive
    /// for as long as they need it.
    pub fn load(&self) -> Arc<LiveState<R>> {
        Arc::clone(&self.state.read())
    }

    /// Replace the state, returning the previous one.
    pub fn replace(&self, next: LiveState<R>) -> Arc<LiveState<R>> {
        std::mem::replace(&mut *self.state.write(), Arc::new(next))
    }
}

impl<R> Default for LiveStateCell<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::BuildDiagnostic;

    #[test]
    fn test_cell_starts_pending() {
        let cell: LiveStateCell<u32> = LiveStateCell::new();
        let state = cell.load();
        assert!(state.is_pending());
        assert!(matches!(
            state.current().map_err(|e| e.to_string()),
            Err(message) if message.contains("before the compiler finished compiling")
        ));
    }

    #[test]
    fn test_replace_is_last_write_wins() {
        let cell = LiveStateCell::new();

        cell.replace(LiveState::Ready(1));
        let previous = cell.replace(LiveState::Ready(2));

        assert_eq!(previous.renderer(), Some(&1));
        assert_eq!(cell.load().current().ok(), Some(2));
    }

    #[test]
    fn test_failed_overrides_ready() {
        let cell = LiveStateCell::new();
        cell.replace(LiveState::Ready("renderer"));

        let error = Arc::new(HotServerError::Compile(BuildDiagnostic::new("boom")));
        cell.replace(LiveState::Failed(Arc::clone(&error)));

        let state = cell.load();
        assert!(!state.is_ready());
        assert_eq!(state.label(), "failed");
        assert!(Arc::ptr_eq(state.error().unwrap(), &error));
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let cell = LiveStateCell::new();
        cell.replace(LiveState::Ready("old"));

        let snapshot = cell.load();
        cell.replace(LiveState::Ready("new"));

        assert_eq!(snapshot.renderer(), Some(&"old"));
        assert_eq!(cell.load().renderer(), Some(&"new"));
    }
}
