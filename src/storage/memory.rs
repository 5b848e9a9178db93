//! In-memory belief storage for testing.
//!
//! Provides a thread-safe `MemoryStore` that keeps the last committed state
//! in memory. Commits can be made to fail on demand to exercise the belief
//! store's fail-open persistence path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{MnemosyneError, Result};
use crate::storage::{MemoryState, MemoryStore};

/// In-memory memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Last committed state.
    state: RwLock<MemoryState>,
    /// Successful commits so far.
    commits: AtomicUsize,
    /// When set, every commit fails with a storage error.
    failing: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `state`.
    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Make subsequent commits fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Copy of the last committed state.
    pub fn snapshot(&self) -> MemoryState {
        self.state.read().unwrap().clone()
    }
}

fn poisoned() -> MnemosyneError {
    MnemosyneError::storage("memory://", std::io::Error::other("state lock poisoned"))
}

impl MemoryStore for InMemoryStore {
    fn load(&self) -> Result<MemoryState> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.clone())
    }

    fn commit(&self, state: &MemoryState) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MnemosyneError::storage(
                "memory://",
                std::io::Error::other("injected commit failure"),
            ));
        }
        *self.state.write().map_err(|_| poisoned())? = state.clone();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
