//! Belief memory persistence.
//!
//! This module provides the `MemoryStore` trait with file-based and
//! in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::{FileMemoryStore, COLLECTIONS};
pub use memory::InMemoryStore;
pub use traits::{MemoryState, MemoryStore};
