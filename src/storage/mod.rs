//! Durable storage.
//!
//! The engine only needs a named-blob capability ([`KeyValueStore`]);
//! [`NoteStore`] is its contract against that capability: the whole note
//! collection is one JSON array under one key.

mod file_store;
mod memory_store;
mod note_store;

pub use file_store::{FileStore, EASEL_DIR};
pub use memory_store::MemoryStore;
pub use note_store::NoteStore;

use crate::error::Result;

/// Get/set of named text blobs.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}
