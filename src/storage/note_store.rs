use std::collections::HashSet;

use tracing::{debug, warn};

use super::KeyValueStore;
use crate::entity::Note;
use crate::error::{EaselError, Result};

/// Reads and writes the whole note collection as one JSON array.
pub struct NoteStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl NoteStore {
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted collection. A missing blob is an empty collection;
    /// an unreadable or corrupt one is a [`EaselError::StorageRead`].
    ///
    /// Duplicate ids in the blob keep their first occurrence.
    pub fn load(&self) -> Result<Vec<Note>> {
        let raw = self
            .backend
            .get(&self.key)
            .map_err(|e| EaselError::StorageRead(e.to_string()))?;

        let Some(raw) = raw else {
            debug!(key = %self.key, "no stored notes yet");
            return Ok(Vec::new());
        };

        let notes: Vec<Note> =
            serde_json::from_str(&raw).map_err(|e| EaselError::StorageRead(e.to_string()))?;

        let mut seen = HashSet::new();
        let total = notes.len();
        let notes: Vec<Note> = notes
            .into_iter()
            .filter(|note| seen.insert(note.id.clone()))
            .collect();
        if notes.len() != total {
            warn!(dropped = total - notes.len(), "stored notes contained duplicate ids");
        }

        Ok(notes)
    }

    /// Overwrite the persisted collection with `notes`.
    pub fn save(&mut self, notes: &[Note]) -> Result<()> {
        let json = serde_json::to_string(notes).map_err(|e| EaselError::StorageWrite(e.to_string()))?;
        self.backend
            .set(&self.key, &json)
            .map_err(|e| EaselError::StorageWrite(e.to_string()))?;
        debug!(key = %self.key, notes = notes.len(), bytes = json.len(), "notes persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_missing_blob_is_empty_collection() {
        let store = NoteStore::new(Box::new(MemoryStore::new()), "notes");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let backend = MemoryStore::new();
        let mut store = NoteStore::new(Box::new(backend.clone()), "notes");

        let notes = vec![Note::new("A".to_string()), Note::new("B".to_string())];
        store.save(&notes).unwrap();

        let raw = backend.value("notes").unwrap();
        assert!(raw.starts_with('['));
        assert_eq!(store.load().unwrap(), notes);
    }

    #[test]
    fn test_corrupt_blob_is_storage_read_error() {
        let store = NoteStore::new(Box::new(MemoryStore::with_value("notes", "{not json")), "notes");
        assert!(matches!(store.load(), Err(EaselError::StorageRead(_))));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let json = r#"[
            {"id":"a","title":"first","snapshot":null,"updated_at":"2024-01-01T00:00:00Z"},
            {"id":"a","title":"second","snapshot":null,"updated_at":"2024-01-02T00:00:00Z"}
        ]"#;
        let store = NoteStore::new(Box::new(MemoryStore::with_value("notes", json)), "notes");

        let notes = store.load().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "first");
    }

    #[test]
    fn test_write_failure_is_storage_write_error() {
        let backend = MemoryStore::new();
        backend.set_fail_writes(true);
        let mut store = NoteStore::new(Box::new(backend), "notes");

        let result = store.save(&[Note::new("A".to_string())]);
        assert!(matches!(result, Err(EaselError::StorageWrite(_))));
    }
}
