// src/entity/note.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::NoteId;
use crate::scene::SceneDocument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Serialized scene; absent until the note is first bound to the surface.
    #[serde(default)]
    pub snapshot: Option<SceneDocument>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: String) -> Self {
        Self {
            id: NoteId::generate(),
            title,
            snapshot: None,
            updated_at: Utc::now(),
        }
    }

    /// Bump `updated_at`. The timestamp never moves backwards, even if the
    /// wall clock does or two mutations land in the same tick.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_note_has_no_snapshot() {
        let note = Note::new("Sketch".to_string());
        assert_eq!(note.title, "Sketch");
        assert!(note.snapshot.is_none());
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut note = Note::new("Sketch".to_string());
        let future = Utc::now() + Duration::hours(1);
        note.updated_at = future;

        note.touch();
        assert!(note.updated_at > future);
    }

    #[test]
    fn test_missing_snapshot_field_defaults_to_none() {
        let json = r#"{"id":"a","title":"T","updated_at":"2024-01-01T00:00:00Z"}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert!(note.snapshot.is_none());
    }
}
