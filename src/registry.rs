//! The note registry: the ordered note collection plus the active binding.
//!
//! The registry is pure in-memory state. Persisting it after a mutation is
//! the caller's job (see [`crate::workspace::Workspace`]), which keeps every
//! operation here all-or-nothing.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::entity::{Note, NoteId};
use crate::error::{EaselError, Result};
use crate::scene::SceneDocument;

/// What a successful delete did to the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub note: Note,
    pub was_active: bool,
    /// Active id after the removal. Only meaningful when `was_active`.
    pub next_active: Option<NoteId>,
}

#[derive(Debug, Clone)]
pub struct NoteRegistry {
    notes: Vec<Note>,
    active: Option<NoteId>,
    default_title: String,
}

impl NoteRegistry {
    pub fn new(default_title: impl Into<String>) -> Self {
        Self::from_notes(Vec::new(), default_title)
    }

    /// Wrap an already-loaded collection. Nothing is active yet.
    pub fn from_notes(notes: Vec<Note>, default_title: impl Into<String>) -> Self {
        Self {
            notes,
            active: None,
            default_title: default_title.into(),
        }
    }

    pub fn list(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| &n.id == id)
    }

    pub fn active(&self) -> Option<&NoteId> {
        self.active.as_ref()
    }

    /// Bind `id` as the active note, or clear the binding with `None`.
    pub fn set_active(&mut self, id: Option<NoteId>) -> Result<()> {
        if let Some(ref id) = id {
            if !self.contains(id) {
                return Err(EaselError::NoteNotFound(id.to_string()));
            }
        }
        self.active = id;
        Ok(())
    }

    /// Create an empty note at the head of the list.
    pub fn create(&mut self, title: Option<String>) -> Note {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.default_title.clone());
        let note = Note::new(title);
        debug!(id = %note.id, "note created");
        self.notes.insert(0, note.clone());
        note
    }

    /// Remove a note. If it was active, the first remaining note (or none)
    /// becomes active in the same step. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &NoteId) -> Option<Removal> {
        let pos = self.notes.iter().position(|n| &n.id == id)?;
        let note = self.notes.remove(pos);

        let was_active = self.active.as_ref() == Some(id);
        if was_active {
            self.active = self.notes.first().map(|n| n.id.clone());
        }

        debug!(id = %id, was_active, "note deleted");
        Some(Removal {
            note,
            was_active,
            next_active: self.active.clone(),
        })
    }

    /// Returns `false` if the note does not exist.
    pub fn update_title(&mut self, id: &NoteId, title: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(note) => {
                note.title = title.into();
                note.touch();
                true
            }
            None => false,
        }
    }

    /// Replace the snapshot of the active note.
    ///
    /// Refused (returns `false`) for unknown ids and for any note that is not
    /// the active one: a save that was scheduled for a note the user has
    /// since switched away from must not land.
    pub fn update_snapshot(&mut self, id: &NoteId, document: SceneDocument) -> bool {
        if self.active.as_ref() != Some(id) {
            debug!(id = %id, "refusing snapshot update for inactive note");
            return false;
        }
        match self.get_mut(id) {
            Some(note) => {
                note.snapshot = Some(document);
                note.touch();
                true
            }
            None => false,
        }
    }

    /// Find a note by 1-based list position, exact id, or unique id prefix.
    pub fn resolve(&self, reference: &str) -> Result<NoteId> {
        let reference = reference.trim();

        if let Some(note) = self.notes.iter().find(|n| n.id.as_str() == reference) {
            return Ok(note.id.clone());
        }

        if let Ok(position) = reference.parse::<usize>() {
            if let Some(note) = position.checked_sub(1).and_then(|i| self.notes.get(i)) {
                return Ok(note.id.clone());
            }
        }

        let mut matches = self
            .notes
            .iter()
            .filter(|n| !reference.is_empty() && n.id.as_str().starts_with(reference));
        match (matches.next(), matches.next()) {
            (Some(note), None) => Ok(note.id.clone()),
            (Some(_), Some(_)) => Err(EaselError::AmbiguousNote(reference.to_string())),
            _ => Err(EaselError::NoteNotFound(reference.to_string())),
        }
    }

    /// The whole collection as indented JSON, readable by [`Self::import_json`].
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.notes)?)
    }

    /// Prepend the note-like records of a JSON array, returning how many were
    /// added. Either every record is imported or none is.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let payload: Value = serde_json::from_str(json)
            .map_err(|e| EaselError::ImportFormat(format!("not valid JSON: {}", e)))?;
        let records = payload
            .as_array()
            .ok_or_else(|| EaselError::ImportFormat("expected a JSON array of notes".to_string()))?;

        let mut taken: HashSet<NoteId> = self.notes.iter().map(|n| n.id.clone()).collect();
        let mut imported = records
            .iter()
            .enumerate()
            .map(|(index, record)| note_from_record(index, record, &self.default_title, &mut taken))
            .collect::<Result<Vec<Note>>>()?;

        let count = imported.len();
        imported.append(&mut self.notes);
        self.notes = imported;
        debug!(count, "notes imported");
        Ok(count)
    }
}

fn note_from_record(
    index: usize,
    record: &Value,
    default_title: &str,
    taken: &mut HashSet<NoteId>,
) -> Result<Note> {
    let malformed = |what: &str| EaselError::ImportFormat(format!("record {}: {}", index, what));

    let fields = record.as_object().ok_or_else(|| malformed("not an object"))?;

    let id = match fields.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(NoteId::from(s.as_str())),
        Some(Value::Number(n)) => Some(NoteId::from(n.to_string())),
        Some(_) => return Err(malformed("id must be a string")),
    };
    let id = match id {
        Some(id) if !taken.contains(&id) => id,
        Some(id) => {
            debug!(id = %id, "imported id already in use, generating a new one");
            NoteId::generate()
        }
        None => NoteId::generate(),
    };
    taken.insert(id.clone());

    let title = match fields.get("title") {
        None | Some(Value::Null) => default_title.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(malformed("title must be a string")),
    };

    let snapshot = match fields.get("snapshot") {
        None | Some(Value::Null) => None,
        Some(value @ Value::Object(_)) => Some(SceneDocument::from_value(value.clone())),
        Some(_) => return Err(malformed("snapshot must be an object")),
    };

    let updated_at = match fields.get("updated_at").or_else(|| fields.get("updatedAt")) {
        None | Some(Value::Null) => Utc::now(),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| malformed("updated_at is not an RFC 3339 timestamp"))?,
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| malformed("updated_at is not a millisecond timestamp"))?,
        Some(_) => return Err(malformed("updated_at must be a timestamp")),
    };

    Ok(Note {
        id,
        title,
        snapshot,
        updated_at,
    })
}
