//! Active-scene binder: which note the shared scene surface belongs to.
//!
//! ```text
//!   Empty ──begin──▶ Loading ──complete(latest ticket)──▶ Bound
//!     ▲                 ▲ │                                  │
//!     └──── clear ──────┼─┘◀──────────── begin ──────────────┘
//!                       └──────────── clear ────────────────▶ Empty
//! ```
//!
//! Every `begin` hands out a [`LoadTicket`]. Only the most recent ticket
//! can complete a load, so a slow load for a note the user already switched
//! away from is discarded instead of binding the wrong note.

use tracing::debug;

use crate::entity::NoteId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinderState {
    /// No active note.
    Empty,
    /// Switching to `target`; scene events are not attributed to any note.
    Loading { target: NoteId, generation: u64 },
    /// The scene shows `note` and its change events drive autosave.
    Bound { note: NoteId, generation: u64 },
}

/// Proof that a load was started for `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub target: NoteId,
    generation: u64,
}

#[derive(Debug)]
pub struct ActiveSceneBinder {
    state: BinderState,
    generation: u64,
}

impl Default for ActiveSceneBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveSceneBinder {
    pub fn new() -> Self {
        Self {
            state: BinderState::Empty,
            generation: 0,
        }
    }

    pub fn state(&self) -> &BinderState {
        &self.state
    }

    /// Start switching to `target`, detaching from whatever was bound.
    pub fn begin(&mut self, target: NoteId) -> LoadTicket {
        self.generation += 1;
        debug!(note = %target, generation = self.generation, "scene load started");
        self.state = BinderState::Loading {
            target: target.clone(),
            generation: self.generation,
        };
        LoadTicket {
            target,
            generation: self.generation,
        }
    }

    /// Finish a load. Returns `false` and changes nothing if `ticket` has
    /// been superseded by a later `begin` or a `clear`.
    pub fn complete(&mut self, ticket: &LoadTicket) -> bool {
        let current = matches!(
            &self.state,
            BinderState::Loading { target, generation }
                if *generation == ticket.generation && *target == ticket.target
        );
        if !current {
            debug!(note = %ticket.target, generation = ticket.generation, "stale scene load discarded");
            return false;
        }

        debug!(note = %ticket.target, generation = ticket.generation, "scene bound");
        self.state = BinderState::Bound {
            note: ticket.target.clone(),
            generation: ticket.generation,
        };
        true
    }

    /// No note is active any more.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.state = BinderState::Empty;
    }

    /// Whether `ticket` is still the load in progress.
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        matches!(&self.state, BinderState::Loading { generation, .. } if *generation == ticket.generation)
    }

    /// The note whose change events should be recorded, if any.
    pub fn bound_note(&self) -> Option<&NoteId> {
        match &self.state {
            BinderState::Bound { note, .. } => Some(note),
            _ => None,
        }
    }

    pub fn is_bound_to(&self, id: &NoteId) -> bool {
        self.bound_note() == Some(id)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, BinderState::Loading { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let binder = ActiveSceneBinder::new();
        assert_eq!(binder.state(), &BinderState::Empty);
        assert_eq!(binder.bound_note(), None);
    }

    #[test]
    fn test_begin_then_complete_binds() {
        let mut binder = ActiveSceneBinder::new();
        let a = NoteId::from("a");

        let ticket = binder.begin(a.clone());
        assert!(binder.is_loading());
        assert_eq!(binder.bound_note(), None);

        assert!(binder.complete(&ticket));
        assert!(binder.is_bound_to(&a));
    }

    #[test]
    fn test_superseded_load_cannot_complete() {
        let mut binder = ActiveSceneBinder::new();
        let a_ticket = binder.begin(NoteId::from("a"));
        let b_ticket = binder.begin(NoteId::from("b"));

        assert!(!binder.is_current(&a_ticket));
        assert!(!binder.complete(&a_ticket));
        assert!(binder.is_loading());

        assert!(binder.complete(&b_ticket));
        assert!(binder.is_bound_to(&NoteId::from("b")));
    }

    #[test]
    fn test_switch_from_bound_detaches() {
        let mut binder = ActiveSceneBinder::new();
        let ticket = binder.begin(NoteId::from("a"));
        binder.complete(&ticket);

        let next = binder.begin(NoteId::from("b"));
        assert_eq!(binder.bound_note(), None);
        assert!(binder.is_current(&next));
    }

    #[test]
    fn test_clear_invalidates_in_flight_load() {
        let mut binder = ActiveSceneBinder::new();
        let ticket = binder.begin(NoteId::from("a"));
        binder.clear();

        assert!(!binder.complete(&ticket));
        assert_eq!(binder.state(), &BinderState::Empty);
    }

    #[test]
    fn test_completing_twice_is_refused() {
        let mut binder = ActiveSceneBinder::new();
        let ticket = binder.begin(NoteId::from("a"));
        assert!(binder.complete(&ticket));
        assert!(!binder.complete(&ticket));
        assert!(binder.is_bound_to(&NoteId::from("a")));
    }
}
