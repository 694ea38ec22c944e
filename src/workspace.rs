//! The engine: one scene surface shared by many notes.
//!
//! [`Workspace`] owns the registry, the binder, the autosave scheduler, the
//! store and the surface, and is the only thing that moves data between
//! them. All of it runs on one logical thread; callers pass the current
//! [`Instant`] in so the same code is driven by the CLI, by the tokio
//! runtime in [`crate::runtime`], and by tests with a synthetic clock.
//!
//! Failures that must not interrupt editing (storage writes, unreadable
//! snapshots) are logged and queued as [`Notice`]s instead of being
//! returned.

use std::fmt;
use std::time::Instant;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::autosave::AutosaveScheduler;
use crate::binder::{ActiveSceneBinder, BinderState, LoadTicket};
use crate::config::EaselConfig;
use crate::entity::{Note, NoteId};
use crate::error::{EaselError, Result};
use crate::registry::NoteRegistry;
use crate::scene::{codec, ingest, raster, ImageItem, MemoryScene, ObjectHandle, SceneObject, SceneSurface};
use crate::storage::{KeyValueStore, NoteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    StorageRead,
    StorageWrite,
    SceneLoad,
    ImportFormat,
    ImageDecode,
}

/// A recoverable problem the user should hear about.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, error: &EaselError) -> Self {
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = match self.kind {
            NoticeKind::StorageRead => " (starting with an empty note list)",
            NoticeKind::StorageWrite => " (changes are kept in memory and retried on the next save)",
            NoticeKind::SceneLoad => " (showing an empty scene)",
            NoticeKind::ImportFormat | NoticeKind::ImageDecode => "",
        };
        write!(f, "{}{}", self.message, hint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined the confirmation; nothing changed.
    Cancelled,
    NotFound,
    Deleted { next_active: Option<NoteId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added(ObjectHandle),
    /// The target note is no longer on the surface.
    Discarded,
}

pub struct Workspace<S: SceneSurface = MemoryScene> {
    config: EaselConfig,
    registry: NoteRegistry,
    store: NoteStore,
    binder: ActiveSceneBinder,
    autosave: AutosaveScheduler,
    scene: S,
    notices: Vec<Notice>,
}

impl<S: SceneSurface> Workspace<S> {
    /// Load the note collection from `store`. Nothing is selected yet.
    ///
    /// An unreadable collection is reported as a notice and replaced by an
    /// empty one; the stored blob is left alone until the next write.
    pub fn open(store: Box<dyn KeyValueStore>, scene: S, config: EaselConfig) -> Self {
        let store = NoteStore::new(store, config.storage_key.clone());
        let mut notices = Vec::new();

        let notes = match store.load() {
            Ok(notes) => notes,
            Err(e) => {
                warn!(error = %e, "falling back to an empty note list");
                notices.push(Notice::new(NoticeKind::StorageRead, &e));
                Vec::new()
            }
        };
        info!(notes = notes.len(), key = store.key(), "workspace opened");

        Self {
            registry: NoteRegistry::from_notes(notes, config.default_title.clone()),
            autosave: AutosaveScheduler::new(config.autosave_delay()),
            binder: ActiveSceneBinder::new(),
            config,
            store,
            scene,
            notices,
        }
    }

    pub fn config(&self) -> &EaselConfig {
        &self.config
    }

    pub fn notes(&self) -> &[Note] {
        self.registry.list()
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.registry.get(id)
    }

    pub fn active(&self) -> Option<&NoteId> {
        self.registry.active()
    }

    pub fn binder_state(&self) -> &BinderState {
        self.binder.state()
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Direct access to the surface, as an editing UI would have. Changes
    /// are picked up by the next [`Self::pump_events`] or [`Self::tick`].
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn resolve(&self, reference: &str) -> Result<NoteId> {
        self.registry.resolve(reference)
    }

    /// When the pending autosave should fire, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    fn report(&mut self, kind: NoticeKind, error: &EaselError) {
        warn!(error = %error, ?kind, "recoverable engine error");
        self.notices.push(Notice::new(kind, error));
    }

    /// Write the whole collection. Failures become notices.
    fn persist(&mut self) -> bool {
        match self.store.save(self.registry.list()) {
            Ok(()) => true,
            Err(e) => {
                self.report(NoticeKind::StorageWrite, &e);
                false
            }
        }
    }

    fn bound_or_err(&self) -> Result<NoteId> {
        self.binder.bound_note().cloned().ok_or(EaselError::NoActiveNote)
    }

    // ----- registry operations -----

    pub fn create_note(&mut self, title: Option<String>) -> Note {
        let note = self.registry.create(title);
        self.persist();
        note
    }

    /// Returns `false` if the note does not exist.
    pub fn rename(&mut self, id: &NoteId, title: &str) -> bool {
        if !self.registry.update_title(id, title) {
            return false;
        }
        self.persist();
        true
    }

    /// Delete a note once the user has confirmed.
    ///
    /// Deleting the active note binds the first remaining note, or empties
    /// the surface when none is left.
    pub fn delete(&mut self, id: &NoteId, confirmed: bool, now: Instant) -> DeleteOutcome {
        if !confirmed {
            debug!(note = %id, "deletion declined");
            return DeleteOutcome::Cancelled;
        }

        // Edits already on the surface belong to the note bound right now.
        self.pump_events(now);

        let Some(removal) = self.registry.delete(id) else {
            return DeleteOutcome::NotFound;
        };
        info!(note = %id, title = %removal.note.title, "note deleted");

        if removal.was_active {
            // Whatever was pending or queued belonged to the deleted note.
            self.autosave.cancel();
            self.scene.take_events();

            match removal.next_active.clone() {
                Some(next) => {
                    let ticket = self.binder.begin(next);
                    self.teardown_scene();
                    self.finish_select(&ticket);
                }
                None => {
                    self.binder.clear();
                    self.teardown_scene();
                }
            }
        }

        self.persist();
        DeleteOutcome::Deleted {
            next_active: self.registry.active().cloned(),
        }
    }

    // ----- switching -----

    /// Bind `id` to the scene surface, loading its snapshot.
    pub fn select(&mut self, id: &NoteId, now: Instant) -> Result<()> {
        if self.binder.is_bound_to(id) {
            return Ok(());
        }
        let ticket = self.begin_select(id, now)?;
        self.finish_select(&ticket);
        Ok(())
    }

    /// First half of a switch: settle the outgoing note, detach from it and
    /// clear the surface. Until [`Self::finish_select`] runs, scene events
    /// are not attributed to any note.
    pub fn begin_select(&mut self, id: &NoteId, now: Instant) -> Result<LoadTicket> {
        if !self.registry.contains(id) {
            return Err(EaselError::NoteNotFound(id.to_string()));
        }

        // Edits already made belong to the outgoing note, and its pending
        // save has to read the scene before the scene is torn down.
        self.pump_events(now);
        self.flush_pending();
        self.autosave.cancel();

        self.registry.set_active(Some(id.clone()))?;
        let ticket = self.binder.begin(id.clone());
        self.teardown_scene();
        Ok(ticket)
    }

    /// Second half of a switch: load the target's snapshot and bind it.
    ///
    /// Returns `false` if the ticket was superseded in the meantime, in which
    /// case nothing is loaded. A note without a snapshot gets the default
    /// scene, which is persisted immediately.
    pub fn finish_select(&mut self, ticket: &LoadTicket) -> bool {
        if !self.binder.is_current(ticket) || !self.registry.contains(&ticket.target) {
            debug!(note = %ticket.target, "switch superseded before load");
            return false;
        }

        let snapshot = self
            .registry
            .get(&ticket.target)
            .and_then(|note| note.snapshot.clone());

        match snapshot {
            Some(document) => {
                if let Err(e) = codec::deserialize(&document, &mut self.scene) {
                    self.report(NoticeKind::SceneLoad, &e);
                    self.scene.clear();
                }
            }
            None => self.materialize_placeholder(&ticket.target),
        }

        // Objects materialized by the load are not edits.
        self.scene.take_events();
        self.binder.complete(ticket);
        info!(note = %ticket.target, objects = self.scene.len(), "note bound to scene");
        true
    }

    fn materialize_placeholder(&mut self, id: &NoteId) {
        self.scene.clear();
        self.scene.load_objects(codec::placeholder_objects());

        match codec::serialize(&self.scene) {
            Ok(document) => {
                if self.registry.update_snapshot(id, document) {
                    debug!(note = %id, "default scene materialized");
                    self.persist();
                }
            }
            Err(e) => self.report(NoticeKind::StorageWrite, &e),
        }
    }

    fn teardown_scene(&mut self) {
        self.scene.take_events();
        self.scene.clear();
        self.scene.take_events();
    }

    // ----- change events and autosave -----

    /// Drain surface events and schedule an autosave for the bound note.
    /// Events arriving while nothing is bound are dropped. Returns the number
    /// of events attributed to a note.
    pub fn pump_events(&mut self, now: Instant) -> usize {
        let events = self.scene.take_events();
        if events.is_empty() {
            return 0;
        }

        match self.binder.bound_note().cloned() {
            Some(note) => {
                // Every event in the batch shares `now`, so one notify covers them.
                self.autosave.notify(note, now);
                events.len()
            }
            None => {
                debug!(dropped = events.len(), "scene events ignored while no note is bound");
                0
            }
        }
    }

    /// Advance to `now`: pick up events and run the autosave if it is due.
    /// Returns whether a flush wrote the collection.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.pump_events(now);
        match self.autosave.due(now) {
            Some(target) => self.flush_into(&target),
            None => false,
        }
    }

    /// Run any pending autosave immediately.
    pub fn flush_now(&mut self, now: Instant) -> bool {
        self.pump_events(now);
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> bool {
        match self.autosave.take_pending() {
            Some(target) => self.flush_into(&target),
            None => false,
        }
    }

    /// Snapshot the surface into `target`, then persist. The surface is read
    /// now, not when the flush was scheduled; a flush whose note is no
    /// longer bound is dropped.
    fn flush_into(&mut self, target: &NoteId) -> bool {
        if !self.binder.is_bound_to(target) {
            debug!(note = %target, "autosave for a note no longer on the scene discarded");
            return false;
        }

        let document = match codec::serialize(&self.scene) {
            Ok(document) => document,
            Err(e) => {
                self.report(NoticeKind::StorageWrite, &e);
                return false;
            }
        };

        if !self.registry.update_snapshot(target, document) {
            return false;
        }
        debug!(note = %target, "autosave flushed");
        self.persist()
    }

    // ----- scene editing helpers -----

    pub fn add_object(&mut self, object: SceneObject, now: Instant) -> Result<ObjectHandle> {
        self.bound_or_err()?;
        let handle = self.scene.add_object(object);
        self.pump_events(now);
        Ok(handle)
    }

    /// Edit the object at a back-to-front position on the bound scene.
    pub fn edit_object<F>(&mut self, index: usize, mut edit: F, now: Instant) -> Result<()>
    where
        F: FnMut(&mut SceneObject),
    {
        self.bound_or_err()?;
        let handle = self.scene.handle_at(index).ok_or(EaselError::ObjectNotFound(index))?;
        self.scene.update_object(handle, &mut edit);
        self.pump_events(now);
        Ok(())
    }

    pub fn remove_object(&mut self, index: usize, now: Instant) -> Result<SceneObject> {
        self.bound_or_err()?;
        let handle = self.scene.handle_at(index).ok_or(EaselError::ObjectNotFound(index))?;
        let removed = self
            .scene
            .remove_object(handle)
            .ok_or(EaselError::ObjectNotFound(index))?;
        self.pump_events(now);
        Ok(removed)
    }

    // ----- image ingestion -----

    /// Decode `bytes` and append the image to `target`'s scene if `target`
    /// is still the bound note.
    pub fn ingest_image(&mut self, target: &NoteId, bytes: &[u8], now: Instant) -> Result<IngestOutcome> {
        let image = ingest::decode_image(bytes)?;
        Ok(self.complete_ingest(target, image, now))
    }

    /// Deliver an already decoded image that was requested for `target`.
    pub fn complete_ingest(&mut self, target: &NoteId, image: ImageItem, now: Instant) -> IngestOutcome {
        if !self.binder.is_bound_to(target) {
            debug!(note = %target, "image arrived for a note no longer on the scene");
            return IngestOutcome::Discarded;
        }

        let object = ingest::place(image, self.config.max_image_width);
        let handle = self.scene.add_object(object);
        self.pump_events(now);
        IngestOutcome::Added(handle)
    }

    /// Record a decode failure for an asynchronous ingestion.
    pub fn report_ingest_failure(&mut self, error: &EaselError) {
        self.report(NoticeKind::ImageDecode, error);
    }

    // ----- import / export -----

    /// Prepend the notes of an exported collection. A malformed payload is
    /// rejected as a whole.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let count = self.registry.import_json(json)?;
        self.persist();
        Ok(count)
    }

    /// The whole collection as indented JSON, including unsaved edits.
    pub fn export_json(&mut self, now: Instant) -> Result<String> {
        self.flush_now(now);
        self.registry.export_json()
    }

    /// Rasterize the bound scene at the configured upscale factor.
    pub fn render(&self) -> Result<RgbaImage> {
        self.bound_or_err()?;
        raster::render(
            &self.scene,
            self.config.canvas_width,
            self.config.canvas_height,
            self.config.raster_scale,
        )
    }

    /// Flush anything pending. The workspace stays usable.
    pub fn close(&mut self, now: Instant) {
        self.flush_now(now);
    }
}
