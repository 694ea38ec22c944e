//! Scene graph types and the editing-surface contract.
//!
//! A scene is the ordered (back-to-front) list of text and image objects of
//! one note. The engine never draws anything itself: it talks to whatever
//! surface the host provides through [`SceneSurface`], and ships
//! [`MemoryScene`] as the in-process implementation used by the CLI.

pub mod codec;
pub mod ingest;
pub mod raster;

use serde::{Deserialize, Serialize};

pub use codec::SceneDocument;

/// Position, scale and rotation of an object. `angle` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl Transform {
    pub fn at(left: f64, top: f64) -> Self {
        Self {
            left,
            top,
            ..Self::default()
        }
    }
}

/// Whether the user can still pick up and move an object.
///
/// Both flags default to `false` when missing from a document, which is why
/// loading has to re-assert them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interactivity {
    #[serde(default)]
    pub selectable: bool,
    #[serde(default)]
    pub movable: bool,
}

impl Interactivity {
    pub const INTERACTIVE: Self = Self {
        selectable: true,
        movable: true,
    };

    pub fn is_interactive(&self) -> bool {
        self.selectable && self.movable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub font_size: f64,
    /// CSS-style hex colour, e.g. `#1f2933`.
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    /// `data:` URL holding the encoded image bytes.
    pub src: String,
    /// Natural pixel size of the decoded image.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneItem {
    Text(TextItem),
    Image(ImageItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub item: SceneItem,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub flags: Interactivity,
}

impl SceneObject {
    pub fn text(text: impl Into<String>, transform: Transform) -> Self {
        Self {
            item: SceneItem::Text(TextItem {
                text: text.into(),
                font_size: 24.0,
                fill: "#1f2933".to_string(),
            }),
            transform,
            flags: Interactivity::INTERACTIVE,
        }
    }

    pub fn image(image: ImageItem, transform: Transform) -> Self {
        Self {
            item: SceneItem::Image(image),
            transform,
            flags: Interactivity::INTERACTIVE,
        }
    }
}

/// Runtime handle of an object on a surface. Handles are not persisted and
/// are not stable across a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Change notifications emitted by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    ObjectAdded(ObjectHandle),
    ObjectModified(ObjectHandle),
    ObjectRemoved(ObjectHandle),
}

/// Contract the engine needs from an editable canvas.
///
/// Change notifications are queued by the surface and pulled with
/// [`SceneSurface::take_events`]; whoever drains them decides whether they
/// still belong to the note being edited.
pub trait SceneSurface {
    /// Remove every object.
    fn clear(&mut self);

    /// Materialize objects from a document, back to front, returning their
    /// new handles in the same order.
    fn load_objects(&mut self, objects: Vec<SceneObject>) -> Vec<ObjectHandle>;

    /// Current objects, back to front.
    fn objects(&self) -> Vec<SceneObject>;

    fn handles(&self) -> Vec<ObjectHandle>;

    fn add_object(&mut self, object: SceneObject) -> ObjectHandle;

    /// Apply `edit` to one object. Returns `false` if the handle is unknown.
    fn update_object(
        &mut self,
        handle: ObjectHandle,
        edit: &mut dyn FnMut(&mut SceneObject),
    ) -> bool;

    fn remove_object(&mut self, handle: ObjectHandle) -> Option<SceneObject>;

    /// Set interactivity without emitting a change event.
    fn set_flags(&mut self, handle: ObjectHandle, flags: Interactivity) -> bool;

    fn take_events(&mut self) -> Vec<SceneEvent>;

    fn len(&self) -> usize {
        self.handles().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle of the object at a back-to-front position.
    fn handle_at(&self, index: usize) -> Option<ObjectHandle> {
        self.handles().get(index).copied()
    }
}

/// In-process scene surface.
#[derive(Debug, Default)]
pub struct MemoryScene {
    entries: Vec<(ObjectHandle, SceneObject)>,
    next_handle: u64,
    events: Vec<SceneEvent>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> ObjectHandle {
        self.next_handle += 1;
        ObjectHandle(self.next_handle)
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.entries
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, object)| object)
    }

    /// Number of queued, undrained change events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl SceneSurface for MemoryScene {
    fn clear(&mut self) {
        for (handle, _) in self.entries.drain(..) {
            self.events.push(SceneEvent::ObjectRemoved(handle));
        }
    }

    fn load_objects(&mut self, objects: Vec<SceneObject>) -> Vec<ObjectHandle> {
        objects
            .into_iter()
            .map(|object| self.add_object(object))
            .collect()
    }

    fn objects(&self) -> Vec<SceneObject> {
        self.entries.iter().map(|(_, object)| object.clone()).collect()
    }

    fn handles(&self) -> Vec<ObjectHandle> {
        self.entries.iter().map(|(handle, _)| *handle).collect()
    }

    fn add_object(&mut self, object: SceneObject) -> ObjectHandle {
        let handle = self.allocate();
        self.entries.push((handle, object));
        self.events.push(SceneEvent::ObjectAdded(handle));
        handle
    }

    fn update_object(
        &mut self,
        handle: ObjectHandle,
        edit: &mut dyn FnMut(&mut SceneObject),
    ) -> bool {
        match self.entries.iter_mut().find(|(h, _)| *h == handle) {
            Some((_, object)) => {
                edit(object);
                self.events.push(SceneEvent::ObjectModified(handle));
                true
            }
            None => false,
        }
    }

    fn remove_object(&mut self, handle: ObjectHandle) -> Option<SceneObject> {
        let pos = self.entries.iter().position(|(h, _)| *h == handle)?;
        let (_, object) = self.entries.remove(pos);
        self.events.push(SceneEvent::ObjectRemoved(handle));
        Some(object)
    }

    fn set_flags(&mut self, handle: ObjectHandle, flags: Interactivity) -> bool {
        match self.entries.iter_mut().find(|(h, _)| *h == handle) {
            Some((_, object)) => {
                object.flags = flags;
                true
            }
            None => false,
        }
    }

    fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_update_remove_emit_events() {
        let mut scene = MemoryScene::new();
        let handle = scene.add_object(SceneObject::text("hello", Transform::at(10.0, 20.0)));

        assert!(scene.update_object(handle, &mut |object| object.transform.left = 50.0));
        assert_eq!(scene.get(handle).unwrap().transform.left, 50.0);

        assert!(scene.remove_object(handle).is_some());
        assert_eq!(
            scene.take_events(),
            vec![
                SceneEvent::ObjectAdded(handle),
                SceneEvent::ObjectModified(handle),
                SceneEvent::ObjectRemoved(handle),
            ]
        );
        assert!(scene.is_empty());
        assert_eq!(scene.pending_events(), 0);
    }

    #[test]
    fn test_update_unknown_handle_is_noop() {
        let mut scene = MemoryScene::new();
        assert!(!scene.update_object(ObjectHandle(99), &mut |_| {}));
        assert!(scene.take_events().is_empty());
    }

    #[test]
    fn test_set_flags_is_silent() {
        let mut scene = MemoryScene::new();
        let handle = scene.add_object(SceneObject::text("a", Transform::default()));
        scene.take_events();

        assert!(scene.set_flags(handle, Interactivity::default()));
        assert!(!scene.get(handle).unwrap().flags.is_interactive());
        assert!(scene.take_events().is_empty());
    }

    #[test]
    fn test_clear_reports_removals_and_handles_are_fresh_after_reload() {
        let mut scene = MemoryScene::new();
        let first = scene.load_objects(vec![
            SceneObject::text("a", Transform::default()),
            SceneObject::text("b", Transform::default()),
        ]);
        scene.clear();
        let events = scene.take_events();
        assert_eq!(events.len(), 4);

        let second = scene.load_objects(vec![SceneObject::text("a", Transform::default())]);
        assert!(!first.contains(&second[0]));
        assert_eq!(scene.handle_at(0), Some(second[0]));
        assert_eq!(scene.handle_at(1), None);
    }

    #[test]
    fn test_missing_flags_deserialize_as_locked() {
        let json = r##"{"item":{"kind":"text","text":"x","font_size":12.0,"fill":"#000"}}"##;
        let object: SceneObject = serde_json::from_str(json).unwrap();
        assert!(!object.flags.selectable);
        assert!(!object.flags.movable);
        assert_eq!(object.transform, Transform::default());
    }
}
