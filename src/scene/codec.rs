//! Scene snapshot codec
//!
//! Converts the objects on a [`SceneSurface`] to and from a self-contained
//! JSON document. The document is kept as an opaque [`serde_json::Value`]
//! inside notes so that one malformed snapshot can never make the whole
//! note collection unreadable; it is only decoded when a note is loaded.

use serde::{Deserialize, Serialize};

use super::{Interactivity, SceneObject, SceneSurface, Transform};
use crate::error::{EaselError, Result};

/// Current document format.
pub const DOCUMENT_VERSION: u32 = 1;

const PLACEHOLDER_TEXT: &str = "Double-click to edit this note";

/// Serialized, reloadable representation of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneDocument(serde_json::Value);

impl SceneDocument {
    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Number of objects, if the document is well-formed enough to tell.
    pub fn object_count(&self) -> Option<usize> {
        self.0.get("objects")?.as_array().map(Vec::len)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneData {
    version: u32,
    objects: Vec<SceneObject>,
}

/// Capture every object on the surface, including its interactivity flags.
pub fn serialize<S: SceneSurface + ?Sized>(scene: &S) -> Result<SceneDocument> {
    let data = SceneData {
        version: DOCUMENT_VERSION,
        objects: scene.objects(),
    };
    Ok(SceneDocument(serde_json::to_value(data)?))
}

/// Parse a document into objects without touching any surface.
pub fn decode(document: &SceneDocument) -> Result<Vec<SceneObject>> {
    let data: SceneData = serde_json::from_value(document.0.clone())
        .map_err(|e| EaselError::SceneLoad(e.to_string()))?;

    if data.version != DOCUMENT_VERSION {
        return Err(EaselError::SceneLoad(format!(
            "unsupported document version {}",
            data.version
        )));
    }

    Ok(data.objects)
}

/// Replace the surface contents with the document's objects.
///
/// The document is parsed before the surface is touched, so a malformed
/// document leaves the scene as it was. Every loaded object is made
/// selectable and movable again regardless of what the document says.
pub fn deserialize<S: SceneSurface + ?Sized>(document: &SceneDocument, scene: &mut S) -> Result<()> {
    let objects = decode(document)?;

    scene.clear();
    for handle in scene.load_objects(objects) {
        scene.set_flags(handle, Interactivity::INTERACTIVE);
    }

    Ok(())
}

/// Objects of the default scene a note gets on its first bind.
pub fn placeholder_objects() -> Vec<SceneObject> {
    vec![SceneObject::text(PLACEHOLDER_TEXT, Transform::at(80.0, 80.0))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ImageItem, MemoryScene, SceneItem};

    fn image_item() -> ImageItem {
        ImageItem {
            src: "data:image/png;base64,AAAA".to_string(),
            width: 64,
            height: 32,
        }
    }

    fn assert_round_trip(scene: &MemoryScene) {
        let document = serialize(scene).unwrap();
        let mut restored = MemoryScene::new();
        deserialize(&document, &mut restored).unwrap();

        assert_eq!(restored.objects(), scene.objects());
    }

    #[test]
    fn test_round_trip_empty_scene() {
        let scene = MemoryScene::new();
        assert_round_trip(&scene);
        assert_eq!(serialize(&scene).unwrap().object_count(), Some(0));
    }

    #[test]
    fn test_round_trip_single_text() {
        let mut scene = MemoryScene::new();
        scene.add_object(SceneObject::text("hello", Transform::at(12.5, 40.0)));
        assert_round_trip(&scene);
    }

    #[test]
    fn test_round_trip_overlapping_mixed_objects() {
        let mut scene = MemoryScene::new();
        for i in 0..5 {
            let transform = Transform {
                left: 100.0,
                top: 100.0 + i as f64 * 0.1,
                scale_x: 0.25 * (i + 1) as f64,
                scale_y: 1.0 / 3.0,
                angle: -45.0 + i as f64 * 33.3,
            };
            scene.add_object(SceneObject::text(format!("layer {}", i), transform));
            scene.add_object(SceneObject::image(image_item(), transform));
        }
        assert_round_trip(&scene);
        assert_eq!(serialize(&scene).unwrap().object_count(), Some(10));
    }

    #[test]
    fn test_round_trip_survives_text_encoding() {
        let mut scene = MemoryScene::new();
        let transform = Transform {
            left: 0.1 + 0.2,
            top: 1e-7,
            scale_x: std::f64::consts::PI,
            scale_y: 2.0 / 3.0,
            angle: 359.999,
        };
        scene.add_object(SceneObject::image(image_item(), transform));

        let text = serde_json::to_string(&serialize(&scene).unwrap()).unwrap();
        let document: SceneDocument = serde_json::from_str(&text).unwrap();

        let mut restored = MemoryScene::new();
        deserialize(&document, &mut restored).unwrap();
        assert_eq!(restored.objects()[0].transform, transform);
    }

    #[test]
    fn test_deserialize_reasserts_interactivity() {
        let document = SceneDocument::from_value(serde_json::json!({
            "version": 1,
            "objects": [
                { "item": { "kind": "text", "text": "a", "font_size": 10.0, "fill": "#000" } },
                {
                    "item": { "kind": "text", "text": "b", "font_size": 10.0, "fill": "#000" },
                    "flags": { "selectable": false, "movable": false }
                }
            ]
        }));

        let mut scene = MemoryScene::new();
        deserialize(&document, &mut scene).unwrap();

        assert_eq!(scene.len(), 2);
        assert!(scene.objects().iter().all(|o| o.flags.is_interactive()));
    }

    #[test]
    fn test_deserialize_clears_existing_objects() {
        let mut scene = MemoryScene::new();
        scene.add_object(SceneObject::text("old", Transform::default()));

        let mut other = MemoryScene::new();
        other.add_object(SceneObject::text("new", Transform::default()));
        let document = serialize(&other).unwrap();

        deserialize(&document, &mut scene).unwrap();
        let objects = scene.objects();
        assert_eq!(objects.len(), 1);
        match &objects[0].item {
            SceneItem::Text(text) => assert_eq!(text.text, "new"),
            other => panic!("Expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_document_is_scene_load_error_and_leaves_scene() {
        let mut scene = MemoryScene::new();
        scene.add_object(SceneObject::text("keep", Transform::default()));

        let document = SceneDocument::from_value(serde_json::json!({ "objects": "nope" }));
        let result = deserialize(&document, &mut scene);

        assert!(matches!(result, Err(EaselError::SceneLoad(_))));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let document = SceneDocument::from_value(serde_json::json!({ "version": 99, "objects": [] }));
        assert!(matches!(decode(&document), Err(EaselError::SceneLoad(_))));
    }

    #[test]
    fn test_placeholder_is_not_empty() {
        let objects = placeholder_objects();
        assert!(!objects.is_empty());
        assert!(objects.iter().all(|o| o.flags.is_interactive()));
    }
}
