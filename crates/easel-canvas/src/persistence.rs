//! Conversion between the live scene and its durable representation.
//!
//! The stored form references media by element id rather than embedding it:
//! `data:` payloads go to a separate blob store, remote URLs are kept inline.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::{CropRect, ElementId, MediaKind, PlacedElement, SceneGraph, VideoPlayback};
use crate::view::Viewport;

const DEFAULT_SIZE: f32 = 300.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredKind {
    Image,
    Video,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransform {
    pub x: f32,
    pub y: f32,
    #[serde(default = "one")]
    pub scale: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_box: Option<CropRect>,
}

/// A serializable representation of a placed element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: StoredKind,
    /// Key of the image payload in the media store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Key of the video payload in the media store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Inline source for media that is not a `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub transform: StoredTransform,
    #[serde(default)]
    pub z_index: usize,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl StoredElement {
    /// Key under which this element's media blob is stored.
    pub fn media_key(&self) -> &str {
        let key = match self.kind {
            StoredKind::Image => self.image_id.as_deref(),
            StoredKind::Video => self.video_id.as_deref(),
        };
        key.unwrap_or(self.id.as_str())
    }
}

/// Durable snapshot of the canvas (elements, transforms, viewport).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasStorageState {
    pub elements: Vec<StoredElement>,
    /// Unix time in milliseconds.
    pub last_modified: i64,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

/// Media payload resolved for an element during load.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMedia {
    pub src: String,
    pub duration: Option<f32>,
}

fn one() -> f32 {
    1.0
}

pub fn is_data_url(src: &str) -> bool {
    src.starts_with("data:")
}

/// Serializes the scene into its storage form.
pub fn to_storage(scene: &SceneGraph, viewport: Viewport, last_modified: i64) -> CanvasStorageState {
    let elements = scene
        .iter()
        .enumerate()
        .map(|(z_index, e)| {
            let media_key = Some(e.id.to_string());
            let (kind, image_id, video_id) = match e.kind {
                MediaKind::Image => (StoredKind::Image, media_key, None),
                MediaKind::Video(_) => (StoredKind::Video, None, media_key),
            };
            let playback = e.playback();

            StoredElement {
                id: e.id.clone(),
                kind,
                image_id,
                video_id,
                src: (!is_data_url(&e.src)).then(|| e.src.clone()),
                transform: StoredTransform {
                    x: e.position.x,
                    y: e.position.y,
                    scale: 1.0,
                    rotation: e.rotation,
                    crop_box: e.crop,
                },
                z_index,
                width: Some(e.size.x),
                height: Some(e.size.y),
                duration: playback.map(|p| p.duration),
                current_time: playback.map(|p| p.current_time),
                is_playing: playback.map(|p| p.is_playing),
                volume: playback.map(|p| p.volume),
                muted: playback.map(|p| p.muted),
            }
        })
        .collect();

    CanvasStorageState {
        elements,
        last_modified,
        viewport: Some(viewport),
    }
}

/// Rebuilds a scene from its storage form.
///
/// `resolve` looks up the stored media for an element. Elements with neither
/// stored media nor an inline `src` are skipped, as are repeated ids. Invalid
/// crop boxes are dropped.
pub fn from_storage<F>(state: &CanvasStorageState, mut resolve: F) -> (SceneGraph, Viewport)
where
    F: FnMut(&StoredElement) -> Option<ResolvedMedia>,
{
    let mut ordered: Vec<&StoredElement> = state.elements.iter().collect();
    ordered.sort_by_key(|e| e.z_index);

    let mut scene = SceneGraph::new();
    let mut seen = HashSet::new();

    for stored in ordered {
        if !seen.insert(stored.id.clone()) {
            tracing::warn!(element_id = %stored.id, "Skipping repeated element id");
            continue;
        }

        let media = resolve(stored).or_else(|| {
            stored.src.clone().map(|src| ResolvedMedia {
                src,
                duration: None,
            })
        });
        let Some(media) = media else {
            tracing::warn!(element_id = %stored.id, "Skipping element without media");
            continue;
        };

        let size = Vec2::new(
            stored.width.filter(|w| *w > 0.0).unwrap_or(DEFAULT_SIZE),
            stored.height.filter(|h| *h > 0.0).unwrap_or(DEFAULT_SIZE),
        );
        let kind = match stored.kind {
            StoredKind::Image => MediaKind::Image,
            StoredKind::Video => MediaKind::Video(VideoPlayback {
                duration: stored.duration.or(media.duration).unwrap_or(0.0),
                current_time: stored.current_time.unwrap_or(0.0),
                is_playing: stored.is_playing.unwrap_or(false),
                volume: stored.volume.unwrap_or(1.0),
                muted: stored.muted.unwrap_or(false),
                is_loaded: false,
            }),
        };

        let element = PlacedElement {
            id: stored.id.clone(),
            src: media.src,
            position: Vec2::new(stored.transform.x, stored.transform.y),
            size,
            rotation: stored.transform.rotation,
            crop: stored.transform.crop_box.filter(|c| c.is_valid()),
            kind,
            flags: Default::default(),
        };

        if let Err(e) = scene.insert(element) {
            tracing::warn!(error = %e, "Skipping element");
        }
    }

    let viewport = state.viewport.unwrap_or_default().sanitized();
    (scene, viewport)
}
