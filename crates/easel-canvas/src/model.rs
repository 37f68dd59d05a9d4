//! # Scene Graph Model
//!
//! Placed images and videos live in a flat arena (`SlotMap`) with a separate
//! draw order. Elements are addressed from the outside by their stable
//! [`ElementId`]; the arena key is an internal detail.
//!
//! Elements are never mutated in place. Every change goes through
//! [`SceneGraph::update`], which swaps in a whole new value, so snapshots held
//! by the history never observe later edits.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::CanvasError;
use crate::math::{Rect, rotated_bounds};

pub use uuid::Uuid;

new_key_type! {
    /// Arena key for an element. Not stable across loads; use [`ElementId`] instead.
    pub struct ElementKey;
}

/// Stable identifier of a placed element, unique across images and videos.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id such as `image-3f2c...`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4()))
    }

    /// Id given to a duplicate of this element.
    pub fn copy_of(&self, stamp_ms: i64) -> Self {
        Self(format!("{}-copy-{stamp_ms}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

bitflags! {
    /// Boolean states of an element.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ElementFlags: u8 {
        /// The element is part of the current selection.
        const SELECTED = 1 << 0;
        /// A remote job is producing or editing this element's content.
        const GENERATING = 1 << 1;
        /// The element cannot be moved by dragging.
        const LOCKED = 1 << 2;
    }
}

impl Serialize for ElementFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for ElementFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

/// Normalized crop window inside the source media. All components are in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Result<Self, CanvasError> {
        let crop = Self {
            x,
            y,
            width,
            height,
        };
        if crop.is_valid() {
            Ok(crop)
        } else {
            Err(CanvasError::InvalidCrop {
                x,
                y,
                width,
                height,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.width <= 1.0
            && self.height <= 1.0
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }

    /// Moves the window by `delta` (normalized units), keeping it inside the unit square.
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x: (self.x + delta.x).clamp(0.0, (1.0 - self.width).max(0.0)),
            y: (self.y + delta.y).clamp(0.0, (1.0 - self.height).max(0.0)),
            ..*self
        }
    }
}

/// Playback attributes carried by video elements.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoPlayback {
    /// Clip length in seconds.
    pub duration: f32,
    pub current_time: f32,
    pub is_playing: bool,
    /// 0.0 – 1.0
    pub volume: f32,
    pub muted: bool,
    /// Whether the host has finished loading the media. Never persisted as true.
    pub is_loaded: bool,
}

impl Default for VideoPlayback {
    fn default() -> Self {
        Self {
            duration: 0.0,
            current_time: 0.0,
            is_playing: false,
            volume: 1.0,
            muted: false,
            is_loaded: false,
        }
    }
}

impl VideoPlayback {
    pub fn with_duration(duration: f32) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video(VideoPlayback),
}

/// An image or video positioned on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedElement {
    pub id: ElementId,
    /// `data:` URL or remote URL.
    pub src: String,
    /// Canvas-space position of the top-left corner.
    pub position: Vec2,
    pub size: Vec2,
    /// Degrees, clockwise, around `position`.
    pub rotation: f32,
    pub crop: Option<CropRect>,
    pub kind: MediaKind,
    pub flags: ElementFlags,
}

impl PlacedElement {
    pub fn image(id: ElementId, src: impl Into<String>, position: Vec2, size: Vec2) -> Self {
        Self {
            id,
            src: src.into(),
            position,
            size,
            rotation: 0.0,
            crop: None,
            kind: MediaKind::Image,
            flags: ElementFlags::empty(),
        }
    }

    pub fn video(
        id: ElementId,
        src: impl Into<String>,
        position: Vec2,
        size: Vec2,
        duration: f32,
    ) -> Self {
        Self {
            kind: MediaKind::Video(VideoPlayback::with_duration(duration)),
            ..Self::image(id, src, position, size)
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, MediaKind::Video(_))
    }

    pub fn playback(&self) -> Option<&VideoPlayback> {
        match &self.kind {
            MediaKind::Video(p) => Some(p),
            MediaKind::Image => None,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.flags.contains(ElementFlags::SELECTED)
    }

    pub fn bounds(&self) -> Rect {
        rotated_bounds(self.position, self.size, self.rotation)
    }

    pub fn with_src(&self, src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..self.clone()
        }
    }

    pub fn with_position(&self, position: Vec2) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn with_flags(&self, flags: ElementFlags) -> Self {
        Self {
            flags,
            ..self.clone()
        }
    }

    pub fn with_crop(&self, crop: Option<CropRect>) -> Result<Self, CanvasError> {
        if let Some(c) = crop
            && !c.is_valid()
        {
            return Err(CanvasError::InvalidCrop {
                x: c.x,
                y: c.y,
                width: c.width,
                height: c.height,
            });
        }
        Ok(Self {
            crop,
            ..self.clone()
        })
    }

    /// Returns a copy with new playback attributes. Images are returned unchanged.
    pub fn with_playback(&self, playback: VideoPlayback) -> Self {
        match self.kind {
            MediaKind::Video(_) => Self {
                kind: MediaKind::Video(playback),
                ..self.clone()
            },
            MediaKind::Image => self.clone(),
        }
    }
}

/// The set of placed elements and their stacking order.
#[derive(Clone, Debug)]
pub struct SceneGraph {
    elements: SlotMap<ElementKey, PlacedElement>,
    /// Lower index = further back.
    draw_order: Vec<ElementKey>,
    id_index: HashMap<ElementId, ElementKey>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            elements: SlotMap::with_key(),
            draw_order: Vec::new(),
            id_index: HashMap::new(),
        }
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from elements given back-to-front.
    pub fn from_elements(
        elements: impl IntoIterator<Item = PlacedElement>,
    ) -> Result<Self, CanvasError> {
        let mut graph = Self::default();
        for element in elements {
            graph.insert(element)?;
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.draw_order.clear();
        self.id_index.clear();
    }

    /// Adds an element on top of the stack.
    pub fn insert(&mut self, element: PlacedElement) -> Result<ElementKey, CanvasError> {
        if self.id_index.contains_key(&element.id) {
            return Err(CanvasError::DuplicateId(element.id));
        }
        let id = element.id.clone();
        let key = self.elements.insert(element);
        self.draw_order.push(key);
        self.id_index.insert(id, key);
        Ok(key)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn get(&self, id: &ElementId) -> Option<&PlacedElement> {
        self.id_index.get(id).and_then(|k| self.elements.get(*k))
    }

    /// Replaces an element with the value produced by `f`.
    ///
    /// The id is pinned: whatever `f` returns keeps the original id.
    pub fn update<F>(&mut self, id: &ElementId, f: F) -> Result<(), CanvasError>
    where
        F: FnOnce(&PlacedElement) -> PlacedElement,
    {
        let key = *self
            .id_index
            .get(id)
            .ok_or_else(|| CanvasError::UnknownElement(id.clone()))?;
        let slot = &mut self.elements[key];
        let mut next = f(slot);
        next.id = id.clone();
        *slot = next;
        Ok(())
    }

    /// Fallible variant of [`SceneGraph::update`].
    pub fn try_update<F>(&mut self, id: &ElementId, f: F) -> Result<(), CanvasError>
    where
        F: FnOnce(&PlacedElement) -> Result<PlacedElement, CanvasError>,
    {
        let current = self
            .get(id)
            .ok_or_else(|| CanvasError::UnknownElement(id.clone()))?;
        let next = f(current)?;
        self.update(id, |_| next)
    }

    pub fn remove(&mut self, id: &ElementId) -> Option<PlacedElement> {
        let key = self.id_index.remove(id)?;
        self.draw_order.retain(|k| *k != key);
        self.elements.remove(key)
    }

    /// Iterates elements back-to-front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PlacedElement> + '_ {
        self.draw_order.iter().filter_map(|k| self.elements.get(*k))
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.iter().map(|e| e.id.clone()).collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &PlacedElement> + '_ {
        self.iter().filter(|e| !e.is_video())
    }

    pub fn videos(&self) -> impl Iterator<Item = &PlacedElement> + '_ {
        self.iter().filter(|e| e.is_video())
    }

    /// Position in the stack, 0 = back.
    pub fn z_index(&self, id: &ElementId) -> Option<usize> {
        let key = self.id_index.get(id)?;
        self.draw_order.iter().position(|k| k == key)
    }

    // --- Selection ---

    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.iter()
            .filter(|e| e.is_selected())
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn is_selected(&self, id: &ElementId) -> bool {
        self.get(id).is_some_and(|e| e.is_selected())
    }

    /// Sets the selection to exactly `ids`. Unknown ids are ignored.
    pub fn select_ids(&mut self, ids: &[ElementId]) {
        let wanted: HashSet<&ElementId> = ids.iter().collect();
        for key in self.draw_order.clone() {
            let element = &self.elements[key];
            let selected = wanted.contains(&element.id);
            if element.is_selected() != selected {
                let mut flags = element.flags;
                flags.set(ElementFlags::SELECTED, selected);
                let next = element.with_flags(flags);
                self.elements[key] = next;
            }
        }
    }

    pub fn select_only(&mut self, id: &ElementId) {
        self.select_ids(std::slice::from_ref(id));
    }

    pub fn toggle_selection(&mut self, id: &ElementId) {
        let _ = self.update(id, |e| {
            let mut flags = e.flags;
            flags.toggle(ElementFlags::SELECTED);
            e.with_flags(flags)
        });
    }

    pub fn add_to_selection(&mut self, ids: &[ElementId]) {
        let mut current = self.selected_ids();
        current.extend(ids.iter().cloned());
        self.select_ids(&current);
    }

    pub fn select_all(&mut self) {
        let all = self.ids();
        self.select_ids(&all);
    }

    pub fn clear_selection(&mut self) {
        self.select_ids(&[]);
    }

    /// Removes every selected element and returns them.
    pub fn remove_selected(&mut self) -> Vec<PlacedElement> {
        self.selected_ids()
            .iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Copies the selected elements, offset by `offset`, on top of the stack.
    ///
    /// Copies are not selected and never inherit the generating state. A copy
    /// id already on the canvas gets a numeric suffix.
    pub fn duplicate_selected(&mut self, offset: Vec2, stamp_ms: i64) -> Vec<ElementId> {
        let copies: Vec<PlacedElement> = self
            .iter()
            .filter(|e| e.is_selected())
            .map(|e| {
                let mut flags = e.flags;
                flags.remove(ElementFlags::SELECTED | ElementFlags::GENERATING);
                let base = e.id.copy_of(stamp_ms);
                let mut id = base.clone();
                let mut n = 1;
                while self.contains(&id) {
                    id = ElementId::new(format!("{}-{n}", base.as_str()));
                    n += 1;
                }
                PlacedElement {
                    id,
                    position: e.position + offset,
                    flags,
                    ..e.clone()
                }
            })
            .collect();

        let mut created = Vec::with_capacity(copies.len());
        for copy in copies {
            let id = copy.id.clone();
            match self.insert(copy) {
                Ok(_) => created.push(id),
                Err(e) => tracing::warn!(element_id = %id, error = %e, "Skipping duplicate"),
            }
        }
        created
    }

    // --- Layer order ---

    pub fn bring_to_front(&mut self, id: &ElementId) -> bool {
        self.move_in_stack(id, |_, len| len - 1)
    }

    pub fn send_to_back(&mut self, id: &ElementId) -> bool {
        self.move_in_stack(id, |_, _| 0)
    }

    pub fn bring_forward(&mut self, id: &ElementId) -> bool {
        self.move_in_stack(id, |idx, len| (idx + 1).min(len - 1))
    }

    pub fn send_backward(&mut self, id: &ElementId) -> bool {
        self.move_in_stack(id, |idx, _| idx.saturating_sub(1))
    }

    fn move_in_stack(&mut self, id: &ElementId, target: impl Fn(usize, usize) -> usize) -> bool {
        let Some(idx) = self.z_index(id) else {
            return false;
        };
        let to = target(idx, self.draw_order.len());
        if to == idx {
            return false;
        }
        let key = self.draw_order.remove(idx);
        self.draw_order.insert(to, key);
        true
    }

    // --- Spatial queries ---

    /// Topmost element whose bounding box contains `point`.
    pub fn hit_test(&self, point: Vec2) -> Option<&PlacedElement> {
        self.iter().rev().find(|e| e.bounds().contains(point))
    }

    /// Elements whose bounding boxes overlap `rect`, back-to-front.
    pub fn elements_in_rect(&self, rect: &Rect) -> Vec<ElementId> {
        self.iter()
            .filter(|e| e.bounds().intersects(rect))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Union of all element bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.iter()
            .map(|e| e.bounds())
            .reduce(|acc, b| acc.union(&b))
    }
}
