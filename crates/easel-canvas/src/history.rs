use crate::model::{ElementId, PlacedElement, SceneGraph};

/// An immutable full copy of the canvas at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryState {
    pub images: Vec<PlacedElement>,
    pub videos: Vec<PlacedElement>,
    pub selected_ids: Vec<ElementId>,
    /// Stacking order across images and videos, back-to-front.
    pub draw_order: Vec<ElementId>,
}

impl HistoryState {
    pub fn capture(scene: &SceneGraph) -> Self {
        Self {
            images: scene.images().cloned().collect(),
            videos: scene.videos().cloned().collect(),
            selected_ids: scene.selected_ids(),
            draw_order: scene.ids(),
        }
    }

    /// Rebuilds a scene graph from this snapshot.
    ///
    /// `selected_ids` is authoritative for the selection flags.
    pub fn restore(&self) -> SceneGraph {
        let mut by_id: std::collections::HashMap<&ElementId, &PlacedElement> = self
            .images
            .iter()
            .chain(self.videos.iter())
            .map(|e| (&e.id, e))
            .collect();

        let mut scene = SceneGraph::new();
        for id in &self.draw_order {
            if let Some(element) = by_id.remove(id) {
                let _ = scene.insert(element.clone());
            }
        }
        // Anything missing from the order list goes on top.
        for element in self.images.iter().chain(self.videos.iter()) {
            if by_id.remove(&element.id).is_some() {
                let _ = scene.insert(element.clone());
            }
        }
        scene.select_ids(&self.selected_ids);
        scene
    }
}

/// Bounded, linear undo/redo log of full scene snapshots.
///
/// Snapshots are recorded *after* each change, so the entry under the pointer
/// always mirrors the live canvas. Undo steps the pointer back and hands out
/// the earlier snapshot; recording while not at the end discards the redo
/// branch.
pub struct HistoryManager {
    entries: Vec<HistoryState>,
    /// Index of the current entry; -1 when empty.
    pointer: isize,
    pub max_entries: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries),
            pointer: -1,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pointer(&self) -> isize {
        self.pointer
    }

    pub fn current(&self) -> Option<&HistoryState> {
        usize::try_from(self.pointer)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.entries.len() as isize
    }

    /// Appends a snapshot, dropping any redo entries and the oldest entries past the limit.
    pub fn record(&mut self, state: HistoryState) {
        let keep = (self.pointer + 1).max(0) as usize;
        self.entries.truncate(keep);
        self.entries.push(state);

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        self.pointer = self.entries.len() as isize - 1;

        tracing::debug!(
            depth = self.entries.len(),
            pointer = self.pointer,
            "History entry recorded"
        );
    }

    /// Steps back one entry. No-op at the first entry.
    pub fn undo(&mut self) -> Option<&HistoryState> {
        if !self.can_undo() {
            return None;
        }
        self.pointer -= 1;
        tracing::debug!(pointer = self.pointer, "Undo");
        self.current()
    }

    /// Steps forward one entry. No-op at the last entry.
    pub fn redo(&mut self) -> Option<&HistoryState> {
        if !self.can_redo() {
            return None;
        }
        self.pointer += 1;
        tracing::debug!(pointer = self.pointer, "Redo");
        self.current()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = -1;
    }
}
