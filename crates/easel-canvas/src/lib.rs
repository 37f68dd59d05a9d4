//! # Easel Canvas
//!
//! `easel_canvas` is the headless, synchronous half of the Easel editor.
//! It owns the state and mathematics of an infinite media canvas and leaves
//! painting to the host application.
//!
//! ## Core Architecture
//! - **Model (`src/model.rs`)**: Placed images/videos in a flat arena (SlotMap) with a draw order.
//! - **History (`src/history.rs`)**: Bounded undo/redo log of full snapshots.
//! - **View (`src/view.rs`)**: Pan/zoom transform (Canvas <-> Screen).
//! - **Interaction (`src/interaction.rs`)**: Pointer/keyboard state machine (pan, drag, marquee, crop).
//! - **Persistence (`src/persistence.rs`)**: Conversion to and from the durable storage form.

pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod interaction;
pub mod math;
pub mod model;
pub mod persistence;
pub mod placement;
pub mod view;

use glam::Vec2;
use input::InputState;
use model::{ElementId, SceneGraph};
use view::{View, Viewport};

pub use config::CanvasConfig;
pub use error::CanvasError;
pub use interaction::{InteractionMode, LogicEvent, SelectionBox};

/// The transient editor state around a scene: viewport, pointer mode and configuration.
///
/// Instantiate once per editor surface and feed it input with [`Canvas::update`].
pub struct Canvas {
    pub config: CanvasConfig,
    pub view: View,
    pub interaction_mode: InteractionMode,
}

impl Canvas {
    pub fn new(config: CanvasConfig) -> Self {
        let view = View::new(Viewport::default(), config.default_canvas_size)
            .with_zoom_limits(config.min_zoom, config.max_zoom);
        Self {
            config,
            view,
            interaction_mode: InteractionMode::Idle,
        }
    }

    /// Updates the drawing-surface size (e.g. on window resize).
    pub fn update_canvas_size(&mut self, size: Vec2) {
        self.view.canvas_size = size;
    }

    pub fn viewport(&self) -> Viewport {
        self.view.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.view.viewport = viewport.sanitized();
    }

    /// Processes one frame of input against `scene` and returns the resulting logic events.
    pub fn update(&mut self, input: &InputState, scene: &mut SceneGraph) -> Vec<LogicEvent> {
        let mut events = Vec::new();
        interaction::handle_interactions(
            &mut self.interaction_mode,
            &mut self.view,
            &self.config,
            input,
            scene,
            &mut events,
        );
        events
    }

    /// Enters crop mode for `id`. Any other interaction is abandoned.
    pub fn begin_crop(&mut self, scene: &SceneGraph, id: &ElementId) -> Result<(), CanvasError> {
        if !scene.contains(id) {
            return Err(CanvasError::UnknownElement(id.clone()));
        }
        self.interaction_mode = InteractionMode::Cropping {
            id: id.clone(),
            drag: None,
        };
        Ok(())
    }

    /// Leaves crop mode, returning the id that was being cropped.
    pub fn end_crop(&mut self) -> Option<ElementId> {
        let id = self.interaction_mode.cropping_id().cloned();
        if id.is_some() {
            self.interaction_mode = InteractionMode::Idle;
        }
        id
    }

    pub fn selection_box(&self) -> Option<SelectionBox> {
        self.interaction_mode.selection_box()
    }
}
