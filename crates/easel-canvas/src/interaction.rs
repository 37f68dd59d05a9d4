use glam::Vec2;
use std::collections::HashMap;

use crate::config::CanvasConfig;
use crate::input::{InputState, Key};
use crate::math::Rect;
use crate::model::{CropRect, ElementFlags, ElementId, SceneGraph};
use crate::view::{View, Viewport};

/// Events emitted by the canvas logic to the host application.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicEvent {
    /// Request to delete the selected elements.
    DeleteSelection,
    /// Request to duplicate the selected elements.
    DuplicateSelection,
    Undo,
    Redo,
    /// The set of selected elements changed.
    SelectionChanged,
    /// A drag finished. `delta` is in canvas space.
    ElementsMoved { ids: Vec<ElementId>, delta: Vec2 },
    /// The crop window of an element changed during a crop drag.
    CropChanged { id: ElementId },
    /// The user left crop mode.
    CropFinished { id: ElementId },
    /// Pan or zoom changed.
    ViewportChanged,
    /// The visual state changed and the host should repaint.
    RepaintNeeded,
}

/// Transient marquee rectangle, in canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionBox {
    pub start: Vec2,
    pub end: Vec2,
    pub visible: bool,
}

impl SelectionBox {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }
}

/// The current state of user interaction.
///
/// Exactly one mode is active at a time, so panning the canvas and dragging
/// elements can never happen together.
#[derive(Clone, Debug, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    /// Panning the canvas (middle button, or Space + left button).
    Panning {
        /// Pointer position at start of drag (Screen Space).
        start_drag: Vec2,
        initial_viewport: Viewport,
    },
    /// Moving the selected elements.
    DraggingElements {
        initial_positions: HashMap<ElementId, Vec2>,
        /// Pointer position at start of drag (Canvas Space).
        start_mouse_canvas: Vec2,
        last_delta: Vec2,
    },
    /// Marquee selection.
    BoxSelecting {
        start_pos_canvas: Vec2,
        current_pos_canvas: Vec2,
        /// Selection held before the marquee started (kept when shift is down).
        base_selection: Vec<ElementId>,
    },
    /// Adjusting the crop window of one element.
    Cropping {
        id: ElementId,
        /// Active drag: pointer start (Canvas Space) and crop at drag start.
        drag: Option<(Vec2, CropRect)>,
    },
}

impl InteractionMode {
    pub fn selection_box(&self) -> Option<SelectionBox> {
        match self {
            InteractionMode::BoxSelecting {
                start_pos_canvas,
                current_pos_canvas,
                ..
            } => Some(SelectionBox {
                start: *start_pos_canvas,
                end: *current_pos_canvas,
                visible: true,
            }),
            _ => None,
        }
    }

    pub fn is_dragging_canvas(&self) -> bool {
        matches!(self, InteractionMode::Panning { .. })
    }

    pub fn is_dragging_elements(&self) -> bool {
        matches!(self, InteractionMode::DraggingElements { .. })
    }

    pub fn cropping_id(&self) -> Option<&ElementId> {
        match self {
            InteractionMode::Cropping { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Handles user interactions and updates the scene/view state.
///
/// This is the central state machine of the canvas. It processes input
/// according to the current `InteractionMode`, moves between modes, and pushes
/// `LogicEvent`s for actions the host must carry out (delete, undo, ...).
pub fn handle_interactions(
    mode: &mut InteractionMode,
    view: &mut View,
    config: &CanvasConfig,
    input: &InputState,
    scene: &mut SceneGraph,
    events: &mut Vec<LogicEvent>,
) {
    // Zooming via scroll
    if input.scroll_delta != 0.0 {
        let factor = 1.0 + input.scroll_delta * config.zoom_speed;
        if factor > 0.0 && view.zoom_at(input.mouse_pos, factor) {
            events.push(LogicEvent::ViewportChanged);
            events.push(LogicEvent::RepaintNeeded);
        }
    }

    if !input.event_consumed_by_content {
        handle_shortcuts(mode, input, scene, events);
    }

    let next_mode = match mode {
        InteractionMode::Idle => handle_idle(view, input, scene, events),
        InteractionMode::Panning {
            start_drag,
            initial_viewport,
        } => handle_panning(view, input, *start_drag, *initial_viewport, events),
        InteractionMode::DraggingElements {
            initial_positions,
            start_mouse_canvas,
            last_delta,
        } => handle_dragging_elements(
            view,
            input,
            scene,
            initial_positions,
            *start_mouse_canvas,
            last_delta,
            events,
        ),
        InteractionMode::BoxSelecting {
            start_pos_canvas,
            current_pos_canvas,
            base_selection,
        } => handle_box_selecting(
            view,
            input,
            scene,
            *start_pos_canvas,
            current_pos_canvas,
            base_selection,
            events,
        ),
        InteractionMode::Cropping { id, drag } => {
            handle_cropping(view, input, scene, id, drag, events)
        }
    };

    if let Some(new_mode) = next_mode {
        *mode = new_mode;
    }
}

fn handle_shortcuts(
    mode: &mut InteractionMode,
    input: &InputState,
    scene: &mut SceneGraph,
    events: &mut Vec<LogicEvent>,
) {
    let command = input.modifiers.command();
    for key in &input.pressed_keys {
        match key {
            Key::Delete | Key::Backspace if matches!(mode, InteractionMode::Idle) => {
                events.push(LogicEvent::DeleteSelection);
                events.push(LogicEvent::RepaintNeeded);
            }
            Key::A if command => {
                scene.select_all();
                events.push(LogicEvent::SelectionChanged);
                events.push(LogicEvent::RepaintNeeded);
            }
            Key::D if command => events.push(LogicEvent::DuplicateSelection),
            Key::Z if command && input.modifiers.shift => events.push(LogicEvent::Redo),
            Key::Z if command => events.push(LogicEvent::Undo),
            Key::Y if command => events.push(LogicEvent::Redo),
            Key::Escape | Key::Enter => {
                if let InteractionMode::Cropping { id, .. } = mode {
                    events.push(LogicEvent::CropFinished { id: id.clone() });
                    *mode = InteractionMode::Idle;
                } else if *key == Key::Escape && !scene.selected_ids().is_empty() {
                    scene.clear_selection();
                    events.push(LogicEvent::SelectionChanged);
                }
                events.push(LogicEvent::RepaintNeeded);
            }
            _ => {}
        }
    }
}

/// Handles the `Idle` state.
///
/// Transitions to:
/// - `Panning` (middle button, or Space + left button)
/// - `DraggingElements` (left button on an element)
/// - `BoxSelecting` (left button on empty space)
fn handle_idle(
    view: &View,
    input: &InputState,
    scene: &mut SceneGraph,
    events: &mut Vec<LogicEvent>,
) -> Option<InteractionMode> {
    if input.event_consumed_by_content {
        return None;
    }

    let space_pan = input.mouse_buttons.left && input.is_pressed(Key::Space);
    if input.mouse_buttons.middle || space_pan {
        return Some(InteractionMode::Panning {
            start_drag: input.mouse_pos,
            initial_viewport: view.viewport,
        });
    }

    if !input.mouse_buttons.left {
        return None;
    }

    let canvas_mouse = view.screen_to_canvas(input.mouse_pos);
    let hit = scene.hit_test(canvas_mouse).map(|e| (e.id.clone(), e.is_selected()));

    match hit {
        Some((id, already_selected)) => {
            if input.modifiers.shift {
                scene.toggle_selection(&id);
                events.push(LogicEvent::SelectionChanged);
            } else if !already_selected {
                scene.select_only(&id);
                events.push(LogicEvent::SelectionChanged);
            }
            events.push(LogicEvent::RepaintNeeded);

            let initial_positions: HashMap<ElementId, Vec2> = scene
                .iter()
                .filter(|e| e.is_selected() && !e.flags.contains(ElementFlags::LOCKED))
                .map(|e| (e.id.clone(), e.position))
                .collect();

            if initial_positions.is_empty() {
                return None;
            }

            Some(InteractionMode::DraggingElements {
                initial_positions,
                start_mouse_canvas: canvas_mouse,
                last_delta: Vec2::ZERO,
            })
        }
        None => {
            let base_selection = if input.modifiers.shift {
                scene.selected_ids()
            } else {
                if !scene.selected_ids().is_empty() {
                    scene.clear_selection();
                    events.push(LogicEvent::SelectionChanged);
                }
                Vec::new()
            };

            Some(InteractionMode::BoxSelecting {
                start_pos_canvas: canvas_mouse,
                current_pos_canvas: canvas_mouse,
                base_selection,
            })
        }
    }
}

/// Handles the `Panning` state: offsets the viewport by the pointer delta.
fn handle_panning(
    view: &mut View,
    input: &InputState,
    start_drag: Vec2,
    initial_viewport: Viewport,
    events: &mut Vec<LogicEvent>,
) -> Option<InteractionMode> {
    let held = input.mouse_buttons.middle || input.mouse_buttons.left;
    if !held {
        return Some(InteractionMode::Idle);
    }

    let delta = input.mouse_pos - start_drag;
    view.viewport = initial_viewport.with_pan(initial_viewport.pan() + delta);
    events.push(LogicEvent::ViewportChanged);
    events.push(LogicEvent::RepaintNeeded);
    None
}

/// Handles the `DraggingElements` state.
///
/// Positions are recomputed from the drag start each frame, so rounding never
/// accumulates. Each move replaces the element wholesale.
fn handle_dragging_elements(
    view: &View,
    input: &InputState,
    scene: &mut SceneGraph,
    initial_positions: &HashMap<ElementId, Vec2>,
    start_mouse_canvas: Vec2,
    last_delta: &mut Vec2,
    events: &mut Vec<LogicEvent>,
) -> Option<InteractionMode> {
    if !input.mouse_buttons.left {
        if *last_delta != Vec2::ZERO {
            let mut ids: Vec<ElementId> = initial_positions.keys().cloned().collect();
            ids.sort();
            events.push(LogicEvent::ElementsMoved {
                ids,
                delta: *last_delta,
            });
        }
        return Some(InteractionMode::Idle);
    }

    let delta = view.screen_to_canvas(input.mouse_pos) - start_mouse_canvas;
    if delta == *last_delta {
        return None;
    }

    for (id, initial) in initial_positions {
        let _ = scene.update(id, |e| e.with_position(*initial + delta));
    }
    *last_delta = delta;
    events.push(LogicEvent::RepaintNeeded);
    None
}

/// Handles the `BoxSelecting` state: live-updates the selection while the button is held.
fn handle_box_selecting(
    view: &View,
    input: &InputState,
    scene: &mut SceneGraph,
    start_pos_canvas: Vec2,
    current_pos_canvas: &mut Vec2,
    base_selection: &[ElementId],
    events: &mut Vec<LogicEvent>,
) -> Option<InteractionMode> {
    *current_pos_canvas = view.screen_to_canvas(input.mouse_pos);
    let rect = Rect::from_corners(start_pos_canvas, *current_pos_canvas);

    let mut selection = base_selection.to_vec();
    for id in scene.elements_in_rect(&rect) {
        if !selection.contains(&id) {
            selection.push(id);
        }
    }

    let mut before = scene.selected_ids();
    before.sort();
    let mut after = selection.clone();
    after.sort();
    if before != after {
        scene.select_ids(&selection);
        events.push(LogicEvent::SelectionChanged);
    }
    events.push(LogicEvent::RepaintNeeded);

    if !input.mouse_buttons.left {
        return Some(InteractionMode::Idle);
    }
    None
}

/// Handles the `Cropping` state: a left-drag slides the crop window over the media.
fn handle_cropping(
    view: &View,
    input: &InputState,
    scene: &mut SceneGraph,
    id: &ElementId,
    drag: &mut Option<(Vec2, CropRect)>,
    events: &mut Vec<LogicEvent>,
) -> Option<InteractionMode> {
    let Some(element) = scene.get(id) else {
        return Some(InteractionMode::Idle);
    };

    if input.event_consumed_by_content {
        return None;
    }

    let canvas_mouse = view.screen_to_canvas(input.mouse_pos);
    match (*drag, input.mouse_buttons.left) {
        (None, true) => {
            if element.bounds().contains(canvas_mouse) {
                *drag = Some((canvas_mouse, element.crop.unwrap_or(CropRect::FULL)));
            }
        }
        (Some((start, initial)), true) => {
            let size = element.size.max(Vec2::ONE);
            let delta = (canvas_mouse - start) / size * Vec2::new(initial.width, initial.height);
            let next = initial.translated(delta);
            if element.crop != Some(next) {
                let _ = scene.try_update(id, |e| e.with_crop(Some(next)));
                events.push(LogicEvent::CropChanged { id: id.clone() });
                events.push(LogicEvent::RepaintNeeded);
            }
        }
        (Some(_), false) => *drag = None,
        (None, false) => {}
    }
    None
}
