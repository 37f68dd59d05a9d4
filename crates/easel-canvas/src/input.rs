//! # Input Protocol
//!
//! Input state the host passes to the canvas every frame (or on every pointer event).

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// State of keyboard modifiers (Shift, Ctrl, Alt, Meta).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ModifiersState {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command / Windows key.
    pub meta: bool,
}

impl ModifiersState {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// State of mouse buttons.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

/// Keyboard keys the canvas reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Enter,
    /// Held to pan with the left button.
    Space,
    A,
    D,
    Y,
    Z,
}

/// The input state for a single frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputState {
    /// Pointer position in Screen Space (pixels).
    pub mouse_pos: Vec2,
    pub mouse_buttons: MouseButtons,
    /// Vertical scroll delta this frame (positive = zoom in).
    pub scroll_delta: f32,
    pub modifiers: ModifiersState,
    /// Keys held down or pressed this frame.
    pub pressed_keys: Vec<Key>,
    /// If true, clicks and drags were consumed by host UI (e.g. video controls)
    /// and the canvas only tracks the pointer.
    pub event_consumed_by_content: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            mouse_pos: Vec2::ZERO,
            mouse_buttons: MouseButtons::default(),
            scroll_delta: 0.0,
            modifiers: ModifiersState::default(),
            pressed_keys: Vec::new(),
            event_consumed_by_content: false,
        }
    }
}

impl InputState {
    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }
}
