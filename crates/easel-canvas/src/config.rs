//! # Configuration
//!
//! This module defines the configuration struct for the Canvas.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tuning parameters for the canvas.
///
/// Every field has a default, so partial configs deserialize cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Zoom change per scroll unit. Default: 0.1.
    pub zoom_speed: f32,
    /// Zoom change per zoom-control click. Default: 0.2.
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Longest side of a newly placed element, in canvas units. Default: 300.
    pub max_placement_size: f32,
    /// Offset applied to duplicated elements. Default: 20.
    pub duplicate_offset: f32,
    /// Gap between a source element and a generation placed beside it. Default: 20.
    pub placement_gap: f32,
    /// Number of undo steps kept. Default: 50.
    pub history_limit: usize,
    /// Size of the drawing surface until the host reports one. Default: 1200x800.
    pub default_canvas_size: Vec2,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            zoom_speed: 0.1,
            zoom_step: 0.2,
            min_zoom: 0.1,
            max_zoom: 10.0,
            max_placement_size: 300.0,
            duplicate_offset: 20.0,
            placement_gap: 20.0,
            history_limit: 50,
            default_canvas_size: Vec2::new(1200.0, 800.0),
        }
    }
}
