//! # Viewport System
//!
//! This module handles the "infinite canvas" mathematics.
//! It transforms between Canvas Space (where elements live) and Screen Space
//! (pixels of the host's drawing surface).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::math::Rect;

/// Pan/zoom transform applied to the whole canvas.
///
/// `Screen = Canvas * scale + (x, y)`. `scale` is always positive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self { x, y, scale }
    }

    pub fn pan(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn with_pan(&self, pan: Vec2) -> Self {
        Self {
            x: pan.x,
            y: pan.y,
            scale: self.scale,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.scale.is_finite() && self.scale > 0.0
    }

    /// Returns `self` if valid, otherwise the identity viewport.
    pub fn sanitized(self) -> Self {
        if self.is_valid() { self } else { Self::default() }
    }
}

/// The viewport combined with the size of the host's drawing surface.
/// It serves as the single source of truth for coordinate conversions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    pub viewport: Viewport,
    /// Size of the visible area in pixels.
    pub canvas_size: Vec2,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl View {
    pub fn new(viewport: Viewport, canvas_size: Vec2) -> Self {
        Self {
            viewport: viewport.sanitized(),
            canvas_size,
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }

    /// Sets the zoom range. Swapped limits are reordered; non-positive or
    /// non-finite limits fall back to the defaults.
    pub fn with_zoom_limits(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        let usable = |z: f32| z.is_finite() && z > 0.0;
        if usable(min_zoom) && usable(max_zoom) {
            self.min_zoom = min_zoom.min(max_zoom);
            self.max_zoom = min_zoom.max(max_zoom);
        } else {
            tracing::warn!(min_zoom, max_zoom, "Ignoring invalid zoom limits");
        }
        self
    }

    /// Formula: `Screen = (Canvas * scale) + pan`
    pub fn canvas_to_screen(&self, canvas_pos: Vec2) -> Vec2 {
        canvas_pos * self.viewport.scale + self.viewport.pan()
    }

    /// Formula: `Canvas = (Screen - pan) / scale`
    pub fn screen_to_canvas(&self, screen_pos: Vec2) -> Vec2 {
        (screen_pos - self.viewport.pan()) / self.viewport.scale
    }

    /// Canvas-space point currently at the centre of the screen.
    pub fn center_in_canvas(&self) -> Vec2 {
        self.screen_to_canvas(self.canvas_size * 0.5)
    }

    /// Canvas-space rectangle currently visible.
    pub fn visible_rect(&self) -> Rect {
        Rect::from_corners(
            self.screen_to_canvas(Vec2::ZERO),
            self.screen_to_canvas(self.canvas_size),
        )
    }

    /// Multiplies the scale by `factor`, keeping the canvas point under `screen_point` fixed.
    ///
    /// Returns false when the clamped scale did not change.
    pub fn zoom_at(&mut self, screen_point: Vec2, factor: f32) -> bool {
        let old = self.viewport.scale;
        let new = (old * factor).clamp(self.min_zoom, self.max_zoom);
        if !new.is_finite() || (new - old).abs() <= f32::EPSILON {
            return false;
        }

        let anchor = self.screen_to_canvas(screen_point);
        // Screen = Canvas * scale + pan  =>  pan = Screen - Canvas * scale
        let pan = screen_point - anchor * new;
        self.viewport = Viewport::new(pan.x, pan.y, new);
        true
    }

    pub fn zoom_in(&mut self, step: f32) -> bool {
        self.zoom_at(self.canvas_size * 0.5, 1.0 + step)
    }

    pub fn zoom_out(&mut self, step: f32) -> bool {
        self.zoom_at(self.canvas_size * 0.5, 1.0 / (1.0 + step))
    }

    pub fn reset(&mut self) {
        self.viewport = Viewport::default();
    }

    /// Pans and zooms so that `bounds` fills the screen with `padding` pixels of margin.
    pub fn fit_to(&mut self, bounds: Rect, padding: f32) {
        let size = bounds.size();
        let avail = (self.canvas_size - Vec2::splat(padding * 2.0)).max(Vec2::ONE);
        if size.x <= 0.0 || size.y <= 0.0 {
            return;
        }
        let scale = (avail.x / size.x)
            .min(avail.y / size.y)
            .clamp(self.min_zoom, self.max_zoom);
        let pan = self.canvas_size * 0.5 - bounds.center() * scale;
        self.viewport = Viewport::new(pan.x, pan.y, scale);
    }
}
