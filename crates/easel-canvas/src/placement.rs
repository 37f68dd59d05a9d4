//! Sizing and positioning of newly created elements.

use glam::Vec2;

use crate::model::PlacedElement;
use crate::view::View;

/// Scales `natural` so the longer side equals `max_size`, preserving aspect ratio.
///
/// Returns `None` for degenerate media (zero or non-finite dimensions).
pub fn fit_within(natural: Vec2, max_size: f32) -> Option<Vec2> {
    if !(natural.x > 0.0 && natural.y > 0.0) || !natural.is_finite() {
        return None;
    }
    let aspect = natural.x / natural.y;
    let mut width = max_size;
    let mut height = max_size / aspect;
    if height > max_size {
        height = max_size;
        width = max_size * aspect;
    }
    Some(Vec2::new(width, height))
}

/// Top-left position that centres an element of `size` in the visible area.
pub fn centered_in_view(size: Vec2, view: &View) -> Vec2 {
    view.center_in_canvas() - size * 0.5
}

/// Top-left position directly to the right of `source`, top-aligned.
pub fn beside(source: &PlacedElement, gap: f32) -> Vec2 {
    source.position + Vec2::new(source.size.x + gap, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_width_bound() {
        assert_eq!(
            fit_within(Vec2::new(800.0, 400.0), 300.0),
            Some(Vec2::new(300.0, 150.0))
        );
    }

    #[test]
    fn portrait_is_height_bound() {
        assert_eq!(
            fit_within(Vec2::new(400.0, 800.0), 300.0),
            Some(Vec2::new(150.0, 300.0))
        );
    }

    #[test]
    fn degenerate_sizes_are_rejected() {
        assert_eq!(fit_within(Vec2::new(0.0, 10.0), 300.0), None);
        assert_eq!(fit_within(Vec2::new(10.0, f32::NAN), 300.0), None);
    }
}
