use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Builds a rectangle from two arbitrary corners (e.g. a marquee drag).
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Bounding box of a rectangle rotated by `rotation_deg` around its top-left corner.
///
/// Elements rotate around their origin (`position`), matching how the host
/// renderer applies the transform.
pub fn rotated_bounds(position: Vec2, size: Vec2, rotation_deg: f32) -> Rect {
    if rotation_deg.rem_euclid(360.0) == 0.0 {
        return Rect::new(position, size);
    }

    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let rotate = |v: Vec2| Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos);

    let corners = [
        Vec2::ZERO,
        rotate(Vec2::new(size.x, 0.0)),
        rotate(size),
        rotate(Vec2::new(0.0, size.y)),
    ];

    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    for c in corners {
        min = min.min(c);
        max = max.max(c);
    }

    Rect {
        min: position + min,
        max: position + max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let r = Rect::from_corners(Vec2::new(10.0, 50.0), Vec2::new(0.0, 20.0));
        assert_eq!(r.min, Vec2::new(0.0, 20.0));
        assert_eq!(r.max, Vec2::new(10.0, 50.0));
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let r = rotated_bounds(Vec2::ZERO, Vec2::new(100.0, 50.0), 90.0);
        assert!((r.size().x - 50.0).abs() < 1e-3);
        assert!((r.size().y - 100.0).abs() < 1e-3);
        // Rotating clockwise around the origin pushes the box to negative x.
        assert!((r.min.x + 50.0).abs() < 1e-3);
    }
}
