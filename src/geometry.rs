//! Pixel-space geometry: metre/pixel conversion and bounding rectangles.
//!
//! Positions are continuous metres; collision and terrain sampling happen in
//! integer pixel space at 100 px per metre.

use serde::{Deserialize, Serialize};

/// Fixed conversion factor between metres and pixels.
pub const PIXELS_PER_METER: f32 = 100.0;

/// Convert a metre coordinate to its pixel coordinate (floor).
#[inline]
pub fn meters_to_pixel(m: f32) -> i32 {
    (m * PIXELS_PER_METER).floor() as i32
}

/// Convert a pixel coordinate back to metres.
#[inline]
pub fn pixel_to_meters(px: i32) -> f32 {
    px as f32 / PIXELS_PER_METER
}

/// Movement axis for oscillating entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Axis-aligned rectangle in pixel space.
///
/// `w` and `h` are sprite dimensions: the box covers pixel columns
/// `x ..= x + w - 1` and rows `y ..= y + h - 1`. Overlap tests are
/// edge-inclusive, so two boxes that merely touch count as overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Edge-inclusive intersection test.
    pub fn overlaps(&self, other: &PixelRect) -> bool {
        if self.w <= 0 || self.h <= 0 || other.w <= 0 || other.h <= 0 {
            return false;
        }
        self.x <= other.x + other.w
            && other.x <= self.x + self.w
            && self.y <= other.y + other.h
            && other.y <= self.y + self.h
    }

    /// Last pixel column covered by this rectangle.
    pub fn right(&self) -> i32 {
        self.x + self.w - 1
    }

    /// Last pixel row covered by this rectangle.
    pub fn top(&self) -> i32 {
        self.y + self.h - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metre_to_pixel_floors() {
        assert_eq!(meters_to_pixel(1.0), 100);
        assert_eq!(meters_to_pixel(1.999), 199);
        assert_eq!(meters_to_pixel(0.0), 0);
        assert_eq!(meters_to_pixel(-0.01), -1);
    }

    #[test]
    fn touching_boxes_overlap() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(10, 0, 10, 10);
        assert!(a.overlaps(&b));
        let c = PixelRect::new(11, 0, 10, 10);
        assert!(!a.overlaps(&c));
        let d = PixelRect::new(5, 5, 10, 10);
        assert!(a.overlaps(&d));
    }

    #[test]
    fn degenerate_boxes_never_overlap() {
        let a = PixelRect::new(0, 0, 0, 10);
        let b = PixelRect::new(0, 0, 10, 10);
        assert!(!a.overlaps(&b));
    }
}
