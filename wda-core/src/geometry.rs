//! Screen geometry primitives.
//!
//! All rectangles are edge-based (`left`/`top`/`right`/`bottom`) in
//! virtual-screen coordinates, matching the Win32 `RECT` convention.
//! Logical coordinates are DPI-scaled; physical coordinates are raw pixels.

use serde::Serialize;
use windows::Win32::Foundation::{POINT, RECT};

/// A point in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<POINT> for Point {
    fn from(p: POINT) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<Point> for POINT {
    fn from(p: Point) -> Self {
        POINT { x: p.x, y: p.y }
    }
}

/// An edge-based rectangle in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.left + self.width() / 2,
            y: self.top + self.height() / 2,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// The overlapping region of two rectangles, or `None` when disjoint.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Area of overlap with `other`, in square units.
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        self.intersect(other)
            .map(|r| r.width() as i64 * r.height() as i64)
            .unwrap_or(0)
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    /// Scale a physical-pixel rectangle down to logical units.
    pub fn to_logical(&self, scale: f64) -> Rect {
        if scale <= 0.0 || (scale - 1.0).abs() < f64::EPSILON {
            return *self;
        }
        Rect {
            left: (self.left as f64 / scale).round() as i32,
            top: (self.top as f64 / scale).round() as i32,
            right: (self.right as f64 / scale).round() as i32,
            bottom: (self.bottom as f64 / scale).round() as i32,
        }
    }

    /// Scale a logical rectangle up to physical pixels.
    pub fn to_physical(&self, scale: f64) -> Rect {
        if scale <= 0.0 || (scale - 1.0).abs() < f64::EPSILON {
            return *self;
        }
        Rect {
            left: (self.left as f64 * scale).round() as i32,
            top: (self.top as f64 * scale).round() as i32,
            right: (self.right as f64 * scale).round() as i32,
            bottom: (self.bottom as f64 * scale).round() as i32,
        }
    }
}

impl From<RECT> for Rect {
    fn from(r: RECT) -> Self {
        Self {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}

impl From<Rect> for RECT {
    fn from(r: Rect) -> Self {
        RECT {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_height_center() {
        let r = Rect::new(10, 20, 110, 70);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
        assert_eq!(r.center(), Point::new(60, 45));
    }

    #[test]
    fn negative_origin_rect_is_valid() {
        // The virtual screen may begin left of the primary monitor.
        let r = Rect::new(-1920, 0, 0, 1080);
        assert_eq!(r.width(), 1920);
        assert!(r.contains(Point::new(-960, 540)));
        assert!(!r.contains(Point::new(0, 540)));
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(200, 200, 300, 300);
        assert!(a.intersect(&b).is_none());
        assert_eq!(a.intersection_area(&b), 0);
    }

    #[test]
    fn intersect_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 150, 150);
        let i = a.intersect(&b).unwrap();
        assert_eq!(i, Rect::new(50, 50, 100, 100));
        assert_eq!(a.intersection_area(&b), 2_500);
    }

    #[test]
    fn logical_physical_round_trip_at_150_percent() {
        let physical = Rect::new(0, 0, 3840, 2160);
        let logical = physical.to_logical(1.5);
        assert_eq!(logical, Rect::new(0, 0, 2560, 1440));
        assert_eq!(logical.to_physical(1.5), physical);
    }

    #[test]
    fn unit_scale_is_identity() {
        let r = Rect::new(5, 7, 11, 13);
        assert_eq!(r.to_logical(1.0), r);
        assert_eq!(r.to_physical(1.0), r);
    }

    #[test]
    fn from_origin_size() {
        let r = Rect::from_origin_size(10, 20, 300, 200);
        assert_eq!(r.right, 310);
        assert_eq!(r.bottom, 220);
    }
}
