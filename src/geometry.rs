//! # Geometry
//!
//! Points, node boundaries and rectangles in layout space. Layout space has
//! its origin in the top-left corner of a page and y grows downward; all
//! values are PDF points.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A new point shifted right by `dx` and down by `dy`.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// The polygon enclosing a node.
///
/// A closed boundary of a laid-out node always holds four points in the
/// order top-left, top-right, bottom-right, bottom-left. Rebuilding goes
/// through `reset`, four `set_next` calls and `close`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boundary {
    points: Vec<Point>,
    closed: bool,
}

impl Boundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closed rectangular boundary.
    pub fn from_box(top_left: Point, width: f64, height: f64) -> Self {
        let mut boundary = Self::new();
        boundary.rebuild(top_left, width, height);
        boundary
    }

    pub fn reset(&mut self) -> &mut Self {
        self.points.clear();
        self.closed = false;
        self
    }

    pub fn set_next(&mut self, point: Point) -> &mut Self {
        debug_assert!(!self.closed, "boundary is closed");
        self.points.push(point);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.closed = true;
        self
    }

    /// Reset and close the boundary around a box anchored at `top_left`.
    pub fn rebuild(&mut self, top_left: Point, width: f64, height: f64) {
        self.reset()
            .set_next(top_left)
            .set_next(top_left.translate(width, 0.0))
            .set_next(top_left.translate(width, height))
            .set_next(top_left.translate(0.0, height))
            .close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Top-left corner.
    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// Bottom-right corner.
    pub fn diagonal_point(&self) -> Option<Point> {
        self.points.get(2).copied()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for point in &mut self.points {
            *point = point.translate(dx, dy);
        }
    }
}

/// An origin point combined with a size. Used for clip regions and
/// annotation areas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    origin: Point,
    width: f64,
    height: f64,
}

impl Rectangle {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    pub fn with_size(width: f64, height: f64) -> Self {
        Self::new(Point::ORIGIN, width, height)
    }

    /// The rectangle spanned by two opposite corners.
    pub fn from_corners(first: Point, diagonal: Point) -> Self {
        let x = first.x.min(diagonal.x);
        let y = first.y.min(diagonal.y);
        Self::new(
            Point::new(x, y),
            (diagonal.x - first.x).abs(),
            (diagonal.y - first.y).abs(),
        )
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn far_corner(&self) -> Point {
        self.origin.translate(self.width, self.height)
    }

    pub fn middle(&self) -> Point {
        self.origin.translate(self.width / 2.0, self.height / 2.0)
    }

    /// The shared area of two rectangles, or `None` when they are disjoint.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        if self.disjoint(other) {
            return None;
        }

        let near_x = self.origin.x.max(other.origin.x);
        let near_y = self.origin.y.max(other.origin.y);
        let far = self.far_corner();
        let other_far = other.far_corner();
        let far_x = far.x.min(other_far.x);
        let far_y = far.y.min(other_far.y);

        Some(Rectangle::new(
            Point::new(near_x, near_y),
            far_x - near_x,
            far_y - near_y,
        ))
    }

    fn disjoint(&self, other: &Rectangle) -> bool {
        let far = self.far_corner();
        let other_far = other.far_corner();
        // Touching edges enclose no area.
        other.origin.x >= far.x
            || other.origin.y >= far.y
            || other_far.x <= self.origin.x
            || other_far.y <= self.origin.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_keeps_corner_order() {
        let boundary = Boundary::from_box(Point::new(10.0, 20.0), 100.0, 50.0);
        assert!(boundary.is_closed());
        assert_eq!(
            boundary.points(),
            &[
                Point::new(10.0, 20.0),
                Point::new(110.0, 20.0),
                Point::new(110.0, 70.0),
                Point::new(10.0, 70.0),
            ]
        );
        assert_eq!(boundary.diagonal_point(), Some(Point::new(110.0, 70.0)));
    }

    #[test]
    fn boundary_rebuild_after_reset() {
        let mut boundary = Boundary::from_box(Point::ORIGIN, 10.0, 10.0);
        boundary.rebuild(Point::new(5.0, 5.0), 20.0, 30.0);
        assert_eq!(boundary.points().len(), 4);
        assert_eq!(boundary.first_point(), Some(Point::new(5.0, 5.0)));
        assert_eq!(boundary.points()[3], Point::new(5.0, 35.0));
    }

    #[test]
    fn boundary_translate_moves_every_point() {
        let mut boundary = Boundary::from_box(Point::ORIGIN, 10.0, 10.0);
        boundary.translate(3.0, -2.0);
        assert_eq!(boundary.first_point(), Some(Point::new(3.0, -2.0)));
        assert_eq!(boundary.diagonal_point(), Some(Point::new(13.0, 8.0)));
    }

    #[test]
    fn disjoint_rectangles_have_no_intersection() {
        let a = Rectangle::new(Point::new(0.0, 0.0), 10.0, 10.0);
        let b = Rectangle::new(Point::new(20.0, 20.0), 5.0, 5.0);
        assert_eq!(a.intersection(&b), None);
        assert_eq!(b.intersection(&a), None);
    }

    #[test]
    fn overlapping_rectangles_intersect() {
        let a = Rectangle::new(Point::new(0.0, 0.0), 10.0, 10.0);
        let b = Rectangle::new(Point::new(5.0, 2.0), 10.0, 4.0);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.origin(), Point::new(5.0, 2.0));
        assert_eq!(i.far_corner(), Point::new(10.0, 6.0));
    }

    #[test]
    fn contained_rectangle_is_its_own_intersection() {
        let outer = Rectangle::with_size(100.0, 100.0);
        let inner = Rectangle::new(Point::new(10.0, 10.0), 20.0, 20.0);
        assert_eq!(outer.intersection(&inner), Some(inner));
    }
}
