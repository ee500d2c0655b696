//! Axis-aligned bounds and the geometry capability boundary.
//!
//! The rule engine never inspects shape internals - it asks a
//! [`GeometryProvider`] for bounds, so shape plugins with custom geometry
//! (rotated text, paths) can supply their own implementation.

use serde::{Deserialize, Serialize};

use crate::shapes::Shape;

/// Axis-aligned bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when `other` lies entirely inside these bounds
    pub fn contains(&self, other: &Bounds) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Gap between two rectangles: zero when they touch or overlap
    pub fn gap_to(&self, other: &Bounds) -> f64 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.bottom())
            .max(self.y - other.bottom())
            .max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Overlap predicate a relationship rule tests between parent and child
/// bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OverlapCondition {
    /// Parent bounds fully contain the child bounds
    Contains,
    /// Any overlap between the two bounds
    Intersects,
    /// Bounds within the given gap of each other
    Near(f64),
}

impl OverlapCondition {
    pub fn matches(&self, parent: &Bounds, child: &Bounds) -> bool {
        match self {
            OverlapCondition::Contains => parent.contains(child),
            OverlapCondition::Intersects => parent.intersects(child),
            OverlapCondition::Near(gap) => parent.gap_to(child) <= *gap,
        }
    }
}

/// Geometry capability supplied by the shape-plugin layer
pub trait GeometryProvider {
    fn bounds(&self, shape: &Shape) -> Bounds;

    fn hit_test(&self, shape: &Shape, x: f64, y: f64) -> bool {
        self.bounds(shape).contains_point(x, y)
    }
}

/// Default provider: bounds straight from the shape's x/y/width/height.
/// Rotation is ignored; plugins that need rotated bounds supply their own
/// provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicGeometry;

impl GeometryProvider for BasicGeometry {
    fn bounds(&self, shape: &Shape) -> Bounds {
        Bounds::new(shape.x, shape.y, shape.width, shape.height)
    }
}
