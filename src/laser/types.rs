// src/laser/types.rs

use crate::detection::Species;
use opencv::core::{Point, Point2d, Vec4i};
use std::f64::consts::PI;

/// Estimated ground position of the laser, in frame pixels.
pub type AimPoint = Point;

// ============================================================================
// SEGMENTS & LINES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl LineSegment {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Direction angle in radians, folded into [0, π).
    pub fn direction(&self) -> f64 {
        let angle = ((self.y1 - self.y0) as f64).atan2((self.x1 - self.x0) as f64);
        angle.rem_euclid(PI)
    }

    /// Smallest angle between the two (undirected) segment directions, in [0, π/2].
    pub fn angle_to(&self, other: &LineSegment) -> f64 {
        let diff = (self.direction() - other.direction()).abs();
        diff.min(PI - diff)
    }

    /// Implicit form `a·x + b·y + c = 0` of the supporting line.
    pub fn equation(&self) -> LineEquation {
        let (x1, y1, x2, y2) = (
            self.x0 as f64,
            self.y0 as f64,
            self.x1 as f64,
            self.y1 as f64,
        );
        LineEquation {
            a: y2 - y1,
            b: x1 - x2,
            c: y1 * (x2 - x1) - (y2 - y1) * x1,
        }
    }
}

impl From<Vec4i> for LineSegment {
    fn from(v: Vec4i) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LineEquation {
    /// Solve `[a1 b1; a2 b2]·[x y]ᵀ = [-c1 -c2]ᵀ`. `None` for (near-)parallel lines.
    pub fn intersect(&self, other: &LineEquation) -> Option<Point2d> {
        let det = self.a * other.b - other.a * self.b;
        if det.abs() < 1e-9 {
            return None;
        }
        let x = (self.b * other.c - other.b * self.c) / det;
        let y = (other.a * self.c - self.a * other.c) / det;
        Some(Point2d::new(x, y))
    }
}

// ============================================================================
// BEHAVIOR
// ============================================================================

/// Where the laser currently lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaserBehavior {
    /// No laser line intersection in the frame.
    NotDetected,
    OnWeed,
    OnCrop,
    /// Aim point exists but hits no plant.
    OnNothing,
}

impl LaserBehavior {
    pub fn label(&self) -> &'static str {
        match self {
            LaserBehavior::NotDetected => "not detected",
            LaserBehavior::OnWeed => "on weed",
            LaserBehavior::OnCrop => "on crop",
            LaserBehavior::OnNothing => "on ground",
        }
    }

    pub fn is_on_plant(&self) -> bool {
        matches!(self, LaserBehavior::OnWeed | LaserBehavior::OnCrop)
    }
}

impl From<Species> for LaserBehavior {
    fn from(species: Species) -> Self {
        match species {
            Species::Crop => LaserBehavior::OnCrop,
            Species::Weed => LaserBehavior::OnWeed,
        }
    }
}
