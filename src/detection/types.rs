// src/detection/types.rs

use anyhow::Result;
use opencv::{
    core::{Mat, Point, Point2d, Rect},
    prelude::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Crop,
    Weed,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Crop => "CROP",
            Species::Weed => "WEED",
        }
    }
}

/// One detected plant blob.
///
/// `mask` covers exactly `bounding_box`, which is always clipped to the frame,
/// and `center` lies inside `bounding_box`.
#[derive(Debug, Clone)]
pub struct Plant {
    pub bounding_box: Rect,
    /// Top-left corner of `bounding_box`.
    pub position: Point,
    pub center: Point2d,
    /// CV_8UC1, non-zero on plant pixels.
    pub mask: Mat,
    pub species: Species,
    pub area: f64,
    pub score: f64,
}

impl Plant {
    /// Whether the mask pixel at mask-local coordinates is set.
    /// Coordinates outside the mask are never set.
    pub fn mask_at(&self, local: Point) -> Result<bool> {
        if local.x < 0 || local.y < 0 || local.x >= self.mask.cols() || local.y >= self.mask.rows()
        {
            return Ok(false);
        }
        Ok(*self.mask.at_2d::<u8>(local.y, local.x)? != 0)
    }

    /// Frame point translated into mask-local coordinates.
    pub fn to_local(&self, point: Point) -> Point {
        Point::new(point.x - self.position.x, point.y - self.position.y)
    }
}
