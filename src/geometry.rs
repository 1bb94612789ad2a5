// src/geometry.rs
//
// Integer rectangle helpers shared by the grouper, classifier and jet checker.
// All rectangles are half-open: [x, x + width) × [y, y + height).

use anyhow::Result;
use opencv::{
    core::{Mat, Point, Point2d, Rect},
    imgproc,
};

/// Intersection of two rectangles. Disjoint inputs give a zero-sized rect.
pub fn intersect(a: Rect, b: Rect) -> Rect {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.width).min(b.x + b.width);
    let y1 = (a.y + a.height).min(b.y + b.height);

    if x1 <= x0 || y1 <= y0 {
        Rect::new(x0, y0, 0, 0)
    } else {
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

pub fn overlap_area(a: Rect, b: Rect) -> i32 {
    let r = intersect(a, b);
    r.width * r.height
}

/// Clip to the frame extents.
pub fn clip_to_frame(rect: Rect, width: i32, height: i32) -> Rect {
    intersect(rect, Rect::new(0, 0, width, height))
}

pub fn contains(rect: Rect, p: Point) -> bool {
    p.x >= rect.x && p.x < rect.x + rect.width && p.y >= rect.y && p.y < rect.y + rect.height
}

pub fn center(rect: Rect) -> Point2d {
    Point2d::new(
        rect.x as f64 + rect.width as f64 / 2.0,
        rect.y as f64 + rect.height as f64 / 2.0,
    )
}

/// Shift the origin up-left by `shift` and add `margin` to both dimensions.
pub fn widen(rect: Rect, shift: i32, margin: i32) -> Rect {
    Rect::new(
        rect.x - shift,
        rect.y - shift,
        rect.width + margin,
        rect.height + margin,
    )
}

pub fn distance(a: Point2d, b: Point2d) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

pub fn frame_diagonal(width: i32, height: i32) -> f64 {
    (width as f64).hypot(height as f64)
}

/// Centroid of the set pixels of a binary mask, in frame coordinates.
///
/// `origin` is the frame position of the mask's top-left pixel. Returns `None`
/// when the mask is empty.
pub fn mask_centroid(mask: &Mat, origin: Point) -> Result<Option<Point2d>> {
    let m = imgproc::moments(mask, true)?;
    if m.m00 == 0.0 {
        return Ok(None);
    }
    Ok(Some(Point2d::new(
        origin.x as f64 + m.m10 / m.m00,
        origin.y as f64 + m.m01 / m.m00,
    )))
}
