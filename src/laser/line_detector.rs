// src/laser/line_detector.rs
//
// Laser aim point from the projected line pattern.
//
//   frame → gray (or laser-color mask) → Canny → HoughLinesP → segments
//   segments → implicit lines → pairwise intersections (non-parallel, in-frame)
//   intersections → mean → aim point
//
// All results are computed once at construction and owned by the detector,
// so it holds no reference to the frame it was built from.

use super::types::{AimPoint, LineSegment};
use crate::error::VisionError;
use crate::types::LineConfig;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point2d, Scalar, Size, Vec3b, Vec4i, Vector},
    imgproc,
    prelude::*,
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LineDetector {
    width: i32,
    height: i32,
    segments: Vec<LineSegment>,
    intersections: Vec<Point2d>,
}

impl LineDetector {
    pub fn new(frame: &Mat, config: &LineConfig) -> Result<Self> {
        let (width, height) = (frame.cols(), frame.rows());
        if frame.empty() {
            warn!("Line detection skipped: {}", VisionError::EmptyInput);
            return Ok(Self::from_segments(Vec::new(), width, height, config.min_angle));
        }

        let source = if config.use_color_filter && frame.channels() == 3 {
            laser_color_mask(frame, config)?
        } else if frame.channels() == 3 {
            let mut gray = Mat::default();
            imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;
            gray
        } else {
            frame.try_clone()?
        };

        let mut edges = Mat::default();
        imgproc::canny(&source, &mut edges, config.canny_low, config.canny_high, 3, false)?;

        let mut raw = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut raw,
            config.hough_rho,
            config.hough_theta_deg.to_radians(),
            config.hough_threshold,
            config.min_line_length,
            config.max_line_gap,
        )?;

        let segments = raw.iter().map(LineSegment::from).collect();
        Ok(Self::from_segments(segments, width, height, config.min_angle))
    }

    /// Build from already-detected segments on a `width`×`height` frame.
    pub fn from_segments(
        segments: Vec<LineSegment>,
        width: i32,
        height: i32,
        min_angle: f64,
    ) -> Self {
        let intersections = pairwise_intersections(&segments, width, height, min_angle);
        debug!(
            "Line detection: {} segments, {} in-frame intersections",
            segments.len(),
            intersections.len()
        );
        Self {
            width,
            height,
            segments,
            intersections,
        }
    }

    pub fn lines(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn intersections(&self) -> &[Point2d] {
        &self.intersections
    }

    pub fn has_intersection(&self) -> bool {
        !self.intersections.is_empty()
    }

    /// Mean of all kept intersections, clamped into the frame.
    pub fn intersection(&self) -> Result<AimPoint, VisionError> {
        if self.intersections.is_empty() {
            return Err(VisionError::NoIntersection);
        }

        let n = self.intersections.len() as f64;
        let (sx, sy) = self
            .intersections
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));

        let x = ((sx / n).round() as i32).clamp(0, self.width - 1);
        let y = ((sy / n).round() as i32).clamp(0, self.height - 1);
        Ok(AimPoint::new(x, y))
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

fn pairwise_intersections(
    segments: &[LineSegment],
    width: i32,
    height: i32,
    min_angle: f64,
) -> Vec<Point2d> {
    let equations: Vec<_> = segments.iter().map(LineSegment::equation).collect();
    let mut points = Vec::new();

    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            // Near-parallel pairs give ill-conditioned solves
            if segments[i].angle_to(&segments[j]) <= min_angle {
                continue;
            }

            if let Some(p) = equations[i].intersect(&equations[j]) {
                let inside =
                    p.x >= 0.0 && p.x < width as f64 && p.y >= 0.0 && p.y < height as f64;
                if inside {
                    points.push(p);
                }
            }
        }
    }

    points
}

/// Binary mask of pixels whose 8-bit Lab color is within `color_threshold`
/// (L1 distance) of the configured laser color.
fn laser_color_mask(frame: &Mat, config: &LineConfig) -> Result<Mat> {
    let mut lab = Mat::default();
    imgproc::cvt_color_def(frame, &mut lab, imgproc::COLOR_BGR2Lab)?;

    let mut mask =
        Mat::new_rows_cols_with_default(lab.rows(), lab.cols(), core::CV_8UC1, Scalar::all(0.0))?;
    let target = config.laser_color_lab;

    for row in 0..lab.rows() {
        for col in 0..lab.cols() {
            let px = *lab.at_2d::<Vec3b>(row, col)?;
            let distance: f64 = (0..3).map(|c| (px[c] as f64 - target[c]).abs()).sum();
            if distance < config.color_threshold {
                *mask.at_2d_mut::<u8>(row, col)? = 255;
            }
        }
    }

    Ok(mask)
}
