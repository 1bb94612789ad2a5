// src/detection/plant_detector.rs
//
// Frame → plant list.
//
//   frame ─ remove_laser_color ─┬─ segment_weed ─┐
//                               ├─ segment_crop ─┴─ OR ─┐
//                               └─ build_edge_mask ─────┴─ SpeciesClassifier → plants

use super::color_segmenter::ColorSegmenter;
use super::species_classifier::SpeciesClassifier;
use super::types::{Plant, Species};
use crate::error::VisionError;
use crate::types::{Config, EdgeConfig, LaserRemovalConfig};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Size},
    imgproc, photo,
    prelude::*,
};
use tracing::{debug, warn};

pub struct PlantDetector {
    laser_removal: LaserRemovalConfig,
    edges: EdgeConfig,
    segmenter: ColorSegmenter,
    classifier: SpeciesClassifier,
    score_threshold: f64,
}

impl PlantDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            laser_removal: config.laser_removal.clone(),
            edges: config.edges.clone(),
            segmenter: ColorSegmenter::from_config(config),
            classifier: SpeciesClassifier::from_config(config),
            score_threshold: config.classifier.score_threshold,
        }
    }

    /// Detect and classify the plants of one BGR frame.
    ///
    /// An empty or non-BGR frame is logged as `EmptyInput` and yields no plants.
    pub fn detect_plants(&self, frame: &Mat) -> Result<Vec<Plant>> {
        if frame.empty() || frame.channels() != 3 {
            warn!(
                "{} ({}x{}, {} channels)",
                VisionError::EmptyInput,
                frame.cols(),
                frame.rows(),
                frame.channels()
            );
            return Ok(Vec::new());
        }

        let cleaned = remove_laser_color(frame, &self.laser_removal)?;

        let weed_mask = self.segmenter.segment_weed(&cleaned)?;
        let crop_mask = self.segmenter.segment_crop(&cleaned)?;

        let mut combined = Mat::default();
        core::bitwise_or(&weed_mask, &crop_mask, &mut combined, &core::no_array())?;

        let edge_mask = build_edge_mask(&cleaned, &self.edges)?;

        let plants =
            self.classifier
                .classify(&combined, &cleaned, &edge_mask, self.score_threshold)?;

        let crops = plants.iter().filter(|p| p.species == Species::Crop).count();
        debug!(
            "Detected {} plants ({} crop, {} weed)",
            plants.len(),
            crops,
            plants.len() - crops
        );

        Ok(plants)
    }
}

/// Erase the laser streak: mask its color, thicken, blank it out and inpaint.
pub fn remove_laser_color(frame: &Mat, config: &LaserRemovalConfig) -> Result<Mat> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(frame, &mut hsv, imgproc::COLOR_BGR2HSV)?;

    let mut laser = Mat::default();
    core::in_range(&hsv, &config.range.lower(), &config.range.upper(), &mut laser)?;

    let kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        Size::new(config.morph_size, config.morph_size),
        Point::new(-1, -1),
    )?;
    let mut thick = Mat::default();
    imgproc::dilate(
        &laser,
        &mut thick,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    if core::count_non_zero(&thick)? == 0 {
        return Ok(frame.try_clone()?);
    }

    let mut keep = Mat::default();
    core::bitwise_not(&thick, &mut keep, &core::no_array())?;

    let mut masked = Mat::default();
    core::bitwise_and(frame, frame, &mut masked, &keep)?;

    let mut repaired = Mat::default();
    photo::inpaint(
        &masked,
        &thick,
        &mut repaired,
        config.inpaint_radius,
        photo::INPAINT_TELEA,
    )?;

    Ok(repaired)
}

/// Canny edges, dilated then eroded, used to confirm that a blob has texture.
pub fn build_edge_mask(frame: &Mat, config: &EdgeConfig) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

    let mut edges = Mat::default();
    imgproc::canny(&gray, &mut edges, config.canny_low, config.canny_high, 3, false)?;

    let dilate_kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        Size::new(config.dilate_size, config.dilate_size),
        Point::new(-1, -1),
    )?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        &edges,
        &mut dilated,
        &dilate_kernel,
        Point::new(-1, -1),
        config.dilate_iterations,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    let erode_kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        Size::new(config.erode_size, config.erode_size),
        Point::new(-1, -1),
    )?;
    let mut mask = Mat::default();
    imgproc::erode(
        &dilated,
        &mut mask,
        &erode_kernel,
        Point::new(-1, -1),
        config.erode_iterations,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    Ok(mask)
}
