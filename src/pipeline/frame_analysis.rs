// src/pipeline/frame_analysis.rs
//
// One processed frame: the frame itself plus everything derived from it.
// Every consumer reads plants, aim point and behavior from the same record.

use crate::detection::{Plant, PlantDetector};
use crate::error::VisionError;
use crate::laser::{AimPoint, JetPositionChecker, LaserBehavior, LineDetector};
use crate::types::Config;
use anyhow::Result;
use opencv::{core::Mat, prelude::*};
use tracing::info;

/// `Clone` copies the frame pixels (`Mat::clone` is deep) along with the
/// derived plants and lines, which hold no reference into the frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub frame_id: u64,
    frame: Mat,
    config: Config,
    plants: Vec<Plant>,
    line_detector: LineDetector,
    behavior: LaserBehavior,
}

impl FrameAnalysis {
    /// Run plant detection, line detection and the jet check on `frame`.
    /// The record takes ownership of the frame.
    pub fn new(frame_id: u64, frame: Mat, config: &Config) -> Result<Self> {
        let detector = PlantDetector::new(config);
        let plants = detector.detect_plants(&frame)?;
        let line_detector = LineDetector::new(&frame, &config.lines)?;

        let behavior =
            JetPositionChecker::new(&plants, &line_detector, config.jet.clone()).compute_state()?;

        info!(
            "Frame {}: {} plants, laser {}",
            frame_id,
            plants.len(),
            behavior.label()
        );

        Ok(Self {
            frame_id,
            frame,
            config: config.clone(),
            plants,
            line_detector,
            behavior,
        })
    }

    pub fn frame(&self) -> &Mat {
        &self.frame
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn line_detector(&self) -> &LineDetector {
        &self.line_detector
    }

    pub fn aim_point(&self) -> Option<AimPoint> {
        self.line_detector.intersection().ok()
    }

    pub fn laser_behavior(&self) -> LaserBehavior {
        self.behavior
    }

    /// Checker bound to this record's plants and lines, for per-plant queries.
    pub fn jet_checker(&self) -> JetPositionChecker<'_> {
        JetPositionChecker::new(&self.plants, &self.line_detector, self.config.jet.clone())
    }

    /// Copy the frame and rerun every detector on the copy.
    pub fn try_clone(&self) -> Result<Self> {
        Self::new(self.frame_id, self.frame.try_clone()?, &self.config)
    }

    pub fn is_empty_frame(&self) -> bool {
        self.frame.empty()
    }

    pub fn aim_error(&self) -> Option<VisionError> {
        self.line_detector.intersection().err()
    }
}
