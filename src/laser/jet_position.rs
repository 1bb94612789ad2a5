// src/laser/jet_position.rs
//
// Aim point + plant list → where the laser lands.

use super::line_detector::LineDetector;
use super::types::{AimPoint, LaserBehavior};
use crate::detection::{Plant, Species};
use crate::geometry;
use crate::types::JetConfig;
use anyhow::Result;
use opencv::core::Point;
use tracing::debug;

/// Borrows the plants and line detector of one frame; it cannot outlive them.
pub struct JetPositionChecker<'a> {
    plants: &'a [Plant],
    line_detector: &'a LineDetector,
    config: JetConfig,
}

impl<'a> JetPositionChecker<'a> {
    pub fn new(plants: &'a [Plant], line_detector: &'a LineDetector, config: JetConfig) -> Self {
        Self {
            plants,
            line_detector,
            config,
        }
    }

    /// Hit-test one plant.
    ///
    /// Weed boxes are widened and a weed miss probes a disk of
    /// `weed_tolerance` px around the point, since weed masks are coarser.
    pub fn is_on_plant(&self, plant: &Plant, point: AimPoint) -> Result<LaserBehavior> {
        let is_weed = plant.species == Species::Weed;

        let hit_box = if is_weed {
            geometry::widen(
                plant.bounding_box,
                self.config.weed_origin_shift,
                self.config.weed_margin,
            )
        } else {
            plant.bounding_box
        };

        if !geometry::contains(hit_box, point) {
            return Ok(LaserBehavior::OnNothing);
        }

        let local = plant.to_local(point);
        let hit = plant.mask_at(local)?
            || (is_weed && self.probe_disk(plant, local, self.config.weed_tolerance)?);

        Ok(if hit {
            LaserBehavior::from(plant.species)
        } else {
            LaserBehavior::OnNothing
        })
    }

    /// Behavior of the frame: first plant hit in list order wins.
    pub fn compute_state(&self) -> Result<LaserBehavior> {
        let aim = match self.line_detector.intersection() {
            Ok(aim) => aim,
            Err(_) => return Ok(LaserBehavior::NotDetected),
        };

        for plant in self.plants {
            let behavior = self.is_on_plant(plant, aim)?;
            if behavior.is_on_plant() {
                debug!(
                    "Laser at ({}, {}) {} (bbox {:?})",
                    aim.x,
                    aim.y,
                    behavior.label(),
                    plant.bounding_box
                );
                return Ok(behavior);
            }
        }

        debug!("Laser at ({}, {}) hits no plant", aim.x, aim.y);
        Ok(LaserBehavior::OnNothing)
    }

    fn probe_disk(&self, plant: &Plant, local: Point, radius: i32) -> Result<bool> {
        let r2 = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                if plant.mask_at(Point::new(local.x + dx, local.y + dy))? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
