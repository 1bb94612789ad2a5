// src/config.rs

use crate::error::VisionError;
use crate::types::{ColorRange, Config};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_yaml_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse YAML. Missing sections and fields fall back to their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        check_range("laser_removal.range", &self.laser_removal.range)?;
        check_range("weed.range", &self.weed.range)?;
        check_range("crop.range", &self.crop.range)?;

        check_positive("laser_removal.morph_size", self.laser_removal.morph_size)?;
        check_positive("weed.morph_open_size", self.weed.morph_open_size)?;
        check_positive("edges.dilate_size", self.edges.dilate_size)?;
        check_positive("edges.erode_size", self.edges.erode_size)?;

        if self.crop.aspect_ratio_min > self.crop.aspect_ratio_max {
            return Err(VisionError::InvalidConfig(format!(
                "crop.aspect_ratio_min ({}) exceeds aspect_ratio_max ({})",
                self.crop.aspect_ratio_min, self.crop.aspect_ratio_max
            )));
        }
        if self.classifier.score_threshold <= 0.0 {
            return Err(VisionError::InvalidConfig(
                "classifier.score_threshold must be positive".to_string(),
            ));
        }
        if self.classifier.area_divisor <= 0.0 || self.classifier.suppression_radius_divisor <= 0.0
        {
            return Err(VisionError::InvalidConfig(
                "classifier divisors must be positive".to_string(),
            ));
        }
        if self.lines.hough_threshold < 1 || self.lines.hough_rho <= 0.0 {
            return Err(VisionError::InvalidConfig(
                "lines.hough_threshold and lines.hough_rho must be positive".to_string(),
            ));
        }
        if self.lines.hough_theta_deg <= 0.0 {
            return Err(VisionError::InvalidConfig(
                "lines.hough_theta_deg must be positive".to_string(),
            ));
        }
        if self.jet.weed_tolerance < 0 {
            return Err(VisionError::InvalidConfig(
                "jet.weed_tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_range(name: &str, range: &ColorRange) -> Result<(), VisionError> {
    if range.is_ordered() {
        Ok(())
    } else {
        Err(VisionError::InvalidConfig(format!(
            "{name}: min {:?} exceeds max {:?}",
            range.min, range.max
        )))
    }
}

fn check_positive(name: &str, value: i32) -> Result<(), VisionError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(VisionError::InvalidConfig(format!(
            "{name} must be at least 1, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "classifier:\n  score_threshold: 5.5\nlines:\n  hough_threshold: 30\n";
        let config = Config::from_yaml_str(yaml).unwrap();

        assert!((config.classifier.score_threshold - 5.5).abs() < 1e-9);
        assert_eq!(config.lines.hough_threshold, 30);
        assert!((config.classifier.crop_group_distance - 50.0).abs() < 1e-9);
        assert!((config.classifier.weed_group_distance - 30.0).abs() < 1e-9);
        assert!((config.lines.min_angle - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.weed.range, defaults.weed.range);
        assert_eq!(config.crop.range, defaults.crop.range);
        assert_eq!(config.laser_removal.range, defaults.laser_removal.range);
        assert_eq!(config.lines.hough_threshold, defaults.lines.hough_threshold);
        assert_eq!(config.jet.weed_tolerance, defaults.jet.weed_tolerance);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_inverted_range_rejected() {
        let yaml = "weed:\n  range:\n    min: [120, 0, 0]\n    max: [90, 255, 255]\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("weed.range"));
    }

    #[test]
    fn test_zero_kernel_rejected() {
        let mut config = Config::default();
        config.edges.dilate_size = 0;
        assert!(matches!(
            config.validate(),
            Err(VisionError::InvalidConfig(_))
        ));
    }
}
