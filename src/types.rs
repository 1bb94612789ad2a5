// src/types.rs

use opencv::core::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub laser_removal: LaserRemovalConfig,
    pub weed: WeedSegmentationConfig,
    pub crop: CropSegmentationConfig,
    pub classifier: ClassifierConfig,
    pub edges: EdgeConfig,
    pub lines: LineConfig,
    pub jet: JetConfig,
    pub logging: LoggingConfig,
}

/// Inclusive per-channel bounds for `core::in_range`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl ColorRange {
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn lower(&self) -> Scalar {
        Scalar::new(self.min[0], self.min[1], self.min[2], 0.0)
    }

    pub fn upper(&self) -> Scalar {
        Scalar::new(self.max[0], self.max[1], self.max[2], 0.0)
    }

    pub fn is_ordered(&self) -> bool {
        self.min.iter().zip(self.max.iter()).all(|(lo, hi)| lo <= hi)
    }
}

// ============================================================================
// SEGMENTATION
// ============================================================================

/// Removal of the projected laser streak before plant segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserRemovalConfig {
    /// HSV range of the laser color cast.
    pub range: ColorRange,
    /// Side of the rectangular kernel used to thicken the laser mask.
    pub morph_size: i32,
    pub inpaint_radius: f64,
}

impl Default for LaserRemovalConfig {
    fn default() -> Self {
        Self {
            range: ColorRange::new([80.0, 80.0, 80.0], [100.0, 255.0, 255.0]),
            morph_size: 5,
            inpaint_radius: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeedSegmentationConfig {
    /// HSV range (OpenCV hue scale 0-179).
    pub range: ColorRange,
    pub morph_open_size: i32,
    pub dilate_iterations: i32,
    /// Contours smaller than this are dropped as speckle.
    pub area_threshold: f64,
    pub group_max_distance: f64,
}

impl Default for WeedSegmentationConfig {
    fn default() -> Self {
        Self {
            range: ColorRange::new([95.0, 0.0, 0.0], [179.0, 117.0, 105.0]),
            morph_open_size: 2,
            dilate_iterations: 2,
            area_threshold: 50.0,
            group_max_distance: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSegmentationConfig {
    /// Lab range after L-channel equalization. Foliage is outside the band.
    pub range: ColorRange,
    pub morph_kernel_size: i32,
    pub morph_iterations: i32,
    pub area_threshold: f64,
    pub aspect_ratio_min: f64,
    pub aspect_ratio_max: f64,
    pub group_max_distance: f64,
}

impl Default for CropSegmentationConfig {
    fn default() -> Self {
        Self {
            range: ColorRange::new([0.0, 82.0, 123.0], [240.0, 131.0, 134.0]),
            morph_kernel_size: 3,
            morph_iterations: 2,
            area_threshold: 500.0,
            aspect_ratio_min: 0.2,
            aspect_ratio_max: 5.0,
            group_max_distance: 50.0,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Blobs scoring at or above this are crop.
    pub score_threshold: f64,
    pub area_divisor: f64,
    pub min_solidity: f64,
    pub min_extent: f64,
    /// Fraction of frame width around the centerline that earns a proximity bonus.
    pub center_band_ratio: f64,

    // Declustering pass
    pub decluster_max_area: f64,
    pub decluster_score_margin: f64,
    /// Fraction of the frame diagonal.
    pub decluster_distance_ratio: f64,

    // Species-aware regrouping
    pub crop_group_distance: f64,
    pub weed_group_distance: f64,

    /// Weed suppression radius = crop bbox width / this.
    pub suppression_radius_divisor: f64,
    /// Blobs at or above this area are treated as full-frame artefacts.
    pub max_plant_area: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            score_threshold: 4.0,
            area_divisor: 400.0,
            min_solidity: 0.8,
            min_extent: 0.5,
            center_band_ratio: 0.3,
            decluster_max_area: 3000.0,
            decluster_score_margin: 1.0,
            decluster_distance_ratio: 0.04,
            crop_group_distance: 50.0,
            weed_group_distance: 30.0,
            suppression_radius_divisor: 6.0,
            max_plant_area: 100_000.0,
        }
    }
}

/// Edge mask used by the overlap-pruning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub canny_low: f64,
    pub canny_high: f64,
    pub dilate_size: i32,
    pub dilate_iterations: i32,
    pub erode_size: i32,
    pub erode_iterations: i32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_size: 5,
            dilate_iterations: 1,
            erode_size: 3,
            erode_iterations: 1,
        }
    }
}

// ============================================================================
// LASER LINE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub canny_low: f64,
    pub canny_high: f64,
    pub hough_rho: f64,
    pub hough_theta_deg: f64,
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    /// Pairs of lines closer than this (radians) are not intersected.
    pub min_angle: f64,

    /// Feed Canny a laser-color mask instead of plain grayscale.
    pub use_color_filter: bool,
    /// Target laser color in 8-bit Lab.
    pub laser_color_lab: [f64; 3],
    /// L1 distance in Lab below which a pixel counts as laser.
    pub color_threshold: f64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            hough_rho: 1.0,
            hough_theta_deg: 1.0,
            hough_threshold: 50,
            min_line_length: 50.0,
            max_line_gap: 10.0,
            min_angle: 0.1,
            use_color_filter: false,
            laser_color_lab: [163.0, 101.0, 139.0],
            color_threshold: 30.0,
        }
    }
}

/// Hit-test tolerance for the aim point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JetConfig {
    /// Added to weed bbox width and height.
    pub weed_margin: i32,
    /// Subtracted from weed bbox origin.
    pub weed_origin_shift: i32,
    /// Radius (px) of the neighborhood probed when the exact weed pixel misses.
    pub weed_tolerance: i32,
}

impl Default for JetConfig {
    fn default() -> Self {
        Self {
            weed_margin: 10,
            weed_origin_shift: 5,
            weed_tolerance: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
