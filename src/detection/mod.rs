// src/detection/mod.rs

mod color_segmenter;
mod contour_grouper;
mod plant_detector;
mod species_classifier;
mod types;

// Re-export public APIs
pub use color_segmenter::ColorSegmenter;
pub use contour_grouper::{group_contours, group_indices, Contour};
pub use plant_detector::{build_edge_mask, remove_laser_color, PlantDetector};
pub use species_classifier::{BlobFeatures, SpeciesClassifier};
pub use types::*;
