// src/lib.rs
//
// Vision core for a laser weeding robot: plant detection and classification,
// laser aim point estimation, and aim point hit testing.

pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod laser;
pub mod pipeline;
pub mod types;

pub use detection::{Plant, PlantDetector, Species};
pub use error::VisionError;
pub use laser::{AimPoint, JetPositionChecker, LaserBehavior, LineDetector};
pub use pipeline::FrameAnalysis;
pub use types::Config;
