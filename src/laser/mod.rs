// src/laser/mod.rs

mod jet_position;
mod line_detector;
mod types;

pub use jet_position::JetPositionChecker;
pub use line_detector::LineDetector;
pub use types::*;
