// src/pipeline/mod.rs

pub mod frame_analysis;

pub use frame_analysis::FrameAnalysis;
