// src/error.rs

/// Domain errors raised by the vision core.
///
/// OpenCV failures are not wrapped here; they travel as `anyhow::Error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisionError {
    /// The frame has no pixels.
    #[error("input frame is empty")]
    EmptyInput,

    /// No pair of detected laser lines produced an in-frame intersection.
    #[error("no valid laser line intersection")]
    NoIntersection,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
