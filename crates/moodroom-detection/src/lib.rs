//! moodroom-detection
//!
//! Periodic facial-expression sampling over a live video element. The face,
//! landmark and expression networks are external; they are reached through
//! [`ExpressionModel`].

pub mod adapter;
pub mod model;
pub mod overlay;

pub use adapter::{AdapterStats, CycleReport, DetectionAdapter};
pub use model::{
    verify_artifacts, BoundingBox, DetectorOptions, ExpressionModel, FaceDetection, Point,
    MODEL_ARTIFACTS,
};
pub use overlay::OverlayCanvas;
