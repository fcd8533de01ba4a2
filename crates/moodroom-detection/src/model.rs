use std::path::Path;

use async_trait::async_trait;
use moodroom_core::{DetectionConfig, DetectionError, ExpressionScores, VideoFrame};
use serde::{Deserialize, Serialize};

/// Artifacts the tiny face detector, 68-point landmark and expression nets load from.
pub const MODEL_ARTIFACTS: &[&str] = &[
    "tiny_face_detector_model-weights_manifest.json",
    "face_landmark_68_model-weights_manifest.json",
    "face_expression_model-weights_manifest.json",
];

// MARK: - DetectorOptions

/// Tiny face detector parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    pub input_size: u32,
    pub score_threshold: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            input_size: 512,
            score_threshold: 0.5,
        }
    }
}

impl From<&DetectionConfig> for DetectorOptions {
    fn from(cfg: &DetectionConfig) -> Self {
        Self {
            input_size: cfg.input_size,
            score_threshold: cfg.score_threshold,
        }
    }
}

// MARK: - Detection results

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One detected face with landmarks and expression scores, in frame pixels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetection {
    pub score: f32,
    #[serde(rename = "box", alias = "bbox")]
    pub bbox: BoundingBox,
    pub landmarks: Vec<Point>,
    pub expressions: ExpressionScores,
}

// MARK: - ExpressionModel

/// External face / landmark / expression network.
#[async_trait]
pub trait ExpressionModel: Send + Sync {
    /// Load weights from `model_dir`. Awaited once before sampling starts.
    async fn load(&self, model_dir: &Path) -> Result<(), DetectionError>;

    fn is_loaded(&self) -> bool;

    /// All faces in `frame`, each with landmarks and expression scores.
    async fn detect_all_faces(
        &self,
        frame: &VideoFrame,
        options: &DetectorOptions,
    ) -> Result<Vec<FaceDetection>, DetectionError>;

    /// Files that must exist in the model directory before `load` is called.
    fn required_artifacts(&self) -> &'static [&'static str] {
        MODEL_ARTIFACTS
    }
}

/// Check that every required artifact exists under `model_dir`.
pub fn verify_artifacts(model_dir: &Path, artifacts: &[&str]) -> Result<(), DetectionError> {
    for name in artifacts {
        let path = model_dir.join(name);
        if !path.is_file() {
            return Err(DetectionError::MissingArtifact { path });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_reports_first_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODEL_ARTIFACTS[0]), "{}").unwrap();

        let err = verify_artifacts(dir.path(), MODEL_ARTIFACTS).unwrap_err();
        match err {
            DetectionError::MissingArtifact { path } => {
                assert_eq!(path, dir.path().join(MODEL_ARTIFACTS[1]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn verify_passes_when_all_present() {
        let dir = tempfile::tempdir().unwrap();
        for name in MODEL_ARTIFACTS {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        assert!(verify_artifacts(dir.path(), MODEL_ARTIFACTS).is_ok());
    }

    #[test]
    fn detection_parses_box_field() {
        let json = r#"{"score": 0.8, "box": {"x": 1, "y": 2, "width": 3, "height": 4},
                       "expressions": {"happy": 0.9}}"#;
        let face: FaceDetection = serde_json::from_str(json).unwrap();
        assert_eq!(face.bbox.width, 3.0);
        assert!(face.landmarks.is_empty());
        assert_eq!(face.expressions.happy, 0.9);
    }

    #[test]
    fn options_follow_config() {
        let cfg = DetectionConfig { input_size: 320, score_threshold: 0.4, ..Default::default() };
        let opts = DetectorOptions::from(&cfg);
        assert_eq!(opts, DetectorOptions { input_size: 320, score_threshold: 0.4 });
        assert_eq!(DetectorOptions::default().input_size, 512);
    }
}
