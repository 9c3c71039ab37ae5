//! Image file → face embeddings.
//!
//! [`FaceEncoder`] is the only seam between the sweep logic and the neural
//! networks. Everything above it (target loading, scanning, quarantine) works
//! against the trait, so it can run with a stub in tests.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::{ImageReader, RgbImage};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot read image {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("{0}")]
    Other(String),
}

/// Produces one embedding per face found in an image file.
pub trait FaceEncoder {
    /// Embeddings in detection order (most confident face first).
    ///
    /// An image without faces yields an empty vector, not an error.
    fn encode(&mut self, path: &Path) -> Result<Vec<Embedding>, EncodeError>;
}

/// Default model directory: `$XDG_DATA_HOME/facesweep/models`, falling back
/// to `$HOME/.local/share/facesweep/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesweep")
        .join("models")
}

/// Decode an image file to RGB, choosing the decoder from the file's leading
/// bytes rather than its extension. Falls back to the extension when the
/// content is not recognised.
pub fn load_rgb(path: &Path) -> Result<RgbImage, EncodeError> {
    let read_err = |source| EncodeError::Read {
        path: path.to_path_buf(),
        source,
    };
    let image = ImageReader::open(path)
        .map_err(read_err)?
        .with_guessed_format()
        .map_err(read_err)?
        .decode()
        .map_err(|source| EncodeError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(image.to_rgb8())
}

/// SCRFD + ArcFace encoder running on ONNX Runtime.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path, detection_threshold: f32) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?
            .with_confidence_threshold(detection_threshold);
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, path: &Path) -> Result<Vec<Embedding>, EncodeError> {
        let image = load_rgb(path)?;

        let faces = self.detector.detect(&image)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            faces = faces.len(),
            "detected faces"
        );

        faces
            .iter()
            .map(|face| self.recognizer.extract(&image, face).map_err(EncodeError::from))
            .collect()
    }
}
