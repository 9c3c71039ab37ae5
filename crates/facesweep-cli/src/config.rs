use std::path::PathBuf;

use facesweep_core::detector::SCRFD_CONFIDENCE_THRESHOLD;
use facesweep_core::DEFAULT_TOLERANCE;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// Maximum cosine distance for two faces to count as the same person.
    pub tolerance: f32,
    /// Minimum SCRFD score for a detection to count as a face.
    pub detection_threshold: f32,
}

impl Config {
    /// Load configuration from `FACESWEEP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("FACESWEEP_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facesweep_core::default_model_dir);

        Self {
            model_dir,
            tolerance: parse_f32(&lookup, "FACESWEEP_TOLERANCE", DEFAULT_TOLERANCE),
            detection_threshold: parse_f32(
                &lookup,
                "FACESWEEP_DETECTION_THRESHOLD",
                SCRFD_CONFIDENCE_THRESHOLD,
            ),
        }
    }
}

fn parse_f32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<f32>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                tracing::warn!(key, value = %raw, default, "ignoring unparsable value");
                default
            }
        },
    }
}
