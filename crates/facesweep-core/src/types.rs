use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default maximum distance for two faces to count as the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Wrap raw values with no model tag.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Cosine distance in [0, 2]. Lower = more similar.
    ///
    /// This is the value compared against the tolerance: `0.6` accepts any
    /// pair whose cosine similarity exceeds `0.4`.
    pub fn distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// Scan the faces of one image in order and return the index and distance of
/// the first face strictly below `tolerance`.
///
/// Faces after the first hit are never compared, even if they would be closer.
pub fn first_within_tolerance(
    target: &Embedding,
    faces: &[Embedding],
    tolerance: f32,
) -> Option<(usize, f32)> {
    faces
        .iter()
        .enumerate()
        .map(|(i, face)| (i, target.distance(face)))
        .find(|&(_, distance)| distance < tolerance)
}

/// An image that contains the target face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    /// Distance of the face that triggered the match.
    pub distance: f32,
}
