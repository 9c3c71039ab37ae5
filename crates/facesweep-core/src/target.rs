//! Loading the reference face.

use crate::encoder::{EncodeError, FaceEncoder};
use crate::types::Embedding;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Target image '{}' does not exist.", .0.display())]
    NotFound(PathBuf),
    #[error("No faces found in the target image '{}'.", .0.display())]
    NoFace(PathBuf),
    #[error("Could not encode the target image '{}': {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },
}

/// Encode the target image and return its first face.
///
/// With several faces present the first one reported by the encoder wins.
pub fn load_target_face<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    path: &Path,
) -> Result<Embedding, TargetError> {
    if !path.is_file() {
        return Err(TargetError::NotFound(path.to_path_buf()));
    }

    let faces = encoder.encode(path).map_err(|source| TargetError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if faces.len() > 1 {
        tracing::warn!(
            path = %path.display(),
            faces = faces.len(),
            "target image has several faces; using the first"
        );
    }

    faces
        .into_iter()
        .next()
        .ok_or_else(|| TargetError::NoFace(path.to_path_buf()))
}
