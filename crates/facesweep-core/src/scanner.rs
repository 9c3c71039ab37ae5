//! Folder scanning and per-image face comparison.
//!
//! The walk is sequential and ordered by file name within each directory.
//! A file that cannot be read or decoded is reported and skipped; only a
//! missing root folder aborts the scan.

use crate::encoder::FaceEncoder;
use crate::types::{first_within_tolerance, Embedding, MatchRecord, DEFAULT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions considered images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "tiff"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Folder '{}' does not exist.", .0.display())]
    FolderNotFound(PathBuf),
}

/// A file the scanner had to give up on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Progress notifications, emitted in traversal order.
#[derive(Debug)]
pub enum ScanEvent<'a> {
    Matched(&'a MatchRecord),
    Skipped(&'a SkippedFile),
}

/// Outcome of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Matching images in traversal order, not sorted by distance.
    pub matches: Vec<MatchRecord>,
    pub skipped: Vec<SkippedFile>,
    /// Image files handed to the encoder.
    pub files_examined: usize,
}

/// Decides which files are worth encoding.
pub struct ImageFilter {
    suffixes: Vec<String>,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self {
            suffixes: IMAGE_EXTENSIONS.iter().map(|ext| format!(".{ext}")).collect(),
        }
    }

    /// Whether the file name ends in one of the image extensions.
    ///
    /// Matches on the whole name, so a bare `.png` counts as well.
    pub fn should_include(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks a folder and reports images containing the target face.
pub struct FaceScanner {
    tolerance: f32,
    filter: ImageFilter,
    excluded: Vec<PathBuf>,
}

impl FaceScanner {
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            filter: ImageFilter::new(),
            excluded: Vec::new(),
        }
    }

    /// Skip a directory (and everything below it) during the walk.
    pub fn with_excluded_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Scan `root` recursively.
    ///
    /// Within one image, faces are compared in encoder order and the first
    /// one under tolerance decides the match; later faces are not compared.
    pub fn scan<E, F>(
        &self,
        encoder: &mut E,
        root: &Path,
        target: &Embedding,
        mut on_event: F,
    ) -> Result<ScanReport, ScanError>
    where
        E: FaceEncoder + ?Sized,
        F: FnMut(ScanEvent<'_>),
    {
        if !root.is_dir() {
            return Err(ScanError::FolderNotFound(root.to_path_buf()));
        }

        let mut report = ScanReport::default();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    tracing::warn!(path = %path.display(), error = %e, "cannot read directory entry");
                    let skipped = SkippedFile { path, reason: e.to_string() };
                    on_event(ScanEvent::Skipped(&skipped));
                    report.skipped.push(skipped);
                    continue;
                }
            };

            if entry.file_type().is_dir() || !self.filter.should_include(entry.path()) {
                continue;
            }

            let path = entry.path();
            report.files_examined += 1;

            let faces = match encoder.encode(path) {
                Ok(faces) => faces,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not process image");
                    let skipped = SkippedFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    };
                    on_event(ScanEvent::Skipped(&skipped));
                    report.skipped.push(skipped);
                    continue;
                }
            };

            match first_within_tolerance(target, &faces, self.tolerance) {
                Some((face_index, distance)) => {
                    tracing::debug!(path = %path.display(), face_index, distance, "match");
                    let record = MatchRecord {
                        path: path.to_path_buf(),
                        distance,
                    };
                    on_event(ScanEvent::Matched(&record));
                    report.matches.push(record);
                }
                None => {
                    tracing::debug!(path = %path.display(), faces = faces.len(), "no match");
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            examined = report.files_examined,
            matches = report.matches.len(),
            skipped = report.skipped.len(),
            "scan finished"
        );

        Ok(report)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| dir == path)
    }
}

impl Default for FaceScanner {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}
