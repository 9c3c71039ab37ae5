//! The `removed_faces` folder that confirmed matches are moved into.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the quarantine folder created under the scanned root.
pub const QUARANTINE_DIR_NAME: &str = "removed_faces";

#[derive(Error, Debug)]
pub enum QuarantineError {
    #[error("cannot create quarantine folder {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error("Destination path '{}' already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("{source}")]
    Move {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to an existing quarantine folder.
#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    /// Path of the quarantine folder for a scanned root.
    pub fn dir_for(root: &Path) -> PathBuf {
        root.join(QUARANTINE_DIR_NAME)
    }

    /// Create `<root>/removed_faces` if needed. Safe to call repeatedly.
    pub fn create(root: &Path) -> Result<Self, QuarantineError> {
        let dir = Self::dir_for(root);
        fs::create_dir_all(&dir).map_err(|source| QuarantineError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move `source` into the quarantine folder, keeping its file name.
    ///
    /// Never overwrites an existing file of the same name, even one that
    /// appears while the move is in progress. Falls back to copy + delete
    /// when the source cannot be linked into place (e.g. across filesystems);
    /// the source is only deleted once the copy's size matches.
    pub fn move_into(&self, source: &Path) -> Result<PathBuf, QuarantineError> {
        let name = source
            .file_name()
            .ok_or_else(|| QuarantineError::NoFileName(source.to_path_buf()))?;
        let destination = self.dir.join(name);

        move_file(source, &destination).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                QuarantineError::AlreadyExists(destination.clone())
            } else {
                QuarantineError::Move {
                    path: source.to_path_buf(),
                    source: e,
                }
            }
        })?;

        tracing::info!(
            from = %source.display(),
            to = %destination.display(),
            "moved into quarantine"
        );
        Ok(destination)
    }
}

/// Move without replacing: `destination` must not exist.
///
/// A hard link claims the destination name atomically; the source name is
/// then dropped. Where linking is impossible the bytes are copied into a
/// freshly created file instead.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound) => {
            return Err(e)
        }
        Err(link_err) => {
            tracing::debug!(error = %link_err, "hard link failed, falling back to copy");
            copy_new(source, destination)?;
        }
    }
    fs::remove_file(source).map_err(|e| {
        let _ = fs::remove_file(destination);
        e
    })
}

/// Copy `source` into a new file at `destination`, failing with
/// [`io::ErrorKind::AlreadyExists`] if something is already there.
fn copy_new(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let source_size = reader.metadata()?.len();
    let mut writer = OpenOptions::new().write(true).create_new(true).open(destination)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|n| writer.sync_all().map(|()| n));
    match copied {
        Ok(n) if n == source_size => Ok(()),
        Ok(n) => {
            let _ = fs::remove_file(destination);
            Err(io::Error::other(format!(
                "copy verification failed: source {source_size} bytes, destination {n} bytes"
            )))
        }
        Err(e) => {
            let _ = fs::remove_file(destination);
            Err(e)
        }
    }
}
