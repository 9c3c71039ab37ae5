//! One interactive sweep: target → scan → per-match disposition.

use crate::encoder::FaceEncoder;
use crate::prompt;
use crate::quarantine::{Quarantine, QuarantineError};
use crate::scanner::{FaceScanner, ScanError, ScanEvent, SkippedFile};
use crate::target::{load_target_face, TargetError};
use crate::types::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal session errors. Every variant ends the run with exit code 1.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Quarantine(#[from] QuarantineError),
    #[error("input closed while waiting for an answer")]
    InputClosed,
    #[error("terminal I/O: {0}")]
    Io(io::Error),
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SessionError::InputClosed
        } else {
            SessionError::Io(e)
        }
    }
}

/// Paths given up front skip the matching prompt.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub target: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub tolerance: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            target: None,
            folder: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// What happened to one matching image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Disposition {
    Moved { destination: PathBuf },
    Kept,
    MoveFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub path: PathBuf,
    pub distance: f32,
    pub disposition: Disposition,
}

/// Everything a finished session did, suitable for a JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub target: PathBuf,
    pub folder: PathBuf,
    pub tolerance: f32,
    pub files_examined: usize,
    pub skipped: Vec<SkippedFile>,
    pub outcomes: Vec<MatchOutcome>,
}

impl SessionSummary {
    pub fn moved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, Disposition::Moved { .. }))
            .count()
    }
}

/// Drives the prompt flow over an arbitrary reader/writer pair.
pub struct Session<'a, E: FaceEncoder + ?Sized, R, W> {
    encoder: &'a mut E,
    input: R,
    output: W,
    options: SessionOptions,
}

impl<'a, E, R, W> Session<'a, E, R, W>
where
    E: FaceEncoder + ?Sized,
    R: BufRead,
    W: Write,
{
    pub fn new(encoder: &'a mut E, input: R, output: W, options: SessionOptions) -> Self {
        Self {
            encoder,
            input,
            output,
            options,
        }
    }

    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        writeln!(self.output, "=== Face Recognition and Image Management ===")?;

        let target_path = match self.options.target.take() {
            Some(path) => path,
            None => self.ask_path("Enter the path to the target face image: ")?,
        };

        writeln!(self.output, "Loading target face...")?;
        let target = load_target_face(&mut *self.encoder, &target_path)?;

        let folder = match self.options.folder.take() {
            Some(path) => path,
            None => self.ask_path("Enter the path to the folder to scan: ")?,
        };

        writeln!(self.output, "\nScanning images for matches...")?;
        let scanner = FaceScanner::new(self.options.tolerance)
            .with_excluded_dir(Quarantine::dir_for(&folder));

        let output = &mut self.output;
        let mut write_err: Option<io::Error> = None;
        let report = scanner.scan(&mut *self.encoder, &folder, &target, |event| {
            if write_err.is_none() {
                if let Err(e) = write_scan_event(&mut *output, &event) {
                    write_err = Some(e);
                }
            }
        })?;
        if let Some(e) = write_err {
            return Err(e.into());
        }

        let mut summary = SessionSummary {
            target: target_path,
            folder: folder.clone(),
            tolerance: scanner.tolerance(),
            files_examined: report.files_examined,
            skipped: report.skipped,
            outcomes: Vec::with_capacity(report.matches.len()),
        };

        if report.matches.is_empty() {
            writeln!(self.output, "No images with the target face were found.")?;
            return Ok(summary);
        }

        writeln!(
            self.output,
            "\nFound {} image(s) containing the target face.",
            report.matches.len()
        )?;

        let quarantine = Quarantine::create(&folder)?;

        for record in report.matches {
            let remove = prompt::confirm_removal(&mut self.input, &mut self.output, &record.path)?;
            let disposition = if remove {
                self.remove(&quarantine, &record.path)?
            } else {
                writeln!(self.output, "Kept '{}'.", record.path.display())?;
                Disposition::Kept
            };
            summary.outcomes.push(MatchOutcome {
                path: record.path,
                distance: record.distance,
                disposition,
            });
        }

        writeln!(self.output, "\nOperation completed.")?;
        tracing::info!(
            matches = summary.outcomes.len(),
            moved = summary.moved(),
            "session finished"
        );
        Ok(summary)
    }

    fn ask_path(&mut self, prompt: &str) -> Result<PathBuf, SessionError> {
        let answer = prompt::ask(&mut self.input, &mut self.output, prompt)?;
        Ok(PathBuf::from(answer))
    }

    /// Move one image; a failed move is reported, not fatal.
    fn remove(&mut self, quarantine: &Quarantine, path: &std::path::Path) -> io::Result<Disposition> {
        match quarantine.move_into(path) {
            Ok(destination) => {
                writeln!(
                    self.output,
                    "Moved '{}' to '{}'.",
                    path.display(),
                    quarantine.dir().display()
                )?;
                Ok(Disposition::Moved { destination })
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "move failed");
                writeln!(
                    self.output,
                    "Error: Could not remove/move image '{}'. Error: {e}",
                    path.display()
                )?;
                Ok(Disposition::MoveFailed { reason: e.to_string() })
            }
        }
    }
}

fn write_scan_event<W: Write>(output: &mut W, event: &ScanEvent<'_>) -> io::Result<()> {
    match event {
        ScanEvent::Matched(record) => writeln!(
            output,
            "Match found: {} (Distance: {:.4})",
            record.path.display(),
            record.distance
        ),
        ScanEvent::Skipped(skipped) => writeln!(
            output,
            "Warning: Could not process image '{}'. Error: {}",
            skipped.path.display(),
            skipped.reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeError;
    use crate::types::Embedding;
    use std::io::Cursor;
    use std::path::Path;

    /// Every image holds one face identical to the target.
    struct SameFace {
        calls: usize,
    }

    impl FaceEncoder for SameFace {
        fn encode(&mut self, _path: &Path) -> Result<Vec<Embedding>, EncodeError> {
            self.calls += 1;
            Ok(vec![Embedding::new(vec![1.0, 0.0])])
        }
    }

    fn run(encoder: &mut SameFace, input: &str, options: SessionOptions) -> (Result<SessionSummary, SessionError>, String) {
        let mut output = Vec::new();
        let result = Session::new(encoder, Cursor::new(input.to_string()), &mut output, options).run();
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn missing_target_stops_before_folder_prompt() {
        let mut encoder = SameFace { calls: 0 };
        let (result, text) = run(&mut encoder, "/nonexistent/me.jpg\n/tmp\n", SessionOptions::default());

        assert!(matches!(result, Err(SessionError::Target(TargetError::NotFound(_)))));
        assert!(!text.contains("Enter the path to the folder to scan"));
        assert_eq!(encoder.calls, 0);
    }

    #[test]
    fn closed_input_is_fatal() {
        let mut encoder = SameFace { calls: 0 };
        let (result, _) = run(&mut encoder, "", SessionOptions::default());
        assert!(matches!(result, Err(SessionError::InputClosed)));
    }

    #[test]
    fn preset_paths_skip_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("me.jpg");
        std::fs::write(&target, b"img").unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        std::fs::write(photos.join("x.jpg"), b"img").unwrap();

        let options = SessionOptions {
            target: Some(target),
            folder: Some(photos.clone()),
            ..SessionOptions::default()
        };
        let mut encoder = SameFace { calls: 0 };
        let (result, text) = run(&mut encoder, "y\n", options);

        let summary = result.unwrap();
        assert!(!text.contains("Enter the path"));
        assert_eq!(summary.moved(), 1);
        assert!(photos.join("removed_faces/x.jpg").exists());
        assert!(text.contains("Match found:"));
        assert!(text.contains("(Distance: 0.0000)"));
        assert!(text.ends_with("\nOperation completed.\n"));
    }
}
