use facesweep_core::scanner::ScanError;
use facesweep_core::target::TargetError;
use facesweep_core::{
    Disposition, EncodeError, Embedding, FaceEncoder, Session, SessionError, SessionOptions,
    SessionSummary, QUARANTINE_DIR_NAME,
};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Embedding at a given cosine distance from the target `[1, 0]`.
fn at_distance(distance: f32) -> Embedding {
    let cos = 1.0 - distance;
    Embedding::new(vec![cos, (1.0 - cos * cos).max(0.0).sqrt()])
}

/// Stub encoder keyed by file name. Records every file it was asked about.
#[derive(Default)]
struct StubEncoder {
    faces: HashMap<String, Vec<Embedding>>,
    failing: Vec<String>,
    seen: Vec<String>,
}

impl StubEncoder {
    fn with_target() -> Self {
        let mut stub = Self::default();
        stub.faces.insert("target.jpg".into(), vec![Embedding::new(vec![1.0, 0.0])]);
        stub
    }

    fn face(mut self, name: &str, distance: f32) -> Self {
        self.faces.insert(name.into(), vec![at_distance(distance)]);
        self
    }

    fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.into());
        self
    }
}

impl FaceEncoder for StubEncoder {
    fn encode(&mut self, path: &Path) -> Result<Vec<Embedding>, EncodeError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.seen.push(name.clone());
        if self.failing.contains(&name) {
            return Err(EncodeError::Other("simulated decoder crash".into()));
        }
        Ok(self.faces.get(&name).cloned().unwrap_or_default())
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self { dir: TempDir::new().unwrap() };
        fixture.write("target.jpg");
        fs::create_dir(fixture.photos()).unwrap();
        fixture
    }

    fn target(&self) -> PathBuf {
        self.dir.path().join("target.jpg")
    }

    fn photos(&self) -> PathBuf {
        self.dir.path().join("photos")
    }

    fn write(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, rel.as_bytes()).unwrap();
        path
    }

    fn quarantine(&self) -> PathBuf {
        self.photos().join(QUARANTINE_DIR_NAME)
    }

    /// Answers the two path prompts, then feeds `answers` to the match prompts.
    fn run(&self, encoder: &mut StubEncoder, answers: &str) -> (Result<SessionSummary, SessionError>, String) {
        let input = format!("{}\n{}\n{answers}", self.target().display(), self.photos().display());
        let mut output = Vec::new();
        let result = Session::new(encoder, Cursor::new(input), &mut output, SessionOptions::default()).run();
        (result, String::from_utf8(output).unwrap())
    }
}

#[test]
fn missing_target_is_fatal_and_nothing_is_scanned() {
    let fixture = Fixture::new();
    fixture.write("photos/a.jpg");
    fs::remove_file(fixture.target()).unwrap();

    let mut encoder = StubEncoder::with_target().face("a.jpg", 0.1);
    let (result, text) = fixture.run(&mut encoder, "y\n");

    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Target(TargetError::NotFound(_))));
    assert!(err.to_string().starts_with("Target image '"));
    assert!(encoder.seen.is_empty());
    assert!(!text.contains("Scanning images"));
}

#[test]
fn target_without_faces_is_fatal() {
    let fixture = Fixture::new();
    fixture.write("photos/a.jpg");

    let mut encoder = StubEncoder::default().face("a.jpg", 0.1);
    let (result, _) = fixture.run(&mut encoder, "y\n");

    assert!(matches!(result, Err(SessionError::Target(TargetError::NoFace(_)))));
    assert_eq!(encoder.seen, vec!["target.jpg".to_string()]);
}

#[test]
fn unreadable_target_is_fatal_and_scan_never_starts() {
    let fixture = Fixture::new();
    fixture.write("photos/a.jpg");

    let mut encoder = StubEncoder::with_target().failing("target.jpg").face("a.jpg", 0.1);
    let (result, text) = fixture.run(&mut encoder, "y\n");

    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Target(TargetError::Encode { .. })), "got {err}");
    assert!(err.to_string().contains(&fixture.target().display().to_string()));
    assert_eq!(encoder.seen, vec!["target.jpg".to_string()]);
    assert!(!text.contains("Scanning images"));
    assert!(!fixture.quarantine().exists());
}

#[test]
fn missing_folder_is_fatal() {
    let fixture = Fixture::new();
    fs::remove_dir(fixture.photos()).unwrap();

    let mut encoder = StubEncoder::with_target();
    let (result, _) = fixture.run(&mut encoder, "");

    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Scan(ScanError::FolderNotFound(_))));
    assert!(err.to_string().contains("does not exist"));
    assert!(!fixture.quarantine().exists());
}

#[test]
fn only_close_faces_are_reported() {
    let fixture = Fixture::new();
    let close = fixture.write("photos/close.jpg");
    let far = fixture.write("photos/far.jpg");

    let mut encoder = StubEncoder::with_target().face("close.jpg", 0.3).face("far.jpg", 0.9);
    let (result, text) = fixture.run(&mut encoder, "n\n");

    let summary = result.unwrap();
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].path, close);
    assert!(text.contains("Found 1 image(s) containing the target face."));
    assert!(text.contains(&format!("Match found: {} (Distance: 0.3000)", close.display())));
    assert!(!text.contains(&far.display().to_string()));
}

#[test]
fn text_files_are_never_encoded() {
    let fixture = Fixture::new();
    fixture.write("photos/notes.txt");
    fixture.write("photos/sub/pic.PNG");

    let mut encoder = StubEncoder::with_target();
    let (result, text) = fixture.run(&mut encoder, "");

    let summary = result.unwrap();
    assert!(!encoder.seen.contains(&"notes.txt".to_string()));
    assert!(encoder.seen.contains(&"pic.PNG".to_string()));
    assert_eq!(summary.files_examined, 1);
    assert!(text.contains("No images with the target face were found."));
    // Nothing matched, so no quarantine folder either.
    assert!(!fixture.quarantine().exists());
}

#[test]
fn confirmed_match_is_moved_and_declined_match_is_kept() {
    let fixture = Fixture::new();
    let moved = fixture.write("photos/a/one.jpg");
    let kept = fixture.write("photos/b/two.jpg");

    let mut encoder = StubEncoder::with_target().face("one.jpg", 0.2).face("two.jpg", 0.2);
    let (result, text) = fixture.run(&mut encoder, "yes\nNO\n");

    let summary = result.unwrap();
    let destination = fixture.quarantine().join("one.jpg");
    assert!(!moved.exists());
    assert!(destination.exists());
    assert!(kept.exists());

    assert_eq!(summary.outcomes[0].disposition, Disposition::Moved { destination });
    assert_eq!(summary.outcomes[1].disposition, Disposition::Kept);
    assert!(text.contains(&format!("Kept '{}'.", kept.display())));
    assert!(text.contains(&format!("Moved '{}' to '{}'.", moved.display(), fixture.quarantine().display())));
}

#[test]
fn failing_file_does_not_hide_later_matches() {
    let fixture = Fixture::new();
    let broken = fixture.write("photos/1_broken.jpg");
    let later = fixture.write("photos/2_match.jpg");

    let mut encoder = StubEncoder::with_target().failing("1_broken.jpg").face("2_match.jpg", 0.1);
    let (result, text) = fixture.run(&mut encoder, "n\n");

    let summary = result.unwrap();
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].path, broken);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].path, later);

    let warning = text.find("Warning: Could not process image").unwrap();
    let matched = text.find("Match found:").unwrap();
    assert!(warning < matched);
    assert!(text.contains("simulated decoder crash"));
}

#[test]
fn move_collision_is_reported_and_run_continues() {
    let fixture = Fixture::new();
    fixture.write("photos/removed_faces/dup.jpg");
    let first = fixture.write("photos/x/dup.jpg");
    let second = fixture.write("photos/y/other.jpg");

    let mut encoder = StubEncoder::with_target().face("dup.jpg", 0.1).face("other.jpg", 0.1);
    let (result, text) = fixture.run(&mut encoder, "y\ny\n");

    let summary = result.unwrap();
    assert!(matches!(summary.outcomes[0].disposition, Disposition::MoveFailed { .. }));
    assert!(first.exists());
    assert!(text.contains(&format!("Error: Could not remove/move image '{}'.", first.display())));

    assert!(!second.exists());
    assert!(fixture.quarantine().join("other.jpg").exists());
    assert_eq!(summary.moved(), 1);
    // The pre-existing quarantined file was not offered again.
    assert_eq!(encoder.seen.iter().filter(|n| *n == "dup.jpg").count(), 1);
}

#[test]
fn unrecognized_answers_are_asked_again() {
    let fixture = Fixture::new();
    let photo = fixture.write("photos/me.jpg");

    let mut encoder = StubEncoder::with_target().face("me.jpg", 0.0);
    let (result, text) = fixture.run(&mut encoder, "sure\nY\n");

    assert_eq!(result.unwrap().moved(), 1);
    assert!(!photo.exists());
    assert_eq!(text.matches("Please respond with 'y' or 'n'.").count(), 1);
}
