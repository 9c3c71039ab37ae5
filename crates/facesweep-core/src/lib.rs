//! facesweep-core: find a reference face across a folder of photos.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both running
//! via ONNX Runtime on the CPU. The sweep itself (target loading, scanning,
//! quarantine moves, operator prompts) only sees the [`FaceEncoder`] trait.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod prompt;
pub mod quarantine;
pub mod recognizer;
pub mod scanner;
pub mod session;
pub mod target;
pub mod types;

pub use encoder::{default_model_dir, EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use quarantine::{Quarantine, QUARANTINE_DIR_NAME};
pub use scanner::{FaceScanner, ScanReport};
pub use session::{Disposition, Session, SessionError, SessionOptions, SessionSummary};
pub use types::{BoundingBox, Embedding, MatchRecord, DEFAULT_TOLERANCE};
