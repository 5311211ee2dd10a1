//! External collaborators consumed by the camera loops.
//!
//! Frame acquisition and the detection models are blocking and run on the
//! camera's own thread. Roster loading, persistence and notification are
//! async and run on the runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use proctor_engine::{FaceDetector, ObjectDetector};
use proctor_models::{AttendanceRecord, EvidenceRecord, Student};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Result of one frame read.
#[derive(Debug)]
pub enum FrameRead {
    Frame(RgbImage),
    /// No frame this iteration; skip without touching any state
    Skip,
    /// The source is exhausted or released
    Closed,
}

/// Blocking frame source for one camera.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> FrameRead;

    /// Release the underlying capture device.
    fn release(&mut self) {}
}

/// Everything a camera loop reads from: frames plus the models run on them.
pub struct CameraFeed {
    pub source: Box<dyn FrameSource>,
    pub faces: Arc<dyn FaceDetector>,
    pub objects: Arc<dyn ObjectDetector>,
}

impl CameraFeed {
    pub fn new(
        source: Box<dyn FrameSource>,
        faces: Arc<dyn FaceDetector>,
        objects: Arc<dyn ObjectDetector>,
    ) -> Self {
        Self {
            source,
            faces,
            objects,
        }
    }
}

/// Source of registered students and their identity vectors.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn load_known_identities(&self) -> WorkerResult<Vec<Student>>;
}

/// Durable record keeping for attendance and violations.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_attendance(&self, record: &AttendanceRecord) -> WorkerResult<()>;

    /// Store the evidence frame and record; returns the record with its
    /// evidence path filled in.
    async fn record_violation(
        &self,
        record: &EvidenceRecord,
        frame: &RgbImage,
    ) -> WorkerResult<EvidenceRecord>;
}

/// Best-effort alert delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, record: &EvidenceRecord, frame: &RgbImage) -> WorkerResult<()>;
}

/// Roster read from a JSON array of students.
#[derive(Debug, Clone)]
pub struct JsonRosterProvider {
    path: PathBuf,
}

impl JsonRosterProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RosterProvider for JsonRosterProvider {
    async fn load_known_identities(&self) -> WorkerResult<Vec<Student>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            WorkerError::roster_failed(format!("{}: {}", self.path.display(), e))
        })?;
        let students: Vec<Student> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), students = students.len(), "Roster loaded");
        Ok(students)
    }
}
