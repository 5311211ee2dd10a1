//! File-backed persistence and log-based notification.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use proctor_models::{AttendanceRecord, EvidenceRecord};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::collaborators::{NotificationSink, PersistenceSink};
use crate::error::{WorkerError, WorkerResult};

const VIOLATION_LOG: &str = "violations.jsonl";
const ATTENDANCE_LOG: &str = "attendance.jsonl";

/// Writes evidence images under `{root}/{usn}/` and appends JSON lines logs.
#[derive(Debug, Clone)]
pub struct FileEvidenceSink {
    root: PathBuf,
}

impl FileEvidenceSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{usn}/{kind}_{YYYYmmdd_HHMMSS}.jpg`
    pub fn evidence_path(&self, record: &EvidenceRecord) -> PathBuf {
        let stamp = record.timestamp.format("%Y%m%d_%H%M%S");
        self.root
            .join(sanitize(&record.usn))
            .join(format!("{}_{}.jpg", record.violation.as_str(), stamp))
    }

    async fn append_line<T: Serialize>(&self, file: &str, value: &T) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let mut out = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(file))
            .await?;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Keep path components to characters that are safe in file names.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl PersistenceSink for FileEvidenceSink {
    async fn record_attendance(&self, record: &AttendanceRecord) -> WorkerResult<()> {
        self.append_line(ATTENDANCE_LOG, record).await
    }

    async fn record_violation(
        &self,
        record: &EvidenceRecord,
        frame: &RgbImage,
    ) -> WorkerResult<EvidenceRecord> {
        let path = self.evidence_path(record);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // JPEG encoding is CPU-bound.
        let image = frame.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || image.save_with_format(&target, ImageFormat::Jpeg))
            .await
            .map_err(|e| WorkerError::persistence(format!("evidence encoder task: {}", e)))??;

        let mut stored = record.clone();
        stored.evidence_path = Some(path.to_string_lossy().into_owned());
        self.append_line(VIOLATION_LOG, &stored).await?;

        info!(
            evidence_id = %stored.id,
            usn = %stored.usn,
            kind = %stored.violation,
            path = %path.display(),
            "Evidence stored"
        );
        Ok(stored)
    }
}

/// Emits every alert as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, record: &EvidenceRecord, frame: &RgbImage) -> WorkerResult<()> {
        warn!(
            evidence_id = %record.id,
            usn = %record.usn,
            name = %record.name,
            kind = %record.violation,
            camera_id = %record.camera_id,
            location = %record.location,
            evidence = record.evidence_path.as_deref().unwrap_or("-"),
            width = frame.width(),
            height = frame.height(),
            "ALERT: {}", record.violation.description()
        );
        Ok(())
    }
}
