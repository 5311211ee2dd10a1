//! Classroom attendance: session-wide marks and per-camera CSV sheets.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, Utc};
use proctor_models::{AttendanceRecord, CameraId, StudentId};

use crate::error::WorkerResult;

const CSV_HEADER: [&str; 6] = ["USN", "Name", "Subject", "Class", "Time", "Camera ID"];

/// Students already marked present in this session, shared by all cameras.
#[derive(Debug, Clone, Default)]
pub struct AttendanceRegister {
    marked: Arc<Mutex<HashSet<StudentId>>>,
}

impl AttendanceRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `usn` present. Returns false if it was already marked.
    pub fn mark(&self, usn: &StudentId) -> bool {
        self.marked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(usn.clone())
    }

    pub fn is_marked(&self, usn: &StudentId) -> bool {
        self.marked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(usn)
    }

    pub fn len(&self) -> usize {
        self.marked.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session label used in sheet file names, e.g. `09AM`.
pub fn session_label(at: DateTime<Local>) -> String {
    at.format("%I%p").to_string()
}

/// One camera's attendance CSV, open until the attendance window closes.
#[derive(Debug)]
pub struct AttendanceSheet {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: usize,
}

impl AttendanceSheet {
    /// Open `{dir}/{classroom}_{subject}_{session}_{camera}.csv` for appending.
    ///
    /// The header is written only when the file is new or empty, so a
    /// restarted session keeps rows already on disk.
    pub fn create(
        dir: &Path,
        classroom: &str,
        subject: &str,
        session: &str,
        camera_id: CameraId,
    ) -> WorkerResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "{}_{}_{}_{}.csv",
            classroom, subject, session, camera_id
        ));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            path,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one row. Writing to a closed sheet is a no-op.
    pub fn append(&mut self, record: &AttendanceRecord) -> WorkerResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let time = record
            .timestamp
            .with_timezone(&Local)
            .format("%d-%m-%Y %H:%M:%S")
            .to_string();
        let camera = record.camera_id.index().to_string();
        writer.write_record([
            record.usn.as_str(),
            record.name.as_str(),
            record.subject.as_str(),
            record.classroom.as_str(),
            time.as_str(),
            camera.as_str(),
        ])?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close the sheet. Further calls are no-ops.
    pub fn close(&mut self) -> WorkerResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for AttendanceSheet {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Build the attendance record for a student seen at `timestamp`.
pub fn attendance_record(
    usn: &StudentId,
    name: &str,
    classroom: &str,
    subject: &str,
    camera_id: CameraId,
    timestamp: DateTime<Utc>,
) -> AttendanceRecord {
    AttendanceRecord {
        usn: usn.clone(),
        name: name.to_string(),
        classroom: classroom.to_string(),
        subject: subject.to_string(),
        camera_id,
        timestamp,
    }
}
