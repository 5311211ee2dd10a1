//! Records handed to the persistence and notification collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{CameraId, CameraMode, Student, StudentId, ViolationKind};

/// Placeholder used for unattributed incidents.
pub const UNKNOWN_IDENTITY: &str = "UNKNOWN";

/// Unique identifier for an evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(pub String);

impl EvidenceId {
    /// Generate a new random evidence ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EvidenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured metadata describing one detected violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: EvidenceId,
    /// USN of the attributed student, or `UNKNOWN`.
    pub usn: String,
    /// Display name of the attributed student, or `UNKNOWN`.
    pub name: String,
    pub violation: ViolationKind,
    pub camera_id: CameraId,
    pub mode: CameraMode,
    pub timestamp: DateTime<Utc>,
    /// Hall or classroom label.
    pub location: String,
    /// Where the evidence image was stored, filled in by the persistence sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_path: Option<String>,
}

impl EvidenceRecord {
    /// Create a record, attributed to `student` when one is known.
    pub fn new(
        student: Option<&Student>,
        violation: ViolationKind,
        camera_id: CameraId,
        mode: CameraMode,
        location: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (usn, name) = match student {
            Some(s) => (s.usn.to_string(), s.name.clone()),
            None => (UNKNOWN_IDENTITY.to_string(), UNKNOWN_IDENTITY.to_string()),
        };

        Self {
            id: EvidenceId::new(),
            usn,
            name,
            violation,
            camera_id,
            mode,
            timestamp,
            location: location.into(),
            evidence_path: None,
        }
    }

    /// Whether the incident could not be attributed to a student.
    pub fn is_unattributed(&self) -> bool {
        self.usn == UNKNOWN_IDENTITY
    }
}

/// One attendance mark in a classroom session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub usn: StudentId,
    pub name: String,
    pub classroom: String,
    pub subject: String,
    pub camera_id: CameraId,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unattributed_record() {
        let record = EvidenceRecord::new(
            None,
            ViolationKind::UnknownPerson,
            CameraId(1),
            CameraMode::Exam,
            "Exam Hall 2",
            Utc::now(),
        );
        assert!(record.is_unattributed());
        assert_eq!(record.name, UNKNOWN_IDENTITY);
        assert_eq!(record.location, "Exam Hall 2");
    }

    #[test]
    fn test_attributed_record_roundtrip() {
        let student = Student {
            usn: StudentId::new("1AB21CS001"),
            name: "Asha".to_string(),
            branch: "CS".to_string(),
            semester: "5".to_string(),
            section: "A".to_string(),
            vectors: vec![],
        };
        let record = EvidenceRecord::new(
            Some(&student),
            ViolationKind::PhoneUsage,
            CameraId(0),
            CameraMode::Normal,
            "CS-5A",
            Utc::now(),
        );
        assert!(!record.is_unattributed());

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("evidence_path"));
        let parsed: EvidenceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
