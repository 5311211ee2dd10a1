//! Camera identity and per-camera session configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a physical camera (capture device index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(pub u32);

impl CameraId {
    /// Get the raw device index.
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam_{}", self.0)
    }
}

impl From<u32> for CameraId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Monitoring mode a camera runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Classroom: attendance window, then per-student phone discipline.
    #[default]
    Normal,
    /// Exam hall: full behavioral surveillance with per-camera alerting.
    Exam,
}

impl CameraMode {
    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMode::Normal => "normal",
            CameraMode::Exam => "exam",
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown camera mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown camera mode: {0}")]
pub struct CameraModeParseError(pub String);

impl FromStr for CameraMode {
    type Err = CameraModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" | "classroom" => Ok(CameraMode::Normal),
            "exam" => Ok(CameraMode::Exam),
            other => Err(CameraModeParseError(other.to_string())),
        }
    }
}

/// Read-only configuration of one camera, loaded once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub mode: CameraMode,

    /// Classroom (normal mode) or exam hall (exam mode) this camera watches.
    #[serde(default, alias = "classroom", alias = "hall")]
    pub label: String,

    /// Branch expected in the hall, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_branch: Option<String>,

    /// Subject taught during the session (normal mode attendance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl CameraConfig {
    /// Create an exam-hall camera configuration.
    pub fn exam(hall: impl Into<String>) -> Self {
        Self {
            mode: CameraMode::Exam,
            label: hall.into(),
            expected_branch: None,
            subject: None,
        }
    }

    /// Create a classroom camera configuration.
    pub fn classroom(classroom: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            mode: CameraMode::Normal,
            label: classroom.into(),
            expected_branch: None,
            subject: Some(subject.into()),
        }
    }

    /// Label used when the configured one is blank.
    pub fn location_or_default(&self, camera_id: CameraId) -> String {
        if self.label.trim().is_empty() {
            match self.mode {
                CameraMode::Exam => format!("Hall-{}", camera_id.index()),
                CameraMode::Normal => format!("Classroom-{}", camera_id.index()),
            }
        } else {
            self.label.clone()
        }
    }
}
