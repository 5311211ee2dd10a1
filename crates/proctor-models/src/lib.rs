//! Shared data models for the proctoring pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Face geometry (bounding boxes)
//! - Cameras and their session mode
//! - Students, roster entries and identity labels
//! - Violation verdicts
//! - Evidence and attendance records handed to collaborators

pub mod camera;
pub mod evidence;
pub mod rect;
pub mod student;
pub mod violation;

// Re-export common types
pub use camera::{CameraConfig, CameraId, CameraMode, CameraModeParseError};
pub use evidence::{AttendanceRecord, EvidenceId, EvidenceRecord, UNKNOWN_IDENTITY};
pub use rect::BoundingBox;
pub use student::{normalize_classroom, IdentityLabel, Student, StudentId};
pub use violation::{Verdict, ViolationKind};
