//! Students, identity vectors and per-frame identity labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// University serial number identifying a student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct StudentId(pub String);

impl From<String> for StudentId {
    fn from(usn: String) -> Self {
        Self::new(usn)
    }
}

impl StudentId {
    /// Create from an existing string; USNs are stored upper-case.
    pub fn new(usn: impl Into<String>) -> Self {
        Self(usn.into().trim().to_uppercase())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered student with their enrolled identity vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub usn: StudentId,
    pub name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub section: String,
    /// Face encodings captured at registration.
    #[serde(default, alias = "face_encodings")]
    pub vectors: Vec<Vec<f64>>,
}

impl Student {
    /// Classroom the student belongs to, e.g. `CS-5A`.
    pub fn classroom(&self) -> String {
        normalize_classroom(&format!("{}-{}{}", self.branch, self.semester, self.section))
    }
}

/// Normalize a classroom label for comparison: no whitespace, upper-case.
pub fn normalize_classroom(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Identity decision for one face, either a concrete student or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "usn")]
pub enum IdentityLabel {
    Known(StudentId),
    Unknown,
}

impl IdentityLabel {
    pub fn is_known(&self) -> bool {
        matches!(self, IdentityLabel::Known(_))
    }

    /// The student id if the label is known.
    pub fn student_id(&self) -> Option<&StudentId> {
        match self {
            IdentityLabel::Known(id) => Some(id),
            IdentityLabel::Unknown => None,
        }
    }
}

impl fmt::Display for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityLabel::Known(id) => write!(f, "{}", id),
            IdentityLabel::Unknown => f.write_str("UNKNOWN"),
        }
    }
}
