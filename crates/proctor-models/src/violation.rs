//! Violation kinds and the per-frame verdict.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of policy violation raised for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// No violation.
    #[default]
    None,
    /// A phone is visible in the frame.
    PhoneUsage,
    /// A face that does not resolve to any registered student.
    UnknownPerson,
    /// Sustained mouth motion.
    Talking,
    /// Repeated left/right head movement.
    SideLook,
    /// Talking and side-looking in the same frame.
    TalkingAndSideLook,
}

impl ViolationKind {
    /// All kinds that represent an actual violation, highest priority first.
    pub const VIOLATIONS: &'static [ViolationKind] = &[
        ViolationKind::PhoneUsage,
        ViolationKind::UnknownPerson,
        ViolationKind::TalkingAndSideLook,
        ViolationKind::Talking,
        ViolationKind::SideLook,
    ];

    /// Returns the kind name as a string, suitable for file names and labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::None => "none",
            ViolationKind::PhoneUsage => "phone_usage",
            ViolationKind::UnknownPerson => "unknown_person",
            ViolationKind::Talking => "talking",
            ViolationKind::SideLook => "side_look",
            ViolationKind::TalkingAndSideLook => "talking_and_side_look",
        }
    }

    /// Returns a human-readable description used in alerts.
    pub fn description(&self) -> &'static str {
        match self {
            ViolationKind::None => "No violation",
            ViolationKind::PhoneUsage => "Phone Usage",
            ViolationKind::UnknownPerson => "Unknown Face",
            ViolationKind::Talking => "Talking",
            ViolationKind::SideLook => "Side Look",
            ViolationKind::TalkingAndSideLook => "Talking + Side Look",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fused classification of one frame. Produced fresh every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Verdict {
    pub is_violation: bool,
    pub kind: ViolationKind,
}

impl Verdict {
    /// A verdict with no violation.
    pub fn none() -> Self {
        Self::default()
    }

    /// A violation verdict of the given kind.
    ///
    /// Passing [`ViolationKind::None`] yields [`Verdict::none`].
    pub fn violation(kind: ViolationKind) -> Self {
        Self {
            is_violation: kind != ViolationKind::None,
            kind,
        }
    }

    /// The violation kind, or `None` when the frame is clean.
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        self.is_violation.then_some(self.kind)
    }
}
