#![deny(unreachable_patterns)]
//! Violation detection and alerting engine.
//!
//! This crate provides:
//! - Track keys (grid quantization or IoU tracking) for faces across frames
//! - Majority-vote identity smoothing over a short label window
//! - Windowed behavioral detectors (talking, side-look)
//! - Priority-ordered signal fusion into a single verdict
//! - Per-key cooldown tables for phone detection and alert dispatch
//! - A per-camera analyzer wiring the above into one frame step

pub mod analyzer;
pub mod config;
pub mod cooldown;
pub mod detect;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod history;
pub mod identity;
pub mod metrics;
pub mod phone;
pub mod roster;
pub mod side_look;
pub mod talking;
pub mod track_key;
pub mod tracker;

pub use analyzer::{CameraAnalyzer, FaceObservation, FrameAnalysis, IdentifiedFace};
pub use config::{EngineConfig, TrackStrategy};
pub use cooldown::{CooldownTable, RateKey};
pub use detect::{FaceDetection, FaceDetector, ObjectDetector, PHONE_CLASS};
pub use error::{EngineError, EngineResult};
pub use fusion::{fuse, Signals};
pub use identity::IdentityResolver;
pub use phone::PhoneGate;
pub use roster::{EuclideanMatcher, IdentityMatcher, Roster};
pub use side_look::SideLookDetector;
pub use talking::TalkingDetector;
pub use track_key::{TrackKey, TrackKeyer};
pub use tracker::IoUTracker;

/// Seconds on a monotonic session clock.
pub type Timestamp = f64;
