//! Engine metrics.
//!
//! Counters are no-ops until the host process installs a recorder.

use metrics::{counter, gauge};
use proctor_models::{CameraId, ViolationKind};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "proctor_frames_processed_total";
    pub const FACES_DETECTED_TOTAL: &str = "proctor_faces_detected_total";
    pub const VIOLATIONS_DETECTED_TOTAL: &str = "proctor_violations_detected_total";
    pub const ALERTS_ALLOWED_TOTAL: &str = "proctor_alerts_allowed_total";
    pub const ALERTS_SUPPRESSED_TOTAL: &str = "proctor_alerts_suppressed_total";
    pub const PHONE_CHECKS_TOTAL: &str = "proctor_phone_checks_total";
    pub const PHONE_CHECKS_SKIPPED_TOTAL: &str = "proctor_phone_checks_skipped_total";
    pub const TRACKS_EVICTED_TOTAL: &str = "proctor_tracks_evicted_total";
    pub const ACTIVE_TRACKS: &str = "proctor_active_tracks";
}

/// Record one analyzed frame and the faces found in it.
pub fn record_frame(camera_id: CameraId, faces: usize) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    counter!(names::FACES_DETECTED_TOTAL, &labels).increment(faces as u64);
}

/// Record a fused violation, before cooldown gating.
pub fn record_violation(camera_id: CameraId, kind: ViolationKind) {
    let labels = [
        ("camera", camera_id.to_string()),
        ("kind", kind.as_str().to_string()),
    ];
    counter!(names::VIOLATIONS_DETECTED_TOTAL, &labels).increment(1);
}

/// Record the outcome of the alert cooldown gate.
pub fn record_alert_gate(camera_id: CameraId, allowed: bool) {
    let labels = [("camera", camera_id.to_string())];
    if allowed {
        counter!(names::ALERTS_ALLOWED_TOTAL, &labels).increment(1);
    } else {
        counter!(names::ALERTS_SUPPRESSED_TOTAL, &labels).increment(1);
    }
}

/// Record an object detector invocation, or a skip while cooling down.
pub fn record_phone_check(ran: bool) {
    if ran {
        counter!(names::PHONE_CHECKS_TOTAL).increment(1);
    } else {
        counter!(names::PHONE_CHECKS_SKIPPED_TOTAL).increment(1);
    }
}

pub fn record_eviction(camera_id: CameraId, evicted: usize) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::TRACKS_EVICTED_TOTAL, &labels).increment(evicted as u64);
}

pub fn set_active_tracks(camera_id: CameraId, count: usize) {
    let labels = [("camera", camera_id.to_string())];
    gauge!(names::ACTIVE_TRACKS, &labels).set(count as f64);
}
