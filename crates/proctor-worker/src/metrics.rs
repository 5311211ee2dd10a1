//! Worker metrics and the Prometheus exporter.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use proctor_models::{CameraId, ViolationKind};

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_SKIPPED_TOTAL: &str = "proctor_frames_skipped_total";
    pub const EVIDENCE_DISPATCHED_TOTAL: &str = "proctor_evidence_dispatched_total";
    pub const EVIDENCE_DROPPED_TOTAL: &str = "proctor_evidence_dropped_total";
    pub const DISPATCH_FAILURES_TOTAL: &str = "proctor_dispatch_failures_total";
    pub const ATTENDANCE_MARKED_TOTAL: &str = "proctor_attendance_marked_total";
    pub const ROSTER_REFRESHES_TOTAL: &str = "proctor_roster_refreshes_total";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_frame_skipped(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::FRAMES_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn record_evidence_dispatched(camera_id: CameraId, kind: ViolationKind) {
    let labels = [
        ("camera", camera_id.to_string()),
        ("kind", kind.as_str().to_string()),
    ];
    counter!(names::EVIDENCE_DISPATCHED_TOTAL, &labels).increment(1);
}

/// Record a job dropped because the dispatch queue was full or closed.
pub fn record_evidence_dropped(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::EVIDENCE_DROPPED_TOTAL, &labels).increment(1);
}

/// Record a collaborator failure at the dispatch boundary.
pub fn record_dispatch_failure(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::DISPATCH_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_attendance(camera_id: CameraId) {
    let labels = [("camera", camera_id.to_string())];
    counter!(names::ATTENDANCE_MARKED_TOTAL, &labels).increment(1);
}

pub fn record_roster_refresh(success: bool) {
    let labels = [("result", if success { "ok" } else { "error" }.to_string())];
    counter!(names::ROSTER_REFRESHES_TOTAL, &labels).increment(1);
}
