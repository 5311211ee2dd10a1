//! Structured camera logging utilities.
//!
//! Provides consistent lifecycle logging for camera loops with the
//! camera ID and mode attached to every line.

use proctor_models::{CameraId, CameraMode};
use tracing::{error, info, warn, Span};

/// Camera logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct CameraLogger {
    camera_id: String,
    mode: String,
    location: String,
}

impl CameraLogger {
    pub fn new(camera_id: CameraId, mode: CameraMode, location: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            mode: mode.as_str().to_string(),
            location: location.into(),
        }
    }

    /// Log the start of the camera loop.
    pub fn log_start(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            mode = %self.mode,
            location = %self.location,
            "Camera started: {}", message
        );
    }

    /// Log a phase change (e.g. attendance closed).
    pub fn log_progress(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            mode = %self.mode,
            "Camera progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            camera_id = %self.camera_id,
            mode = %self.mode,
            "Camera warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            camera_id = %self.camera_id,
            mode = %self.mode,
            "Camera error: {}", message
        );
    }

    /// Log the end of the camera loop.
    pub fn log_completion(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            mode = %self.mode,
            "Camera stopped: {}", message
        );
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Create a tracing span for this camera.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "camera",
            camera_id = %self.camera_id,
            mode = %self.mode,
            location = %self.location
        )
    }
}
