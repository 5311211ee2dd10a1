//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No exam cameras configured")]
    NoExamCameras,

    #[error("No cameras configured for {0} session")]
    NoCameras(String),

    #[error("No registered students")]
    EmptyRoster,

    #[error("Roster load failed: {0}")]
    RosterFailed(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Camera loop failed: {0}")]
    CameraFailed(String),

    #[error("Engine error: {0}")]
    Engine(#[from] proctor_engine::EngineError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn roster_failed(msg: impl Into<String>) -> Self {
        Self::RosterFailed(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    pub fn camera_failed(msg: impl Into<String>) -> Self {
        Self::CameraFailed(msg.into())
    }

    /// Whether this error ends the session without being a process failure.
    ///
    /// Missing exam cameras and an empty roster stop the affected session
    /// with a diagnostic; other sessions keep running.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::NoExamCameras | WorkerError::NoCameras(_) | WorkerError::EmptyRoster
        )
    }

    /// Whether this error came from a persistence or notification collaborator.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::Persistence(_) | WorkerError::Notification(_)
        )
    }
}
