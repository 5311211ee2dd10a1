//! Worker configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use proctor_engine::EngineConfig;
use proctor_models::{CameraConfig, CameraId, CameraMode};

use crate::error::{WorkerError, WorkerResult};

/// Which cameras a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Exam cameras only
    Exam,
    /// Classroom cameras only
    Normal,
    /// Every camera in its configured mode
    #[default]
    Hybrid,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Exam => "exam",
            SessionMode::Normal => "normal",
            SessionMode::Hybrid => "hybrid",
        }
    }

    /// Whether a camera configured with `mode` takes part in this session.
    pub fn includes(&self, mode: CameraMode) -> bool {
        match self {
            SessionMode::Exam => mode == CameraMode::Exam,
            SessionMode::Normal => mode == CameraMode::Normal,
            SessionMode::Hybrid => true,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exam" => Ok(SessionMode::Exam),
            "normal" | "classroom" => Ok(SessionMode::Normal),
            "hybrid" => Ok(SessionMode::Hybrid),
            other => Err(WorkerError::config_error(format!(
                "unknown session mode '{}'",
                other
            ))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Session to run
    pub session_mode: SessionMode,
    /// Camera configuration JSON
    pub camera_config_path: PathBuf,
    /// Optional engine tuning JSON; defaults apply when unset
    pub engine_config_path: Option<PathBuf>,
    /// Registered students JSON
    pub roster_path: PathBuf,
    /// Recorded frames, one `cam_<id>` directory per camera
    pub replay_dir: PathBuf,
    /// Evidence images and violation log
    pub evidence_dir: PathBuf,
    /// Attendance CSV sheets
    pub attendance_dir: PathBuf,
    /// Attendance window measured from session start
    pub attendance_window: Duration,
    /// How often the roster is reloaded
    pub roster_refresh: Duration,
    /// Pending evidence jobs before new ones are dropped
    pub dispatch_capacity: usize,
    /// Pause after each frame read
    pub frame_interval: Duration,
    /// Grace period for in-flight dispatch on shutdown
    pub shutdown_timeout: Duration,
    /// Prometheus listener address; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::Hybrid,
            camera_config_path: PathBuf::from("cameras.json"),
            engine_config_path: None,
            roster_path: PathBuf::from("students.json"),
            replay_dir: PathBuf::from("frames"),
            evidence_dir: PathBuf::from("evidence"),
            attendance_dir: PathBuf::from("attendance"),
            attendance_window: Duration::from_secs(60),
            roster_refresh: Duration::from_secs(300),
            dispatch_capacity: 64,
            frame_interval: Duration::from_millis(30),
            shutdown_timeout: Duration::from_secs(10),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let session_mode = match std::env::var("PROCTOR_SESSION_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.session_mode,
        };

        let metrics_addr = match std::env::var("PROCTOR_METRICS_ADDR") {
            Ok(value) => Some(value.parse().map_err(|_| {
                WorkerError::config_error(format!("invalid PROCTOR_METRICS_ADDR '{}'", value))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            session_mode,
            camera_config_path: env_path("PROCTOR_CAMERA_CONFIG", defaults.camera_config_path),
            engine_config_path: std::env::var("PROCTOR_ENGINE_CONFIG").ok().map(PathBuf::from),
            roster_path: env_path("PROCTOR_ROSTER_PATH", defaults.roster_path),
            replay_dir: env_path("PROCTOR_REPLAY_DIR", defaults.replay_dir),
            evidence_dir: env_path("PROCTOR_EVIDENCE_DIR", defaults.evidence_dir),
            attendance_dir: env_path("PROCTOR_ATTENDANCE_DIR", defaults.attendance_dir),
            attendance_window: Duration::from_secs(
                std::env::var("PROCTOR_ATTENDANCE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            roster_refresh: Duration::from_secs(
                std::env::var("PROCTOR_ROSTER_REFRESH_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            dispatch_capacity: std::env::var("PROCTOR_DISPATCH_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64),
            frame_interval: Duration::from_millis(
                std::env::var("PROCTOR_FRAME_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("PROCTOR_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            metrics_addr,
        })
    }

    /// Engine tuning from `engine_config_path`, or defaults.
    pub fn load_engine_config(&self) -> WorkerResult<EngineConfig> {
        let config = match &self.engine_config_path {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

/// Load the per-camera configuration table.
///
/// The file is a JSON object keyed by camera index:
/// `{"0": {"mode": "exam", "hall": "Exam Hall 1"}, ...}`.
pub fn load_camera_config(path: &Path) -> WorkerResult<BTreeMap<CameraId, CameraConfig>> {
    let raw = std::fs::read_to_string(path)?;
    parse_camera_config(&raw)
}

pub fn parse_camera_config(raw: &str) -> WorkerResult<BTreeMap<CameraId, CameraConfig>> {
    let table: BTreeMap<u32, CameraConfig> = serde_json::from_str(raw)?;
    if table.is_empty() {
        return Err(WorkerError::config_error("camera configuration is empty"));
    }
    Ok(table
        .into_iter()
        .map(|(id, config)| (CameraId(id), config))
        .collect())
}
