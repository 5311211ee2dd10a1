//! Proctoring session worker.
//!
//! This crate provides:
//! - Per-camera processing loops for exam halls and classrooms
//! - Session executor with roster refresh and graceful shutdown
//! - Bounded evidence dispatch to persistence and notification sinks
//! - Attendance sheets for classroom sessions
//! - Directory replay feeds and file-backed sinks

pub mod attendance;
pub mod camera_loop;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod replay;
pub mod sinks;

pub use attendance::{AttendanceRegister, AttendanceSheet};
pub use camera_loop::{CameraLoop, CameraStats, ClassroomState, SessionHandles};
pub use collaborators::{
    CameraFeed, FrameRead, FrameSource, JsonRosterProvider, NotificationSink, PersistenceSink,
    RosterProvider,
};
pub use config::{load_camera_config, SessionMode, WorkerConfig};
pub use dispatcher::{Dispatcher, DispatchWorker};
pub use error::{WorkerError, WorkerResult};
pub use executor::{SessionExecutor, SessionReport, ShutdownHandle};
pub use logging::CameraLogger;
pub use replay::replay_feed;
pub use sinks::{FileEvidenceSink, LogNotifier};
