//! Session executor.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use proctor_engine::{CameraAnalyzer, EngineConfig, Roster};
use proctor_models::{normalize_classroom, CameraConfig, CameraId, CameraMode, Student};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::attendance::{session_label, AttendanceRegister, AttendanceSheet};
use crate::camera_loop::{CameraLoop, CameraStats, ClassroomState, SessionHandles, DEFAULT_SUBJECT};
use crate::collaborators::{CameraFeed, NotificationSink, PersistenceSink, RosterProvider};
use crate::config::{SessionMode, WorkerConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Requests a graceful stop of every camera loop in the session.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub cameras: BTreeMap<CameraId, CameraStats>,
    /// Dispatch jobs completed, or `None` when the drain grace period ran out
    pub dispatched: Option<usize>,
}

/// Runs one proctoring session across the configured cameras.
pub struct SessionExecutor {
    config: WorkerConfig,
    engine: EngineConfig,
    cameras: BTreeMap<CameraId, CameraConfig>,
    roster_provider: Arc<dyn RosterProvider>,
    persistence: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn NotificationSink>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SessionExecutor {
    pub fn new(
        config: WorkerConfig,
        engine: EngineConfig,
        cameras: BTreeMap<CameraId, CameraConfig>,
        roster_provider: Arc<dyn RosterProvider>,
        persistence: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            engine,
            cameras,
            roster_provider,
            persistence,
            notifier,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Cameras taking part in a `mode` session.
    pub fn select_cameras(&self, mode: SessionMode) -> WorkerResult<Vec<(CameraId, CameraConfig)>> {
        let selected: Vec<_> = self
            .cameras
            .iter()
            .filter(|(_, config)| mode.includes(config.mode))
            .map(|(id, config)| (*id, config.clone()))
            .collect();

        if selected.is_empty() {
            return Err(match mode {
                SessionMode::Exam => WorkerError::NoExamCameras,
                other => WorkerError::NoCameras(other.to_string()),
            });
        }
        Ok(selected)
    }

    /// Load the roster; an empty one ends the session.
    async fn load_roster(&self) -> WorkerResult<Roster> {
        let students = self.roster_provider.load_known_identities().await?;
        let roster = Roster::new(students);
        if !roster.has_identities() {
            return Err(WorkerError::EmptyRoster);
        }
        Ok(roster)
    }

    /// Run a session until every camera source closes or shutdown is triggered.
    ///
    /// Cameras without a feed in `feeds` are skipped with a warning.
    pub async fn run(
        &self,
        mode: SessionMode,
        mut feeds: HashMap<CameraId, CameraFeed>,
    ) -> WorkerResult<SessionReport> {
        let cameras = self.select_cameras(mode)?;
        let roster = self.load_roster().await?;
        info!(
            mode = %mode,
            cameras = cameras.len(),
            students = roster.students().len(),
            "Starting session"
        );

        let (roster_tx, roster_rx) = watch::channel(Arc::new(roster));
        let refresh_task = self.spawn_roster_refresh(roster_tx);

        let (dispatcher, dispatch_worker) = Dispatcher::spawn(
            Arc::clone(&self.persistence),
            Arc::clone(&self.notifier),
            self.config.dispatch_capacity,
        );

        let session = SessionHandles {
            roster: roster_rx,
            dispatcher,
            shutdown: self.shutdown.subscribe(),
            started: Instant::now(),
            frame_interval: self.config.frame_interval,
        };

        let register = AttendanceRegister::new();
        let session_name = session_label(Local::now());

        let mut loops: Vec<(CameraId, JoinHandle<CameraStats>)> = Vec::new();
        for (camera_id, camera) in cameras {
            let Some(feed) = feeds.remove(&camera_id) else {
                warn!(camera_id = %camera_id, "No feed for camera, skipping");
                continue;
            };

            let camera_loop = match self.build_loop(
                camera_id,
                &camera,
                feed,
                session.clone(),
                &register,
                &session_name,
            ) {
                Ok(camera_loop) => camera_loop,
                Err(e) => {
                    error!(camera_id = %camera_id, "Camera setup failed: {}", e);
                    continue;
                }
            };

            loops.push((
                camera_id,
                tokio::task::spawn_blocking(move || camera_loop.run()),
            ));
        }
        drop(session);

        let mut report = SessionReport::default();
        let no_loops = loops.is_empty();
        for (camera_id, handle) in loops {
            match handle.await {
                Ok(stats) => {
                    report.cameras.insert(camera_id, stats);
                }
                Err(e) => error!(camera_id = %camera_id, "Camera loop panicked: {}", e),
            }
        }

        refresh_task.abort();
        report.dispatched = dispatch_worker.drain(self.config.shutdown_timeout).await;

        if no_loops {
            return Err(WorkerError::camera_failed("no camera could be started"));
        }

        info!(
            mode = %mode,
            cameras = report.cameras.len(),
            "Session finished"
        );
        Ok(report)
    }

    fn build_loop(
        &self,
        camera_id: CameraId,
        camera: &CameraConfig,
        feed: CameraFeed,
        session: SessionHandles,
        register: &AttendanceRegister,
        session_name: &str,
    ) -> WorkerResult<CameraLoop> {
        let analyzer = CameraAnalyzer::new(camera_id, camera.mode, self.engine.clone())?;

        match camera.mode {
            CameraMode::Exam => Ok(CameraLoop::exam(camera_id, camera, analyzer, feed, session)),
            CameraMode::Normal => {
                let classroom = normalize_classroom(&camera.location_or_default(camera_id));
                let subject = camera.subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
                let sheet = AttendanceSheet::create(
                    &self.config.attendance_dir,
                    &classroom,
                    subject,
                    session_name,
                    camera_id,
                )?;
                let state = ClassroomState::new(
                    &classroom,
                    subject,
                    self.config.attendance_window,
                    sheet,
                    register.clone(),
                );
                Ok(CameraLoop::classroom(
                    camera_id, camera, analyzer, feed, session, state,
                ))
            }
        }
    }

    /// Periodically reload the roster; failures keep the previous snapshot.
    fn spawn_roster_refresh(&self, roster_tx: watch::Sender<Arc<Roster>>) -> JoinHandle<()> {
        let provider = Arc::clone(&self.roster_provider);
        let period = self.config.roster_refresh;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let loaded = provider.load_known_identities().await;
                        if let Some(roster) = refreshed_roster(loaded) {
                            roster_tx.send_replace(Arc::new(roster));
                        }
                    }
                }
            }
        })
    }
}

/// Roster to swap in after a reload, or `None` to keep the current one.
///
/// A reload is held to the same bar as session start: it must carry at
/// least one identity vector.
fn refreshed_roster(loaded: WorkerResult<Vec<Student>>) -> Option<Roster> {
    let students = match loaded {
        Ok(students) => students,
        Err(e) => {
            warn!("Roster refresh failed: {}", e);
            metrics::record_roster_refresh(false);
            return None;
        }
    };

    let roster = Roster::new(students);
    if !roster.has_identities() {
        warn!("Roster refresh returned no identities, keeping previous roster");
        metrics::record_roster_refresh(false);
        return None;
    }

    info!(students = roster.students().len(), "Roster refreshed");
    metrics::record_roster_refresh(true);
    Some(roster)
}
