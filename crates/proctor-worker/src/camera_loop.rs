//! Per-camera processing loop.
//!
//! Each camera runs on its own blocking thread and processes frames in
//! arrival order. All per-track state lives in the loop's analyzer; only
//! the roster snapshot and the attendance register are shared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use image::RgbImage;
use proctor_engine::{CameraAnalyzer, FaceDetection, Roster, Timestamp};
use proctor_models::{
    normalize_classroom, CameraConfig, CameraId, CameraMode, EvidenceRecord, ViolationKind,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::attendance::{attendance_record, AttendanceRegister, AttendanceSheet};
use crate::collaborators::{CameraFeed, FrameRead};
use crate::dispatcher::Dispatcher;
use crate::logging::CameraLogger;
use crate::metrics;

/// Subject used when a classroom camera has none configured.
pub const DEFAULT_SUBJECT: &str = "General";

/// Session-wide handles every camera loop reads from.
#[derive(Clone)]
pub struct SessionHandles {
    pub roster: watch::Receiver<Arc<Roster>>,
    pub dispatcher: Dispatcher,
    pub shutdown: watch::Receiver<bool>,
    /// Zero point of the session clock
    pub started: Instant,
    /// Pause after each frame read
    pub frame_interval: Duration,
}

/// Counters reported when a camera loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub frames: u64,
    pub skipped: u64,
    pub violations: u64,
    pub alerts: u64,
    pub attendance: u64,
}

/// Classroom attendance followed by phone discipline.
pub struct ClassroomState {
    classroom: String,
    subject: String,
    window_secs: f64,
    sheet: AttendanceSheet,
    register: AttendanceRegister,
}

impl ClassroomState {
    pub fn new(
        classroom: &str,
        subject: &str,
        window: Duration,
        sheet: AttendanceSheet,
        register: AttendanceRegister,
    ) -> Self {
        Self {
            classroom: normalize_classroom(classroom),
            subject: subject.to_string(),
            window_secs: window.as_secs_f64(),
            sheet,
            register,
        }
    }

    fn attendance_open(&self, now: Timestamp) -> bool {
        now <= self.window_secs
    }
}

enum ModeState {
    Exam,
    Classroom(ClassroomState),
}

/// Processing loop for one camera.
pub struct CameraLoop {
    camera_id: CameraId,
    location: String,
    analyzer: CameraAnalyzer,
    feed: CameraFeed,
    session: SessionHandles,
    state: ModeState,
    logger: CameraLogger,
    stats: CameraStats,
}

impl CameraLoop {
    /// Exam-hall loop: full surveillance with per-camera alerting.
    pub fn exam(
        camera_id: CameraId,
        config: &CameraConfig,
        analyzer: CameraAnalyzer,
        feed: CameraFeed,
        session: SessionHandles,
    ) -> Self {
        Self::build(camera_id, config, analyzer, feed, session, ModeState::Exam)
    }

    /// Classroom loop: attendance window, then per-student phone discipline.
    pub fn classroom(
        camera_id: CameraId,
        config: &CameraConfig,
        analyzer: CameraAnalyzer,
        feed: CameraFeed,
        session: SessionHandles,
        classroom: ClassroomState,
    ) -> Self {
        Self::build(
            camera_id,
            config,
            analyzer,
            feed,
            session,
            ModeState::Classroom(classroom),
        )
    }

    fn build(
        camera_id: CameraId,
        config: &CameraConfig,
        analyzer: CameraAnalyzer,
        feed: CameraFeed,
        session: SessionHandles,
        state: ModeState,
    ) -> Self {
        let location = config.location_or_default(camera_id);
        let logger = CameraLogger::new(camera_id, analyzer.mode(), location.clone());
        Self {
            camera_id,
            location,
            analyzer,
            feed,
            session,
            state,
            logger,
            stats: CameraStats::default(),
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn stats(&self) -> &CameraStats {
        &self.stats
    }

    /// Read and process frames until the source closes or shutdown is signalled.
    pub fn run(mut self) -> CameraStats {
        let span = self.logger.create_span();
        let _guard = span.enter();
        self.logger.log_start(&self.location);

        loop {
            if *self.session.shutdown.borrow() {
                self.logger.log_progress("shutdown requested");
                break;
            }

            match self.feed.source.next_frame() {
                FrameRead::Frame(frame) => {
                    let now = self.session.started.elapsed().as_secs_f64();
                    self.process_frame(&frame, now);
                }
                FrameRead::Skip => {
                    self.stats.skipped += 1;
                    metrics::record_frame_skipped(self.camera_id);
                }
                FrameRead::Closed => {
                    self.logger.log_progress("frame source closed");
                    break;
                }
            }

            if !self.session.frame_interval.is_zero() {
                std::thread::sleep(self.session.frame_interval);
            }
        }

        self.finish()
    }

    /// Process one frame captured at session time `now`.
    pub fn process_frame(&mut self, frame: &RgbImage, now: Timestamp) {
        self.stats.frames += 1;
        let roster = Arc::clone(&*self.session.roster.borrow());
        let detections = self.feed.faces.detect_faces(frame);

        match self.state {
            ModeState::Exam => self.process_exam(frame, &detections, &roster, now),
            ModeState::Classroom(_) => self.process_classroom(frame, &detections, &roster, now),
        }
    }

    fn process_exam(
        &mut self,
        frame: &RgbImage,
        detections: &[FaceDetection],
        roster: &Roster,
        now: Timestamp,
    ) {
        let analysis =
            self.analyzer
                .analyze(frame, detections, roster, self.feed.objects.as_ref(), now);

        let Some(kind) = analysis.verdict.violation_kind() else {
            return;
        };
        self.stats.violations += 1;

        if !self.analyzer.allow_alert(now) {
            debug!(camera_id = %self.camera_id, kind = %kind, "Alert suppressed by cooldown");
            return;
        }

        let student = analysis.representative().and_then(|usn| roster.student(usn));
        let record = EvidenceRecord::new(
            student,
            kind,
            self.camera_id,
            CameraMode::Exam,
            self.location.clone(),
            Utc::now(),
        );
        info!(
            camera_id = %self.camera_id,
            usn = %record.usn,
            kind = %kind,
            faces = analysis.faces.len(),
            "Exam violation"
        );

        if self.session.dispatcher.dispatch_violation(record, frame.clone()) {
            self.stats.alerts += 1;
        }
    }

    fn process_classroom(
        &mut self,
        frame: &RgbImage,
        detections: &[FaceDetection],
        roster: &Roster,
        now: Timestamp,
    ) {
        let ModeState::Classroom(classroom) = &mut self.state else {
            return;
        };
        let faces = self.analyzer.identify(detections, roster, now);

        if classroom.attendance_open(now) {
            for usn in faces.iter().filter_map(|face| face.student_id()) {
                let Some(student) = roster.student(usn) else {
                    continue;
                };
                if student.classroom() != classroom.classroom || !classroom.register.mark(usn) {
                    continue;
                }

                let record = attendance_record(
                    usn,
                    &student.name,
                    &classroom.classroom,
                    &classroom.subject,
                    self.camera_id,
                    Utc::now(),
                );
                if let Err(e) = classroom.sheet.append(&record) {
                    self.logger.log_warning(&format!("attendance sheet write failed: {}", e));
                }
                info!(
                    camera_id = %self.camera_id,
                    usn = %usn,
                    classroom = %classroom.classroom,
                    "Attendance marked"
                );
                self.session.dispatcher.dispatch_attendance(record);
                self.stats.attendance += 1;
                metrics::record_attendance(self.camera_id);
            }
            return;
        }

        if classroom.sheet.is_open() {
            if let Err(e) = classroom.sheet.close() {
                self.logger.log_warning(&format!("attendance sheet close failed: {}", e));
            }
            self.logger.log_progress(&format!(
                "attendance closed with {} marks, discipline mode active",
                classroom.sheet.rows()
            ));
        }

        for usn in faces.iter().filter_map(|face| face.student_id()) {
            if !self
                .analyzer
                .check_phone(self.feed.objects.as_ref(), frame, Some(usn), now)
            {
                continue;
            }
            self.stats.violations += 1;

            let record = EvidenceRecord::new(
                roster.student(usn),
                ViolationKind::PhoneUsage,
                self.camera_id,
                CameraMode::Normal,
                self.location.clone(),
                Utc::now(),
            );
            info!(camera_id = %self.camera_id, usn = %usn, "Phone usage in class");

            if self.session.dispatcher.dispatch_violation(record, frame.clone()) {
                self.stats.alerts += 1;
            }
        }
    }

    /// Close session-scoped resources and release the frame source.
    pub fn finish(mut self) -> CameraStats {
        if let ModeState::Classroom(classroom) = &mut self.state {
            if let Err(e) = classroom.sheet.close() {
                self.logger.log_error(&format!("attendance sheet close failed: {}", e));
            }
        }
        self.feed.source.release();

        self.logger.log_completion(&format!(
            "{} frames, {} skipped, {} violations, {} alerts, {} attendance",
            self.stats.frames,
            self.stats.skipped,
            self.stats.violations,
            self.stats.alerts,
            self.stats.attendance
        ));
        self.stats
    }
}
