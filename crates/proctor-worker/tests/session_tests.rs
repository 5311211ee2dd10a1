//! End-to-end session tests with in-memory collaborators.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::RgbImage;
use proctor_engine::{
    CameraAnalyzer, EngineConfig, FaceDetection, FaceDetector, ObjectDetector, Roster, PHONE_CLASS,
};
use proctor_models::{
    AttendanceRecord, BoundingBox, CameraConfig, CameraId, CameraMode, EvidenceRecord, Student,
    StudentId, ViolationKind, UNKNOWN_IDENTITY,
};
use proctor_worker::{
    CameraFeed, CameraLoop, Dispatcher, FrameRead, FrameSource, NotificationSink,
    PersistenceSink, RosterProvider, SessionExecutor, SessionHandles, SessionMode, WorkerConfig,
    WorkerError, WorkerResult,
};
use tokio::sync::watch;
use tokio_test::{assert_err, assert_ok};

const KNOWN: [f64; 2] = [0.1, 0.0];
const STRANGER: [f64; 2] = [3.0, 3.0];

fn student(usn: &str, branch: &str, origin: [f64; 2]) -> Student {
    Student {
        usn: StudentId::new(usn),
        name: format!("Student {}", usn),
        branch: branch.to_string(),
        semester: "5".to_string(),
        section: "A".to_string(),
        vectors: vec![origin.to_vec()],
    }
}

fn asha() -> Student {
    student("1AB21CS001", "CS", [0.0, 0.0])
}

fn face_at(x: f64, vector: [f64; 2]) -> FaceDetection {
    FaceDetection::new(BoundingBox::new(x, 8.0, 40.0, 40.0), vector.to_vec())
}

struct Scripted {
    remaining: usize,
}

impl FrameSource for Scripted {
    fn next_frame(&mut self) -> FrameRead {
        if self.remaining == 0 {
            return FrameRead::Closed;
        }
        self.remaining -= 1;
        FrameRead::Frame(RgbImage::new(128, 64))
    }
}

struct FixedFaces(Vec<FaceDetection>);

impl FaceDetector for FixedFaces {
    fn detect_faces(&self, _frame: &RgbImage) -> Vec<FaceDetection> {
        self.0.clone()
    }
}

/// Every third frame the encoder drifts away from the enrolled vector.
#[derive(Default)]
struct FlickeringFace {
    calls: AtomicUsize,
}

impl FaceDetector for FlickeringFace {
    fn detect_faces(&self, _frame: &RgbImage) -> Vec<FaceDetection> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = if call % 3 == 2 { STRANGER } else { KNOWN };
        vec![face_at(8.0, vector)]
    }
}

/// Encoder alternates between the enrolled vector and a stranger every frame.
#[derive(Default)]
struct AlternatingFace {
    calls: AtomicUsize,
}

impl FaceDetector for AlternatingFace {
    fn detect_faces(&self, _frame: &RgbImage) -> Vec<FaceDetection> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = if call % 2 == 1 { STRANGER } else { KNOWN };
        vec![face_at(8.0, vector)]
    }
}

struct Phone(bool);

impl ObjectDetector for Phone {
    fn detect_class(&self, _frame: &RgbImage, target_class: &str, _confidence: f32) -> bool {
        self.0 && target_class == PHONE_CLASS
    }
}

fn feed(frames: usize, faces: Vec<FaceDetection>, phone: bool) -> CameraFeed {
    CameraFeed::new(
        Box::new(Scripted { remaining: frames }),
        Arc::new(FixedFaces(faces)),
        Arc::new(Phone(phone)),
    )
}

struct StaticRoster(Vec<Student>);

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn load_known_identities(&self) -> WorkerResult<Vec<Student>> {
        Ok(self.0.clone())
    }
}

struct UnreachableRoster;

#[async_trait]
impl RosterProvider for UnreachableRoster {
    async fn load_known_identities(&self) -> WorkerResult<Vec<Student>> {
        Err(WorkerError::roster_failed("connection refused"))
    }
}

#[derive(Default)]
struct Recorder {
    violations: Mutex<Vec<EvidenceRecord>>,
    attendance: Mutex<Vec<AttendanceRecord>>,
    notified: Mutex<Vec<EvidenceRecord>>,
    fail_persistence: bool,
}

#[async_trait]
impl PersistenceSink for Recorder {
    async fn record_attendance(&self, record: &AttendanceRecord) -> WorkerResult<()> {
        self.attendance.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn record_violation(
        &self,
        record: &EvidenceRecord,
        _frame: &RgbImage,
    ) -> WorkerResult<EvidenceRecord> {
        if self.fail_persistence {
            return Err(WorkerError::persistence("bucket unavailable"));
        }
        let mut stored = record.clone();
        stored.evidence_path = Some(format!("{}.jpg", record.id));
        self.violations.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl NotificationSink for Recorder {
    async fn notify(&self, record: &EvidenceRecord, _frame: &RgbImage) -> WorkerResult<()> {
        self.notified.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn worker_config(attendance_dir: &Path, attendance_window: Duration) -> WorkerConfig {
    WorkerConfig {
        attendance_dir: attendance_dir.to_path_buf(),
        attendance_window,
        frame_interval: Duration::ZERO,
        shutdown_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn build_executor(
    config: WorkerConfig,
    cameras: Vec<(u32, CameraConfig)>,
    roster: Arc<dyn RosterProvider>,
    sink: Arc<Recorder>,
) -> SessionExecutor {
    let cameras: BTreeMap<CameraId, CameraConfig> = cameras
        .into_iter()
        .map(|(id, camera)| (CameraId(id), camera))
        .collect();
    SessionExecutor::new(
        config,
        EngineConfig::default(),
        cameras,
        roster,
        sink.clone(),
        sink,
    )
}

#[tokio::test]
async fn test_exam_stranger_alerts_once_per_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([(CameraId(0), feed(10, vec![face_at(8.0, STRANGER)], false))]);
    let report = assert_ok!(executor.run(SessionMode::Exam, feeds).await);

    let stats = &report.cameras[&CameraId(0)];
    assert_eq!(stats.frames, 10);
    assert_eq!(stats.violations, 10);
    assert_eq!(stats.alerts, 1);
    assert_eq!(report.dispatched, Some(1));

    let notified = sink.notified.lock().unwrap();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].violation, ViolationKind::UnknownPerson);
    assert_eq!(notified[0].usn, UNKNOWN_IDENTITY);
    assert!(notified[0].evidence_path.is_some());
}

#[tokio::test]
async fn test_exam_phone_attributed_to_visible_student() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(2, CameraConfig::exam("Exam Hall 2"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([(CameraId(2), feed(6, vec![face_at(8.0, KNOWN)], true))]);
    let report = assert_ok!(executor.run(SessionMode::Hybrid, feeds).await);

    // the phone cooldown suppresses detection after the first hit
    let stats = &report.cameras[&CameraId(2)];
    assert_eq!(stats.violations, 1);
    assert_eq!(stats.alerts, 1);

    let stored = sink.violations.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].violation, ViolationKind::PhoneUsage);
    assert_eq!(stored[0].usn, "1AB21CS001");
    assert_eq!(stored[0].location, "Exam Hall 2");
}

#[tokio::test]
async fn test_flickering_match_keeps_identity() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([(
        CameraId(0),
        CameraFeed::new(
            Box::new(Scripted { remaining: 12 }),
            Arc::new(FlickeringFace::default()),
            Arc::new(Phone(false)),
        ),
    )]);
    let report = assert_ok!(executor.run(SessionMode::Exam, feeds).await);

    let stats = &report.cameras[&CameraId(0)];
    assert_eq!(stats.frames, 12);
    assert_eq!(stats.violations, 0);
    assert!(sink.notified.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_alternating_match_keeps_identity_across_window() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    // one full 5-label window of K,S,K,S,K; every tie resolves to the student
    let feeds = HashMap::from([(
        CameraId(0),
        CameraFeed::new(
            Box::new(Scripted { remaining: 5 }),
            Arc::new(AlternatingFace::default()),
            Arc::new(Phone(true)),
        ),
    )]);
    let report = assert_ok!(executor.run(SessionMode::Exam, feeds).await);

    let stats = &report.cameras[&CameraId(0)];
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.violations, 1);

    let notified = sink.notified.lock().unwrap();
    assert_eq!(notified.len(), 1);
    assert!(notified
        .iter()
        .all(|record| record.violation != ViolationKind::UnknownPerson));
    assert!(notified.iter().all(|record| record.usn == "1AB21CS001"));
}

#[tokio::test]
async fn test_classroom_attendance_marks_each_student_once() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let visitor = student("1AB21EC007", "EC", [10.0, 10.0]);
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(3600)),
        vec![(1, CameraConfig::classroom("cs-5a", "DBMS"))],
        Arc::new(StaticRoster(vec![asha(), visitor])),
        sink.clone(),
    );

    let faces = vec![face_at(8.0, KNOWN), face_at(80.0, [10.0, 10.1])];
    let feeds = HashMap::from([(CameraId(1), feed(8, faces, true))]);
    let report = assert_ok!(executor.run(SessionMode::Normal, feeds).await);

    let stats = &report.cameras[&CameraId(1)];
    assert_eq!(stats.attendance, 1);
    // phones are ignored while attendance is open
    assert_eq!(stats.violations, 0);

    let marks = sink.attendance.lock().unwrap();
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].usn, StudentId::new("1AB21CS001"));
    assert_eq!(marks[0].classroom, "CS-5A");
    assert_eq!(marks[0].subject, "DBMS");

    let sheets: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(sheets.len(), 1);
    let name = sheets[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("CS-5A_DBMS_"));

    let mut reader = csv::Reader::from_path(&sheets[0]).unwrap();
    assert_eq!(reader.records().count(), 1);
}

#[tokio::test]
async fn test_classroom_discipline_after_window() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::ZERO),
        vec![(1, CameraConfig::classroom("CS-5A", "DBMS"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([(CameraId(1), feed(5, vec![face_at(8.0, KNOWN)], true))]);
    let report = assert_ok!(executor.run(SessionMode::Hybrid, feeds).await);

    let stats = &report.cameras[&CameraId(1)];
    assert_eq!(stats.attendance, 0);
    assert_eq!(stats.violations, 1);

    let notified = sink.notified.lock().unwrap();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].violation, ViolationKind::PhoneUsage);
    assert_eq!(notified[0].usn, "1AB21CS001");
    assert_eq!(notified[0].mode, CameraMode::Normal);
    assert!(sink.attendance.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_hybrid_runs_every_camera() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(3600)),
        vec![
            (0, CameraConfig::exam("Exam Hall 1")),
            (1, CameraConfig::classroom("CS-5A", "DBMS")),
        ],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([
        (CameraId(0), feed(3, vec![face_at(8.0, STRANGER)], false)),
        (CameraId(1), feed(3, vec![face_at(8.0, KNOWN)], false)),
    ]);
    let report = assert_ok!(executor.run(SessionMode::Hybrid, feeds).await);

    assert_eq!(report.cameras.len(), 2);
    assert_eq!(report.cameras[&CameraId(0)].alerts, 1);
    assert_eq!(report.cameras[&CameraId(1)].attendance, 1);
    assert_eq!(report.dispatched, Some(2));
}

#[tokio::test]
async fn test_session_fatal_errors() {
    let dir = tempfile::tempdir().unwrap();

    let no_exam = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(1, CameraConfig::classroom("CS-5A", "DBMS"))],
        Arc::new(StaticRoster(vec![asha()])),
        Arc::new(Recorder::default()),
    );
    let err = assert_err!(no_exam.run(SessionMode::Exam, HashMap::new()).await);
    assert!(matches!(err, WorkerError::NoExamCameras));
    assert!(err.is_session_fatal());

    let empty_roster = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(Vec::new())),
        Arc::new(Recorder::default()),
    );
    let err = assert_err!(empty_roster.run(SessionMode::Exam, HashMap::new()).await);
    assert!(matches!(err, WorkerError::EmptyRoster));
    assert!(err.is_session_fatal());

    let unreachable = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(UnreachableRoster),
        Arc::new(Recorder::default()),
    );
    let err = assert_err!(unreachable.run(SessionMode::Exam, HashMap::new()).await);
    assert!(matches!(err, WorkerError::RosterFailed(_)));
}

#[tokio::test]
async fn test_persistence_failure_still_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder {
        fail_persistence: true,
        ..Default::default()
    });
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let feeds = HashMap::from([(CameraId(0), feed(4, vec![face_at(8.0, STRANGER)], false))]);
    let report = assert_ok!(executor.run(SessionMode::Exam, feeds).await);

    assert_eq!(report.cameras[&CameraId(0)].frames, 4);
    let notified = sink.notified.lock().unwrap();
    assert_eq!(notified.len(), 1);
    assert!(notified[0].evidence_path.is_none());
}

#[tokio::test]
async fn test_shutdown_stops_camera_loops() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Recorder::default());
    let executor = build_executor(
        worker_config(dir.path(), Duration::from_secs(60)),
        vec![(0, CameraConfig::exam("Exam Hall 1"))],
        Arc::new(StaticRoster(vec![asha()])),
        sink.clone(),
    );

    let shutdown = executor.shutdown_handle();
    shutdown.trigger();
    assert!(shutdown.is_triggered());

    let feeds = HashMap::from([(CameraId(0), feed(1000, vec![face_at(8.0, STRANGER)], false))]);
    let report = assert_ok!(executor.run(SessionMode::Exam, feeds).await);
    assert_eq!(report.cameras[&CameraId(0)].frames, 0);
}

#[tokio::test]
async fn test_alert_cooldown_on_session_clock() {
    let sink = Arc::new(Recorder::default());
    let (dispatcher, worker) = Dispatcher::spawn(sink.clone(), sink.clone(), 16);
    let (_roster_tx, roster) = watch::channel(Arc::new(Roster::new(vec![asha()])));
    let (_shutdown_tx, shutdown) = watch::channel(false);
    let session = SessionHandles {
        roster,
        dispatcher,
        shutdown,
        started: Instant::now(),
        frame_interval: Duration::ZERO,
    };

    let camera_id = CameraId(3);
    let analyzer =
        CameraAnalyzer::new(camera_id, CameraMode::Exam, EngineConfig::default()).unwrap();
    let mut camera = CameraLoop::exam(
        camera_id,
        &CameraConfig::exam("Exam Hall 3"),
        analyzer,
        feed(0, vec![face_at(8.0, STRANGER)], false),
        session,
    );

    let frame = RgbImage::new(128, 64);
    for now in [0.0, 5.0, 19.9, 20.5, 30.0, 41.0] {
        camera.process_frame(&frame, now);
    }

    let stats = camera.finish();
    assert_eq!(stats.violations, 6);
    assert_eq!(stats.alerts, 3);
    assert_eq!(worker.drain(Duration::from_secs(5)).await, Some(3));
    assert_eq!(sink.notified.lock().unwrap().len(), 3);
}
