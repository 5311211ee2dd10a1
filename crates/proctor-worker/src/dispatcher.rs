//! Evidence and attendance dispatch.
//!
//! Camera loops hand jobs to a bounded queue and never wait on
//! collaborators. A single task drains the queue: persistence first, then
//! notification. Collaborator failures are logged and counted here and go
//! no further.

use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use proctor_models::{AttendanceRecord, EvidenceRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::collaborators::{NotificationSink, PersistenceSink};
use crate::metrics;

/// One unit of dispatch work. Violation jobs own their frame copy.
#[derive(Debug)]
pub enum DispatchJob {
    Violation {
        record: EvidenceRecord,
        frame: RgbImage,
    },
    Attendance(AttendanceRecord),
}

/// Cheap, cloneable handle used by camera loops.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<DispatchJob>,
}

impl Dispatcher {
    /// Start the dispatch task with a queue of `capacity` jobs.
    pub fn spawn(
        persistence: Arc<dyn PersistenceSink>,
        notifier: Arc<dyn NotificationSink>,
        capacity: usize,
    ) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_dispatch(rx, persistence, notifier));
        (Self { tx }, DispatchWorker { handle })
    }

    /// Queue a violation. Never blocks; returns false when the job was dropped.
    pub fn dispatch_violation(&self, record: EvidenceRecord, frame: RgbImage) -> bool {
        let camera_id = record.camera_id;
        let kind = record.violation;
        match self.tx.try_send(DispatchJob::Violation { record, frame }) {
            Ok(()) => {
                metrics::record_evidence_dispatched(camera_id, kind);
                true
            }
            Err(e) => {
                warn!(camera_id = %camera_id, kind = %kind, "Evidence dropped: {}", e);
                metrics::record_evidence_dropped(camera_id);
                false
            }
        }
    }

    /// Queue an attendance mark. Never blocks; returns false when dropped.
    pub fn dispatch_attendance(&self, record: AttendanceRecord) -> bool {
        let camera_id = record.camera_id;
        match self.tx.try_send(DispatchJob::Attendance(record)) {
            Ok(()) => true,
            Err(e) => {
                warn!(camera_id = %camera_id, "Attendance record dropped: {}", e);
                metrics::record_evidence_dropped(camera_id);
                false
            }
        }
    }
}

/// The running dispatch task.
#[derive(Debug)]
pub struct DispatchWorker {
    handle: JoinHandle<usize>,
}

impl DispatchWorker {
    /// Wait up to `grace` for queued jobs to finish once every
    /// [`Dispatcher`] handle has been dropped.
    ///
    /// Returns the number of jobs handled, or `None` when the grace period
    /// ran out and the remaining jobs were abandoned.
    pub async fn drain(self, grace: Duration) -> Option<usize> {
        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(handled)) => {
                info!(handled, "Dispatch queue drained");
                Some(handled)
            }
            Ok(Err(e)) => {
                error!("Dispatch task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Dispatch grace period elapsed, abandoning in-flight evidence");
                handle.abort();
                None
            }
        }
    }
}

async fn run_dispatch(
    mut rx: mpsc::Receiver<DispatchJob>,
    persistence: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn NotificationSink>,
) -> usize {
    let mut handled = 0;
    while let Some(job) = rx.recv().await {
        match job {
            DispatchJob::Violation { record, frame } => {
                dispatch_violation(&record, &frame, persistence.as_ref(), notifier.as_ref())
                    .await;
            }
            DispatchJob::Attendance(record) => {
                if let Err(e) = persistence.record_attendance(&record).await {
                    error!(usn = %record.usn, camera_id = %record.camera_id, "Attendance persistence failed: {}", e);
                    metrics::record_dispatch_failure("attendance");
                }
            }
        }
        handled += 1;
    }
    handled
}

async fn dispatch_violation(
    record: &EvidenceRecord,
    frame: &RgbImage,
    persistence: &dyn PersistenceSink,
    notifier: &dyn NotificationSink,
) {
    // Notification still goes out when persistence fails, without a stored path.
    let stored = match persistence.record_violation(record, frame).await {
        Ok(stored) => stored,
        Err(e) => {
            error!(
                evidence_id = %record.id,
                camera_id = %record.camera_id,
                kind = %record.violation,
                "Evidence persistence failed: {}", e
            );
            metrics::record_dispatch_failure("persistence");
            record.clone()
        }
    };

    match notifier.notify(&stored, frame).await {
        Ok(()) => debug!(evidence_id = %stored.id, "Alert delivered"),
        Err(e) => {
            warn!(
                evidence_id = %stored.id,
                camera_id = %stored.camera_id,
                "Alert notification failed: {}", e
            );
            metrics::record_dispatch_failure("notification");
        }
    }
}
