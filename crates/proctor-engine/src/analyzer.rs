//! Per-camera frame analysis.
//!
//! A [`CameraAnalyzer`] owns every piece of per-track state for one camera:
//! track keys, identity windows, mouth and position histories, and both
//! cooldown tables. Frames must be fed in arrival order.

use std::sync::Arc;

use image::RgbImage;
use proctor_models::{BoundingBox, CameraId, CameraMode, IdentityLabel, StudentId, Verdict};
use rayon::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::cooldown::{CooldownTable, RateKey};
use crate::detect::{FaceDetection, ObjectDetector};
use crate::error::EngineResult;
use crate::fusion::{fuse, Signals};
use crate::identity::IdentityResolver;
use crate::metrics;
use crate::phone::PhoneGate;
use crate::roster::{EuclideanMatcher, IdentityMatcher, Roster};
use crate::side_look::SideLookDetector;
use crate::talking::TalkingDetector;
use crate::track_key::{TrackKey, TrackKeyer};
use crate::Timestamp;

/// A face with its track key and smoothed identity.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedFace {
    pub bbox: BoundingBox,
    pub key: TrackKey,
    pub label: IdentityLabel,
    /// Distance to the nearest known vector, if any were registered
    pub distance: Option<f64>,
}

impl IdentifiedFace {
    pub fn student_id(&self) -> Option<&StudentId> {
        self.label.student_id()
    }
}

/// An identified face with this frame's behavioral signals.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub face: IdentifiedFace,
    pub talking: bool,
    pub side_look: bool,
}

/// Outcome of analyzing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// Faces in detection (scan) order
    pub faces: Vec<FaceObservation>,
    pub signals: Signals,
    pub verdict: Verdict,
}

impl FrameAnalysis {
    /// First face in scan order whose smoothed label is a known student.
    pub fn representative(&self) -> Option<&StudentId> {
        self.faces.iter().find_map(|obs| obs.face.student_id())
    }
}

/// Stateful analyzer for one camera stream.
pub struct CameraAnalyzer {
    camera_id: CameraId,
    mode: CameraMode,
    config: EngineConfig,
    matcher: Arc<dyn IdentityMatcher>,
    keyer: TrackKeyer,
    identities: IdentityResolver,
    talking: TalkingDetector,
    side_look: SideLookDetector,
    phone: PhoneGate,
    alerts: CooldownTable<RateKey>,
    last_eviction: Option<Timestamp>,
}

impl CameraAnalyzer {
    /// Create an analyzer with Euclidean identity matching.
    pub fn new(camera_id: CameraId, mode: CameraMode, config: EngineConfig) -> EngineResult<Self> {
        Self::with_matcher(camera_id, mode, config, Arc::new(EuclideanMatcher))
    }

    pub fn with_matcher(
        camera_id: CameraId,
        mode: CameraMode,
        config: EngineConfig,
        matcher: Arc<dyn IdentityMatcher>,
    ) -> EngineResult<Self> {
        config.validate()?;

        Ok(Self {
            camera_id,
            mode,
            keyer: TrackKeyer::from_config(&config),
            identities: IdentityResolver::new(config.match_threshold, config.label_history),
            talking: TalkingDetector::new(&config),
            side_look: SideLookDetector::new(&config),
            phone: PhoneGate::new(&config),
            alerts: CooldownTable::new(),
            last_eviction: None,
            matcher,
            config,
        })
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Assign track keys and smoothed identities to this frame's faces.
    ///
    /// Nearest-vector search runs in parallel; results enter the per-track
    /// windows in detection order.
    pub fn identify(
        &mut self,
        detections: &[FaceDetection],
        roster: &Roster,
        now: Timestamp,
    ) -> Vec<IdentifiedFace> {
        let boxes: Vec<BoundingBox> = detections.iter().map(|d| d.bbox).collect();
        let keys = self.keyer.assign(&boxes);

        let matcher = self.matcher.as_ref();
        let matches: Vec<Option<(&StudentId, f64)>> = detections
            .par_iter()
            .map(|detection| roster.best_match(matcher, &detection.vector))
            .collect();

        detections
            .iter()
            .zip(keys)
            .zip(matches)
            .map(|((detection, key), best)| {
                let label = self.identities.resolve(key, best, now);
                IdentifiedFace {
                    bbox: detection.bbox,
                    key,
                    label,
                    distance: best.map(|(_, distance)| distance),
                }
            })
            .collect()
    }

    /// Run the full per-frame pipeline: identity, behavior, phone, fusion.
    ///
    /// The object detector is consulted only when at least one face is
    /// present and the camera's phone cooldown has expired.
    pub fn analyze(
        &mut self,
        frame: &RgbImage,
        detections: &[FaceDetection],
        roster: &Roster,
        objects: &dyn ObjectDetector,
        now: Timestamp,
    ) -> FrameAnalysis {
        let identified = self.identify(detections, roster, now);

        let faces: Vec<FaceObservation> = identified
            .into_iter()
            .map(|face| {
                let talking = self.talking.observe(frame, &face.bbox, face.key, now);
                let side_look = self.side_look.observe(&face.bbox, face.key, now);
                FaceObservation {
                    face,
                    talking,
                    side_look,
                }
            })
            .collect();

        let phone = !faces.is_empty() && self.check_phone(objects, frame, None, now);

        let signals = Signals {
            phone,
            unknown_face: faces.iter().any(|obs| !obs.face.label.is_known()),
            talking: faces.iter().any(|obs| obs.talking),
            side_look: faces.iter().any(|obs| obs.side_look),
        };
        let verdict = fuse(signals);

        metrics::record_frame(self.camera_id, faces.len());
        if let Some(kind) = verdict.violation_kind() {
            metrics::record_violation(self.camera_id, kind);
            debug!(
                camera_id = %self.camera_id,
                kind = %kind,
                faces = faces.len(),
                "Violation detected"
            );
        }

        self.maybe_evict(now);

        FrameAnalysis {
            faces,
            signals,
            verdict,
        }
    }

    /// Phone check keyed per the camera's suppression policy.
    pub fn check_phone(
        &mut self,
        objects: &dyn ObjectDetector,
        frame: &RgbImage,
        student: Option<&StudentId>,
        now: Timestamp,
    ) -> bool {
        let key = RateKey::for_phone(self.camera_id, student, self.mode);
        self.phone.check(objects, frame, key, now)
    }

    /// Violation-alert cooldown for this camera.
    pub fn allow_alert(&mut self, now: Timestamp) -> bool {
        let allowed = self.alerts.allow(
            RateKey::Camera(self.camera_id),
            now,
            self.config.alert_cooldown_secs,
        );
        metrics::record_alert_gate(self.camera_id, allowed);
        allowed
    }

    /// Tracks currently holding identity state.
    pub fn track_count(&self) -> usize {
        self.identities.track_count()
    }

    /// Drop per-track state idle for longer than `stale_track_secs`.
    ///
    /// Runs at most once per idle window; never runs when eviction is unset.
    pub fn maybe_evict(&mut self, now: Timestamp) -> usize {
        let Some(max_idle) = self.config.stale_track_secs else {
            return 0;
        };
        if matches!(self.last_eviction, Some(last) if now - last < max_idle) {
            return 0;
        }
        self.last_eviction = Some(now);

        let evicted = self.identities.evict_older_than(now, max_idle)
            + self.talking.evict_older_than(now, max_idle)
            + self.side_look.evict_older_than(now, max_idle);
        self.phone.evict_older_than(now, max_idle.max(self.config.phone_cooldown_secs));
        self.alerts
            .evict_older_than(now, max_idle.max(self.config.alert_cooldown_secs));

        if evicted > 0 {
            debug!(camera_id = %self.camera_id, evicted, "Evicted stale tracks");
            metrics::record_eviction(self.camera_id, evicted);
        }
        metrics::set_active_tracks(self.camera_id, self.identities.track_count());
        evicted
    }
}
