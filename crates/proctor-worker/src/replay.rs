//! Replay of recorded camera frames with sidecar detections.
//!
//! A camera directory holds image files processed in file-name order. Each
//! frame may have a JSON sidecar with the same stem carrying the model
//! outputs recorded for it:
//!
//! ```json
//! {"faces": [{"bbox": {"x": 10, "y": 20, "width": 80, "height": 80}, "vector": [0.1, 0.2]}],
//!  "objects": [{"class": "cell phone", "confidence": 0.8}]}
//! ```
//!
//! The detectors of a replay feed report the sidecar of the frame most
//! recently returned by its source.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbImage;
use proctor_engine::frame::decode_frame;
use proctor_engine::{FaceDetection, FaceDetector, ObjectDetector};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::collaborators::{CameraFeed, FrameRead, FrameSource};
use crate::error::{WorkerError, WorkerResult};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Clone, Deserialize)]
struct ObjectSighting {
    class: String,
    confidence: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Annotation {
    #[serde(default)]
    faces: Vec<FaceDetection>,
    #[serde(default)]
    objects: Vec<ObjectSighting>,
}

type SharedAnnotation = Arc<Mutex<Annotation>>;

/// Frames read from a directory, oldest file name first.
pub struct DirectoryFrameSource {
    frames: VecDeque<PathBuf>,
    current: SharedAnnotation,
}

impl DirectoryFrameSource {
    fn open(dir: &Path, current: SharedAnnotation) -> WorkerResult<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(WorkerError::config_error(format!(
                "no frames found in {}",
                dir.display()
            )));
        }

        Ok(Self {
            frames: frames.into(),
            current,
        })
    }

    fn load_annotation(frame_path: &Path) -> Annotation {
        let sidecar = frame_path.with_extension("json");
        let Ok(raw) = std::fs::read_to_string(&sidecar) else {
            return Annotation::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %sidecar.display(), "Ignoring malformed sidecar: {}", e);
            Annotation::default()
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> FrameRead {
        let Some(path) = self.frames.pop_front() else {
            return FrameRead::Closed;
        };

        let frame = match std::fs::read(&path)
            .map_err(WorkerError::from)
            .and_then(|bytes| decode_frame(&bytes).map_err(WorkerError::from))
        {
            Ok(frame) => frame,
            Err(e) => {
                debug!(path = %path.display(), "Skipping unreadable frame: {}", e);
                return FrameRead::Skip;
            }
        };

        let annotation = Self::load_annotation(&path);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = annotation;
        FrameRead::Frame(frame)
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}

/// Face detector replaying the current frame's recorded faces.
pub struct SidecarFaceDetector {
    current: SharedAnnotation,
}

impl FaceDetector for SidecarFaceDetector {
    fn detect_faces(&self, _frame: &RgbImage) -> Vec<FaceDetection> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .faces
            .clone()
    }
}

/// Object detector replaying the current frame's recorded objects.
pub struct SidecarObjectDetector {
    current: SharedAnnotation,
}

impl ObjectDetector for SidecarObjectDetector {
    fn detect_class(&self, _frame: &RgbImage, target_class: &str, confidence: f32) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .iter()
            .any(|o| o.class == target_class && o.confidence >= confidence)
    }
}

/// Build a camera feed replaying `dir`.
pub fn replay_feed(dir: &Path) -> WorkerResult<CameraFeed> {
    let current = SharedAnnotation::default();
    let source = DirectoryFrameSource::open(dir, Arc::clone(&current))?;
    Ok(CameraFeed::new(
        Box::new(source),
        Arc::new(SidecarFaceDetector {
            current: Arc::clone(&current),
        }),
        Arc::new(SidecarObjectDetector { current }),
    ))
}
