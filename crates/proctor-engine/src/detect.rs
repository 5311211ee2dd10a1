//! Model boundaries consumed by the engine.
//!
//! The face detector/encoder and the object detector are opaque: the engine
//! only sees boxes, identity vectors and yes/no class presence.

use image::RgbImage;
use proctor_models::BoundingBox;
use serde::{Deserialize, Serialize};

/// Object class reported by COCO-style detectors for phones.
pub const PHONE_CLASS: &str = "cell phone";

/// One face found in a frame, with its identity vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Face box in full-frame pixel coordinates
    pub bbox: BoundingBox,
    /// Identity vector produced by the encoder
    pub vector: Vec<f64>,
}

impl FaceDetection {
    pub fn new(bbox: BoundingBox, vector: Vec<f64>) -> Self {
        Self { bbox, vector }
    }
}

/// Face detection and encoding model.
pub trait FaceDetector: Send + Sync {
    /// Find all faces in `frame`, in scan order.
    fn detect_faces(&self, frame: &RgbImage) -> Vec<FaceDetection>;
}

/// Object detection model.
pub trait ObjectDetector: Send + Sync {
    /// Whether an object of `target_class` is present with at least `confidence`.
    fn detect_class(&self, frame: &RgbImage, target_class: &str, confidence: f32) -> bool;
}
