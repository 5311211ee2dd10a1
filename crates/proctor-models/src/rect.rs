//! Face bounding boxes in pixel coordinates.

use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a box from `(top, right, bottom, left)` edges, the layout most
    /// face detectors report.
    pub fn from_edges(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }

    /// Top edge y-coordinate.
    #[inline]
    pub fn top(&self) -> f64 {
        self.y
    }

    /// Left edge x-coordinate.
    #[inline]
    pub fn left(&self) -> f64 {
        self.x
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        (self.left() + self.right()) / 2.0
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Intersect the box with a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box is inside the frame.
    pub fn clip_to_frame(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.right().min(frame_width as f64);
        let y2 = self.bottom().min(frame_height as f64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}
