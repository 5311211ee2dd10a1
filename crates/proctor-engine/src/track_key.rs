//! Track keys associating a face with its per-track history.
//!
//! The grid strategy buckets a box by its top-left corner. Two different
//! faces in the same bucket share a key, and a face crossing a bucket
//! boundary starts a fresh key; both are accepted. The IoU strategy uses
//! [`IoUTracker`] IDs instead.

use proctor_models::BoundingBox;
use std::fmt;

use crate::config::{EngineConfig, TrackStrategy};
use crate::tracker::IoUTracker;

/// Identifier of one track within a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKey {
    /// Quantized `(top / cell, left / cell)` bucket.
    Cell { row: i64, col: i64 },
    /// IoU tracker ID.
    Track(u32),
}

impl TrackKey {
    /// Grid bucket of `bbox` for a given cell size in pixels.
    pub fn from_grid(bbox: &BoundingBox, cell_size: u32) -> Self {
        let cell = cell_size.max(1) as f64;
        TrackKey::Cell {
            row: (bbox.top() / cell).floor() as i64,
            col: (bbox.left() / cell).floor() as i64,
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Cell { row, col } => write!(f, "cell({},{})", row, col),
            TrackKey::Track(id) => write!(f, "track#{}", id),
        }
    }
}

/// Assigns track keys to the faces of each frame.
pub enum TrackKeyer {
    Grid { cell_size: u32 },
    Iou(IoUTracker),
}

impl TrackKeyer {
    /// Build the keyer selected by `config.track_strategy`.
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.track_strategy {
            TrackStrategy::Grid => TrackKeyer::Grid {
                cell_size: config.track_cell_size,
            },
            TrackStrategy::Iou => {
                TrackKeyer::Iou(IoUTracker::new(config.iou_threshold, config.max_track_gap))
            }
        }
    }

    /// One key per box, in input order. Must be called once per frame.
    pub fn assign(&mut self, boxes: &[BoundingBox]) -> Vec<TrackKey> {
        match self {
            TrackKeyer::Grid { cell_size } => boxes
                .iter()
                .map(|bbox| TrackKey::from_grid(bbox, *cell_size))
                .collect(),
            TrackKeyer::Iou(tracker) => tracker
                .update(boxes)
                .into_iter()
                .map(TrackKey::Track)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_key_stable_for_small_motion() {
        let a = BoundingBox::from_edges(85.0, 170.0, 160.0, 95.0);
        let b = BoundingBox::from_edges(87.0, 173.0, 162.0, 98.0);
        assert_eq!(TrackKey::from_grid(&a, 40), TrackKey::from_grid(&b, 40));
        assert_eq!(TrackKey::from_grid(&a, 40), TrackKey::Cell { row: 2, col: 2 });
    }

    #[test]
    fn test_grid_key_changes_across_boundary() {
        let a = BoundingBox::from_edges(79.0, 150.0, 150.0, 79.0);
        let b = BoundingBox::from_edges(81.0, 152.0, 152.0, 81.0);
        assert_ne!(TrackKey::from_grid(&a, 40), TrackKey::from_grid(&b, 40));
    }

    #[test]
    fn test_iou_keyer_follows_face_across_boundary() {
        let mut keyer = TrackKeyer::from_config(&EngineConfig::with_iou_tracking());
        let first = keyer.assign(&[BoundingBox::from_edges(79.0, 150.0, 150.0, 79.0)]);
        let second = keyer.assign(&[BoundingBox::from_edges(81.0, 152.0, 152.0, 81.0)]);
        assert_eq!(first, second);
    }
}
