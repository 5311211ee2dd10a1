//! Side-look detection from horizontal head oscillation.

use proctor_models::BoundingBox;

use crate::config::EngineConfig;
use crate::history::{BoundedHistory, TrackTable};
use crate::track_key::TrackKey;
use crate::Timestamp;

/// Positional-oscillation detector keyed by track.
///
/// Stores the horizontal center of each observed box and reports side-look
/// once the window holds enough large horizontal moves.
#[derive(Debug)]
pub struct SideLookDetector {
    history: usize,
    min_samples: usize,
    move_threshold: f64,
    move_count: usize,
    tracks: TrackTable<BoundedHistory<f64>>,
}

impl SideLookDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            history: config.position_history,
            min_samples: config.side_look_min_samples,
            move_threshold: config.side_move_threshold,
            move_count: config.side_move_count,
            tracks: TrackTable::new(),
        }
    }

    pub fn observe(&mut self, bbox: &BoundingBox, key: TrackKey, now: Timestamp) -> bool {
        self.observe_center(key, bbox.cx(), now)
    }

    /// Append a horizontal center and evaluate the window.
    pub fn observe_center(&mut self, key: TrackKey, cx: f64, now: Timestamp) -> bool {
        let capacity = self.history;
        let threshold = self.move_threshold;
        let centers = self
            .tracks
            .touch(key, now, || BoundedHistory::new(capacity));
        centers.push(cx);

        if centers.len() < self.min_samples {
            return false;
        }

        let moves = centers
            .pairs()
            .filter(|(older, newer)| (*newer - *older).abs() > threshold)
            .count();
        moves >= self.move_count
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        self.tracks.evict_older_than(now, max_idle)
    }
}
