//! Talking detection from sustained mouth-region motion.
//!
//! Each track keeps its last few normalized mouth patches. A pair of
//! consecutive patches is "active" when its mean difference exceeds the
//! motion threshold; talking needs several active pairs in the window and
//! enough moving pixels in the current frame.

use image::{GrayImage, RgbImage};
use proctor_models::BoundingBox;

use crate::config::EngineConfig;
use crate::frame::{mouth_patch, patch_diff};
use crate::history::{BoundedHistory, TrackTable};
use crate::track_key::TrackKey;
use crate::Timestamp;

/// Motion-consistency detector keyed by track.
#[derive(Debug)]
pub struct TalkingDetector {
    region_ratio: f64,
    patch_width: u32,
    patch_height: u32,
    history: usize,
    motion_threshold: f64,
    noise_floor: u8,
    active_frames: usize,
    min_motion_fraction: f64,
    tracks: TrackTable<BoundedHistory<GrayImage>>,
}

impl TalkingDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            region_ratio: config.mouth_region_ratio,
            patch_width: config.mouth_patch_width,
            patch_height: config.mouth_patch_height,
            history: config.motion_history,
            motion_threshold: config.motion_threshold,
            noise_floor: config.pixel_noise_floor,
            active_frames: config.active_frame_count,
            min_motion_fraction: config.min_motion_fraction,
            tracks: TrackTable::new(),
        }
    }

    /// Extract the mouth patch of `bbox` from `frame` and update the track.
    ///
    /// An empty mouth region yields `false` and leaves the history untouched.
    pub fn observe(
        &mut self,
        frame: &RgbImage,
        bbox: &BoundingBox,
        key: TrackKey,
        now: Timestamp,
    ) -> bool {
        match mouth_patch(
            frame,
            bbox,
            self.region_ratio,
            self.patch_width,
            self.patch_height,
        ) {
            Some(patch) => self.observe_patch(key, patch, now),
            None => false,
        }
    }

    /// Append an already normalized patch and evaluate the window.
    pub fn observe_patch(&mut self, key: TrackKey, patch: GrayImage, now: Timestamp) -> bool {
        let capacity = self.history;
        let noise_floor = self.noise_floor;
        let motion_threshold = self.motion_threshold;
        let history = self
            .tracks
            .touch(key, now, || BoundedHistory::new(capacity));

        // First observation only seeds the window.
        let Some(previous) = history.last() else {
            history.push(patch);
            return false;
        };

        let current = patch_diff(previous, &patch, noise_floor);
        history.push(patch);

        let active = history
            .pairs()
            .filter(|(older, newer)| patch_diff(older, newer, noise_floor).mean > motion_threshold)
            .count();

        active >= self.active_frames && current.moving_fraction > self.min_motion_fraction
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        self.tracks.evict_older_than(now, max_idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    const KEY: TrackKey = TrackKey::Cell { row: 1, col: 1 };

    fn patch(value: u8) -> GrayImage {
        GrayImage::from_pixel(90, 45, Luma([value]))
    }

    #[test]
    fn test_first_observation_is_never_talking() {
        let mut detector = TalkingDetector::new(&EngineConfig::default());
        assert!(!detector.observe_patch(KEY, patch(255), 0.0));
        assert_eq!(detector.track_count(), 1);
    }

    #[test]
    fn test_alternating_patches_trigger_on_sixth_call() {
        let mut detector = TalkingDetector::new(&EngineConfig::default());
        let results: Vec<bool> = (0..8)
            .map(|i| {
                let value = if i % 2 == 0 { 0 } else { 255 };
                detector.observe_patch(KEY, patch(value), i as f64)
            })
            .collect();

        assert_eq!(&results[..5], &[false; 5]);
        assert!(results[5]);
        assert!(results[6] && results[7]);
    }

    #[test]
    fn test_static_mouth_is_not_talking() {
        let mut detector = TalkingDetector::new(&EngineConfig::default());
        for i in 0..10 {
            assert!(!detector.observe_patch(KEY, patch(128), i as f64));
        }
    }

    #[test]
    fn test_still_current_frame_blocks_detection() {
        let mut detector = TalkingDetector::new(&EngineConfig::default());
        for i in 0..7 {
            let value = if i % 2 == 0 { 0 } else { 255 };
            detector.observe_patch(KEY, patch(value), i as f64);
        }
        // Window still has active pairs, but nothing moved since the last frame.
        assert!(!detector.observe_patch(KEY, patch(0), 7.0));
    }

    #[test]
    fn test_empty_region_does_not_seed_history() {
        let mut detector = TalkingDetector::new(&EngineConfig::default());
        let frame = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let outside = BoundingBox::from_edges(200.0, 300.0, 300.0, 200.0);
        assert!(!detector.observe(&frame, &outside, KEY, 0.0));
        assert_eq!(detector.track_count(), 0);
    }
}
