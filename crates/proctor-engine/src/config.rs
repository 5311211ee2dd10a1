//! Configuration for the violation detection engine.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How detections are associated with per-track state across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackStrategy {
    /// Floor-divide the box's top/left corner by a fixed cell size.
    #[default]
    Grid,
    /// Greedy IoU matching against the previous frame's boxes.
    Iou,
}

/// Configuration for the violation detection engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Tracking ===
    /// Track association strategy (default: grid)
    pub track_strategy: TrackStrategy,

    /// Grid cell size in pixels for quantized track keys (default: 40)
    pub track_cell_size: u32,

    /// IoU threshold for track matching when using the IoU strategy (default: 0.3)
    pub iou_threshold: f64,

    /// Frames a track may go unmatched before the IoU tracker drops it (default: 10)
    pub max_track_gap: u32,

    /// Evict per-track state not seen for this many seconds (default: never)
    pub stale_track_secs: Option<f64>,

    // === Identity ===
    /// Accept the nearest known encoding only below this distance (default: 0.45)
    pub match_threshold: f64,

    /// Identity label window per track (default: 5)
    pub label_history: usize,

    // === Talking ===
    /// Fraction of the face box height, from the bottom, treated as mouth (default: 0.4)
    pub mouth_region_ratio: f64,

    /// Normalized mouth patch width (default: 90)
    pub mouth_patch_width: u32,

    /// Normalized mouth patch height (default: 45)
    pub mouth_patch_height: u32,

    /// Mouth patches kept per track (default: 8)
    pub motion_history: usize,

    /// Mean intensity difference for a pair of patches to count as active (default: 22)
    pub motion_threshold: f64,

    /// Per-pixel difference above which a pixel counts as moving (default: 25)
    pub pixel_noise_floor: u8,

    /// Active pairs required to declare talking (default: 5)
    pub active_frame_count: usize,

    /// Fraction of moving pixels required in the current frame (default: 0.08)
    pub min_motion_fraction: f64,

    // === Side look ===
    /// Horizontal centers kept per track (default: 8)
    pub position_history: usize,

    /// Samples required before evaluating side-look (default: 5)
    pub side_look_min_samples: usize,

    /// Horizontal displacement in pixels counted as a move (default: 12)
    pub side_move_threshold: f64,

    /// Moves within the window required to declare side-look (default: 4)
    pub side_move_count: usize,

    // === Phone detection ===
    /// Object class name for phones (default: "cell phone")
    pub phone_class: String,

    /// Minimum object detector confidence (default: 0.35)
    pub phone_confidence: f32,

    /// Seconds between phone detections for one key (default: 15)
    pub phone_cooldown_secs: f64,

    // === Alerting ===
    /// Seconds between dispatched alerts for one camera (default: 20)
    pub alert_cooldown_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_strategy: TrackStrategy::Grid,
            track_cell_size: 40,
            iou_threshold: 0.3,
            max_track_gap: 10,
            stale_track_secs: None,
            match_threshold: 0.45,
            label_history: 5,
            mouth_region_ratio: 0.4,
            mouth_patch_width: 90,
            mouth_patch_height: 45,
            motion_history: 8,
            motion_threshold: 22.0,
            pixel_noise_floor: 25,
            active_frame_count: 5,
            min_motion_fraction: 0.08,
            position_history: 8,
            side_look_min_samples: 5,
            side_move_threshold: 12.0,
            side_move_count: 4,
            phone_class: crate::detect::PHONE_CLASS.to_string(),
            phone_confidence: 0.35,
            phone_cooldown_secs: 15.0,
            alert_cooldown_secs: 20.0,
        }
    }
}

impl EngineConfig {
    /// IoU tracking instead of grid quantization.
    pub fn with_iou_tracking() -> Self {
        Self {
            track_strategy: TrackStrategy::Iou,
            ..Default::default()
        }
    }

    /// Check that every window and ratio is usable.
    pub fn validate(&self) -> EngineResult<()> {
        if self.track_cell_size == 0 {
            return Err(EngineError::invalid_config("track_cell_size must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(EngineError::invalid_config("iou_threshold must be within 0..=1"));
        }
        if self.label_history == 0 || self.motion_history < 2 || self.position_history < 2 {
            return Err(EngineError::invalid_config(
                "label_history must be > 0; motion_history and position_history must be >= 2",
            ));
        }
        if !(self.mouth_region_ratio > 0.0 && self.mouth_region_ratio <= 1.0) {
            return Err(EngineError::invalid_config("mouth_region_ratio must be within (0, 1]"));
        }
        if self.mouth_patch_width == 0 || self.mouth_patch_height == 0 {
            return Err(EngineError::invalid_config("mouth patch size must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.min_motion_fraction) {
            return Err(EngineError::invalid_config("min_motion_fraction must be within 0..=1"));
        }
        if self.match_threshold <= 0.0 {
            return Err(EngineError::invalid_config("match_threshold must be > 0"));
        }
        if self.phone_cooldown_secs < 0.0 || self.alert_cooldown_secs < 0.0 {
            return Err(EngineError::invalid_config("cooldown windows must be >= 0"));
        }
        if matches!(self.stale_track_secs, Some(secs) if secs <= 0.0) {
            return Err(EngineError::invalid_config("stale_track_secs must be > 0 when set"));
        }
        Ok(())
    }
}
