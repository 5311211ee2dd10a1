//! Cooldown-gated phone detection.

use image::RgbImage;

use crate::config::EngineConfig;
use crate::cooldown::{CooldownTable, RateKey};
use crate::detect::ObjectDetector;
use crate::metrics;
use crate::Timestamp;

/// Runs the object detector for phones at most once per cooldown window per key.
///
/// While a key is cooling down the detector is not invoked at all. A
/// negative detection does not start a cooldown.
#[derive(Debug)]
pub struct PhoneGate {
    class: String,
    confidence: f32,
    window: f64,
    cooldown: CooldownTable<RateKey>,
}

impl PhoneGate {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            class: config.phone_class.clone(),
            confidence: config.phone_confidence,
            window: config.phone_cooldown_secs,
            cooldown: CooldownTable::new(),
        }
    }

    /// Whether a phone is reported for `key` in this frame.
    pub fn check(
        &mut self,
        detector: &dyn ObjectDetector,
        frame: &RgbImage,
        key: RateKey,
        now: Timestamp,
    ) -> bool {
        if !self.cooldown.would_allow(&key, now, self.window) {
            metrics::record_phone_check(false);
            return false;
        }

        metrics::record_phone_check(true);
        if !detector.detect_class(frame, &self.class, self.confidence) {
            return false;
        }

        self.cooldown.allow(key, now, self.window)
    }

    pub fn is_cooling(&self, key: &RateKey, now: Timestamp) -> bool {
        !self.cooldown.would_allow(key, now, self.window)
    }

    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        self.cooldown.evict_older_than(now, max_idle)
    }
}
