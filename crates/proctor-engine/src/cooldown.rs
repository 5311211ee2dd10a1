//! Per-key cooldown tables.
//!
//! Each rate-limited concern (phone detection, alert dispatch) owns its own
//! table; entries are never shared between concerns.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use proctor_models::{CameraId, CameraMode, StudentId};

use crate::Timestamp;

/// Rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    Camera(CameraId),
    Student(StudentId),
}

impl RateKey {
    /// Phone suppression key: per student when a confident identity exists
    /// outside exam mode, per camera otherwise.
    pub fn for_phone(camera: CameraId, student: Option<&StudentId>, mode: CameraMode) -> Self {
        match (mode, student) {
            (CameraMode::Normal, Some(usn)) => RateKey::Student(usn.clone()),
            _ => RateKey::Camera(camera),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::Camera(id) => write!(f, "{}", id),
            RateKey::Student(usn) => write!(f, "{}", usn),
        }
    }
}

/// Last-allowed timestamps per key.
#[derive(Debug)]
pub struct CooldownTable<K = RateKey> {
    last_allowed: HashMap<K, Timestamp>,
    suppressed: u64,
}

impl<K> Default for CooldownTable<K> {
    fn default() -> Self {
        Self {
            last_allowed: HashMap::new(),
            suppressed: 0,
        }
    }
}

impl<K: Eq + Hash> CooldownTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow and record `now` iff `key` has no record or its last allowed
    /// time is more than `window` seconds ago. A refusal leaves the record as is.
    pub fn allow(&mut self, key: K, now: Timestamp, window: f64) -> bool {
        if self.would_allow(&key, now, window) {
            self.last_allowed.insert(key, now);
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Same test as [`allow`](Self::allow) without recording anything.
    pub fn would_allow(&self, key: &K, now: Timestamp, window: f64) -> bool {
        match self.last_allowed.get(key) {
            Some(last) => now - last > window,
            None => true,
        }
    }

    pub fn last_allowed(&self, key: &K) -> Option<Timestamp> {
        self.last_allowed.get(key).copied()
    }

    /// Refusals since creation.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn len(&self) -> usize {
        self.last_allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_allowed.is_empty()
    }

    /// Drop records older than `max_idle` seconds.
    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        let before = self.last_allowed.len();
        self.last_allowed.retain(|_, last| now - *last <= max_idle);
        before - self.last_allowed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_strict_and_per_key() {
        let mut table = CooldownTable::new();
        let cam0 = RateKey::Camera(CameraId(0));
        let cam1 = RateKey::Camera(CameraId(1));

        assert!(table.allow(cam0.clone(), 0.0, 20.0));
        assert!(!table.allow(cam0.clone(), 10.0, 20.0));
        assert!(table.allow(cam1.clone(), 10.0, 20.0));
        assert!(!table.allow(cam0.clone(), 20.0, 20.0));
        assert!(table.allow(cam0.clone(), 21.0, 20.0));

        assert_eq!(table.last_allowed(&cam0), Some(21.0));
        assert_eq!(table.suppressed(), 2);
    }

    #[test]
    fn test_refusal_does_not_extend_window() {
        let mut table = CooldownTable::new();
        let key = RateKey::Student(StudentId::new("1AB21CS001"));
        assert!(table.allow(key.clone(), 0.0, 15.0));
        assert!(!table.allow(key.clone(), 14.0, 15.0));
        assert!(table.allow(key.clone(), 15.5, 15.0));
    }

    #[test]
    fn test_would_allow_does_not_record() {
        let mut table: CooldownTable<&str> = CooldownTable::new();
        assert!(table.would_allow(&"cam0", 0.0, 20.0));
        assert!(table.is_empty());
        assert!(table.allow("cam0", 0.0, 20.0));
        assert!(!table.would_allow(&"cam0", 5.0, 20.0));
        assert_eq!(table.suppressed(), 0);
    }

    #[test]
    fn test_phone_key_policy() {
        let usn = StudentId::new("1AB21CS001");
        assert_eq!(
            RateKey::for_phone(CameraId(2), Some(&usn), CameraMode::Normal),
            RateKey::Student(usn.clone())
        );
        assert_eq!(
            RateKey::for_phone(CameraId(2), Some(&usn), CameraMode::Exam),
            RateKey::Camera(CameraId(2))
        );
        assert_eq!(
            RateKey::for_phone(CameraId(2), None, CameraMode::Normal),
            RateKey::Camera(CameraId(2))
        );
    }

    #[test]
    fn test_eviction() {
        let mut table = CooldownTable::new();
        table.allow(RateKey::Camera(CameraId(0)), 0.0, 20.0);
        table.allow(RateKey::Camera(CameraId(1)), 50.0, 20.0);
        assert_eq!(table.evict_older_than(60.0, 30.0), 1);
        assert_eq!(table.len(), 1);
    }
}
