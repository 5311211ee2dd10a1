//! Track identity resolution with majority-vote smoothing.
//!
//! Face-match distances are noisy near the acceptance threshold, so a single
//! frame's decision is only a candidate. Each track keeps its last few
//! candidates and reports the most frequent one.

use proctor_models::{IdentityLabel, StudentId};

use crate::history::{BoundedHistory, TrackTable};
use crate::track_key::TrackKey;
use crate::Timestamp;

#[derive(Debug)]
struct LabelWindow {
    candidates: BoundedHistory<IdentityLabel>,
    smoothed: Option<IdentityLabel>,
}

/// Maps per-frame identity candidates to a stable per-track label.
///
/// Each track keeps its last `capacity` candidates and reports the most
/// frequent one. Ties go to the label this track last reported, when that
/// label is among the tied leaders; otherwise to the tied label seen most
/// recently. An alternating `A, U, A, U, ...` stream therefore keeps
/// reporting `A` until `U` holds a strict majority of the window.
#[derive(Debug)]
pub struct IdentityResolver {
    threshold: f64,
    capacity: usize,
    tracks: TrackTable<LabelWindow>,
}

impl IdentityResolver {
    pub fn new(threshold: f64, capacity: usize) -> Self {
        Self {
            threshold,
            capacity,
            tracks: TrackTable::new(),
        }
    }

    /// Single-frame decision: the best match is accepted only when its
    /// distance is strictly below the threshold.
    pub fn candidate(best_match: Option<(&StudentId, f64)>, threshold: f64) -> IdentityLabel {
        match best_match {
            Some((usn, distance)) if distance < threshold => IdentityLabel::Known(usn.clone()),
            _ => IdentityLabel::Unknown,
        }
    }

    /// Record this frame's candidate for `key` and return the smoothed label.
    pub fn resolve(
        &mut self,
        key: TrackKey,
        best_match: Option<(&StudentId, f64)>,
        now: Timestamp,
    ) -> IdentityLabel {
        let candidate = Self::candidate(best_match, self.threshold);
        self.push_candidate(key, candidate, now)
    }

    /// Record an already-decided candidate for `key` and return the smoothed label.
    ///
    /// See the type docs for how ties in the window are broken.
    pub fn push_candidate(
        &mut self,
        key: TrackKey,
        candidate: IdentityLabel,
        now: Timestamp,
    ) -> IdentityLabel {
        let capacity = self.capacity;
        let window = self.tracks.touch(key, now, || LabelWindow {
            candidates: BoundedHistory::new(capacity),
            smoothed: None,
        });

        window.candidates.push(candidate);
        let label = majority(&window.candidates, window.smoothed.as_ref());
        window.smoothed = Some(label.clone());
        label
    }

    /// Last smoothed label reported for `key`.
    pub fn smoothed(&self, key: &TrackKey) -> Option<&IdentityLabel> {
        self.tracks.get(key).and_then(|w| w.smoothed.as_ref())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        self.tracks.evict_older_than(now, max_idle)
    }
}

/// Most frequent label in the window.
///
/// On a tie the previously reported label wins if it is among the leaders;
/// otherwise the leader inserted most recently wins.
fn majority(
    window: &BoundedHistory<IdentityLabel>,
    incumbent: Option<&IdentityLabel>,
) -> IdentityLabel {
    // (label, count, index of latest occurrence)
    let mut tally: Vec<(&IdentityLabel, usize, usize)> = Vec::new();
    for (idx, label) in window.iter().enumerate() {
        match tally.iter_mut().find(|(l, _, _)| *l == label) {
            Some(entry) => {
                entry.1 += 1;
                entry.2 = idx;
            }
            None => tally.push((label, 1, idx)),
        }
    }

    let Some(top) = tally.iter().map(|(_, count, _)| *count).max() else {
        return IdentityLabel::Unknown;
    };
    let leaders: Vec<_> = tally.into_iter().filter(|(_, count, _)| *count == top).collect();

    if let Some(current) = incumbent {
        if leaders.len() > 1 && leaders.iter().any(|(l, _, _)| *l == current) {
            return current.clone();
        }
    }

    leaders
        .into_iter()
        .max_by_key(|(_, _, last_idx)| *last_idx)
        .map(|(label, _, _)| label.clone())
        .unwrap_or(IdentityLabel::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: TrackKey = TrackKey::Cell { row: 2, col: 3 };

    fn known(usn: &str) -> IdentityLabel {
        IdentityLabel::Known(StudentId::new(usn))
    }

    fn feed(resolver: &mut IdentityResolver, labels: &[IdentityLabel]) -> Vec<IdentityLabel> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| resolver.push_candidate(KEY, label.clone(), i as f64))
            .collect()
    }

    #[test]
    fn test_candidate_threshold_is_strict() {
        let usn = StudentId::new("1AB21CS001");
        assert_eq!(
            IdentityResolver::candidate(Some((&usn, 0.44)), 0.45),
            IdentityLabel::Known(usn.clone())
        );
        assert_eq!(
            IdentityResolver::candidate(Some((&usn, 0.45)), 0.45),
            IdentityLabel::Unknown
        );
        assert_eq!(IdentityResolver::candidate(None, 0.45), IdentityLabel::Unknown);
    }

    #[test]
    fn test_majority_over_window() {
        let mut resolver = IdentityResolver::new(0.45, 5);
        let a = known("A");
        let b = known("B");
        let out = feed(&mut resolver, &[a.clone(), a.clone(), b.clone(), b.clone(), a.clone()]);
        assert_eq!(out.last(), Some(&a));
    }

    #[test]
    fn test_window_forgets_old_candidates() {
        let mut resolver = IdentityResolver::new(0.45, 5);
        let a = known("A");
        let u = IdentityLabel::Unknown;
        let out = feed(
            &mut resolver,
            &[a.clone(), a.clone(), a.clone(), u.clone(), u.clone(), u.clone(), u.clone()],
        );
        // window is [A, U, U, U, U] after seven frames
        assert_eq!(out.last(), Some(&u));
        assert_eq!(out[4], a);
    }

    #[test]
    fn test_alternating_match_does_not_flicker() {
        let mut resolver = IdentityResolver::new(0.45, 5);
        let a = known("A");
        let u = IdentityLabel::Unknown;
        let out = feed(&mut resolver, &[a.clone(), u.clone(), a.clone(), u.clone(), a.clone()]);
        assert!(out.iter().all(|label| *label == a), "got {:?}", out);
    }

    #[test]
    fn test_tie_without_incumbent_prefers_most_recent() {
        let mut resolver = IdentityResolver::new(0.45, 5);
        let a = known("A");
        let b = known("B");
        let c = known("C");
        let out = feed(
            &mut resolver,
            &[b.clone(), b.clone(), b.clone(), a.clone(), c.clone(), c.clone(), a.clone()],
        );
        // [B, B, A, C, C]: tie B/C, incumbent B holds
        assert_eq!(out[5], b);
        // [B, A, C, C, A]: tie A/C, incumbent B not a leader, A is newest
        assert_eq!(out[6], a);
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut resolver = IdentityResolver::new(0.45, 5);
        let other = TrackKey::Cell { row: 0, col: 0 };
        resolver.push_candidate(KEY, known("A"), 0.0);
        let label = resolver.push_candidate(other, IdentityLabel::Unknown, 0.0);
        assert_eq!(label, IdentityLabel::Unknown);
        assert_eq!(resolver.smoothed(&KEY), Some(&known("A")));
        assert_eq!(resolver.track_count(), 2);
    }
}
