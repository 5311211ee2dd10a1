//! IoU-based tracker for maintaining face identity across frames.
//!
//! Uses greedy matching by Intersection over Union to associate faces
//! between consecutive frames of one camera.

use proctor_models::BoundingBox;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct FaceTrack {
    bbox: BoundingBox,
    /// Consecutive frames without a matching face
    missed: u32,
    seen_last_frame: bool,
}

impl FaceTrack {
    fn seen(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            missed: 0,
            seen_last_frame: true,
        }
    }
}

/// Short-lived spatial tracker assigning stable IDs to faces of one camera.
pub struct IoUTracker {
    /// Minimum overlap for a face to continue a track (exclusive)
    iou_threshold: f64,
    /// Frames a track survives without a matching face
    max_gap: u32,
    tracks: HashMap<u32, FaceTrack>,
    next_id: u32,
}

impl IoUTracker {
    pub fn new(iou_threshold: f64, max_gap: u32) -> Self {
        Self {
            iou_threshold,
            max_gap,
            tracks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Assign a track ID to every box, in input order.
    pub fn update(&mut self, boxes: &[BoundingBox]) -> Vec<u32> {
        let mut assigned: Vec<Option<u32>> = vec![None; boxes.len()];
        let mut free: Vec<u32> = self.tracks.keys().copied().collect();
        // lowest track id wins equal-overlap ties
        free.sort_unstable();

        for (det_idx, bbox) in boxes.iter().enumerate() {
            let best = free
                .iter()
                .filter_map(|id| self.tracks.get(id).map(|t| (*id, bbox.iou(&t.bbox))))
                .filter(|(_, overlap)| *overlap > self.iou_threshold)
                .fold(None, |best: Option<(u32, f64)>, (id, overlap)| match best {
                    Some((_, top)) if top >= overlap => best,
                    _ => Some((id, overlap)),
                });

            if let Some((id, _)) = best {
                assigned[det_idx] = Some(id);
                free.retain(|&other| other != id);
                self.tracks.insert(id, FaceTrack::seen(*bbox));
            }
        }

        for id in free {
            if let Some(track) = self.tracks.get_mut(&id) {
                track.missed += 1;
                track.seen_last_frame = false;
                if track.missed > self.max_gap {
                    self.tracks.remove(&id);
                }
            }
        }

        // unmatched faces open new tracks
        assigned
            .into_iter()
            .zip(boxes)
            .map(|(slot, bbox)| {
                slot.unwrap_or_else(|| {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(id, FaceTrack::seen(*bbox));
                    id
                })
            })
            .collect()
    }

    /// Tracks matched in the latest frame.
    pub fn active_track_count(&self) -> usize {
        self.tracks.values().filter(|t| t.seen_last_frame).count()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
