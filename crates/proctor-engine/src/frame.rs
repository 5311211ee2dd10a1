//! Frame helpers: decoding, mouth region extraction and patch differencing.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use proctor_models::BoundingBox;

use crate::error::EngineResult;

/// Decode an encoded image (JPEG, PNG, ...) into an RGB frame.
pub fn decode_frame(bytes: &[u8]) -> EngineResult<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Lower `region_ratio` of the face box, clipped to the frame.
///
/// The mouth starts at `top + int(height * (1 - region_ratio))`.
pub fn mouth_region(
    bbox: &BoundingBox,
    region_ratio: f64,
    frame_width: u32,
    frame_height: u32,
) -> Option<BoundingBox> {
    let offset = (bbox.height * (1.0 - region_ratio)).trunc();
    let mouth_top = bbox.top() + offset;
    let region = BoundingBox::from_edges(mouth_top, bbox.right(), bbox.bottom(), bbox.left());
    region.clip_to_frame(frame_width, frame_height)
}

/// Grayscale mouth patch normalized to `width` x `height`.
///
/// Returns `None` when the mouth region is empty after clipping.
pub fn mouth_patch(
    frame: &RgbImage,
    bbox: &BoundingBox,
    region_ratio: f64,
    width: u32,
    height: u32,
) -> Option<GrayImage> {
    let region = mouth_region(bbox, region_ratio, frame.width(), frame.height())?;

    let x = region.x.floor() as u32;
    let y = region.y.floor() as u32;
    let w = (region.right().ceil() as u32).min(frame.width()).saturating_sub(x);
    let h = (region.bottom().ceil() as u32).min(frame.height()).saturating_sub(y);
    if w == 0 || h == 0 {
        return None;
    }

    let crop = imageops::crop_imm(frame, x, y, w, h).to_image();
    let gray = imageops::grayscale(&crop);
    Some(imageops::resize(&gray, width, height, FilterType::Triangle))
}

/// Difference statistics between two equally sized patches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchDiff {
    /// Mean absolute intensity difference
    pub mean: f64,
    /// Fraction of pixels whose difference exceeds the noise floor
    pub moving_fraction: f64,
}

/// Absolute per-pixel difference of `older` and `newer`.
///
/// Patches of different size compare over their overlapping pixels.
pub fn patch_diff(older: &GrayImage, newer: &GrayImage, noise_floor: u8) -> PatchDiff {
    let mut total: u64 = 0;
    let mut moving: u64 = 0;
    let mut count: u64 = 0;

    for (a, b) in older.as_raw().iter().zip(newer.as_raw()) {
        let diff = a.abs_diff(*b);
        total += diff as u64;
        if diff > noise_floor {
            moving += 1;
        }
        count += 1;
    }

    if count == 0 {
        return PatchDiff {
            mean: 0.0,
            moving_fraction: 0.0,
        };
    }

    PatchDiff {
        mean: total as f64 / count as f64,
        moving_fraction: moving as f64 / count as f64,
    }
}
