//! Subject isolation backends.
//!
//! The [`Segmenter`] trait is the seam between the pipeline and whatever
//! decides which pixels are "subject" and which are "background". A
//! segmenter receives an RGBA image and returns an image of the same size in
//! which removed background has alpha 0 (or partial alpha on soft edges).
//!
//! | Backend | Availability | Approach |
//! |---|---|---|
//! | [`KeySegmenter`] | always | border key color + flood fill |
//! | [`OnnxSegmenter`](super::onnx::OnnxSegmenter) | `onnx` feature | U²-Net saliency model via ONNX Runtime |

use image::{Rgba, RgbaImage};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Model error: {0}")]
    Model(String),
    #[error("Segmentation failed: {0}")]
    Failed(String),
}

/// A subject-isolation backend.
///
/// Implementations must be `Sync` so a single instance can be shared across
/// a rayon worker pool.
pub trait Segmenter: Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Return `image` with its background made transparent.
    fn isolate(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError>;
}

/// Default distance (Euclidean, RGB) within which a pixel counts as background.
pub const DEFAULT_TOLERANCE: u8 = 30;

/// Pure-Rust segmenter for studio-style shots on a plain backdrop.
///
/// The key color is the per-channel median of the outermost pixel ring. Every
/// border pixel close enough to the key seeds a 4-connected flood fill; all
/// reached pixels become transparent. Interior regions of the same color
/// that do not touch the border are kept.
#[derive(Debug, Clone, Copy)]
pub struct KeySegmenter {
    tolerance: u8,
}

impl KeySegmenter {
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }
}

impl Default for KeySegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Segmenter for KeySegmenter {
    fn name(&self) -> &'static str {
        "key"
    }

    fn isolate(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        let (w, h) = image.dimensions();
        let mut out = image.clone();
        if w == 0 || h == 0 {
            return Ok(out);
        }

        let key = border_key_color(image);
        let limit = u32::from(self.tolerance).pow(2);
        let is_background = |p: &Rgba<u8>| p[3] == 0 || color_distance_sq(p, &key) <= limit;

        let mut visited = vec![false; (w as usize) * (h as usize)];
        let mut queue = VecDeque::new();

        for (x, y) in border_coords(w, h) {
            let idx = (y * w + x) as usize;
            if !visited[idx] && is_background(image.get_pixel(x, y)) {
                visited[idx] = true;
                queue.push_back((x, y));
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            out.get_pixel_mut(x, y)[3] = 0;

            let neighbors = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbors {
                if nx >= w || ny >= h {
                    continue;
                }
                let idx = (ny * w + nx) as usize;
                if !visited[idx] && is_background(image.get_pixel(nx, ny)) {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        Ok(out)
    }
}

/// Coordinates of the outermost ring, each visited once.
fn border_coords(w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let top_bottom = (0..w).flat_map(move |x| {
        let bottom = (h > 1).then_some((x, h - 1));
        std::iter::once((x, 0)).chain(bottom)
    });
    let sides = (1..h.saturating_sub(1)).flat_map(move |y| {
        let right = (w > 1).then_some((w - 1, y));
        std::iter::once((0, y)).chain(right)
    });
    top_bottom.chain(sides)
}

/// Per-channel median of the border ring.
fn border_key_color(image: &RgbaImage) -> Rgba<u8> {
    let (w, h) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = Default::default();
    for (x, y) in border_coords(w, h) {
        let p = image.get_pixel(x, y);
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(p[c]);
        }
    }
    let median = |values: &mut Vec<u8>| {
        values.sort_unstable();
        values[values.len() / 2]
    };
    let [r, g, b] = &mut channels;
    Rgba([median(r), median(g), median(b), 255])
}

fn color_distance_sq(a: &Rgba<u8>, b: &Rgba<u8>) -> u32 {
    (0..3)
        .map(|c| {
            let d = i32::from(a[c]) - i32::from(b[c]);
            (d * d) as u32
        })
        .sum()
}
