//! ONNX Runtime segmentation backend (`onnx` feature).
//!
//! Runs a U²-Net style salient-object model, the layout used by rembg's
//! `u2net.onnx` / `u2netp.onnx` / `silueta.onnx` files:
//!
//! - input: `1×3×320×320` float, RGB, ImageNet mean/std normalized
//! - output 0: saliency map, `1×1×320×320` (or `1×320×320`)
//!
//! The prediction is min-max normalized, resized back to the source
//! dimensions, and written into the alpha channel.

use super::segment::{SegmentError, Segmenter};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use ort::{inputs, session::Session, value::Tensor};
use std::path::Path;
use std::sync::Mutex;

const INPUT_SIZE: u32 = 320;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Saliency-model segmenter. The session is behind a mutex because
/// `Session::run` needs exclusive access.
pub struct OnnxSegmenter {
    session: Mutex<Session>,
}

impl OnnxSegmenter {
    pub fn from_file(model_path: &Path) -> Result<Self, SegmentError> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| {
                SegmentError::Model(format!("failed to load {}: {e}", model_path.display()))
            })?;
        tracing::info!(model = %model_path.display(), "loaded segmentation model");
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn predict_mask(&self, image: &RgbaImage) -> Result<GrayImage, SegmentError> {
        let (orig_w, orig_h) = image.dimensions();
        let size = INPUT_SIZE as usize;
        let resized = image::imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);

        // Normalize against the image max, as rembg does, then ImageNet mean/std
        let max_value = resized
            .pixels()
            .flat_map(|p| [p[0], p[1], p[2]])
            .max()
            .unwrap_or(0)
            .max(1) as f32;

        let mut input_data = vec![0f32; 3 * size * size];
        for (x, y, p) in resized.enumerate_pixels() {
            let idx = y as usize * size + x as usize;
            for c in 0..3 {
                input_data[c * size * size + idx] = (p[c] as f32 / max_value - MEAN[c]) / STD[c];
            }
        }

        let input_tensor = Tensor::<f32>::from_array(([1usize, 3, size, size], input_data))
            .map_err(|e| SegmentError::Model(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| SegmentError::Failed("model session lock poisoned".to_string()))?;
        let outputs = session
            .run(inputs![input_tensor])
            .map_err(|e| SegmentError::Model(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(SegmentError::Model("model returned no outputs".to_string()));
        }
        let view = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| SegmentError::Model(e.to_string()))?;

        let (mask_h, mask_w) = match view.ndim() {
            4 => (view.shape()[2], view.shape()[3]),
            3 => (view.shape()[1], view.shape()[2]),
            2 => (view.shape()[0], view.shape()[1]),
            _ => {
                return Err(SegmentError::Model(format!(
                    "unsupported output dimensions: {:?}",
                    view.shape()
                )));
            }
        };

        let mut raw = Vec::with_capacity(mask_w * mask_h);
        for y in 0..mask_h {
            for x in 0..mask_w {
                let v = match view.ndim() {
                    4 => view[[0, 0, y, x]],
                    3 => view[[0, y, x]],
                    _ => view[[y, x]],
                };
                raw.push(v);
            }
        }

        let min_v = raw.iter().copied().fold(f32::INFINITY, f32::min);
        let max_v = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = (max_v - min_v).max(1e-6);

        let mut mask = GrayImage::new(mask_w as u32, mask_h as u32);
        for (i, v) in raw.iter().enumerate() {
            let normalized = ((v - min_v) / range).clamp(0.0, 1.0);
            let x = (i % mask_w) as u32;
            let y = (i / mask_w) as u32;
            mask.put_pixel(x, y, Luma([(normalized * 255.0).round() as u8]));
        }

        let full = DynamicImage::ImageLuma8(mask)
            .resize_exact(orig_w, orig_h, FilterType::Lanczos3)
            .to_luma8();
        Ok(full)
    }
}

impl Segmenter for OnnxSegmenter {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn isolate(&self, image: &RgbaImage) -> Result<RgbaImage, SegmentError> {
        let mask = self.predict_mask(image)?;
        let mut out = image.clone();
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            // Keep pre-existing transparency: the mask can only remove
            pixel[3] = ((u16::from(pixel[3]) * u16::from(m[0])) / 255) as u8;
        }
        Ok(out)
    }
}
