//! Pixel operations of the per-image pipeline.
//!
//! These functions combine the pure [`calculations`](super::calculations)
//! with `image::imageops` primitives. None of them touch the filesystem.
//!
//! | Operation | Implementation |
//! |---|---|
//! | Subject isolation | [`Segmenter`] backend |
//! | Padding / square canvas | `imageops::replace` onto a clear canvas |
//! | Background composite | `imageops::overlay` (alpha "over") |
//! | Brightness | per-channel multiply, clamped |
//! | Resize | `Lanczos3`, then letterbox / centered crop |

use super::ImagingError;
use super::calculations::{
    calculate_fill_dimensions, calculate_fit_dimensions, calculate_square_fit, center_offset,
    padded_dimensions,
};
use super::params::{BackgroundParams, BackgroundSpec, FitMode, ResizeSpec, SquareSpec};
use super::segment::Segmenter;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

/// Lowest accepted brightness factor.
pub const MIN_BRIGHTNESS: f32 = 0.2;
/// Highest accepted brightness factor.
pub const MAX_BRIGHTNESS: f32 = 2.5;

/// Isolate the subject, then pad, square and composite it.
pub fn remove_background(
    segmenter: &dyn Segmenter,
    img: &DynamicImage,
    params: &BackgroundParams,
) -> Result<DynamicImage, ImagingError> {
    let rgba = img.to_rgba8();
    let isolated = segmenter.isolate(&rgba)?;
    if isolated.dimensions() != rgba.dimensions() {
        return Err(ImagingError::Segment(super::SegmentError::Failed(format!(
            "{} segmenter returned {:?}, expected {:?}",
            segmenter.name(),
            isolated.dimensions(),
            rgba.dimensions()
        ))));
    }

    let mut out = isolated;
    if params.padding > 0 {
        out = pad_uniform(&out, params.padding);
    }
    if let Some(square) = params.square {
        out = square_canvas(&out, square);
    }
    Ok(composite_onto(out, params.background))
}

/// Expand the canvas by `padding` transparent pixels on each side.
pub fn pad_uniform(img: &RgbaImage, padding: u32) -> RgbaImage {
    let (w, h) = padded_dimensions(img.dimensions(), padding);
    let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
    imageops::replace(&mut canvas, img, i64::from(padding), i64::from(padding));
    canvas
}

/// Center the subject on a transparent square canvas.
pub fn square_canvas(img: &RgbaImage, spec: SquareSpec) -> RgbaImage {
    let (w, h) = img.dimensions();
    match spec.size {
        Some(size) if size > 0 => {
            let (new_w, new_h) = calculate_square_fit((w, h), size, spec.no_upscale);
            let scaled = if (new_w, new_h) != (w, h) {
                imageops::resize(img, new_w, new_h, FilterType::Lanczos3)
            } else {
                img.clone()
            };
            paste_centered_clear((size, size), &scaled)
        }
        _ => {
            let side = w.max(h);
            paste_centered_clear((side, side), img)
        }
    }
}

/// Copy `img` (not blend) into the middle of a clear canvas. Parts that do
/// not fit are clipped.
fn paste_centered_clear(canvas_dims: (u32, u32), img: &RgbaImage) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(canvas_dims.0, canvas_dims.1, Rgba([0, 0, 0, 0]));
    let (x, y) = center_offset(canvas_dims, img.dimensions());
    imageops::replace(&mut canvas, img, x, y);
    canvas
}

/// Composite onto the requested background.
///
/// Transparent passes through as RGBA. Opaque backgrounds yield RGB;
/// translucent custom colors keep RGBA.
pub fn composite_onto(img: RgbaImage, background: BackgroundSpec) -> DynamicImage {
    if background == BackgroundSpec::Transparent {
        return DynamicImage::ImageRgba8(img);
    }
    let (w, h) = img.dimensions();
    let mut canvas = RgbaImage::from_pixel(w, h, background.rgba());
    imageops::overlay(&mut canvas, &img, 0, 0);
    finish_on(canvas, background)
}

fn finish_on(canvas: RgbaImage, background: BackgroundSpec) -> DynamicImage {
    let out = DynamicImage::ImageRgba8(canvas);
    if background.is_opaque() {
        DynamicImage::ImageRgb8(out.to_rgb8())
    } else {
        out
    }
}

/// Scale color channels by `factor`, leaving alpha untouched.
///
/// `1.0` returns the input unchanged.
pub fn adjust_brightness(img: DynamicImage, factor: f32) -> DynamicImage {
    if factor == 1.0 {
        return img;
    }
    let scale = |v: u8| (f32::from(v) * factor).round().clamp(0.0, 255.0) as u8;
    match img {
        DynamicImage::ImageRgb8(mut buf) => {
            for p in buf.pixels_mut() {
                p.0 = [scale(p[0]), scale(p[1]), scale(p[2])];
            }
            DynamicImage::ImageRgb8(buf)
        }
        other => {
            let mut buf = other.to_rgba8();
            for p in buf.pixels_mut() {
                p.0 = [scale(p[0]), scale(p[1]), scale(p[2]), p[3]];
            }
            DynamicImage::ImageRgba8(buf)
        }
    }
}

/// Resize to exactly `spec.width` × `spec.height` using its fit mode.
///
/// A zero target dimension disables the resize.
pub fn resize(img: DynamicImage, spec: &ResizeSpec, background: BackgroundSpec) -> DynamicImage {
    let (w, h) = (spec.width, spec.height);
    if w == 0 || h == 0 {
        return img;
    }

    match spec.mode {
        FitMode::Stretch => img.resize_exact(w, h, FilterType::Lanczos3),
        FitMode::Pad => {
            let (new_w, new_h) = calculate_fit_dimensions((img.width(), img.height()), (w, h));
            let scaled = imageops::resize(&img.to_rgba8(), new_w, new_h, FilterType::Lanczos3);
            let mut canvas = RgbaImage::from_pixel(w, h, background.rgba());
            let (x, y) = center_offset((w, h), (new_w, new_h));
            if background == BackgroundSpec::Transparent {
                imageops::replace(&mut canvas, &scaled, x, y);
                DynamicImage::ImageRgba8(canvas)
            } else {
                imageops::overlay(&mut canvas, &scaled, x, y);
                finish_on(canvas, background)
            }
        }
        FitMode::Crop => {
            let (new_w, new_h) = calculate_fill_dimensions((img.width(), img.height()), (w, h));
            let scaled = imageops::resize(&img.to_rgba8(), new_w, new_h, FilterType::Lanczos3);
            let (x, y) = center_offset((new_w, new_h), (w, h));
            let cropped = imageops::crop_imm(&scaled, x as u32, y as u32, w, h).to_image();
            // Only an opaque background leaves RGB; everything else stays RGBA
            if background.is_opaque() {
                composite_onto(cropped, background)
            } else {
                DynamicImage::ImageRgba8(cropped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::segment::tests::MockSegmenter;
    use crate::imaging::segment::KeySegmenter;
    use image::{ColorType, Rgb, RgbImage};

    fn gradient_rgb(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
        }))
    }

    fn half_transparent(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    fn bg(background: BackgroundSpec) -> BackgroundParams {
        BackgroundParams {
            background,
            padding: 0,
            square: None,
        }
    }

    // =========================================================================
    // Resize
    // =========================================================================

    #[test]
    fn every_fit_mode_yields_exact_target() {
        let sources = [(640, 480), (300, 900), (1, 1), (1000, 7), (512, 512)];
        let targets = [(512, 512), (320, 180), (90, 400), (1, 1)];
        for mode in [FitMode::Stretch, FitMode::Pad, FitMode::Crop] {
            for &(sw, sh) in &sources {
                for &(tw, th) in &targets {
                    let spec = ResizeSpec {
                        width: tw,
                        height: th,
                        mode,
                    };
                    let out = resize(gradient_rgb(sw, sh), &spec, BackgroundSpec::White);
                    assert_eq!(
                        (out.width(), out.height()),
                        (tw, th),
                        "{mode:?} {sw}x{sh} → {tw}x{th}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_target_disables_resize() {
        let spec = ResizeSpec {
            width: 0,
            height: 100,
            mode: FitMode::Stretch,
        };
        let out = resize(gradient_rgb(40, 30), &spec, BackgroundSpec::White);
        assert_eq!((out.width(), out.height()), (40, 30));
    }

    #[test]
    fn stretch_preserves_color_type() {
        let spec = ResizeSpec {
            width: 10,
            height: 10,
            mode: FitMode::Stretch,
        };
        let out = resize(gradient_rgb(40, 30), &spec, BackgroundSpec::Transparent);
        assert_eq!(out.color(), ColorType::Rgb8);
    }

    #[test]
    fn pad_fills_bars_with_background() {
        let spec = ResizeSpec {
            width: 100,
            height: 100,
            mode: FitMode::Pad,
        };
        // 100x50 source → 100x50 band centered, bars top and bottom
        let out = resize(gradient_rgb(100, 50), &spec, BackgroundSpec::White);
        assert_eq!(out.color(), ColorType::Rgb8);
        assert_eq!(out.to_rgb8().get_pixel(50, 5), &Rgb([255, 255, 255]));
        assert_eq!(out.to_rgb8().get_pixel(50, 94), &Rgb([255, 255, 255]));

        let clear = resize(gradient_rgb(100, 50), &spec, BackgroundSpec::Transparent);
        assert_eq!(clear.color(), ColorType::Rgba8);
        assert_eq!(clear.to_rgba8().get_pixel(50, 5)[3], 0);
        assert_eq!(clear.to_rgba8().get_pixel(50, 50)[3], 255);
    }

    #[test]
    fn pad_translucent_custom_keeps_alpha() {
        let translucent = BackgroundSpec::Custom(Rgba([0, 0, 255, 128]));
        let spec = ResizeSpec {
            width: 64,
            height: 64,
            mode: FitMode::Pad,
        };
        let out = resize(gradient_rgb(64, 16), &spec, translucent);
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(out.to_rgba8().get_pixel(0, 0), &Rgba([0, 0, 255, 128]));
    }

    #[test]
    fn crop_flattens_alpha_onto_opaque_background() {
        let spec = ResizeSpec {
            width: 20,
            height: 20,
            mode: FitMode::Crop,
        };
        let img = DynamicImage::ImageRgba8(half_transparent(40, 20));
        let out = resize(img.clone(), &spec, BackgroundSpec::White);
        assert_eq!(out.color(), ColorType::Rgb8);
        // Right edge of the centered crop sits in the formerly clear half
        assert_eq!(out.to_rgb8().get_pixel(19, 10), &Rgb([255, 255, 255]));

        let kept = resize(img, &spec, BackgroundSpec::Transparent);
        assert_eq!(kept.color(), ColorType::Rgba8);
        assert_eq!(kept.to_rgba8().get_pixel(19, 10)[3], 0);
    }

    #[test]
    fn crop_of_rgb_source_is_rgba_unless_background_opaque() {
        let spec = ResizeSpec {
            width: 20,
            height: 20,
            mode: FitMode::Crop,
        };
        let src = gradient_rgb(40, 20);

        let clear = resize(src.clone(), &spec, BackgroundSpec::Transparent);
        assert_eq!(clear.color(), ColorType::Rgba8);
        assert_eq!(clear.to_rgba8().get_pixel(10, 10)[3], 255);

        let translucent = BackgroundSpec::Custom(Rgba([0, 0, 255, 128]));
        assert_eq!(resize(src.clone(), &spec, translucent).color(), ColorType::Rgba8);

        let opaque = BackgroundSpec::Custom(Rgba([0, 0, 255, 255]));
        assert_eq!(resize(src.clone(), &spec, opaque).color(), ColorType::Rgb8);
        assert_eq!(resize(src, &spec, BackgroundSpec::White).color(), ColorType::Rgb8);
    }

    // =========================================================================
    // Brightness
    // =========================================================================

    #[test]
    fn brightness_one_is_identity() {
        let img = gradient_rgb(33, 17);
        let out = adjust_brightness(img.clone(), 1.0);
        assert_eq!(out.as_bytes(), img.as_bytes());

        let rgba = DynamicImage::ImageRgba8(half_transparent(8, 8));
        assert_eq!(adjust_brightness(rgba.clone(), 1.0).as_bytes(), rgba.as_bytes());
    }

    #[test]
    fn brightness_scales_and_clamps_channels() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([100, 200, 10])));
        let out = adjust_brightness(img, 1.5).to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([150, 255, 15]));
    }

    #[test]
    fn brightness_leaves_alpha_untouched() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 40])));
        let out = adjust_brightness(img, 0.5).to_rgba8();
        assert_eq!(out.get_pixel(0, 0), &Rgba([50, 50, 50, 40]));
    }

    // =========================================================================
    // Background stage
    // =========================================================================

    #[test]
    fn transparent_mode_with_identity_segmenter_keeps_visible_pixels() {
        let img = gradient_rgb(31, 23);
        let out = remove_background(&MockSegmenter::new(), &img, &bg(BackgroundSpec::Transparent))
            .unwrap();
        assert_eq!(out.color(), ColorType::Rgba8);
        let out = out.to_rgba8();
        for (a, b) in img.to_rgb8().pixels().zip(out.pixels()) {
            assert_eq!([a[0], a[1], a[2], 255], b.0);
        }
    }

    #[test]
    fn segmenter_errors_propagate() {
        let err = remove_background(
            &MockSegmenter::failing("model exploded"),
            &gradient_rgb(4, 4),
            &bg(BackgroundSpec::White),
        )
        .unwrap_err();
        assert!(matches!(err, ImagingError::Segment(_)));
    }

    #[test]
    fn white_background_drops_alpha() {
        let img = DynamicImage::ImageRgba8(half_transparent(10, 4));
        let out = remove_background(&MockSegmenter::new(), &img, &bg(BackgroundSpec::White)).unwrap();
        assert_eq!(out.color(), ColorType::Rgb8);
        let rgb = out.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(9, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn custom_opaque_and_translucent_backgrounds() {
        let img = DynamicImage::ImageRgba8(half_transparent(10, 4));

        let opaque = BackgroundSpec::Custom(Rgba([0, 128, 0, 255]));
        let out = remove_background(&MockSegmenter::new(), &img, &bg(opaque)).unwrap();
        assert_eq!(out.color(), ColorType::Rgb8);
        assert_eq!(out.to_rgb8().get_pixel(9, 0), &Rgb([0, 128, 0]));

        let translucent = BackgroundSpec::Custom(Rgba([0, 128, 0, 100]));
        let out = remove_background(&MockSegmenter::new(), &img, &bg(translucent)).unwrap();
        assert_eq!(out.color(), ColorType::Rgba8);
        assert_eq!(out.to_rgba8().get_pixel(9, 0), &Rgba([0, 128, 0, 100]));
    }

    #[test]
    fn padding_adds_clear_margin() {
        let params = BackgroundParams {
            background: BackgroundSpec::Transparent,
            padding: 6,
            square: None,
        };
        let out = remove_background(&MockSegmenter::new(), &gradient_rgb(10, 4), &params)
            .unwrap()
            .to_rgba8();
        assert_eq!(out.dimensions(), (22, 16));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(6, 6)[3], 255);
    }

    #[test]
    fn square_canvas_is_always_square() {
        let specs = [
            SquareSpec {
                size: None,
                no_upscale: true,
            },
            SquareSpec {
                size: Some(64),
                no_upscale: true,
            },
            SquareSpec {
                size: Some(64),
                no_upscale: false,
            },
            SquareSpec {
                size: Some(512),
                no_upscale: true,
            },
        ];
        for spec in specs {
            for (w, h) in [(100, 30), (30, 100), (50, 50), (1, 9)] {
                let out = square_canvas(&half_transparent(w, h), spec);
                assert_eq!(out.width(), out.height(), "{spec:?} {w}x{h}");
            }
        }
    }

    #[test]
    fn square_auto_uses_longer_side_and_centers() {
        let img = RgbaImage::from_pixel(40, 10, Rgba([1, 2, 3, 255]));
        let out = square_canvas(
            &img,
            SquareSpec {
                size: None,
                no_upscale: true,
            },
        );
        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(out.get_pixel(20, 14)[3], 0);
        assert_eq!(out.get_pixel(20, 15)[3], 255);
        assert_eq!(out.get_pixel(20, 24)[3], 255);
        assert_eq!(out.get_pixel(20, 25)[3], 0);
    }

    #[test]
    fn square_fixed_no_upscale_centers_small_subject() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let out = square_canvas(
            &img,
            SquareSpec {
                size: Some(32),
                no_upscale: true,
            },
        );
        assert_eq!(out.dimensions(), (32, 32));
        assert_eq!(out.get_pixel(10, 10)[3], 0);
        assert_eq!(out.get_pixel(11, 11)[3], 255);
        assert_eq!(out.get_pixel(20, 20)[3], 255);
        assert_eq!(out.get_pixel(21, 21)[3], 0);
    }

    #[test]
    fn key_segmenter_end_to_end_on_white_background() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                Rgb([10, 10, 200])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let params = BackgroundParams {
            background: BackgroundSpec::Custom(Rgba([0, 0, 0, 255])),
            padding: 0,
            square: None,
        };
        let out = remove_background(&KeySegmenter::default(), &img, &params)
            .unwrap()
            .to_rgb8();
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(10, 10), &Rgb([10, 10, 200]));
    }
}
