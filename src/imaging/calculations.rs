//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate dimensions that fit inside a target area (letterbox).
///
/// The source aspect ratio is preserved. One dimension matches the target
/// exactly, the other is at most the target. Neither is ever zero.
///
/// # Examples
/// ```
/// # use dataset_prep::imaging::calculate_fit_dimensions;
/// // 800x400 (2:1) into 512x512 → width-bound
/// assert_eq!(calculate_fit_dimensions((800, 400), (512, 512)), (512, 256));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: width matches, height shrinks
        let h = (tgt_w as f64 / src_aspect).round() as u32;
        (tgt_w, h.clamp(1, tgt_h))
    } else {
        // Source is taller (or same shape): height matches
        let w = (tgt_h as f64 * src_aspect).round() as u32;
        (w.clamp(1, tgt_w), tgt_h)
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect < tgt_aspect {
        // Source is taller: width matches, height will exceed
        let h = (tgt_w as f64 / src_aspect).round() as u32;
        (tgt_w, h.max(tgt_h))
    } else {
        // Source is wider (or same shape): height matches, width will exceed
        let w = (tgt_h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), tgt_h)
    }
}

/// Dimensions of the subject after scaling it into a fixed square of `size`.
///
/// Downscaling always happens when the subject overflows the square.
/// Upscaling only happens when `no_upscale` is false.
pub fn calculate_square_fit(source: (u32, u32), size: u32, no_upscale: bool) -> (u32, u32) {
    let (w, h) = source;
    let scale = f64::min(size as f64 / w as f64, size as f64 / h as f64);

    if scale < 1.0 || (scale > 1.0 && !no_upscale) {
        let new_w = ((w as f64 * scale).round() as u32).max(1);
        let new_h = ((h as f64 * scale).round() as u32).max(1);
        (new_w, new_h)
    } else {
        (w, h)
    }
}

/// Top-left offset that centers `inner` within `outer`.
///
/// Uses floor division, so an odd leftover pixel lands on the right/bottom.
/// Negative when `inner` is larger (used for centered crops).
pub fn center_offset(outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64).div_euclid(2),
        (outer.1 as i64 - inner.1 as i64).div_euclid(2),
    )
}

/// Canvas dimensions after adding a uniform margin on every side.
pub fn padded_dimensions(source: (u32, u32), padding: u32) -> (u32, u32) {
    (
        source.0.saturating_add(padding.saturating_mul(2)),
        source.1.saturating_add(padding.saturating_mul(2)),
    )
}
