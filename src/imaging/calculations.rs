//! Pure calculation functions for canvas geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale factor that makes `source` cover `target` on both axes.
///
/// `max(target_w / source_w, target_h / source_h)`: scale-to-fill, never
/// letterbox.
pub fn fill_scale(source: (u32, u32), target: (u32, u32)) -> f64 {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    (tgt_w as f64 / src_w as f64).max(tgt_h as f64 / src_h as f64)
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Each side is `floor(side * scale)`. Floating-point error can leave a side
/// one pixel short of the target, so both are clamped to at least the
/// target: the result always covers the target area.
///
/// # Examples
/// ```
/// # use infocard::imaging::calculate_fill_dimensions;
/// // Landscape photo onto a portrait canvas: height matches, width overflows
/// assert_eq!(calculate_fill_dimensions((1600, 1200), (900, 1200)), (1600, 1200));
/// assert_eq!(calculate_fill_dimensions((800, 600), (900, 1200)), (1600, 1200));
/// ```
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let scale = fill_scale(source, target);
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    let w = (src_w as f64 * scale).floor() as u32;
    let h = (src_h as f64 * scale).floor() as u32;
    (w.max(tgt_w), h.max(tgt_h))
}

/// Top-left corner of a `target`-sized window centered on `resized`.
///
/// `((resized_w - target_w) // 2, (resized_h - target_h) // 2)`.
pub fn center_crop_origin(resized: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (res_w, res_h) = resized;
    let (tgt_w, tgt_h) = target;
    (res_w.saturating_sub(tgt_w) / 2, res_h.saturating_sub(tgt_h) / 2)
}

/// The part of `source` that survives fill-then-crop, in source pixels.
///
/// Returns `(x, y, width, height)`: the centered crop window mapped back
/// through the fill scale, rounded outward so it covers the whole crop and
/// clamped to the source. Resizing this window straight to `target` avoids
/// materializing the full fill-size intermediate.
pub fn source_crop_window(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let scale = fill_scale(source, target);
    let resized = calculate_fill_dimensions(source, target);
    let (left, top) = center_crop_origin(resized, target);
    let axis = |origin: u32, extent: u32, limit: u32| {
        let start = ((origin as f64 / scale).floor() as u32).min(limit - 1);
        let len = ((extent as f64 / scale).ceil() as u32).clamp(1, limit - start);
        (start, len)
    };
    let (x, w) = axis(left, target.0, source.0);
    let (y, h) = axis(top, target.1, source.1);
    (x, y, w, h)
}

/// Intersection of a `size` rectangle placed at `(x, y)` with a
/// `bounds`-sized rectangle at the origin.
///
/// Returns `(dst_x, dst_y, src_x, src_y, width, height)`, or `None` when the
/// rectangles do not overlap.
pub fn clip_to_bounds(
    position: (i64, i64),
    size: (u32, u32),
    bounds: (u32, u32),
) -> Option<(u32, u32, u32, u32, u32, u32)> {
    let (x, y) = position;
    let left = x.max(0);
    let top = y.max(0);
    let right = x.saturating_add(size.0 as i64).min(bounds.0 as i64);
    let bottom = y.saturating_add(size.1 as i64).min(bounds.1 as i64);
    if right <= left || bottom <= top {
        return None;
    }
    Some((
        left as u32,
        top as u32,
        (left - x) as u32,
        (top - y) as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}
