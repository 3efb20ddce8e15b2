//! High-level image operations.
//!
//! These functions combine calculations with backend execution: the Canvas
//! Transform (photo → fixed-size canvas) and the Overlay Compositor (overlay
//! asset + position id → pixels on a canvas).

use super::backend::{BackendError, ImageBackend};
use super::calculations::{calculate_fill_dimensions, center_crop_origin, source_crop_window};
use super::canvas::{Canvas, CanvasSpec};
use crate::position::{EvalContext, PositionError, PositionRegistry};
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Why an overlay could not be composited.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error(transparent)]
    Load(#[from] BackendError),
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Where an overlay landed on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    /// The position id was not registered and `(margin, margin)` was used.
    pub fallback: bool,
}

/// Fill-size intermediates larger than this many canvases are skipped in
/// favor of resizing only the visible window of the source.
const MAX_FILL_AREA_RATIO: u64 = 16;

/// Scale `photo` to fill the canvas, center-crop it and paste the crop onto a
/// fresh white canvas.
///
/// Extreme aspect ratios would need a fill-size buffer far beyond the
/// canvas; those photos are cropped in source coordinates first and the
/// window resized straight to the canvas.
pub fn fill_and_crop(photo: &RgbImage, spec: CanvasSpec) -> Canvas {
    let target = (spec.width, spec.height);
    let mut canvas = Canvas::blank(spec.width, spec.height);
    if photo.width() == 0 || photo.height() == 0 || spec.width == 0 || spec.height == 0 {
        return canvas;
    }

    let (res_w, res_h) = calculate_fill_dimensions(photo.dimensions(), target);
    let fill_area = res_w as u64 * res_h as u64;
    let canvas_area = spec.width as u64 * spec.height as u64;
    let crop = if (res_w, res_h) == photo.dimensions() {
        let (left, top) = center_crop_origin((res_w, res_h), target);
        imageops::crop_imm(photo, left, top, spec.width, spec.height).to_image()
    } else if fill_area > canvas_area.saturating_mul(MAX_FILL_AREA_RATIO) {
        let (x, y, w, h) = source_crop_window(photo.dimensions(), target);
        debug!(
            fill_width = res_w,
            fill_height = res_h,
            "fill size too large, resizing source window"
        );
        let window = imageops::crop_imm(photo, x, y, w, h).to_image();
        imageops::resize(&window, spec.width, spec.height, FilterType::Lanczos3)
    } else {
        let (left, top) = center_crop_origin((res_w, res_h), target);
        let resized = imageops::resize(photo, res_w, res_h, FilterType::Lanczos3);
        imageops::crop_imm(&resized, left, top, spec.width, spec.height).to_image()
    };
    canvas.paste(&crop, 0, 0);
    canvas
}

/// Canvas Transform: load a photo (orientation applied) and fill-crop it to
/// the canvas.
pub fn render_canvas(
    backend: &impl ImageBackend,
    photo: &Path,
    spec: CanvasSpec,
) -> Result<Canvas, BackendError> {
    let image = backend.load_photo(photo)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(BackendError::decode(photo, "image has zero size"));
    }
    debug!(
        photo = %photo.display(),
        width = image.width(),
        height = image.height(),
        "rendering canvas"
    );
    Ok(fill_and_crop(&image, spec))
}

/// Resolve the top-left paste point for an overlay of `overlay_size` on
/// `canvas_size`.
///
/// An unregistered `position_id` falls back to `(margin, margin)` with a
/// warning. Formula failures are returned to the caller.
pub fn resolve_placement(
    registry: &PositionRegistry,
    position_id: &str,
    canvas_size: (u32, u32),
    overlay_size: (u32, u32),
    margin: u32,
) -> Result<Placement, PositionError> {
    let ctx = EvalContext {
        canvas_width: canvas_size.0 as i64,
        canvas_height: canvas_size.1 as i64,
        overlay_width: overlay_size.0 as i64,
        overlay_height: overlay_size.1 as i64,
        margin: margin as i64,
    };
    match registry.place(position_id, &ctx) {
        Ok((x, y)) => Ok(Placement {
            x,
            y,
            fallback: false,
        }),
        Err(PositionError::Unknown(id)) => {
            warn!(position = %id, margin, "unknown position, using margin placement");
            Ok(Placement {
                x: margin as i64,
                y: margin as i64,
                fallback: true,
            })
        }
        Err(e) => Err(e),
    }
}

/// Composite an in-memory overlay onto `canvas` at the resolved position.
pub fn place_overlay(
    canvas: &mut Canvas,
    overlay: &RgbaImage,
    position_id: &str,
    registry: &PositionRegistry,
    margin: u32,
) -> Result<Placement, PositionError> {
    let placement = resolve_placement(
        registry,
        position_id,
        canvas.dimensions(),
        overlay.dimensions(),
        margin,
    )?;
    canvas.composite(overlay, placement.x, placement.y);
    Ok(placement)
}

/// Overlay Compositor: load the overlay asset at `overlay_path` and composite
/// it onto `canvas` at `position_id`.
///
/// On error the canvas is left unchanged.
pub fn composite_overlay(
    backend: &impl ImageBackend,
    canvas: &mut Canvas,
    overlay_path: &Path,
    position_id: &str,
    registry: &PositionRegistry,
    margin: u32,
) -> Result<Placement, OverlayError> {
    let overlay = backend.load_overlay(overlay_path)?;
    let placement = place_overlay(canvas, &overlay, position_id, registry, margin)?;
    debug!(
        overlay = %overlay_path.display(),
        position = position_id,
        x = placement.x,
        y = placement.y,
        "overlay composited"
    );
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::canvas::BACKGROUND;
    use crate::position::{Anchor, FormulaError, PositionDefinition};
    use image::{Rgb, Rgba};

    const SPEC: CanvasSpec = CanvasSpec {
        width: 90,
        height: 120,
        margin: 3,
    };

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]))
    }

    fn registry() -> PositionRegistry {
        [
            (
                "corner".to_string(),
                PositionDefinition::new("MARGIN", "MARGIN", Anchor::TOP_LEFT),
            ),
            (
                "bottom-right".to_string(),
                PositionDefinition::new(
                    "canvas_width - MARGIN",
                    "canvas_height - MARGIN",
                    Anchor::BOTTOM_RIGHT,
                ),
            ),
            (
                "centered".to_string(),
                PositionDefinition::new(
                    "canvas_width // 2",
                    "canvas_height // 2",
                    Anchor::MIDDLE_CENTER,
                ),
            ),
            (
                "broken".to_string(),
                PositionDefinition::new("canvas_width / 0", "0", Anchor::TOP_LEFT),
            ),
        ]
        .into_iter()
        .collect()
    }

    // =========================================================================
    // Canvas Transform
    // =========================================================================

    #[test]
    fn fill_and_crop_output_size_for_any_aspect() {
        for (w, h) in [(300, 400), (400, 300), (350, 350), (90, 120), (7, 1000), (45, 60)] {
            let canvas = fill_and_crop(&gradient(w, h), SPEC);
            assert_eq!(canvas.dimensions(), (90, 120), "source {w}x{h}");
        }
    }

    #[test]
    fn fill_and_crop_exact_size_is_identity() {
        let photo = gradient(90, 120);
        let canvas = fill_and_crop(&photo, SPEC);
        assert_eq!(canvas.image(), &photo);
    }

    #[test]
    fn fill_and_crop_centers_landscape_crop() {
        // 240x120 already has the canvas height; crop window starts at x=75
        let photo = gradient(240, 120);
        let canvas = fill_and_crop(&photo, SPEC);
        assert_eq!(canvas.pixel(0, 0), *photo.get_pixel(75, 0));
        assert_eq!(canvas.pixel(89, 119), *photo.get_pixel(164, 119));
    }

    #[test]
    fn fill_and_crop_sliver_uses_center_window() {
        // 2x4000 would fill to 90x180000; only rows 1998..2001 are visible
        let band = Rgb([0, 200, 0]);
        let photo = RgbImage::from_fn(2, 4000, |_, y| {
            if (1990..2010).contains(&y) {
                band
            } else {
                Rgb([0, 0, 0])
            }
        });
        let canvas = fill_and_crop(&photo, SPEC);
        assert_eq!(canvas.dimensions(), (90, 120));
        assert!(canvas.image().pixels().all(|p| *p == band));
    }

    #[test]
    fn fill_and_crop_empty_photo_gives_blank_canvas() {
        let canvas = fill_and_crop(&RgbImage::new(0, 0), SPEC);
        assert_eq!(canvas, Canvas::blank(90, 120));
    }

    #[test]
    fn render_canvas_loads_through_backend() {
        let backend = MockBackend::new().with_photo("/photos/P1/a.jpg", gradient(180, 240));
        let canvas = render_canvas(&backend, Path::new("/photos/P1/a.jpg"), SPEC).unwrap();
        assert_eq!(canvas.dimensions(), (90, 120));
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::LoadPhoto("/photos/P1/a.jpg".to_string())]
        );
    }

    #[test]
    fn render_canvas_propagates_load_error() {
        let backend = MockBackend::new();
        let err = render_canvas(&backend, Path::new("/missing.jpg"), SPEC).unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }

    #[test]
    fn render_canvas_rejects_zero_size_photo() {
        let backend = MockBackend::new().with_photo("/empty.png", RgbImage::new(0, 5));
        let err = render_canvas(&backend, Path::new("/empty.png"), SPEC).unwrap_err();
        assert!(err.to_string().contains("zero size"));
    }

    // =========================================================================
    // Overlay Compositor
    // =========================================================================

    #[test]
    fn resolve_placement_top_left_margin() {
        let p = resolve_placement(&registry(), "corner", (90, 120), (10, 10), 3).unwrap();
        assert_eq!(
            p,
            Placement {
                x: 3,
                y: 3,
                fallback: false
            }
        );
    }

    #[test]
    fn resolve_placement_applies_anchor() {
        let p = resolve_placement(&registry(), "bottom-right", (90, 120), (10, 20), 3).unwrap();
        assert_eq!((p.x, p.y), (77, 97));
        let p = resolve_placement(&registry(), "centered", (90, 120), (11, 21), 3).unwrap();
        assert_eq!((p.x, p.y), (40, 50));
    }

    #[test]
    fn resolve_placement_unknown_id_falls_back_to_margin() {
        let p = resolve_placement(&registry(), "nope", (90, 120), (10, 10), 7).unwrap();
        assert_eq!(
            p,
            Placement {
                x: 7,
                y: 7,
                fallback: true
            }
        );
    }

    #[test]
    fn resolve_placement_propagates_formula_error() {
        let err = resolve_placement(&registry(), "broken", (90, 120), (10, 10), 3).unwrap_err();
        assert!(matches!(
            err,
            PositionError::Formula {
                source: FormulaError::DivisionByZero,
                ..
            }
        ));
    }

    #[test]
    fn place_overlay_paints_at_resolved_point() {
        let mut canvas = Canvas::blank(90, 120);
        let overlay = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        place_overlay(&mut canvas, &overlay, "corner", &registry(), 3).unwrap();
        assert_eq!(canvas.pixel(3, 3), Rgb([0, 0, 0]));
        assert_eq!(canvas.pixel(7, 7), Rgb([0, 0, 0]));
        assert_eq!(canvas.pixel(2, 2), BACKGROUND);
        assert_eq!(canvas.pixel(8, 8), BACKGROUND);
    }

    #[test]
    fn place_overlay_off_canvas_is_accepted() {
        let registry: PositionRegistry = [(
            "outside".to_string(),
            PositionDefinition::new("canvas_width + 50", "-500", Anchor::TOP_LEFT),
        )]
        .into_iter()
        .collect();
        let mut canvas = Canvas::blank(90, 120);
        let overlay = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        let p = place_overlay(&mut canvas, &overlay, "outside", &registry, 3).unwrap();
        assert_eq!((p.x, p.y), (140, -500));
        assert_eq!(canvas, Canvas::blank(90, 120));
    }

    #[test]
    fn composite_overlay_loads_then_places() {
        let backend = MockBackend::new()
            .with_overlay("/ov/badge.png", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut canvas = Canvas::blank(90, 120);
        let p = composite_overlay(
            &backend,
            &mut canvas,
            Path::new("/ov/badge.png"),
            "bottom-right",
            &registry(),
            3,
        )
        .unwrap();
        assert_eq!((p.x, p.y), (83, 113));
        assert_eq!(canvas.pixel(86, 116), Rgb([255, 0, 0]));
        assert_eq!(canvas.pixel(87, 117), BACKGROUND);
    }

    #[test]
    fn composite_overlay_load_failure_leaves_canvas() {
        let backend = MockBackend::new();
        let mut canvas = Canvas::blank(90, 120);
        let err = composite_overlay(
            &backend,
            &mut canvas,
            Path::new("/ov/missing.png"),
            "corner",
            &registry(),
            3,
        )
        .unwrap_err();
        assert!(matches!(err, OverlayError::Load(_)));
        assert_eq!(canvas, Canvas::blank(90, 120));
    }

    #[test]
    fn composite_overlay_formula_failure_leaves_canvas() {
        let backend = MockBackend::new()
            .with_overlay("/ov/badge.png", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut canvas = Canvas::blank(90, 120);
        let err = composite_overlay(
            &backend,
            &mut canvas,
            Path::new("/ov/badge.png"),
            "broken",
            &registry(),
            3,
        )
        .unwrap_err();
        assert!(matches!(err, OverlayError::Position(_)));
        assert_eq!(canvas, Canvas::blank(90, 120));
    }
}
