//! Image processing: pure Rust on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + orientation** | `ImageReader` + `apply_orientation` |
//! | **Fill resize** | `imageops::resize` with Lanczos3 |
//! | **Center crop** | `imageops::crop_imm` |
//! | **Composite** | straight-alpha "over", clipped to the canvas |
//! | **Encode** | PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Canvas**: [`CanvasSpec`] geometry and the [`Canvas`] pixel buffer
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Canvas Transform and Overlay Compositor

pub mod backend;
mod calculations;
mod canvas;
pub mod operations;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    calculate_fill_dimensions, center_crop_origin, fill_scale, source_crop_window,
};
pub use canvas::{BACKGROUND, Canvas, CanvasSpec};
pub use operations::{
    OverlayError, Placement, composite_overlay, fill_and_crop, place_overlay, render_canvas,
    resolve_placement,
};
pub use rust_backend::{RustBackend, is_supported_photo, supported_input_extensions};
