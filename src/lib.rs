//! # Infocard
//!
//! A batch compositor for product photo cards. Every photo in a products
//! tree is scaled to fill a fixed canvas, center-cropped, and decorated with
//! infographic overlays. A tabular dataset says which overlay goes where on
//! which slide.
//!
//! # Pipeline
//!
//! ```text
//! photos/{product}/*.jpg ─┐
//! dataset (xlsx / csv) ───┼─► generate ─► output[_N]/{product}/{stem}.png
//! infografika/*.png ──────┘
//! ```
//!
//! A run validates its inputs, allocates a fresh output directory (`output`,
//! then `output_1`, `output_2`, ...) and renders photos in parallel. Per-photo
//! and per-overlay failures are reported as events and never abort the batch.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`position`] | Formula language, anchors and the named position registry |
//! | [`config`] | `infocard.toml` loading, validation and editing |
//! | [`dataset`] | Workbook and CSV loading into per-sheet product rows |
//! | [`inventory`] | Product folders, photo ordering and overlay assets on disk |
//! | [`imaging`] | Canvas fill/crop, alpha compositing, decode and PNG encode |
//! | [`generate`] | The batch driver: job planning, parallel rendering, events |
//! | [`output`] | CLI output formatting for events, reports and listings |
//!
//! # Positions
//!
//! A position is a pair of integer formulas plus an anchor. Formulas may use
//! `canvas_width`, `canvas_height`, `overlay_width`, `overlay_height` and
//! `MARGIN`; the anchor says which point of the overlay lands on the
//! evaluated coordinate:
//!
//! ```text
//! left = x - anchor_dx(overlay_width)
//! top  = y - anchor_dy(overlay_height)
//! ```
//!
//! `//` is floor division. `/` must divide exactly, so `canvas_width / 2` on
//! an odd canvas is an error rather than a silently rounded pixel.

pub mod config;
pub mod dataset;
pub mod generate;
pub mod imaging;
pub mod inventory;
pub mod output;
pub mod position;

#[cfg(test)]
pub(crate) mod test_helpers;
