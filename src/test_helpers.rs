//! Shared test utilities for the infocard test suite.
//!
//! Fixture builders for the three inputs of a batch run: a photos tree, an
//! overlays directory and a dataset written as a directory of CSV sheets.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! touch_photo(&tmp.path().join("photos/P1/01.jpg"));
//! write_csv_sheet(&tmp.path().join("data"), "main", &[&["P1", "badgeA", "5"]]);
//! let backend = MockBackend::new()
//!     .with_photo(tmp.path().join("photos/P1/01.jpg"), gradient_photo(90, 120))
//!     .with_overlay(tmp.path().join("overlays/badgeA.png"), solid_overlay(6, 6, [255, 0, 0, 255]));
//! ```

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::Path;

// =========================================================================
// Images
// =========================================================================

/// Photo with a position-dependent color so crops are distinguishable.
pub fn gradient_photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Overlay filled with a single RGBA color.
pub fn solid_overlay(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
}

// =========================================================================
// Filesystem
// =========================================================================

/// Create an empty file (and its parents). Enough for inventory scanning
/// when the pixels come from a mock backend.
pub fn touch_photo(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
}

/// Write `<dir>/<name>.csv` with a header row followed by `rows`.
///
/// A directory of such files loads as a multi-sheet dataset, one sheet per
/// file in name order.
pub fn write_csv_sheet(dir: &Path, name: &str, rows: &[&[&str]]) {
    fs::create_dir_all(dir).unwrap();
    let mut content = String::from("product,overlay,position\n");
    for row in rows {
        content.push_str(&row.join(","));
        content.push('\n');
    }
    fs::write(dir.join(format!("{name}.csv")), content).unwrap();
}
