//! Filesystem inventory: product folders, their photos, overlay assets.
//!
//! ```text
//! photos/                 # photos root
//! ├── P1/                 # product id = folder name
//! │   ├── 01.jpg          # slide 0 (sorted by file name)
//! │   └── 02.jpg          # slide 1
//! └── P2/
//!     └── main.png
//! infografika/            # overlays root
//! ├── badgeA.png          # referenced as "badgeA"
//! └── sale.png
//! ```
//!
//! Listings are sorted by file name and skip hidden (`.`-prefixed) entries.

use crate::imaging::is_supported_photo;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Failed to read directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A product folder and its photos in slide order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub dir: PathBuf,
    pub photos: Vec<PathBuf>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Direct children of `dir`, sorted by name, hidden entries dropped.
fn children(dir: &Path) -> Result<Vec<DirEntry>, InventoryError> {
    if !dir.is_dir() {
        return Err(InventoryError::NotADirectory(dir.to_path_buf()));
    }
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !is_hidden(&entry) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Product ids: the sub-directories of `photos_root`.
pub fn list_products(photos_root: &Path) -> Result<Vec<String>, InventoryError> {
    Ok(children(photos_root)?
        .into_iter()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect())
}

/// Photos of one product in slide order.
pub fn list_photos(product_dir: &Path) -> Result<Vec<PathBuf>, InventoryError> {
    Ok(children(product_dir)?
        .into_iter()
        .filter(|e| e.path().is_file() && is_supported_photo(e.path()))
        .map(|e| e.into_path())
        .collect())
}

/// Every product with its photos. Products without photos are kept.
pub fn scan_products(photos_root: &Path) -> Result<Vec<Product>, InventoryError> {
    list_products(photos_root)?
        .into_iter()
        .map(|id| {
            let dir = photos_root.join(&id);
            let photos = list_photos(&dir)?;
            Ok(Product { id, dir, photos })
        })
        .collect()
}

/// Overlay names (file stems of the `.png` files in `overlays_root`).
pub fn list_overlays(overlays_root: &Path) -> Result<Vec<String>, InventoryError> {
    Ok(children(overlays_root)?
        .into_iter()
        .filter(|e| e.path().is_file() && has_png_extension(e.path()))
        .filter_map(|e| {
            e.path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        })
        .collect())
}

fn has_png_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Asset path for an overlay name: `<root>/<name>.png`. A name that already
/// ends in `.png` is used as is.
pub fn overlay_path(overlays_root: &Path, name: &str) -> PathBuf {
    if has_png_extension(Path::new(name)) {
        overlays_root.join(name)
    } else {
        overlays_root.join(format!("{name}.png"))
    }
}

/// Output path for a photo: `<output_root>/<product>/<stem>.png`.
pub fn output_path(output_root: &Path, product: &str, photo: &Path) -> PathBuf {
    let stem = photo
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    output_root.join(product).join(format!("{stem}.png"))
}
