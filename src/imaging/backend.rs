//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the I/O boundary of the imaging module:
//! decode a photo, decode an overlay, encode a finished canvas. All pixel
//! work (fill-resize, crop, compositing) happens in memory on the values
//! these methods return, so the card pipeline can be exercised with a mock
//! backend that never touches real files.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use image::{RgbImage, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
}

impl BackendError {
    pub fn decode(path: &Path, message: impl ToString) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn encode(path: &Path, message: impl ToString) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Trait for image backends.
///
/// `Sync` so a single backend can be shared by rayon workers.
pub trait ImageBackend: Sync {
    /// Decode a photo as opaque RGB, with its embedded orientation applied.
    fn load_photo(&self, path: &Path) -> Result<RgbImage, BackendError>;

    /// Decode an overlay, converting it to RGBA if it has no alpha channel.
    fn load_overlay(&self, path: &Path) -> Result<RgbaImage, BackendError>;

    /// Encode `image` as PNG at `path`, creating parent directories.
    fn save_png(&self, image: &RgbImage, path: &Path) -> Result<(), BackendError>;
}
