//! The fixed-size output buffer for one card.

use super::calculations::clip_to_bounds;
use image::{Rgb, RgbImage, RgbaImage};

/// Background of a fresh canvas.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Canvas geometry passed explicitly into every imaging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

/// Opaque RGB pixel buffer of exactly the canvas size.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// A white canvas.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Copy `image` onto the canvas at `(x, y)`, clipped to the canvas.
    pub fn paste(&mut self, image: &RgbImage, x: i64, y: i64) {
        image::imageops::replace(&mut self.image, image, x, y);
    }

    /// Alpha-composite `overlay` over the canvas with its top-left corner at
    /// `(x, y)`. Parts outside the canvas are dropped; an overlay entirely
    /// outside leaves the canvas untouched.
    pub fn composite(&mut self, overlay: &RgbaImage, x: i64, y: i64) {
        let Some((dst_x, dst_y, src_x, src_y, w, h)) =
            clip_to_bounds((x, y), overlay.dimensions(), self.dimensions())
        else {
            return;
        };
        for row in 0..h {
            for col in 0..w {
                let src = overlay.get_pixel(src_x + col, src_y + row);
                let alpha = src[3] as u32;
                if alpha == 0 {
                    continue;
                }
                let dst = self.image.get_pixel_mut(dst_x + col, dst_y + row);
                if alpha == 255 {
                    *dst = Rgb([src[0], src[1], src[2]]);
                    continue;
                }
                for c in 0..3 {
                    let blended = src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha);
                    dst[c] = ((blended + 127) / 255) as u8;
                }
            }
        }
    }
}
