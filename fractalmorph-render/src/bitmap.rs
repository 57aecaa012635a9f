//! The output RGBA bitmap buffer, stored bottom-up (bitmap y = 0 at the
//! bottom). The PNG encoder is responsible for flipping to PNG's native
//! top-down row order; the buffer itself never does.

use std::collections::TryReserveError;

/// An RGBA pixel buffer representing a rendered image, bottom-up.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major, bottom-up.
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Creates a new buffer filled with opaque black.
    ///
    /// Panics on allocation failure; callers on the fallible canvas
    /// lifecycle (where allocation size is driven by caller-supplied
    /// dimensions/oversampling) should use [`Self::try_new`] instead.
    pub fn new(width: u32, height: u32) -> Self {
        Self::try_new(width, height).expect("bitmap allocation failed")
    }

    /// Fallible counterpart of [`Self::new`], surfacing allocation failure
    /// instead of aborting the process.
    pub fn try_new(width: u32, height: u32) -> Result<Self, TryReserveError> {
        let len = width as usize * height as usize * 4;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len)?;
        pixels.resize(len, 0u8);
        for chunk in pixels.chunks_exact_mut(4) {
            chunk[3] = 255;
        }
        Ok(Self { width, height, pixels })
    }

    /// `target_width · (target_height − py − 1) + px`, the bottom-up pixel
    /// index (in pixels, not bytes).
    #[inline]
    pub fn bitmap_index(&self, px: u32, py: u32) -> usize {
        (self.width * (self.height - py - 1) + px) as usize
    }

    #[inline]
    pub fn set_pixel(&mut self, px: u32, py: u32, rgba: [u8; 4]) {
        let idx = self.bitmap_index(px, py) * 4;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    #[inline]
    pub fn get_pixel(&self, px: u32, py: u32) -> [u8; 4] {
        let idx = self.bitmap_index(px, py) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        out
    }

    /// Converts to PNG's native top-down row order, channel layout
    /// unchanged (RGBA).
    pub fn to_top_down_rgba(&self) -> Vec<u8> {
        let stride = self.width as usize * 4;
        let mut out = vec![0u8; self.pixels.len()];
        for row in 0..self.height as usize {
            let bottom_up_row = self.height as usize - 1 - row;
            let src = &self.pixels[bottom_up_row * stride..(bottom_up_row + 1) * stride];
            out[row * stride..(row + 1) * stride].copy_from_slice(src);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_black_opaque() {
        let bmp = Bitmap::new(4, 4);
        assert_eq!(bmp.pixels.len(), 4 * 4 * 4);
        for chunk in bmp.pixels.chunks_exact(4) {
            assert_eq!(chunk, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn row_zero_is_stored_last() {
        let mut bmp = Bitmap::new(2, 2);
        bmp.set_pixel(0, 0, [255, 0, 0, 255]);
        // Bottom-up: py=0 is the last row in the flat buffer.
        let idx = bmp.bitmap_index(0, 0);
        assert_eq!(idx, 2); // row 1 (height-0-1=1) * width 2 + px 0
        assert_eq!(&bmp.pixels[idx * 4..idx * 4 + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut bmp = Bitmap::new(8, 6);
        bmp.set_pixel(3, 2, [10, 20, 30, 255]);
        assert_eq!(bmp.get_pixel(3, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn to_top_down_flips_rows() {
        let mut bmp = Bitmap::new(2, 2);
        bmp.set_pixel(0, 0, [1, 1, 1, 255]); // bottom row
        bmp.set_pixel(0, 1, [2, 2, 2, 255]); // top row
        let top_down = bmp.to_top_down_rgba();
        // PNG row 0 must be the *top* of the image, i.e. bitmap y = height-1.
        assert_eq!(&top_down[0..4], &[2, 2, 2, 255]);
        assert_eq!(&top_down[4..8], &[1, 1, 1, 255]);
    }
}
