//! Texture surfaces: an owned ARGB32 buffer with an image view and a dirty table.
//!
//! The buffer is allocated at its "full" size once. The logical image is a
//! view into it (offset + extent, sharing the buffer's pitch), so a graphics
//! mode change that shrinks the picture only moves the view instead of
//! reallocating. All pixel coordinates in this module are relative to the
//! image origin; the dirty table uses the same coordinates.

use crate::dirty::{DirtyTracker, Rect};
use crate::error::BridgeError;

/// Rows are padded to a multiple of this many pixels.
pub const PITCH_ALIGN: u32 = 8;

/// Where the logical image sits inside the full buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageView {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageView {
    /// A view covering `width` x `height` at the buffer origin.
    #[must_use]
    pub const fn at_origin(width: u32, height: u32) -> Self {
        Self {
            x_offset: 0,
            y_offset: 0,
            width,
            height,
        }
    }

    /// True if the view lies inside a `full_width` x `full_height` buffer.
    #[must_use]
    pub fn fits(&self, full_width: u32, full_height: u32) -> bool {
        let right = u64::from(self.x_offset) + u64::from(self.width);
        let bottom = u64::from(self.y_offset) + u64::from(self.height);
        right <= u64::from(full_width) && bottom <= u64::from(full_height)
    }

    /// The view as a rectangle in image coordinates.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// An owned pixel buffer plus geometry and dirty-tracking metadata.
#[derive(Debug, Clone)]
pub struct TextureSurface {
    pixels: Vec<u32>,
    pitch: u32,
    full_width: u32,
    full_height: u32,
    image: ImageView,
    dirty: DirtyTracker,
}

fn aligned_pitch(width: u32) -> u32 {
    width.div_ceil(PITCH_ALIGN) * PITCH_ALIGN
}

impl TextureSurface {
    /// Allocate a `full_width` x `full_height` surface whose image covers
    /// the whole buffer.
    pub fn new(full_width: u32, full_height: u32, dirty_capacity: usize) -> Result<Self, BridgeError> {
        Self::with_image(
            full_width,
            full_height,
            ImageView::at_origin(full_width, full_height),
            dirty_capacity,
        )
    }

    /// Allocate a surface with an explicit image view.
    pub fn with_image(
        full_width: u32,
        full_height: u32,
        image: ImageView,
        dirty_capacity: usize,
    ) -> Result<Self, BridgeError> {
        if full_width == 0 || full_height == 0 {
            return Err(BridgeError::ZeroSize {
                width: full_width,
                height: full_height,
            });
        }
        check_view(image, full_width, full_height)?;

        let pitch = aligned_pitch(full_width);
        let len = pitch as usize * full_height as usize;
        Ok(Self {
            pixels: vec![0; len],
            pitch,
            full_width,
            full_height,
            image,
            dirty: DirtyTracker::new(image.width, image.height, dirty_capacity),
        })
    }

    /// Row pitch in pixels (at least `full_width`).
    #[must_use]
    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    #[must_use]
    pub fn full_width(&self) -> u32 {
        self.full_width
    }

    #[must_use]
    pub fn full_height(&self) -> u32 {
        self.full_height
    }

    #[must_use]
    pub fn image(&self) -> ImageView {
        self.image
    }

    /// Logical image width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width
    }

    /// Logical image height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height
    }

    /// Move or resize the image view without touching the allocation.
    ///
    /// The whole new image is marked dirty.
    pub fn set_image(&mut self, image: ImageView) -> Result<(), BridgeError> {
        check_view(image, self.full_width, self.full_height)?;
        self.image = image;
        self.dirty.set_bounds(image.width, image.height);
        self.dirty.mark_all();
        Ok(())
    }

    /// Change the logical image size for a graphics mode hot swap.
    ///
    /// An image that fits the current allocation is centred in it
    /// (letterboxed); a larger one grows the allocation. Pixel contents are
    /// not preserved when the allocation grows.
    pub fn reshape(&mut self, width: u32, height: u32) -> Result<(), BridgeError> {
        if width == 0 || height == 0 {
            return Err(BridgeError::ZeroSize { width, height });
        }
        if width > self.full_width || height > self.full_height {
            let full_width = self.full_width.max(width);
            let full_height = self.full_height.max(height);
            self.pitch = aligned_pitch(full_width);
            self.full_width = full_width;
            self.full_height = full_height;
            self.pixels = vec![0; self.pitch as usize * full_height as usize];
        }
        let image = ImageView {
            x_offset: (self.full_width - width) / 2,
            y_offset: (self.full_height - height) / 2,
            width,
            height,
        };
        self.set_image(image)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (self.image.y_offset + y) as usize * self.pitch as usize + (self.image.x_offset + x) as usize
    }

    /// Pixel at image coordinates, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        (x < self.image.width && y < self.image.height).then(|| self.pixels[self.index(x, y)])
    }

    /// Write one pixel. Writes outside the image are dropped. Does not mark
    /// anything dirty.
    pub fn set_pixel(&mut self, x: u32, y: u32, argb: u32) {
        if x < self.image.width && y < self.image.height {
            let i = self.index(x, y);
            self.pixels[i] = argb;
        }
    }

    /// One image row.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u32]> {
        if y >= self.image.height {
            return None;
        }
        let start = self.index(0, y);
        Some(&self.pixels[start..start + self.image.width as usize])
    }

    /// One image row, mutable. Does not mark anything dirty.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u32]> {
        if y >= self.image.height {
            return None;
        }
        let start = self.index(0, y);
        let width = self.image.width as usize;
        Some(&mut self.pixels[start..start + width])
    }

    /// Fill the image with one colour and mark all of it dirty.
    pub fn fill(&mut self, argb: u32) {
        for y in 0..self.image.height {
            if let Some(row) = self.row_mut(y) {
                row.fill(argb);
            }
        }
        self.dirty.mark_all();
    }

    /// Copy `rect` (image coordinates) from `src` into the same place in
    /// `self`, clipped to both images. Returns the rectangle actually copied.
    pub fn copy_rect_from(&mut self, src: &TextureSurface, rect: Rect) -> Option<Rect> {
        let rect = rect
            .intersection(&src.image.bounds())?
            .intersection(&self.image.bounds())?;
        let x0 = rect.x as usize;
        let x1 = rect.right() as usize;
        for y in rect.y..rect.bottom() {
            if let (Some(from), Some(to)) = (src.row(y), self.row_mut(y)) {
                to[x0..x1].copy_from_slice(&from[x0..x1]);
            }
        }
        Some(rect)
    }

    #[must_use]
    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }

    pub fn mark_dirty(&mut self, rect: Rect) {
        self.dirty.mark(rect);
    }

    /// Take and clear the accumulated dirty rectangles.
    pub fn take_dirty(&mut self) -> Vec<Rect> {
        self.dirty.take()
    }

    // The whole allocation, pitch-padded.
    #[cfg(test)]
    fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Write `rect` as RGBA8 into `out`, a frame `out_width` pixels wide that
    /// uses the same image coordinates. Anything outside either the image or
    /// the frame is skipped.
    pub fn export_rgba(&self, rect: Rect, out: &mut [u8], out_width: u32) {
        if out_width == 0 {
            return;
        }
        let out_height = (out.len() / (out_width as usize * 4)) as u32;
        let Some(rect) = rect
            .intersection(&self.image.bounds())
            .and_then(|r| r.clip(out_width, out_height))
        else {
            return;
        };

        for y in rect.y..rect.bottom() {
            let Some(row) = self.row(y) else { continue };
            let line = y as usize * out_width as usize;
            for x in rect.x..rect.right() {
                let argb = row[x as usize];
                let offset = (line + x as usize) * 4;
                out[offset] = ((argb >> 16) & 0xFF) as u8;
                out[offset + 1] = ((argb >> 8) & 0xFF) as u8;
                out[offset + 2] = (argb & 0xFF) as u8;
                out[offset + 3] = 0xFF;
            }
        }
    }

    /// The whole image as tightly packed RGBA8.
    #[must_use]
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.image.width as usize * self.image.height as usize * 4];
        self.export_rgba(self.image.bounds(), &mut out, self.image.width);
        out
    }
}

fn check_view(image: ImageView, full_width: u32, full_height: u32) -> Result<(), BridgeError> {
    if image.width == 0 || image.height == 0 {
        return Err(BridgeError::ZeroSize {
            width: image.width,
            height: image.height,
        });
    }
    if !image.fits(full_width, full_height) {
        return Err(BridgeError::ImageOutOfBounds {
            x: image.x_offset,
            y: image.y_offset,
            width: image.width,
            height: image.height,
            full_width,
            full_height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(w: u32, h: u32) -> TextureSurface {
        TextureSurface::new(w, h, 16).expect("valid surface")
    }

    #[test]
    fn pitch_is_aligned() {
        let s = surface(321, 10);
        assert_eq!(s.pitch(), 328);
        assert_eq!(s.pixels().len(), 328 * 10);
        assert_eq!(surface(320, 10).pitch(), 320);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert_eq!(
            TextureSurface::new(0, 10, 16).unwrap_err(),
            BridgeError::ZeroSize {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn view_must_fit() {
        let view = ImageView {
            x_offset: 16,
            y_offset: 0,
            width: 320,
            height: 256,
        };
        assert!(matches!(
            TextureSurface::with_image(320, 256, view, 16),
            Err(BridgeError::ImageOutOfBounds { .. })
        ));

        let mut s = surface(320, 256);
        assert!(s.set_image(view).is_err());
        // Failed updates leave the old view in place.
        assert_eq!(s.image(), ImageView::at_origin(320, 256));
    }

    #[test]
    fn offsets_translate_into_the_full_buffer() {
        let view = ImageView {
            x_offset: 4,
            y_offset: 2,
            width: 8,
            height: 8,
        };
        let mut s = TextureSurface::with_image(16, 16, view, 16).expect("valid");
        s.set_pixel(0, 0, 0xFF12_3456);
        assert_eq!(s.pixel(0, 0), Some(0xFF12_3456));
        assert_eq!(s.pixels()[2 * 16 + 4], 0xFF12_3456);

        // Outside the image is neither readable nor writable.
        s.set_pixel(8, 0, 1);
        assert_eq!(s.pixel(8, 0), None);
        assert_eq!(s.pixels()[2 * 16 + 12], 0);
    }

    #[test]
    fn reshape_letterboxes_within_allocation() {
        let mut s = surface(320, 256);
        s.reshape(256, 192).expect("fits");
        assert_eq!(
            s.image(),
            ImageView {
                x_offset: 32,
                y_offset: 32,
                width: 256,
                height: 192
            }
        );
        assert_eq!(s.full_width(), 320);
        assert_eq!(s.dirty().rects(), &[Rect::new(0, 0, 256, 192)]);
    }

    #[test]
    fn reshape_grows_allocation() {
        let mut s = surface(320, 256);
        s.reshape(640, 256).expect("grows");
        assert_eq!(s.full_width(), 640);
        assert_eq!(s.image(), ImageView::at_origin(640, 256));
        assert!(s.pixels().len() >= 640 * 256);
        assert!(s.image().fits(s.full_width(), s.full_height()));
    }

    #[test]
    fn copy_rect_copies_only_the_rect() {
        let mut src = surface(32, 32);
        src.fill(0xFFAA_AAAA);
        let mut dst = surface(32, 32);

        let copied = dst.copy_rect_from(&src, Rect::new(8, 8, 4, 2));
        assert_eq!(copied, Some(Rect::new(8, 8, 4, 2)));
        assert_eq!(dst.pixel(8, 8), Some(0xFFAA_AAAA));
        assert_eq!(dst.pixel(11, 9), Some(0xFFAA_AAAA));
        assert_eq!(dst.pixel(12, 9), Some(0));
        assert_eq!(dst.pixel(8, 10), Some(0));
    }

    #[test]
    fn copy_rect_clips_to_smaller_surface() {
        let mut src = surface(64, 64);
        src.fill(0xFF00_00FF);
        let mut dst = surface(16, 16);
        let copied = dst.copy_rect_from(&src, Rect::new(8, 8, 32, 32));
        assert_eq!(copied, Some(Rect::new(8, 8, 8, 8)));
        assert_eq!(dst.pixel(15, 15), Some(0xFF00_00FF));
    }

    #[test]
    fn export_rgba_converts_channels() {
        let mut s = surface(4, 2);
        s.set_pixel(1, 1, 0xFF11_2233);
        let rgba = s.to_rgba();
        assert_eq!(rgba.len(), 4 * 2 * 4);
        let offset = (4 + 1) * 4;
        assert_eq!(&rgba[offset..offset + 4], &[0x11, 0x22, 0x33, 0xFF]);
    }

    #[test]
    fn export_rgba_skips_outside_frame() {
        let mut s = surface(8, 8);
        s.fill(0xFFFF_FFFF);
        let mut frame = vec![0u8; 4 * 4 * 4];
        s.export_rgba(Rect::new(2, 2, 6, 6), &mut frame, 4);
        assert_eq!(frame[0], 0);
        assert_eq!(&frame[(2 * 4 + 2) * 4..(2 * 4 + 2) * 4 + 4], &[0xFF; 4]);
    }

    #[test]
    fn fill_marks_everything() {
        let mut s = surface(16, 8);
        s.fill(1);
        assert_eq!(s.take_dirty(), vec![Rect::new(0, 0, 16, 8)]);
        assert!(!s.dirty().is_dirty());
    }
}
