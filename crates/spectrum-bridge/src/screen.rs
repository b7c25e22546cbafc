//! The UI-visible copy of the screen.
//!
//! The emulation thread draws into its own live [`TextureSurface`]; at the end
//! of each frame [`ScreenSync::publish`] copies the dirty rectangles across
//! into the surface held here. The write lock covers one rectangle copy at a
//! time and readers never hold it across a whole frame, so neither side can
//! stall the other for long.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;
use parking_lot::RwLock;

use crate::dirty::Rect;
use crate::error::BridgeError;
use crate::surface::TextureSurface;

/// Lock-guarded UI surface plus a published-frame counter.
#[derive(Debug)]
pub struct ScreenSync {
    surface: RwLock<TextureSurface>,
    generation: AtomicU64,
    dirty_capacity: usize,
}

impl ScreenSync {
    pub fn new(width: u32, height: u32, dirty_capacity: usize) -> Result<Self, BridgeError> {
        Ok(Self {
            surface: RwLock::new(TextureSurface::new(width, height, dirty_capacity)?),
            generation: AtomicU64::new(0),
            dirty_capacity,
        })
    }

    /// Replace the UI surface with a blank one of the given image size.
    pub fn reinit(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        let surface = TextureSurface::new(width, height, self.dirty_capacity)?;
        *self.surface.write() = surface;
        info!("UI surface reallocated at {width}x{height}");
        Ok(())
    }

    /// Move the live surface's dirty rectangles into the UI surface.
    ///
    /// Each rectangle is copied under its own write lock. Returns the
    /// rectangles copied; the live dirty table is empty afterwards. The
    /// generation only advances when something was copied.
    pub fn publish(&self, live: &mut TextureSurface) -> Vec<Rect> {
        let rects = live.take_dirty();
        if rects.is_empty() {
            return rects;
        }
        for &rect in &rects {
            let mut ui = self.surface.write();
            if let Some(copied) = ui.copy_rect_from(live, rect) {
                ui.mark_dirty(copied);
            }
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        rects
    }

    /// Run `f` against the UI surface under the read lock.
    pub fn consume<R>(&self, f: impl FnOnce(&TextureSurface) -> R) -> R {
        f(&self.surface.read())
    }

    /// Take and clear the UI surface's own dirty table.
    pub fn take_dirty(&self) -> Vec<Rect> {
        self.surface.write().take_dirty()
    }

    /// Number of frames published so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current UI image size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        let surface = self.surface.read();
        (surface.width(), surface.height())
    }

    /// Copy one rectangle of the UI surface into an RGBA8 frame.
    pub fn export_rgba(&self, rect: Rect, out: &mut [u8], out_width: u32) {
        self.surface.read().export_rgba(rect, out, out_width);
    }

    /// The whole UI image as RGBA8, e.g. for a screenshot.
    #[must_use]
    pub fn snapshot_rgba(&self) -> (u32, u32, Vec<u8>) {
        let surface = self.surface.read();
        (surface.width(), surface.height(), surface.to_rgba())
    }
}
