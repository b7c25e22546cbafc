//! The standard display consumer.
//!
//! [`SurfaceRenderer`] turns the core's drawing calls into palette-coloured
//! pixels on a live [`TextureSurface`], tracks what changed, and at the end of
//! each frame hands the changes to [`ScreenSync`] for the UI thread.

use std::sync::Arc;

use crossbeam_channel::Sender;
use log::{debug, info, trace, warn};

use crate::config::{BridgeConfig, RenderScale};
use crate::dirty::Rect;
use crate::event::DisplayEvent;
use crate::palette::{Palette, PaletteKind};
use crate::screen::ScreenSync;
use crate::surface::TextureSurface;

/// Draws the emulated display into a live surface owned by the emulation thread.
pub struct SurfaceRenderer {
    config: BridgeConfig,
    palette: Palette,
    scale: RenderScale,
    pending_palette: Option<PaletteKind>,
    pending_scale: Option<RenderScale>,
    /// Size the core asked for, before scaling.
    logical: (u32, u32),
    live: Option<TextureSurface>,
    screen: Arc<ScreenSync>,
    events: Option<Sender<DisplayEvent>>,
}

impl SurfaceRenderer {
    #[must_use]
    pub fn new(config: BridgeConfig, screen: Arc<ScreenSync>) -> Self {
        Self {
            config,
            palette: Palette::for_kind(config.palette),
            scale: config.scale,
            pending_palette: None,
            pending_scale: None,
            logical: (0, 0),
            live: None,
            screen,
            events: None,
        }
    }

    /// Queue lifecycle events on `events`. `None` stops queueing.
    pub fn set_events(&mut self, events: Option<Sender<DisplayEvent>>) {
        self.events = events;
    }

    /// Stage a palette change for the next `init` or `hotswap_graphics_mode`.
    pub fn request_palette(&mut self, kind: PaletteKind) {
        self.pending_palette = Some(kind);
    }

    /// Stage a scale change for the next `init` or `hotswap_graphics_mode`.
    pub fn request_scale(&mut self, scale: RenderScale) {
        self.pending_scale = Some(scale);
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub fn scale(&self) -> RenderScale {
        self.scale
    }

    #[must_use]
    pub fn live(&self) -> Option<&TextureSurface> {
        self.live.as_ref()
    }

    #[must_use]
    pub fn screen(&self) -> &Arc<ScreenSync> {
        &self.screen
    }

    fn apply_pending(&mut self) {
        if let Some(kind) = self.pending_palette.take() {
            debug!("palette switched to {kind:?}");
            self.palette = Palette::for_kind(kind);
        }
        if let Some(scale) = self.pending_scale.take() {
            debug!("render scale switched to {scale:?}");
            self.scale = scale;
        }
    }

    fn discard_pending(&mut self) {
        self.pending_palette = None;
        self.pending_scale = None;
    }

    // Output size for the logical size at the current scale, if acceptable.
    fn output_size(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        self.output_size_at(self.scale, width, height)
    }

    fn output_size_at(&self, scale: RenderScale, width: u32, height: u32) -> Option<(u32, u32)> {
        let factor = scale.factor();
        let size = width.checked_mul(factor).zip(height.checked_mul(factor));
        match size {
            Some((w, h))
                if w > 0 && h > 0 && w <= self.config.max_width && h <= self.config.max_height =>
            {
                Some((w, h))
            }
            _ => {
                warn!(
                    "rejecting display size {width}x{height} at {}x (limit {}x{})",
                    factor, self.config.max_width, self.config.max_height
                );
                None
            }
        }
    }

    /// (Re)allocate the display for a `width` x `height` core image.
    pub fn init(&mut self, width: u32, height: u32) -> bool {
        self.apply_pending();
        let Some((out_width, out_height)) = self.output_size(width, height) else {
            return false;
        };

        let mut live = match TextureSurface::new(out_width, out_height, self.config.dirty_capacity) {
            Ok(surface) => surface,
            Err(err) => {
                warn!("display init failed: {err}");
                return false;
            }
        };
        if let Err(err) = self.screen.reinit(out_width, out_height) {
            warn!("display init failed: {err}");
            return false;
        }
        live.dirty_mut().mark_all();

        self.live = Some(live);
        self.logical = (width, height);
        info!("display initialised at {width}x{height} ({out_width}x{out_height} output)");
        self.send(DisplayEvent::Resized {
            width: out_width,
            height: out_height,
        });
        true
    }

    /// Apply staged palette and scale changes to the running display.
    ///
    /// Nothing is repainted; the whole image is marked dirty so the next
    /// frame republishes it. A refused scale drops both staged changes and
    /// leaves palette and scale as they were.
    pub fn hotswap_graphics_mode(&mut self) -> bool {
        if self.live.is_none() {
            self.apply_pending();
            return true;
        }

        let scale = self.pending_scale.unwrap_or(self.scale);
        if scale != self.scale {
            let (width, height) = self.logical;
            let Some((out_width, out_height)) = self.output_size_at(scale, width, height) else {
                self.discard_pending();
                return false;
            };
            let Some(live) = self.live.as_mut() else {
                return true;
            };
            if let Err(err) = live.reshape(out_width, out_height) {
                warn!("graphics mode switch failed: {err}");
                self.discard_pending();
                return false;
            }
            if let Err(err) = self.screen.reinit(out_width, out_height) {
                // The live surface is already reshaped; keep the scale in step with it.
                warn!("graphics mode switch failed: {err}");
                self.apply_pending();
                return false;
            }
            self.send(DisplayEvent::Resized {
                width: out_width,
                height: out_height,
            });
        }
        self.apply_pending();

        if let Some(live) = self.live.as_mut() {
            live.dirty_mut().mark_all();
        }
        true
    }

    /// Set one core pixel.
    pub fn put_pixel(&mut self, x: u32, y: u32, colour: u8) {
        let factor = self.scale.factor();
        let argb = self.palette.argb(colour);
        let Some(live) = self.live.as_mut() else {
            return;
        };
        let (ox, oy) = (x.saturating_mul(factor), y.saturating_mul(factor));
        for dy in 0..factor {
            for dx in 0..factor {
                live.set_pixel(ox.saturating_add(dx), oy.saturating_add(dy), argb);
            }
        }
        live.mark_dirty(Rect::new(ox, oy, factor, factor));
    }

    /// Eight pixels from a bitmap byte: bit `i` picks ink (1) or paper (0)
    /// for pixel `x + i`.
    pub fn plot8(&mut self, x: u32, y: u32, data: u8, ink: u8, paper: u8) {
        self.plot_bits(x, y, u16::from(data), 8, ink, paper);
    }

    /// Sixteen pixels from a bitmap word, same bit order as [`Self::plot8`].
    pub fn plot16(&mut self, x: u32, y: u32, data: u16, ink: u8, paper: u8) {
        self.plot_bits(x, y, data, 16, ink, paper);
    }

    fn plot_bits(&mut self, x: u32, y: u32, data: u16, count: u32, ink: u8, paper: u8) {
        let factor = self.scale.factor();
        let ink = self.palette.argb(ink);
        let paper = self.palette.argb(paper);
        let Some(live) = self.live.as_mut() else {
            return;
        };

        let (ox, oy) = (x.saturating_mul(factor), y.saturating_mul(factor));
        for dy in 0..factor {
            let Some(row) = live.row_mut(oy.saturating_add(dy)) else {
                break;
            };
            for i in 0..count {
                let argb = if (data >> i) & 1 != 0 { ink } else { paper };
                let px = ox.saturating_add(i * factor) as usize;
                for dx in 0..factor as usize {
                    if let Some(pixel) = row.get_mut(px + dx) {
                        *pixel = argb;
                    }
                }
            }
        }
        live.mark_dirty(Rect::new(ox, oy, count * factor, factor));
    }

    /// Mark a core-coordinate area for redraw.
    pub fn area(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let factor = self.scale.factor();
        if let Some(live) = self.live.as_mut() {
            live.mark_dirty(Rect::new(
                x.saturating_mul(factor),
                y.saturating_mul(factor),
                width.saturating_mul(factor),
                height.saturating_mul(factor),
            ));
        }
    }

    /// Publish this frame's changes to the UI surface.
    pub fn frame_end(&mut self) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if !live.dirty().is_dirty() {
            return;
        }
        let dirty = self.screen.publish(live);
        let generation = self.screen.generation();
        trace!("frame {generation}: {} dirty rects", dirty.len());
        self.send(DisplayEvent::FrameReady { generation, dirty });
    }

    /// Release the live surface.
    pub fn end(&mut self) {
        if self.live.take().is_some() {
            debug!("display closed");
        }
        self.send(DisplayEvent::Closed);
    }

    fn send(&self, event: DisplayEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            trace!("display event receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::display_channel;

    fn renderer() -> SurfaceRenderer {
        let screen = Arc::new(ScreenSync::new(8, 8, 16).expect("valid"));
        SurfaceRenderer::new(BridgeConfig::default(), screen)
    }

    fn live_pixel(r: &SurfaceRenderer, x: u32, y: u32) -> Option<u32> {
        r.live().and_then(|s| s.pixel(x, y))
    }

    // ===== Lifecycle =====

    #[test]
    fn drawing_before_init_is_ignored() {
        let mut r = renderer();
        r.put_pixel(0, 0, 7);
        r.plot8(0, 0, 0xFF, 7, 0);
        r.area(0, 0, 8, 8);
        r.frame_end();
        assert!(r.live().is_none());
        assert_eq!(r.screen().generation(), 0);
    }

    #[test]
    fn init_allocates_both_surfaces_and_reports() {
        let (tx, rx) = display_channel();
        let mut r = renderer();
        r.set_events(Some(tx));
        assert!(r.init(320, 256));
        assert_eq!(r.screen().size(), (320, 256));
        assert_eq!(r.live().map(TextureSurface::width), Some(320));
        assert_eq!(
            rx.try_recv(),
            Ok(DisplayEvent::Resized {
                width: 320,
                height: 256
            })
        );
    }

    #[test]
    fn init_rejects_bad_sizes() {
        let mut r = renderer();
        assert!(!r.init(0, 192));
        assert!(!r.init(641, 192));
        assert!(r.live().is_none());

        r.request_scale(RenderScale::Double);
        assert!(!r.init(352, 296));
        assert!(r.init(320, 256));
        assert_eq!(r.live().map(TextureSurface::width), Some(640));
    }

    #[test]
    fn end_releases_and_reports() {
        let (tx, rx) = display_channel();
        let mut r = renderer();
        r.set_events(Some(tx));
        r.init(16, 16);
        r.end();
        assert!(r.live().is_none());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&DisplayEvent::Closed));
    }

    // ===== Drawing =====

    #[test]
    fn plot8_bit_order_and_colours() {
        let mut r = renderer();
        r.init(16, 1);
        r.plot8(0, 0, 0b0000_0101, 2, 1);
        let ink = Palette::colour().argb(2);
        let paper = Palette::colour().argb(1);
        assert_eq!(live_pixel(&r, 0, 0), Some(ink));
        assert_eq!(live_pixel(&r, 1, 0), Some(paper));
        assert_eq!(live_pixel(&r, 2, 0), Some(ink));
        assert_eq!(live_pixel(&r, 7, 0), Some(paper));
        assert_eq!(live_pixel(&r, 8, 0), Some(0));
    }

    #[test]
    fn plot16_covers_sixteen_pixels() {
        let mut r = renderer();
        r.init(32, 1);
        r.plot16(4, 0, 0x8001, 15, 0);
        let white = Palette::colour().argb(15);
        let black = Palette::colour().argb(0);
        assert_eq!(live_pixel(&r, 4, 0), Some(white));
        assert_eq!(live_pixel(&r, 5, 0), Some(black));
        assert_eq!(live_pixel(&r, 19, 0), Some(white));
        assert_eq!(live_pixel(&r, 20, 0), Some(0));
    }

    #[test]
    fn double_scale_writes_blocks() {
        let mut r = renderer();
        r.request_scale(RenderScale::Double);
        r.init(8, 2);
        if let Some(live) = r.live.as_mut() {
            live.take_dirty();
        }
        r.plot8(0, 1, 0x01, 7, 0);
        let ink = Palette::colour().argb(7);
        for (x, y) in [(0, 2), (1, 2), (0, 3), (1, 3)] {
            assert_eq!(live_pixel(&r, x, y), Some(ink));
        }
        assert_eq!(live_pixel(&r, 2, 2), Some(Palette::colour().argb(0)));
        assert_eq!(
            r.live().map(|s| s.dirty().rects().to_vec()),
            Some(vec![Rect::new(0, 2, 16, 2)])
        );
    }

    #[test]
    fn colour_indices_are_masked() {
        let mut r = renderer();
        r.init(4, 4);
        r.put_pixel(1, 1, 0x12);
        assert_eq!(live_pixel(&r, 1, 1), Some(Palette::colour().argb(2)));
    }

    #[test]
    fn clipped_writes_do_not_panic() {
        let mut r = renderer();
        r.init(12, 4);
        r.plot16(8, 3, 0xFFFF, 7, 0);
        r.plot8(100, 100, 0xFF, 7, 0);
        r.put_pixel(u32::MAX, u32::MAX, 7);
        assert_eq!(live_pixel(&r, 11, 3), Some(Palette::colour().argb(7)));
    }

    // ===== Frames =====

    #[test]
    fn frame_end_publishes_and_notifies_once() {
        let (tx, rx) = display_channel();
        let mut r = renderer();
        r.set_events(Some(tx));
        r.init(32, 8);
        let _ = rx.try_recv();

        r.frame_end();
        r.plot8(8, 2, 0xFF, 4, 0);
        r.frame_end();
        r.frame_end();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            DisplayEvent::FrameReady {
                generation: 2,
                dirty: vec![Rect::new(8, 2, 8, 1)]
            }
        );
        r.screen()
            .consume(|ui| assert_eq!(ui.pixel(8, 2), Some(Palette::colour().argb(4))));
    }

    #[test]
    fn hotswap_applies_palette_and_marks_all() {
        let mut r = renderer();
        r.init(16, 8);
        r.frame_end();
        r.request_palette(PaletteKind::Monochrome);
        assert!(r.hotswap_graphics_mode());
        assert_eq!(*r.palette(), Palette::monochrome());
        assert_eq!(
            r.live().map(|s| s.dirty().rects().to_vec()),
            Some(vec![Rect::new(0, 0, 16, 8)])
        );
    }

    #[test]
    fn hotswap_rescales_in_place() {
        let (tx, rx) = display_channel();
        let mut r = renderer();
        r.set_events(Some(tx));
        r.init(256, 192);
        r.request_scale(RenderScale::Double);
        assert!(r.hotswap_graphics_mode());
        assert_eq!(r.screen().size(), (512, 384));
        assert_eq!(
            rx.try_iter().last(),
            Some(DisplayEvent::Resized {
                width: 512,
                height: 384
            })
        );

        r.request_scale(RenderScale::Normal);
        assert!(r.hotswap_graphics_mode());
        // Shrinking keeps the larger allocation.
        assert_eq!(r.live().map(TextureSurface::full_width), Some(512));
        assert_eq!(r.live().map(TextureSurface::width), Some(256));
    }

    #[test]
    fn hotswap_rejects_oversize_scale() {
        let mut r = renderer();
        r.init(352, 296);
        r.request_scale(RenderScale::Double);
        assert!(!r.hotswap_graphics_mode());
        assert_eq!(r.scale(), RenderScale::Normal);
    }

    #[test]
    fn refused_hotswap_keeps_palette() {
        let mut r = renderer();
        r.init(352, 296);
        r.request_palette(PaletteKind::Monochrome);
        r.request_scale(RenderScale::Double);
        assert!(!r.hotswap_graphics_mode());
        assert_eq!(*r.palette(), Palette::colour());
        assert_eq!(r.scale(), RenderScale::Normal);

        // Nothing stays staged behind the refusal.
        assert!(r.hotswap_graphics_mode());
        assert_eq!(*r.palette(), Palette::colour());
    }
}
