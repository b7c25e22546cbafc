//! Display dispatch: the eight callbacks the emulator core draws through.
//!
//! Each slot holds at most one closure. Registering replaces whatever was
//! there, `None` empties the slot, and calling an empty slot does nothing
//! (`init` and `hotswap_graphics_mode` report success). The core never learns
//! who, if anyone, is listening.
//!
//! Coordinates are in core pixels. Colours are palette indices 0-15.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::renderer::SurfaceRenderer;

type InitFn = Box<dyn FnMut(u32, u32) -> bool + Send>;
type HotswapFn = Box<dyn FnMut() -> bool + Send>;
type PutPixelFn = Box<dyn FnMut(u32, u32, u8) + Send>;
type Plot8Fn = Box<dyn FnMut(u32, u32, u8, u8, u8) + Send>;
type Plot16Fn = Box<dyn FnMut(u32, u32, u16, u8, u8) + Send>;
type AreaFn = Box<dyn FnMut(u32, u32, u32, u32) + Send>;
type NotifyFn = Box<dyn FnMut() + Send>;

/// Registrable display callback slots.
#[derive(Default)]
pub struct DisplayDispatcher {
    init: Option<InitFn>,
    hotswap: Option<HotswapFn>,
    put_pixel: Option<PutPixelFn>,
    plot8: Option<Plot8Fn>,
    plot16: Option<Plot16Fn>,
    area: Option<AreaFn>,
    frame_end: Option<NotifyFn>,
    end: Option<NotifyFn>,
}

impl DisplayDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with every slot routed to `renderer`.
    #[must_use]
    pub fn for_renderer(renderer: Arc<Mutex<SurfaceRenderer>>) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.bind(&renderer);
        dispatcher
    }

    // ===== Registration =====

    pub fn set_init<F>(&mut self, f: Option<F>)
    where
        F: FnMut(u32, u32) -> bool + Send + 'static,
    {
        self.init = f.map(|f| Box::new(f) as InitFn);
    }

    pub fn set_hotswap_graphics_mode<F>(&mut self, f: Option<F>)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.hotswap = f.map(|f| Box::new(f) as HotswapFn);
    }

    pub fn set_put_pixel<F>(&mut self, f: Option<F>)
    where
        F: FnMut(u32, u32, u8) + Send + 'static,
    {
        self.put_pixel = f.map(|f| Box::new(f) as PutPixelFn);
    }

    pub fn set_plot8<F>(&mut self, f: Option<F>)
    where
        F: FnMut(u32, u32, u8, u8, u8) + Send + 'static,
    {
        self.plot8 = f.map(|f| Box::new(f) as Plot8Fn);
    }

    pub fn set_plot16<F>(&mut self, f: Option<F>)
    where
        F: FnMut(u32, u32, u16, u8, u8) + Send + 'static,
    {
        self.plot16 = f.map(|f| Box::new(f) as Plot16Fn);
    }

    pub fn set_area<F>(&mut self, f: Option<F>)
    where
        F: FnMut(u32, u32, u32, u32) + Send + 'static,
    {
        self.area = f.map(|f| Box::new(f) as AreaFn);
    }

    pub fn set_frame_end<F>(&mut self, f: Option<F>)
    where
        F: FnMut() + Send + 'static,
    {
        self.frame_end = f.map(|f| Box::new(f) as NotifyFn);
    }

    pub fn set_end<F>(&mut self, f: Option<F>)
    where
        F: FnMut() + Send + 'static,
    {
        self.end = f.map(|f| Box::new(f) as NotifyFn);
    }

    /// Route all eight slots to one shared renderer.
    ///
    /// Only the emulation thread calls through the dispatcher, so the mutex
    /// is never contended.
    pub fn bind(&mut self, renderer: &Arc<Mutex<SurfaceRenderer>>) {
        let r = Arc::clone(renderer);
        self.set_init(Some(move |w, h| r.lock().init(w, h)));
        let r = Arc::clone(renderer);
        self.set_hotswap_graphics_mode(Some(move || r.lock().hotswap_graphics_mode()));
        let r = Arc::clone(renderer);
        self.set_put_pixel(Some(move |x, y, c| r.lock().put_pixel(x, y, c)));
        let r = Arc::clone(renderer);
        self.set_plot8(Some(move |x, y, d, i, p| r.lock().plot8(x, y, d, i, p)));
        let r = Arc::clone(renderer);
        self.set_plot16(Some(move |x, y, d, i, p| r.lock().plot16(x, y, d, i, p)));
        let r = Arc::clone(renderer);
        self.set_area(Some(move |x, y, w, h| r.lock().area(x, y, w, h)));
        let r = Arc::clone(renderer);
        self.set_frame_end(Some(move || r.lock().frame_end()));
        let r = Arc::clone(renderer);
        self.set_end(Some(move || r.lock().end()));
    }

    /// True if any slot is registered.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.init.is_some()
            || self.hotswap.is_some()
            || self.put_pixel.is_some()
            || self.plot8.is_some()
            || self.plot16.is_some()
            || self.area.is_some()
            || self.frame_end.is_some()
            || self.end.is_some()
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ===== Dispatch =====

    /// Ask the consumer to (re)allocate for a `width` x `height` image.
    pub fn init(&mut self, width: u32, height: u32) -> bool {
        self.init.as_mut().is_none_or(|f| f(width, height))
    }

    pub fn hotswap_graphics_mode(&mut self) -> bool {
        self.hotswap.as_mut().is_none_or(|f| f())
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, colour: u8) {
        if let Some(f) = self.put_pixel.as_mut() {
            f(x, y, colour);
        }
    }

    /// Bit `i` of `data` selects ink (1) or paper (0) for pixel `x + i`.
    #[inline]
    pub fn plot8(&mut self, x: u32, y: u32, data: u8, ink: u8, paper: u8) {
        if let Some(f) = self.plot8.as_mut() {
            f(x, y, data, ink, paper);
        }
    }

    #[inline]
    pub fn plot16(&mut self, x: u32, y: u32, data: u16, ink: u8, paper: u8) {
        if let Some(f) = self.plot16.as_mut() {
            f(x, y, data, ink, paper);
        }
    }

    pub fn area(&mut self, x: u32, y: u32, width: u32, height: u32) {
        if let Some(f) = self.area.as_mut() {
            f(x, y, width, height);
        }
    }

    pub fn frame_end(&mut self) {
        if let Some(f) = self.frame_end.as_mut() {
            f();
        }
    }

    pub fn end(&mut self) {
        if let Some(f) = self.end.as_mut() {
            f();
        }
    }
}
