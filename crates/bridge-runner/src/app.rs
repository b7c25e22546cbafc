//! Windowed mode: winit event loop plus a pixels framebuffer fed from the
//! bridge's UI surface.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, error, info, trace};
use pixels::{Pixels, SurfaceTexture};
use spectrum_bridge::{DisplayEvent, Rect, SharedJoystick, TapeEvent};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::demo::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::gamepad::Gamepad;
use crate::session::{Command, FRAME_DURATION, UiLink};

/// Window scale factor.
const SCALE: u32 = 2;

pub struct App {
    link: UiLink,
    joystick: SharedJoystick,
    gamepad: Gamepad,
    keys: HashSet<KeyCode>,
    window: Option<&'static Window>,
    pixels: Option<Pixels<'static>>,
    size: (u32, u32),
    title: String,
    progress: Option<u32>,
}

impl App {
    pub fn new(link: UiLink, joystick: SharedJoystick, gamepad: Gamepad, title: String) -> Self {
        Self {
            link,
            joystick,
            gamepad,
            keys: HashSet::new(),
            window: None,
            pixels: None,
            size: (DISPLAY_WIDTH, DISPLAY_HEIGHT),
            title,
            progress: None,
        }
    }

    fn send(&self, command: Command) {
        if self.link.commands.send(command).is_err() {
            debug!("emulation thread gone; {command:?} dropped");
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, keycode: KeyCode, pressed: bool) {
        if pressed {
            if !self.keys.insert(keycode) {
                return;
            }
            match keycode {
                KeyCode::Escape => {
                    self.send(Command::Quit);
                    event_loop.exit();
                }
                KeyCode::KeyR => self.send(Command::Restart),
                KeyCode::KeyM => self.send(Command::TogglePalette),
                KeyCode::KeyS => self.send(Command::ToggleScale),
                _ => {}
            }
        } else {
            self.keys.remove(&keycode);
        }
    }

    // Copy rectangles of the UI surface into the pixels frame.
    fn copy_rects(&mut self, rects: &[Rect]) {
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        let frame = pixels.frame_mut();
        for &rect in rects {
            self.link.screen.export_rgba(rect, frame, self.size.0);
        }
    }

    fn resize_frame(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        if let Err(e) = pixels.resize_buffer(width, height) {
            error!("failed to resize framebuffer to {width}x{height}: {e}");
            return;
        }
        info!("framebuffer resized to {width}x{height}");
        self.copy_rects(&[Rect::new(0, 0, width, height)]);
    }

    fn update_title(&self) {
        let Some(window) = self.window else {
            return;
        };
        match self.progress {
            Some(percent) if percent < 100 => {
                window.set_title(&format!("{} - loading {percent}%", self.title));
            }
            _ => window.set_title(&self.title),
        }
    }

    /// Drain queued bridge events. Returns true if the picture changed.
    fn drain_events(&mut self, event_loop: &ActiveEventLoop) -> bool {
        let mut changed = false;
        while let Ok(event) = self.link.display_events.try_recv() {
            match event {
                DisplayEvent::Resized { width, height } => {
                    self.resize_frame(width, height);
                    changed = true;
                }
                DisplayEvent::FrameReady { generation, dirty } => {
                    trace!("frame {generation} ready ({} rects)", dirty.len());
                    changed = true;
                }
                DisplayEvent::Closed => {
                    info!("display closed by the core");
                    event_loop.exit();
                }
            }
        }
        if changed {
            let dirty = self.link.screen.take_dirty();
            self.copy_rects(&dirty);
        }

        let mut progress_changed = false;
        while let Ok(event) = self.link.tape_events.try_recv() {
            self.progress = match event {
                TapeEvent::Progress(ratio) => Some((ratio * 100.0).round() as u32),
                TapeEvent::Reset => None,
            };
            progress_changed = true;
        }
        if progress_changed {
            self.update_title();
        }
        changed
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_size = LogicalSize::new(DISPLAY_WIDTH * SCALE, DISPLAY_HEIGHT * SCALE);
        let attrs = WindowAttributes::default()
            .with_title(&self.title)
            .with_inner_size(window_size);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                // The window lives until process exit.
                let window: &'static Window = Box::leak(Box::new(window));
                let inner = window.inner_size();
                let surface = SurfaceTexture::new(inner.width, inner.height, window);
                match Pixels::new(self.size.0, self.size.1, surface) {
                    Ok(pixels) => self.pixels = Some(pixels),
                    Err(e) => {
                        error!("failed to create pixels: {e}");
                        self.send(Command::Quit);
                        event_loop.exit();
                        return;
                    }
                }
                self.window = Some(window);
                let (width, height) = self.size;
                self.copy_rects(&[Rect::new(0, 0, width, height)]);
            }
            Err(e) => {
                error!("failed to create window: {e}");
                self.send(Command::Quit);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.send(Command::Quit);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0
                    && size.height > 0
                    && let Some(pixels) = self.pixels.as_mut()
                    && let Err(e) = pixels.resize_surface(size.width, size.height)
                {
                    error!("failed to resize surface: {e}");
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(keycode) = event.physical_key {
                    self.handle_key(event_loop, keycode, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(pixels) = self.pixels.as_ref()
                    && let Err(e) = pixels.render()
                {
                    error!("render error: {e}");
                    self.send(Command::Quit);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            return;
        }

        self.gamepad.poll();
        self.joystick.store(self.gamepad.state(&self.keys));

        if self.drain_events(event_loop)
            && let Some(window) = self.window
        {
            window.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + FRAME_DURATION / 2));
    }
}
