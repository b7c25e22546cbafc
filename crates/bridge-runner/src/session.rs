//! The emulation side: the demo core wired to the bridge, run on its own
//! thread at 50 Hz or stepped directly in headless mode.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use parking_lot::Mutex;
use spectrum_bridge::event::{display_channel, tape_channel};
use spectrum_bridge::{
    BridgeConfig, BridgeError, DisplayDispatcher, DisplayEvent, JoystickDispatcher, PaletteKind,
    RenderScale, ScreenSync, SharedJoystick, SurfaceRenderer, TapeEvent, TapeProgress,
};

use crate::demo::LoadingScreen;

/// Frame duration for 50 Hz PAL.
pub const FRAME_DURATION: Duration = Duration::from_micros(20_000);

/// Requests from the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Restart,
    TogglePalette,
    ToggleScale,
    Quit,
}

/// What the UI side keeps after the session moves to its thread.
pub struct UiLink {
    pub screen: Arc<ScreenSync>,
    pub display_events: Receiver<DisplayEvent>,
    pub tape_events: Receiver<TapeEvent>,
    pub commands: Sender<Command>,
}

impl UiLink {
    /// Empty both event queues without a window to show them in, returning
    /// the tape progress ratios that were queued.
    pub fn drain_headless(&self) -> Vec<f32> {
        for event in self.display_events.try_iter() {
            if let DisplayEvent::Resized { width, height } = event {
                debug!("display resized to {width}x{height}");
            }
        }
        self.tape_events
            .try_iter()
            .filter_map(|event| match event {
                TapeEvent::Progress(ratio) => Some(ratio),
                TapeEvent::Reset => None,
            })
            .collect()
    }
}

pub struct Session {
    core: LoadingScreen,
    display: DisplayDispatcher,
    joystick: JoystickDispatcher,
    tape: TapeProgress,
    renderer: Arc<Mutex<SurfaceRenderer>>,
    /// Kempston port latch, refreshed by the joystick poll.
    port: SharedJoystick,
    commands: Receiver<Command>,
    palette: PaletteKind,
    scale: RenderScale,
}

impl Session {
    /// Wire `core` to a fresh bridge. `host` is the joystick state the UI writes.
    pub fn new(
        config: BridgeConfig,
        core: LoadingScreen,
        host: SharedJoystick,
        host_available: bool,
    ) -> Result<(Self, UiLink), BridgeError> {
        let screen = Arc::new(ScreenSync::new(1, 1, config.dirty_capacity)?);
        let (display_tx, display_rx) = display_channel();
        let (tape_tx, tape_rx) = tape_channel();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        let mut renderer = SurfaceRenderer::new(config, Arc::clone(&screen));
        renderer.set_events(Some(display_tx));
        let renderer = Arc::new(Mutex::new(renderer));
        let display = DisplayDispatcher::for_renderer(Arc::clone(&renderer));

        let port = SharedJoystick::new();
        let mut joystick = JoystickDispatcher::new();
        joystick.set_init(Some(move || host_available));
        let latch = port.clone();
        joystick.set_poll(Some(move || latch.store(host.load())));

        let mut tape = TapeProgress::new();
        tape.set_queue(Some(tape_tx));

        let session = Self {
            core,
            display,
            joystick,
            tape,
            renderer,
            port,
            commands: command_rx,
            palette: config.palette,
            scale: config.scale,
        };
        let link = UiLink {
            screen,
            display_events: display_rx,
            tape_events: tape_rx,
            commands: command_tx,
        };
        Ok((session, link))
    }

    /// Bring up the display and joystick. False if the display refused.
    pub fn start(&mut self) -> bool {
        if !self.joystick.init() {
            warn!("no host joystick; keyboard only");
        }
        self.core.start(&mut self.display)
    }

    /// Handle pending commands and run one frame. False once asked to quit
    /// or once the UI side has dropped its link.
    pub fn step(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if !self.handle(command) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("UI link dropped");
                    return false;
                }
            }
        }
        self.joystick.poll();
        self.core
            .run_frame(&mut self.display, &mut self.tape, self.port.load());
        self.display.frame_end();
        true
    }

    pub fn is_loaded(&self) -> bool {
        self.core.is_loaded()
    }

    /// Tear down the display.
    pub fn finish(&mut self) {
        self.display.end();
        self.display.clear();
        self.joystick.clear();
    }

    fn handle(&mut self, command: Command) -> bool {
        debug!("command {command:?}");
        match command {
            Command::Restart => self.core.restart(&mut self.display, &mut self.tape),
            Command::TogglePalette => {
                self.palette = match self.palette {
                    PaletteKind::Colour => PaletteKind::Monochrome,
                    PaletteKind::Monochrome => PaletteKind::Colour,
                };
                self.renderer.lock().request_palette(self.palette);
                self.hotswap();
            }
            Command::ToggleScale => {
                self.scale = match self.scale {
                    RenderScale::Normal => RenderScale::Double,
                    RenderScale::Double => RenderScale::Normal,
                };
                self.renderer.lock().request_scale(self.scale);
                self.hotswap();
            }
            Command::Quit => return false,
        }
        true
    }

    fn hotswap(&mut self) {
        if self.display.hotswap_graphics_mode() {
            self.core.repaint(&mut self.display);
        } else {
            warn!("graphics mode change refused");
            self.scale = self.renderer.lock().scale();
        }
    }

    /// Run on a new thread, paced at 50 Hz, until quit or the UI goes away.
    pub fn spawn(mut self) -> JoinHandle<()> {
        thread::spawn(move || {
            if !self.start() {
                warn!("display init refused; emulation thread exiting");
                self.finish();
                return;
            }
            info!("emulation running");
            let mut next = Instant::now();
            while self.step() {
                next += FRAME_DURATION;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    next = now;
                }
            }
            self.finish();
            info!("emulation stopped");
        })
    }
}
