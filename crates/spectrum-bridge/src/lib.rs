//! Host bridge between a ZX Spectrum emulator core and a platform UI.
//!
//! The core pushes drawing calls through a [`DisplayDispatcher`] at pixel
//! granularity, thousands of times per frame. A [`SurfaceRenderer`] draws
//! them into a live [`TextureSurface`] and tracks dirty rectangles; at the end
//! of each frame [`ScreenSync`] copies only those rectangles into the surface
//! the UI thread reads. Tape position samples go through [`TapeProgress`],
//! which turns noisy per-block counters into a monotonic completion ratio.
//! Joystick init and polling run through a [`JoystickDispatcher`].

mod config;
pub mod dirty;
pub mod display;
mod error;
pub mod event;
pub mod joystick;
mod palette;
pub mod renderer;
pub mod screen;
pub mod surface;
pub mod tape;

pub use config::{BridgeConfig, RenderScale};
pub use dirty::{DEFAULT_DIRTY_CAPACITY, DirtyTracker, Rect};
pub use display::DisplayDispatcher;
pub use error::BridgeError;
pub use event::{DisplayEvent, TapeEvent};
pub use joystick::{JoystickButton, JoystickDispatcher, JoystickState, SharedJoystick};
pub use palette::{Palette, PaletteKind};
pub use renderer::SurfaceRenderer;
pub use screen::ScreenSync;
pub use surface::{ImageView, TextureSurface};
pub use tape::{NOT_STARTED, TapeBlockSample, TapeProgress};
