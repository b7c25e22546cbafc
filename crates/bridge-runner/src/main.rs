//! Runner for the Spectrum host bridge.
//!
//! Replays a SCREEN$ tape load through the bridge into a winit window, or
//! headless for a fixed number of frames with an optional PNG screenshot.

mod app;
mod capture;
mod demo;
mod gamepad;
mod session;

use std::path::PathBuf;
use std::process;

use env_logger::{Builder, Env};
use log::{LevelFilter, info};
use spectrum_bridge::{BridgeConfig, PaletteKind, RenderScale, SharedJoystick};
use winit::event_loop::EventLoop;

use crate::app::App;
use crate::demo::LoadingScreen;
use crate::gamepad::Gamepad;
use crate::session::Session;

const DEFAULT_FRAMES: u32 = 400;
const DEFAULT_BYTES_PER_FRAME: usize = 32;

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    scale: RenderScale,
    mono: bool,
    scr_path: Option<PathBuf>,
    headless: bool,
    frames: u32,
    screenshot_path: Option<PathBuf>,
    bytes_per_frame: usize,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scale: RenderScale::Normal,
        mono: false,
        scr_path: None,
        headless: false,
        frames: DEFAULT_FRAMES,
        screenshot_path: None,
        bytes_per_frame: DEFAULT_BYTES_PER_FRAME,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scale" => {
                i += 1;
                cli.scale = match args.get(i).map(String::as_str) {
                    Some("1") => RenderScale::Normal,
                    Some("2") => RenderScale::Double,
                    other => {
                        eprintln!("--scale takes 1 or 2 (got {})", other.unwrap_or("nothing"));
                        process::exit(1);
                    }
                };
            }
            "--mono" => {
                cli.mono = true;
            }
            "--scr" => {
                i += 1;
                cli.scr_path = args.get(i).map(PathBuf::from);
            }
            "--headless" => {
                cli.headless = true;
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(DEFAULT_FRAMES);
                }
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--bytes-per-frame" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.bytes_per_frame = s.parse().unwrap_or(DEFAULT_BYTES_PER_FRAME);
                }
            }
            "--help" | "-h" => {
                eprintln!("Usage: bridge-runner [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --scale <1|2>            Render scale [default: 1]");
                eprintln!("  --mono                   Black-and-white palette");
                eprintln!("  --scr <file>             6912-byte SCREEN$ dump to load [default: test card]");
                eprintln!("  --headless               Run without a window");
                eprintln!(
                    "  --frames <n>             Number of frames in headless mode [default: {DEFAULT_FRAMES}]"
                );
                eprintln!("  --screenshot <file>      Save a PNG screenshot (headless)");
                eprintln!(
                    "  --bytes-per-frame <n>    Tape bytes loaded per frame [default: {DEFAULT_BYTES_PER_FRAME}]"
                );
                eprintln!();
                eprintln!("Keys: numpad/arrows + Alt or Numpad0 = joystick, R = rewind,");
                eprintln!("      M = mono/colour, S = scale, Esc = quit");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_logger() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.filter_module("naga", LevelFilter::Warn);
    builder.filter_module("wgpu", LevelFilter::Warn);
    builder.filter_module("wgpu_core", LevelFilter::Warn);
    builder.filter_module("wgpu_hal", LevelFilter::Warn);
    builder.init();
}

fn make_core(cli: &CliArgs) -> LoadingScreen {
    let source = match cli.scr_path {
        Some(ref path) => match demo::load_scr(path) {
            Ok(screen) => {
                info!("loaded {}", path.display());
                screen
            }
            Err(e) => {
                eprintln!("Failed to read SCREEN$ file: {e}");
                process::exit(1);
            }
        },
        None => demo::test_card(),
    };
    LoadingScreen::new(source, cli.bytes_per_frame)
}

fn make_config(cli: &CliArgs) -> BridgeConfig {
    BridgeConfig {
        palette: if cli.mono {
            PaletteKind::Monochrome
        } else {
            PaletteKind::Colour
        },
        scale: cli.scale,
        ..BridgeConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Headless mode
// ---------------------------------------------------------------------------

fn run_headless(cli: &CliArgs) {
    let (mut session, link) =
        match Session::new(make_config(cli), make_core(cli), SharedJoystick::new(), false) {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("Failed to set up the bridge: {e}");
                process::exit(1);
            }
        };
    if !session.start() {
        eprintln!("Display refused the requested size");
        process::exit(1);
    }

    let mut last_percent = None;
    for _ in 0..cli.frames {
        session.step();
        for ratio in link.drain_headless() {
            let percent = (ratio * 100.0).round() as u32;
            if percent % 25 == 0 && last_percent != Some(percent) {
                info!("tape block {percent}% loaded");
                last_percent = Some(percent);
            }
        }
    }
    info!(
        "ran {} frames, {} published, screen {}",
        cli.frames,
        link.screen.generation(),
        if session.is_loaded() { "loaded" } else { "still loading" }
    );

    if let Some(ref path) = cli.screenshot_path {
        if let Err(e) = capture::save_screenshot(&link.screen, path) {
            eprintln!("Screenshot error: {e}");
            process::exit(1);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }
    session.finish();
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = parse_args();
    init_logger();

    if cli.headless {
        run_headless(&cli);
        return;
    }

    let gamepad = Gamepad::new();
    let host = SharedJoystick::new();
    let (session, link) =
        match Session::new(make_config(&cli), make_core(&cli), host.clone(), gamepad.is_available()) {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("Failed to set up the bridge: {e}");
                process::exit(1);
            }
        };
    let emulation = session.spawn();

    let title = match cli.scr_path {
        Some(ref path) => format!("ZX Spectrum bridge - {}", path.display()),
        None => "ZX Spectrum bridge".to_string(),
    };
    let mut app = App::new(link, host, gamepad, title);

    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => {
            eprintln!("Failed to create event loop: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = event_loop.run_app(&mut app) {
        eprintln!("Event loop error: {e}");
        process::exit(1);
    }

    drop(app);
    if emulation.join().is_err() {
        eprintln!("Emulation thread panicked");
        process::exit(1);
    }
}
