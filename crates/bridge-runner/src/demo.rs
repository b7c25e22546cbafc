//! A stand-in emulator core: replays a SCREEN$ tape load.
//!
//! It drives the bridge exactly the way a real core does. Bitmap and
//! attribute bytes arrive a few per frame in tape order and are drawn with
//! `plot8`, the border stripes with `plot16`, and the tape engine reports its
//! position per byte. Once loaded, the joystick moves a cursor drawn with
//! `put_pixel` and FIRE inverts the cell under it.

use std::error::Error;
use std::fs;
use std::path::Path;

use log::{debug, info};
use spectrum_bridge::{
    DisplayDispatcher, JoystickButton, JoystickState, NOT_STARTED, TapeBlockSample, TapeProgress,
};

/// Bitmap plus attributes, as saved by `SAVE "x" SCREEN$`.
pub const SCREEN_BYTES: usize = 6912;
const BITMAP_BYTES: usize = 6144;

const SCREEN_WIDTH: u32 = 256;
const SCREEN_HEIGHT: u32 = 192;
const BORDER: u32 = 32;

/// Display size requested from the bridge.
pub const DISPLAY_WIDTH: u32 = SCREEN_WIDTH + 2 * BORDER;
pub const DISPLAY_HEIGHT: u32 = SCREEN_HEIGHT + 2 * BORDER;

/// Header block: flag, type, 10-char name, length, param1, param2, checksum.
const HEADER_BYTES: usize = 19;
/// Data block: flag, payload, checksum.
const DATA_BYTES: usize = SCREEN_BYTES + 2;

const PILOT_FRAMES: u32 = 40;
const GAP_FRAMES: u32 = 20;
const CURSOR_REPEAT_FRAMES: u32 = 4;

/// Paper white, ink black: the attribute of a freshly cleared screen.
const CLEAR_ATTR: u8 = 0x38;
const IDLE_BORDER: u8 = 7;
const CURSOR_COLOUR: u8 = 10;

/// Offset of the bitmap byte for pixel row `y`, character column `col`.
#[must_use]
pub fn bitmap_address(col: usize, y: usize) -> usize {
    ((y & 0xC0) << 5) | ((y & 0x07) << 8) | ((y & 0x38) << 2) | col
}

/// Offset of the attribute byte for character cell (`col`, `row`).
#[must_use]
pub fn attribute_address(col: usize, row: usize) -> usize {
    BITMAP_BYTES + row * 32 + col
}

/// Inverse of [`bitmap_address`]: (column, pixel row) for a bitmap offset.
#[must_use]
pub fn bitmap_position(offset: usize) -> (usize, usize) {
    let y = ((offset >> 5) & 0xC0) | ((offset >> 8) & 0x07) | ((offset >> 2) & 0x38);
    (offset & 0x1F, y)
}

/// (ink, paper) palette indices for an attribute byte. FLASH is ignored.
#[must_use]
pub fn attribute_colours(attr: u8) -> (u8, u8) {
    let bright = if attr & 0x40 != 0 { 8 } else { 0 };
    (bright | (attr & 0x07), bright | ((attr >> 3) & 0x07))
}

/// Read a raw 6912-byte screen dump.
pub fn load_scr(path: &Path) -> Result<Box<[u8; SCREEN_BYTES]>, Box<dyn Error>> {
    let data = fs::read(path)?;
    let screen: Box<[u8; SCREEN_BYTES]> = data
        .into_boxed_slice()
        .try_into()
        .map_err(|data: Box<[u8]>| {
            format!(
                "{} is {} bytes, a SCREEN$ dump is {SCREEN_BYTES}",
                path.display(),
                data.len()
            )
        })?;
    Ok(screen)
}

/// Built-in test card used when no screen file is given.
#[must_use]
pub fn test_card() -> Box<[u8; SCREEN_BYTES]> {
    let mut screen = Box::new([0u8; SCREEN_BYTES]);
    for y in 0..SCREEN_HEIGHT as usize {
        for col in 0..32 {
            let byte = match (y / 8 + col) % 4 {
                0 => 0xFF,
                1 => if y % 2 == 0 { 0xAA } else { 0x55 },
                2 => 0x18,
                _ => (0x80u8 >> (y % 8)) | (1 << (y % 8)),
            };
            screen[bitmap_address(col, y)] = byte;
        }
    }
    for row in 0..24 {
        for col in 0..32 {
            let paper = (col / 4) as u8;
            let ink = 7 - paper;
            let bright = if row % 2 == 1 { 0x40 } else { 0 };
            screen[attribute_address(col, row)] = bright | (paper << 3) | ink;
        }
    }
    screen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pilot { block: usize, frames: u32 },
    Block { block: usize, pos: usize },
    Gap { frames: u32 },
    Loaded,
}

const fn block_length(block: usize) -> usize {
    if block == 0 { HEADER_BYTES } else { DATA_BYTES }
}

// Position on the tape: header, pause, data.
const fn tape_index(block: usize) -> usize {
    if block == 0 { 0 } else { 2 }
}

/// The demo core.
pub struct LoadingScreen {
    source: Box<[u8; SCREEN_BYTES]>,
    vram: Box<[u8; SCREEN_BYTES]>,
    phase: Phase,
    bytes_per_frame: usize,
    frame: u32,
    cursor: (usize, usize),
    cursor_wait: u32,
    fire_held: bool,
}

impl LoadingScreen {
    #[must_use]
    pub fn new(source: Box<[u8; SCREEN_BYTES]>, bytes_per_frame: usize) -> Self {
        Self {
            source,
            vram: blank_vram(),
            phase: Phase::Pilot {
                block: 0,
                frames: PILOT_FRAMES,
            },
            bytes_per_frame: bytes_per_frame.max(1),
            frame: 0,
            cursor: (0, 0),
            cursor_wait: 0,
            fire_held: false,
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Loaded
    }

    /// Set up the display and draw the cleared screen.
    pub fn start(&mut self, display: &mut DisplayDispatcher) -> bool {
        if !display.init(DISPLAY_WIDTH, DISPLAY_HEIGHT) {
            return false;
        }
        self.repaint(display);
        true
    }

    /// Rewind the tape and clear the screen.
    pub fn restart(&mut self, display: &mut DisplayDispatcher, tape: &mut TapeProgress) {
        info!("tape rewound");
        self.vram = blank_vram();
        self.phase = Phase::Pilot {
            block: 0,
            frames: PILOT_FRAMES,
        };
        self.cursor = (0, 0);
        tape.reset();
        self.repaint(display);
    }

    /// Redraw everything from video memory.
    pub fn repaint(&mut self, display: &mut DisplayDispatcher) {
        self.draw_border(display, IDLE_BORDER, IDLE_BORDER);
        for offset in 0..BITMAP_BYTES {
            self.plot_bitmap_byte(display, offset);
        }
        if self.is_loaded() {
            self.draw_cursor(display);
        }
        display.area(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT);
    }

    /// Advance one 50 Hz frame.
    pub fn run_frame(
        &mut self,
        display: &mut DisplayDispatcher,
        tape: &mut TapeProgress,
        joystick: JoystickState,
    ) {
        self.frame = self.frame.wrapping_add(1);
        match self.phase {
            Phase::Pilot { block, frames } => {
                self.draw_border(display, 2, 5);
                tape.observe(tape_index(block), &rom(block, NOT_STARTED));
                self.phase = if frames > 1 {
                    Phase::Pilot {
                        block,
                        frames: frames - 1,
                    }
                } else {
                    Phase::Block { block, pos: 0 }
                };
            }
            Phase::Block { block, pos } => {
                self.draw_border(display, 1, 6);
                let end = (pos + self.bytes_per_frame).min(block_length(block));
                for byte in pos..end {
                    if block == 1 {
                        self.load_byte(display, byte);
                    }
                    tape.observe(tape_index(block), &rom(block, byte + 1));
                }
                self.phase = if end < block_length(block) {
                    Phase::Block { block, pos: end }
                } else if block == 0 {
                    Phase::Gap { frames: GAP_FRAMES }
                } else {
                    info!("screen loaded");
                    self.draw_border(display, IDLE_BORDER, IDLE_BORDER);
                    self.draw_cursor(display);
                    Phase::Loaded
                };
            }
            Phase::Gap { frames } => {
                if frames == GAP_FRAMES {
                    self.draw_border(display, IDLE_BORDER, IDLE_BORDER);
                }
                tape.observe(1, &TapeBlockSample::Pause);
                self.phase = if frames > 1 {
                    Phase::Gap { frames: frames - 1 }
                } else {
                    Phase::Pilot {
                        block: 1,
                        frames: PILOT_FRAMES,
                    }
                };
            }
            Phase::Loaded => self.handle_joystick(display, joystick),
        }
    }

    // Data block byte `index` (0 is the flag byte).
    fn load_byte(&mut self, display: &mut DisplayDispatcher, index: usize) {
        let Some(offset) = index.checked_sub(1).filter(|&o| o < SCREEN_BYTES) else {
            return;
        };
        self.vram[offset] = self.source[offset];
        if offset < BITMAP_BYTES {
            self.plot_bitmap_byte(display, offset);
        } else {
            let cell = offset - BITMAP_BYTES;
            self.plot_cell(display, cell % 32, cell / 32);
        }
    }

    fn plot_bitmap_byte(&self, display: &mut DisplayDispatcher, offset: usize) {
        let (col, y) = bitmap_position(offset);
        let (ink, paper) = attribute_colours(self.vram[attribute_address(col, y / 8)]);
        // Bit 7 is the leftmost pixel on the Spectrum; plot8 wants bit 0 leftmost.
        display.plot8(
            BORDER + col as u32 * 8,
            BORDER + y as u32,
            self.vram[offset].reverse_bits(),
            ink,
            paper,
        );
    }

    fn plot_cell(&self, display: &mut DisplayDispatcher, col: usize, row: usize) {
        for line in 0..8 {
            self.plot_bitmap_byte(display, bitmap_address(col, row * 8 + line));
        }
    }

    // Horizontal stripes alternating between two colours, scrolling each frame.
    fn draw_border(&self, display: &mut DisplayDispatcher, a: u8, b: u8) {
        for y in 0..DISPLAY_HEIGHT {
            let colour = if (self.frame.wrapping_mul(5).wrapping_add(y) / 6) % 2 == 0 { a } else { b };
            let in_screen = (BORDER..BORDER + SCREEN_HEIGHT).contains(&y);
            let mut x = 0;
            while x < DISPLAY_WIDTH {
                if in_screen && x == BORDER {
                    x += SCREEN_WIDTH;
                    continue;
                }
                display.plot16(x, y, 0, colour, colour);
                x += 16;
            }
        }
    }

    fn draw_cursor(&self, display: &mut DisplayDispatcher) {
        let x0 = BORDER + self.cursor.0 as u32 * 8;
        let y0 = BORDER + self.cursor.1 as u32 * 8;
        for i in 0..8 {
            display.put_pixel(x0 + i, y0, CURSOR_COLOUR);
            display.put_pixel(x0 + i, y0 + 7, CURSOR_COLOUR);
            display.put_pixel(x0, y0 + i, CURSOR_COLOUR);
            display.put_pixel(x0 + 7, y0 + i, CURSOR_COLOUR);
        }
        display.area(x0, y0, 8, 8);
    }

    fn handle_joystick(&mut self, display: &mut DisplayDispatcher, joystick: JoystickState) {
        let fire = joystick.is_pressed(JoystickButton::Fire);
        if fire && !self.fire_held {
            let (col, row) = self.cursor;
            for line in 0..8 {
                let offset = bitmap_address(col, row * 8 + line);
                self.vram[offset] = !self.vram[offset];
            }
            self.plot_cell(display, col, row);
            self.draw_cursor(display);
        }
        self.fire_held = fire;

        if self.cursor_wait > 0 {
            self.cursor_wait -= 1;
            return;
        }
        let (mut col, mut row) = self.cursor;
        if joystick.is_pressed(JoystickButton::Left) {
            col = col.saturating_sub(1);
        }
        if joystick.is_pressed(JoystickButton::Right) {
            col = (col + 1).min(31);
        }
        if joystick.is_pressed(JoystickButton::Up) {
            row = row.saturating_sub(1);
        }
        if joystick.is_pressed(JoystickButton::Down) {
            row = (row + 1).min(23);
        }
        if (col, row) != self.cursor {
            debug!("cursor moved to ({col}, {row})");
            let (old_col, old_row) = self.cursor;
            self.plot_cell(display, old_col, old_row);
            self.cursor = (col, row);
            self.draw_cursor(display);
            self.cursor_wait = CURSOR_REPEAT_FRAMES;
        }
    }
}

fn blank_vram() -> Box<[u8; SCREEN_BYTES]> {
    let mut vram = Box::new([0u8; SCREEN_BYTES]);
    vram[BITMAP_BYTES..].fill(CLEAR_ATTR);
    vram
}

fn rom(block: usize, done: usize) -> TapeBlockSample {
    TapeBlockSample::Rom {
        length: block_length(block),
        bytes_through_block: done,
    }
}
