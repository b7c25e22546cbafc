//! ZX Spectrum 16-colour palette.
//!
//! The ULA drives 3-bit RGB plus a BRIGHT modifier, so there are 15 distinct
//! colours (black appears twice). Normal colours use a 0xBD intensity level
//! and bright colours full 0xFF. A greyscale variant is derived from the
//! colour table by luminance for black-and-white TV output.

/// Which palette the renderer draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteKind {
    #[default]
    Colour,
    Monochrome,
}

/// ARGB32 palette: 16 entries indexed by `bright << 3 | colour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colours: [u32; 16],
}

const COLOUR: [u32; 16] = [
    // Normal (bright = 0)
    0xFF00_0000, // 0: Black
    0xFF00_00BD, // 1: Blue
    0xFFBD_0000, // 2: Red
    0xFFBD_00BD, // 3: Magenta
    0xFF00_BD00, // 4: Green
    0xFF00_BDBD, // 5: Cyan
    0xFFBD_BD00, // 6: Yellow
    0xFFBD_BDBD, // 7: White
    // Bright (bright = 1)
    0xFF00_0000, // 8: Black (same as normal)
    0xFF00_00FF, // 9: Bright Blue
    0xFFFF_0000, // 10: Bright Red
    0xFFFF_00FF, // 11: Bright Magenta
    0xFF00_FF00, // 12: Bright Green
    0xFF00_FFFF, // 13: Bright Cyan
    0xFFFF_FF00, // 14: Bright Yellow
    0xFFFF_FFFF, // 15: Bright White
];

impl Palette {
    #[must_use]
    pub const fn colour() -> Self {
        Self { colours: COLOUR }
    }

    /// Greyscale palette using ITU-R 601 luma weights.
    #[must_use]
    pub fn monochrome() -> Self {
        let mut colours = [0u32; 16];
        for (out, &argb) in colours.iter_mut().zip(COLOUR.iter()) {
            let r = f32::from(((argb >> 16) & 0xFF) as u8);
            let g = f32::from(((argb >> 8) & 0xFF) as u8);
            let b = f32::from((argb & 0xFF) as u8);
            let grey = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u32;
            *out = 0xFF00_0000 | (grey << 16) | (grey << 8) | grey;
        }
        Self { colours }
    }

    #[must_use]
    pub fn for_kind(kind: PaletteKind) -> Self {
        match kind {
            PaletteKind::Colour => Self::colour(),
            PaletteKind::Monochrome => Self::monochrome(),
        }
    }

    /// ARGB32 value for a palette index. Only the low four bits are used.
    #[must_use]
    pub const fn argb(&self, index: u8) -> u32 {
        self.colours[(index & 0x0F) as usize]
    }

    #[must_use]
    pub const fn entries(&self) -> &[u32; 16] {
        &self.colours
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::colour()
    }
}
