//! Bridge configuration.

use crate::dirty::DEFAULT_DIRTY_CAPACITY;
use crate::palette::PaletteKind;

/// Horizontal and vertical pixel multiplier applied by the renderer.
///
/// `Double` is used for the Timex hi-res and 512-pixel modes, where the core
/// addresses a grid twice as fine as the standard 256-pixel screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderScale {
    #[default]
    Normal,
    Double,
}

impl RenderScale {
    #[must_use]
    pub const fn factor(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::Double => 2,
        }
    }
}

/// Configuration for a display bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub palette: PaletteKind,
    pub scale: RenderScale,
    /// Largest image `init` accepts, in output pixels.
    pub max_width: u32,
    pub max_height: u32,
    /// Rectangles the dirty table holds before merges are forced.
    pub dirty_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            palette: PaletteKind::Colour,
            scale: RenderScale::Normal,
            max_width: 640,
            max_height: 512,
            dirty_capacity: DEFAULT_DIRTY_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.palette, PaletteKind::Colour);
        assert_eq!(config.scale.factor(), 1);
        assert_eq!((config.max_width, config.max_height), (640, 512));
        assert_eq!(config.dirty_capacity, DEFAULT_DIRTY_CAPACITY);
    }

    #[test]
    fn scale_factors() {
        assert_eq!(RenderScale::Normal.factor(), 1);
        assert_eq!(RenderScale::Double.factor(), 2);
    }
}
