//! Errors raised while building or reshaping a texture surface.
//!
//! Dispatch-level failures never show up here: a display consumer that
//! cannot honour `init` answers `false`, and missing consumers are no-ops.

use thiserror::Error;

/// Geometry errors for [`TextureSurface`](crate::TextureSurface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// A surface or image with a zero dimension was requested.
    #[error("surface dimensions must be non-zero (got {width}x{height})")]
    ZeroSize { width: u32, height: u32 },

    /// The requested size exceeds the configured maximum.
    #[error("surface {width}x{height} exceeds the {max_width}x{max_height} limit")]
    TooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// The image view would extend past the allocated buffer.
    #[error(
        "image {width}x{height} at ({x}, {y}) does not fit in a {full_width}x{full_height} buffer"
    )]
    ImageOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        full_width: u32,
        full_height: u32,
    },
}
