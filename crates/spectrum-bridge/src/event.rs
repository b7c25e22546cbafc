//! Lifecycle messages queued from the emulation thread to the UI thread.
//!
//! Pixel traffic never goes through here. Only the infrequent events (size
//! changes, finished frames, teardown, tape progress) are queued, so the UI can
//! drain them at its own pace.

use crossbeam_channel::{Receiver, Sender};

use crate::dirty::Rect;

/// Display lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// The display was (re)initialised at a new image size.
    Resized { width: u32, height: u32 },
    /// A frame was published. `dirty` lists the rectangles copied into the
    /// UI surface, in image coordinates.
    FrameReady { generation: u64, dirty: Vec<Rect> },
    /// The display was torn down.
    Closed,
}

/// Tape loading notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapeEvent {
    /// Completion ratio of the current block, 0.0 to 1.0.
    Progress(f32),
    /// Progress state was reset (new block, rewind or new tape).
    Reset,
}

/// Unbounded channel for display events.
#[must_use]
pub fn display_channel() -> (Sender<DisplayEvent>, Receiver<DisplayEvent>) {
    crossbeam_channel::unbounded()
}

/// Unbounded channel for tape events.
#[must_use]
pub fn tape_channel() -> (Sender<TapeEvent>, Receiver<TapeEvent>) {
    crossbeam_channel::unbounded()
}
