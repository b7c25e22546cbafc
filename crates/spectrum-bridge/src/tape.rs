//! Tape loading progress.
//!
//! The tape engine reports a per-block position many times per emulated
//! millisecond. Those counters use different units per block kind (bytes,
//! edges, pulses), sometimes read as "not started", and can jitter backwards.
//! [`TapeProgress`] turns them into a completion ratio that never decreases
//! within a block and only changes when the whole-number percentage does.

use crossbeam_channel::Sender;
use log::{debug, trace};

use crate::event::TapeEvent;

/// Counter value the tape engine uses before a block has started.
///
/// Only the low 32 bits are significant: the engine stores -1 in a 32-bit
/// field that may be widened on the way here.
pub const NOT_STARTED: usize = u32::MAX as usize;

fn is_not_started(counter: usize) -> bool {
    counter as u32 == u32::MAX
}

/// Current block and its position, one variant per tape block kind.
///
/// Kinds that carry a position hold `(extent, counter)` in the unit that kind
/// counts in. The rest carry nothing the progress display can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeBlockSample {
    /// Standard-speed ROM block, in bytes.
    Rom { length: usize, bytes_through_block: usize },
    PureTone { length: usize, edge_count: usize },
    Pulses { count: usize, edge_count: usize },
    PureData { length: usize, bytes_through_block: usize },
    RawData { length: usize, bytes_through_block: usize },
    /// Generalised data, measured in symbol-stream bytes against the pulse table size.
    GeneralisedData { max_pulses: usize, bytes_through_stream: usize },
    RlePulse { length: usize, index: usize },
    PulseSequence { count: usize, pulse_count: usize },
    DataBlock { count: usize, bytes_through_block: usize },
    Turbo,
    Pause,
    GroupStart,
    GroupEnd,
    JumpTo,
    LoopStart,
    LoopEnd,
    SelectBlock,
    StopTape48k,
    SetSignalLevel,
    Comment,
    Message,
    ArchiveInfo,
    Hardware,
    Custom,
    Concat,
}

impl TapeBlockSample {
    /// `(total, completed)` for kinds that report a position.
    #[must_use]
    pub const fn progress(&self) -> Option<(usize, usize)> {
        match *self {
            Self::Rom {
                length,
                bytes_through_block,
            }
            | Self::PureData {
                length,
                bytes_through_block,
            }
            | Self::RawData {
                length,
                bytes_through_block,
            } => Some((length, bytes_through_block)),
            Self::PureTone { length, edge_count } => Some((length, edge_count)),
            Self::Pulses { count, edge_count } => Some((count, edge_count)),
            Self::GeneralisedData {
                max_pulses,
                bytes_through_stream,
            } => Some((max_pulses, bytes_through_stream)),
            Self::RlePulse { length, index } => Some((length, index)),
            Self::PulseSequence { count, pulse_count } => Some((count, pulse_count)),
            Self::DataBlock {
                count,
                bytes_through_block,
            } => Some((count, bytes_through_block)),
            Self::Turbo
            | Self::Pause
            | Self::GroupStart
            | Self::GroupEnd
            | Self::JumpTo
            | Self::LoopStart
            | Self::LoopEnd
            | Self::SelectBlock
            | Self::StopTape48k
            | Self::SetSignalLevel
            | Self::Comment
            | Self::Message
            | Self::ArchiveInfo
            | Self::Hardware
            | Self::Custom
            | Self::Concat => None,
        }
    }
}

type FeedbackFn = Box<dyn FnMut(f32) + Send>;

/// Smoothed, monotonic tape progress for the block currently playing.
///
/// Lives on the emulation thread. Results go to the registered feedback
/// closure, to a queued [`TapeEvent`] channel, or both.
#[derive(Default)]
pub struct TapeProgress {
    previous_remaining: Option<usize>,
    previous_percent: Option<u32>,
    block: Option<usize>,
    feedback: Option<FeedbackFn>,
    queue: Option<Sender<TapeEvent>>,
}

impl TapeProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the progress callback. `None` removes it.
    pub fn set_feedback<F>(&mut self, feedback: Option<F>)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.feedback = feedback.map(|f| Box::new(f) as FeedbackFn);
    }

    /// Also queue progress and reset events on `queue`. `None` stops queueing.
    pub fn set_queue(&mut self, queue: Option<Sender<TapeEvent>>) {
        self.queue = queue;
    }

    /// Forget all history. Call when playback restarts or a tape is inserted.
    pub fn reset(&mut self) {
        self.previous_remaining = None;
        self.previous_percent = None;
        self.block = None;
        self.send(TapeEvent::Reset);
    }

    /// Sample the block at `block_index`, resetting first if the tape has
    /// moved on to a different block.
    pub fn observe(&mut self, block_index: usize, sample: &TapeBlockSample) -> Option<f32> {
        if self.block != Some(block_index) {
            if self.block.is_some() {
                debug!("tape moved to block {block_index}; progress reset");
            }
            self.reset();
            self.block = Some(block_index);
        }
        self.sample(sample)
    }

    /// Feed one sample. Returns the ratio emitted, if any.
    pub fn sample(&mut self, sample: &TapeBlockSample) -> Option<f32> {
        let (total, completed) = sample.progress()?;
        if total == 0 {
            trace!("skipping zero-length tape block {sample:?}");
            return None;
        }
        let completed = if is_not_started(completed) { 0 } else { completed };

        let mut remaining = total.saturating_sub(completed);
        if let Some(previous) = self.previous_remaining {
            remaining = remaining.min(previous);
        }
        remaining = remaining.min(total);

        let percent = completion_percent(total, remaining);
        if self.previous_percent == Some(percent) {
            return None;
        }

        self.previous_remaining = Some(remaining);
        self.previous_percent = Some(percent);
        let ratio = percent as f32 / 100.0;
        if let Some(feedback) = self.feedback.as_mut() {
            feedback(ratio);
        }
        self.send(TapeEvent::Progress(ratio));
        Some(ratio)
    }

    /// Last emitted whole-number completion percentage.
    #[must_use]
    pub fn percent(&self) -> Option<u32> {
        self.previous_percent
    }

    fn send(&self, event: TapeEvent) {
        if let Some(queue) = &self.queue
            && queue.send(event).is_err()
        {
            trace!("tape event receiver gone; dropping {event:?}");
        }
    }
}

// floor(100 * done / total), i.e. 100 minus the rounded-up remaining percentage.
fn completion_percent(total: usize, remaining: usize) -> u32 {
    let done = (total - remaining) as u128;
    (done * 100 / total as u128) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn rom(length: usize, done: usize) -> TapeBlockSample {
        TapeBlockSample::Rom {
            length,
            bytes_through_block: done,
        }
    }

    fn collect(progress: &mut TapeProgress) -> Arc<Mutex<Vec<f32>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        progress.set_feedback(Some(move |ratio| sink.lock().unwrap().push(ratio)));
        seen
    }

    // ===== Block kinds =====

    #[test]
    fn progress_fields_per_kind() {
        assert_eq!(rom(10, 3).progress(), Some((10, 3)));
        assert_eq!(
            TapeBlockSample::PureTone {
                length: 8063,
                edge_count: 100
            }
            .progress(),
            Some((8063, 100))
        );
        assert_eq!(
            TapeBlockSample::GeneralisedData {
                max_pulses: 4,
                bytes_through_stream: 2
            }
            .progress(),
            Some((4, 2))
        );
        assert_eq!(
            TapeBlockSample::PulseSequence {
                count: 9,
                pulse_count: 1
            }
            .progress(),
            Some((9, 1))
        );
        assert_eq!(TapeBlockSample::Pause.progress(), None);
        assert_eq!(TapeBlockSample::Concat.progress(), None);
    }

    #[test]
    fn non_progress_kinds_emit_nothing() {
        let mut progress = TapeProgress::new();
        let seen = collect(&mut progress);
        assert_eq!(progress.sample(&TapeBlockSample::Turbo), None);
        assert_eq!(progress.sample(&TapeBlockSample::GroupStart), None);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(progress.percent(), None);
    }

    // ===== Estimator =====

    #[test]
    fn regressions_are_absorbed() {
        let mut progress = TapeProgress::new();
        let seen = collect(&mut progress);
        for done in [0, 100, 90, 300, 250, 1000] {
            progress.sample(&rom(1000, done));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.1, 0.3, 1.0]);
    }

    #[test]
    fn same_percent_is_suppressed() {
        let mut progress = TapeProgress::new();
        assert_eq!(progress.sample(&rom(1000, 10)), Some(0.01));
        assert_eq!(progress.sample(&rom(1000, 11)), None);
        assert_eq!(progress.sample(&rom(1000, 20)), Some(0.02));
    }

    #[test]
    fn sentinel_reads_as_zero() {
        let mut progress = TapeProgress::new();
        assert_eq!(progress.sample(&rom(500, NOT_STARTED)), Some(0.0));
        // Widened sentinel.
        let mut progress = TapeProgress::new();
        let widened = usize::MAX;
        assert_eq!(progress.sample(&rom(500, widened)), Some(0.0));
    }

    #[test]
    fn overrun_clamps_to_complete() {
        let mut progress = TapeProgress::new();
        assert_eq!(progress.sample(&rom(100, 150)), Some(1.0));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn zero_total_is_skipped_without_touching_state() {
        let mut progress = TapeProgress::new();
        progress.sample(&rom(100, 40));
        assert_eq!(progress.sample(&rom(0, 0)), None);
        assert_eq!(progress.percent(), Some(40));
        assert_eq!(progress.sample(&rom(100, 41)), Some(0.41));
    }

    #[test]
    fn reset_accepts_larger_remaining() {
        let mut progress = TapeProgress::new();
        progress.sample(&rom(100, 90));
        // Without a reset the regression is absorbed.
        assert_eq!(progress.sample(&rom(100, 10)), None);

        progress.reset();
        assert_eq!(progress.sample(&rom(100, 10)), Some(0.1));
    }

    #[test]
    fn observe_resets_on_block_change() {
        let mut progress = TapeProgress::new();
        assert_eq!(progress.observe(0, &rom(19, 19)), Some(1.0));
        assert_eq!(progress.observe(1, &rom(6914, 0)), Some(0.0));
        assert_eq!(progress.observe(1, &rom(6914, 3457)), Some(0.5));
        assert_eq!(progress.observe(1, &rom(6914, 3457)), None);
    }

    #[test]
    fn deregistered_feedback_still_tracks_state() {
        let mut progress = TapeProgress::new();
        let seen = collect(&mut progress);
        progress.sample(&rom(10, 5));
        progress.set_feedback(None::<fn(f32)>);
        assert_eq!(progress.sample(&rom(10, 6)), Some(0.6));
        assert_eq!(*seen.lock().unwrap(), vec![0.5]);
    }

    #[test]
    fn queue_receives_progress_and_resets() {
        let (tx, rx) = crate::event::tape_channel();
        let mut progress = TapeProgress::new();
        progress.set_queue(Some(tx));
        progress.observe(3, &rom(4, 1));
        progress.observe(3, &rom(4, 4));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TapeEvent::Reset,
                TapeEvent::Progress(0.25),
                TapeEvent::Progress(1.0)
            ]
        );
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (tx, rx) = crate::event::tape_channel();
        drop(rx);
        let mut progress = TapeProgress::new();
        progress.set_queue(Some(tx));
        assert_eq!(progress.sample(&rom(4, 2)), Some(0.5));
    }
}
