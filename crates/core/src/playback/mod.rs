//! Playback of decoded sequences: the frame-driven scheduler and the
//! keyboard state it drives.

pub mod keyboard;
pub mod scheduler;

pub use keyboard::{Intensity, KeyboardState};
pub use scheduler::{
    retention_for_scroll, ActiveNote, ActiveStatus, NoteSignal, PlaybackMode, Scheduler,
    SchedulerConfig, TickOutcome,
};
