//! Standard MIDI File decoding and frame-driven note playback for a
//! falling-notes piano display.

pub mod error;
pub mod midi;
pub mod playback;
pub mod types;

pub use error::DecodeError;
pub use midi::{load, load_file, load_with_options, DecodeOptions, Sequence, TempoMode};
pub use playback::{NoteSignal, Scheduler, SchedulerConfig};
pub use types::{Note, NoteKind, Track};
