use serde::{Deserialize, Serialize};

/// Whether a note record marks the start or the end of a sounding note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    On,
    Off,
}

/// A note record with its time already resolved to milliseconds.
///
/// Every note-on produces an `On` record whose `duration_ms` is filled in
/// once its note-off is decoded. Every note-off produces an `Off` record of
/// its own (velocity 0, duration 0) so a player sees both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number (0-127)
    pub note: u8,
    /// Onset in milliseconds from the start of the file
    pub time_ms: u32,
    /// Velocity (0-127). Always 0 for `Off` records.
    pub velocity: u8,
    /// Duration in milliseconds. 0 when no note-off was found.
    pub duration_ms: u32,
    /// Channel (0-15)
    pub channel: u8,
    pub kind: NoteKind,
    /// Index of the owning track in [`crate::Sequence::tracks`]
    pub track: usize,
}

impl Note {
    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::On
    }

    /// End time in milliseconds.
    pub fn end_ms(&self) -> u32 {
        self.time_ms.saturating_add(self.duration_ms)
    }
}

/// One decoded track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Display name from the first track-name meta event, empty otherwise
    pub name: String,
    /// Notes in decode order
    pub notes: Vec<Note>,
}

impl Track {
    /// Latest `time + duration` over the track's notes.
    pub fn end_ms(&self) -> u32 {
        self.notes.iter().map(Note::end_ms).max().unwrap_or(0)
    }

    pub fn note_on_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_on()).count()
    }
}
