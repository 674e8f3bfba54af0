//! Merge per-track notes into one time-ordered sequence.

use serde::{Deserialize, Serialize};

use super::decoder::Header;
use super::tempo::TempoMap;
use crate::types::{Note, Track};

/// A fully decoded file: its tracks and all their notes in onset order.
///
/// Read-only once built. Share it with a player through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    header: Header,
    tempo_map: TempoMap,
    tracks: Vec<Track>,
    notes: Vec<Note>,
    total_duration_ms: u32,
}

impl Sequence {
    /// Merge tracks into a sequence.
    ///
    /// Notes are concatenated in track order and stable-sorted by onset, so
    /// equal onsets keep their track order and then their decode order. The
    /// total duration is the running maximum of each track's latest note end.
    pub fn from_tracks(header: Header, tempo_map: TempoMap, tracks: Vec<Track>) -> Self {
        let mut total_duration_ms = 0u32;
        let mut notes = Vec::with_capacity(tracks.iter().map(|t| t.notes.len()).sum());
        for track in &tracks {
            total_duration_ms = total_duration_ms.max(track.end_ms());
            notes.extend_from_slice(&track.notes);
        }
        notes.sort_by_key(|n| n.time_ms);

        Self {
            header,
            tempo_map,
            tracks,
            notes,
            total_duration_ms,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// All note records across tracks, ascending by onset.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Ticks per quarter note, or 0 for SMPTE-timed files.
    pub fn ticks_per_quarter(&self) -> u16 {
        self.header.division.ticks_per_quarter()
    }

    pub fn total_duration_ms(&self) -> u32 {
        self.total_duration_ms
    }

    pub fn note_on_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_on()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
