//! Pair note-on and note-off events into timed note records.

use super::decoder::{RawEvent, RawEventKind, RawTrack};
use super::tempo::TickConverter;
use crate::types::{Note, NoteKind, Track};

/// A note-on still waiting for its note-off.
#[derive(Debug, Clone, Copy)]
struct OpenNote {
    note: u8,
    onset_tick: u64,
    /// Index of the emitted `On` record in the track's note list.
    index: usize,
}

/// Builds one track's notes from its raw events.
///
/// Offs close the earliest-opened matching note (FIFO per note number), so
/// overlapping notes of the same pitch pair in the order they started.
pub struct NoteAssembler {
    track: usize,
    name: Option<String>,
    notes: Vec<Note>,
    open: Vec<OpenNote>,
}

impl NoteAssembler {
    pub fn new(track: usize) -> Self {
        Self {
            track,
            name: None,
            notes: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn push(&mut self, event: &RawEvent, converter: &mut TickConverter<'_>) {
        match &event.kind {
            RawEventKind::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(event.tick, *channel, *note, *velocity, converter),
            RawEventKind::NoteOff { channel, note, .. } => {
                self.note_off(event.tick, *channel, *note, converter)
            }
            RawEventKind::Tempo(tempo) => {
                log::debug!("Tempo change at tick {}: {} us per quarter", event.tick, tempo);
                converter.observe_tempo(*tempo);
            }
            RawEventKind::TrackName(name) => {
                if self.name.is_none() {
                    self.name = Some(name.clone());
                }
            }
        }
    }

    fn note_on(
        &mut self,
        tick: u64,
        channel: u8,
        note: u8,
        velocity: u8,
        converter: &TickConverter<'_>,
    ) {
        self.open.push(OpenNote {
            note,
            onset_tick: tick,
            index: self.notes.len(),
        });
        self.notes.push(Note {
            note,
            time_ms: converter.ms_at(tick),
            velocity,
            duration_ms: 0,
            channel,
            kind: NoteKind::On,
            track: self.track,
        });
    }

    fn note_off(&mut self, tick: u64, channel: u8, note: u8, converter: &TickConverter<'_>) {
        if let Some(pos) = self.open.iter().position(|o| o.note == note) {
            let open = self.open.remove(pos);
            self.notes[open.index].duration_ms = converter.span_ms(open.onset_tick, tick);
        }
        self.notes.push(Note {
            note,
            time_ms: converter.ms_at(tick),
            velocity: 0,
            duration_ms: 0,
            channel,
            kind: NoteKind::Off,
            track: self.track,
        });
    }

    /// Notes still open keep a duration of 0.
    pub fn finish(self) -> Track {
        if !self.open.is_empty() {
            log::debug!(
                "Track {}: {} notes never released",
                self.track,
                self.open.len()
            );
        }
        Track {
            name: self.name.unwrap_or_default(),
            notes: self.notes,
        }
    }
}

/// Assemble a whole raw track. `converter` is shared across tracks so that
/// latest-tempo conversion carries over in decode order.
pub fn assemble_track(raw: &RawTrack, track: usize, converter: &mut TickConverter<'_>) -> Track {
    let mut assembler = NoteAssembler::new(track);
    for event in &raw.events {
        assembler.push(event, converter);
    }
    assembler.finish()
}
