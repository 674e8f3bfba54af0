//! Standard MIDI File decoding into a time-ordered note sequence.
//!
//! Pipeline: header → raw events per track → global tempo map → notes per
//! track → merged [`Sequence`].

pub mod assembler;
pub mod cursor;
pub mod decoder;
pub mod sequence;
pub mod tempo;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use assembler::assemble_track;
use decoder::{decode_tracks, parse_header, RawEventKind, RawTrack};
pub use decoder::Header;
pub use sequence::Sequence;
use tempo::{TempoMap, TickConverter};
pub use tempo::{Division, TempoMode};

/// Options for [`load_with_options`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeOptions {
    pub tempo_mode: TempoMode,
}

/// Decode an SMF byte buffer with default options.
pub fn load(data: &[u8]) -> Result<Sequence> {
    load_with_options(data, &DecodeOptions::default())
}

/// Decode an SMF byte buffer.
///
/// Fails on a bad header, or when no track yields a note. Damaged tracks are
/// skipped or cut short and reported through `log`.
pub fn load_with_options(data: &[u8], options: &DecodeOptions) -> Result<Sequence> {
    let header = parse_header(data)?;
    let raw_tracks = decode_tracks(data, &header);
    let tempo_map = build_tempo_map(&raw_tracks);

    let mut converter = TickConverter::new(header.division, &tempo_map, options.tempo_mode);
    let mut tracks = Vec::new();
    for raw in &raw_tracks {
        let track = assemble_track(raw, tracks.len(), &mut converter);
        if track.notes.is_empty() {
            log::debug!("Track {} has no notes, dropping it", raw.chunk_index);
            continue;
        }
        log::debug!(
            "Track {} ({:?}): {} notes",
            raw.chunk_index,
            track.name,
            track.note_on_count()
        );
        tracks.push(track);
    }

    if tracks.is_empty() {
        return Err(DecodeError::EmptyResult);
    }

    let sequence = Sequence::from_tracks(header, tempo_map, tracks);
    log::info!(
        "Decoded {} tracks, {} notes, {} ms",
        sequence.tracks().len(),
        sequence.note_on_count(),
        sequence.total_duration_ms()
    );
    Ok(sequence)
}

/// Read and decode an SMF file from disk.
pub fn load_file(path: &Path) -> Result<Sequence> {
    let data = std::fs::read(path)?;
    log::info!("Loading MIDI file: {} ({} bytes)", path.display(), data.len());
    load(&data)
}

/// Like [`load_file`] with explicit options.
pub fn load_file_with_options(path: &Path, options: &DecodeOptions) -> Result<Sequence> {
    let data = std::fs::read(path)?;
    log::info!("Loading MIDI file: {} ({} bytes)", path.display(), data.len());
    load_with_options(&data, options)
}

/// Tempo events from every track, in one map.
fn build_tempo_map(tracks: &[RawTrack]) -> TempoMap {
    let mut map = TempoMap::new();
    for event in tracks.iter().flat_map(|t| t.events.iter()) {
        if let RawEventKind::Tempo(tempo) = event.kind {
            map.insert(event.tick, tempo);
        }
    }
    map
}
