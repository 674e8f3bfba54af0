//! SMF chunk decoding: the `MThd` header and `MTrk` bodies into raw events.
//!
//! Track-level damage is recovered here. A chunk with the wrong tag is
//! skipped whole, and a body that ends mid-event keeps whatever decoded
//! before the damage.

use serde::{Deserialize, Serialize};

use super::cursor::ByteCursor;
use super::tempo::Division;
use crate::error::{DecodeError, Result};

const HEADER_TAG: &[u8; 4] = b"MThd";
const TRACK_TAG: &[u8; 4] = b"MTrk";
/// Tag + length + format + track count + division.
const MIN_FILE_LEN: usize = 14;

const META_TRACK_NAME: u8 = 0x03;
const META_TEMPO: u8 = 0x51;

/// Parsed `MThd` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// 0, 1 or 2. Not used to change decoding.
    pub format: u16,
    /// Declared track count. Informational only.
    pub track_count: u16,
    pub division: Division,
    /// Offset of the first chunk after the header.
    #[serde(skip)]
    pub(crate) body_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    Tempo(u32),
    TrackName(String),
}

/// A decoded event at an absolute tick. Events that neither sound nor
/// affect timing are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub tick: u64,
    pub kind: RawEventKind,
}

/// Decoded body of one `MTrk` chunk.
#[derive(Debug, Clone, Default)]
pub struct RawTrack {
    /// Position of the chunk among all chunks after the header, counting
    /// skipped ones.
    pub chunk_index: usize,
    pub events: Vec<RawEvent>,
    /// Set when decoding stopped before the end of the body.
    pub truncated: bool,
}

/// Parse the `MThd` chunk at the start of `data`.
pub fn parse_header(data: &[u8]) -> Result<Header> {
    if data.len() < MIN_FILE_LEN {
        return Err(DecodeError::InvalidHeader(format!(
            "file is {} bytes, too small to be a MIDI file",
            data.len()
        )));
    }
    if &data[0..4] != HEADER_TAG {
        return Err(DecodeError::InvalidHeader("missing MThd tag".to_string()));
    }

    let mut cursor = ByteCursor::new(data);
    cursor.skip(HEADER_TAG.len())?;
    let header_len = cursor.read_u32()? as usize;
    if header_len < 6 {
        return Err(DecodeError::InvalidHeader(format!(
            "header length {} is shorter than 6",
            header_len
        )));
    }
    let format = cursor.read_u16()?;
    let track_count = cursor.read_u16()?;
    let raw_division = cursor.read_u16()?;

    let division = Division::from_raw(raw_division);
    match division {
        Division::Metrical(0) => {
            return Err(DecodeError::InvalidHeader(
                "ticks per quarter note is zero".to_string(),
            ))
        }
        Division::Timecode { fps, subframes } if fps == 0 || subframes == 0 => {
            return Err(DecodeError::InvalidHeader(format!(
                "invalid timecode division {} fps x {}",
                fps, subframes
            )))
        }
        _ => {}
    }
    if format > 2 {
        log::warn!("Unknown MIDI format {}, decoding as format 1", format);
    }

    log::info!(
        "MIDI format {}, {} tracks, division {:?}",
        format,
        track_count,
        division
    );

    Ok(Header {
        format,
        track_count,
        division,
        body_offset: 8usize.saturating_add(header_len),
    })
}

/// Walk every chunk after the header and decode the `MTrk` bodies.
///
/// Chunks with another tag are reported and skipped using their declared
/// length.
pub fn decode_tracks(data: &[u8], header: &Header) -> Vec<RawTrack> {
    let mut tracks = Vec::new();
    let mut offset = header.body_offset;
    let cursor = ByteCursor::new(data);
    let mut chunk_index = 0;

    while offset.saturating_add(8) <= data.len() {
        let tag = &data[offset..offset + 4];
        // offset + 8 <= len was checked above
        let len = cursor.read_u32_at(offset + 4).unwrap_or(0) as usize;
        let body_start = offset + 8;
        let body_end = body_start.saturating_add(len);

        if tag != TRACK_TAG {
            let err = DecodeError::InvalidTrackHeader {
                offset,
                found: String::from_utf8_lossy(tag).into_owned(),
            };
            log::warn!("{}, skipping {} bytes", err, len);
        } else {
            if body_end > data.len() {
                log::warn!(
                    "Track chunk at byte {} declares {} bytes but only {} remain",
                    offset,
                    len,
                    data.len() - body_start
                );
            }
            let track = decode_track(data, body_start, body_end, chunk_index);
            tracks.push(track);
        }

        offset = body_end;
        chunk_index += 1;
    }

    tracks
}

/// Decode one track body confined to `data[start..end]`.
fn decode_track(data: &[u8], start: usize, end: usize, chunk_index: usize) -> RawTrack {
    let mut cursor = ByteCursor::bounded(data, start, end);
    let mut track = RawTrack {
        chunk_index,
        ..Default::default()
    };
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;

    while !cursor.is_empty() {
        let decoded = decode_event(&mut cursor, &mut tick, &mut running_status, &mut track.events);
        if let Err(e) = decoded {
            log::warn!("Track {} cut short: {}", chunk_index, e);
            track.truncated = true;
            break;
        }
    }

    log::debug!(
        "Track {}: {} events over {} ticks",
        chunk_index,
        track.events.len(),
        tick
    );
    track
}

fn decode_event(
    cursor: &mut ByteCursor<'_>,
    tick: &mut u64,
    running_status: &mut Option<u8>,
    events: &mut Vec<RawEvent>,
) -> Result<()> {
    let delta = cursor.read_var_len()?;
    *tick += u64::from(delta);

    let status_offset = cursor.position();
    let status = match cursor.peek_u8()? {
        // Data byte: reuse the previous voice status, leave the byte in place.
        byte if byte < 0x80 => running_status.ok_or(DecodeError::UnexpectedDataByte {
            offset: status_offset,
        })?,
        byte => {
            cursor.read_u8()?;
            *running_status = if byte < 0xF0 { Some(byte) } else { None };
            byte
        }
    };

    let channel = status & 0x0F;
    match status & 0xF0 {
        0x90 => {
            let note = cursor.read_u8()?;
            let velocity = cursor.read_u8()?;
            let kind = if velocity > 0 {
                RawEventKind::NoteOn {
                    channel,
                    note,
                    velocity,
                }
            } else {
                RawEventKind::NoteOff {
                    channel,
                    note,
                    velocity,
                }
            };
            events.push(RawEvent { tick: *tick, kind });
        }
        0x80 => {
            let note = cursor.read_u8()?;
            let velocity = cursor.read_u8()?;
            events.push(RawEvent {
                tick: *tick,
                kind: RawEventKind::NoteOff {
                    channel,
                    note,
                    velocity,
                },
            });
        }
        0xA0 | 0xB0 | 0xE0 => cursor.skip(2)?,
        0xC0 | 0xD0 => cursor.skip(1)?,
        _ => match status {
            0xFF => {
                let meta_type = cursor.read_u8()?;
                let len = cursor.read_var_len()? as usize;
                let payload = cursor.take(len)?;
                if let Some(kind) = meta_event(meta_type, payload) {
                    events.push(RawEvent { tick: *tick, kind });
                }
            }
            0xF0 | 0xF7 => {
                let len = cursor.read_var_len()? as usize;
                cursor.skip(len)?;
            }
            // System common/real-time bytes carry nothing in a file.
            _ => {}
        },
    }

    Ok(())
}

fn meta_event(meta_type: u8, payload: &[u8]) -> Option<RawEventKind> {
    match meta_type {
        META_TEMPO if payload.len() == 3 => {
            let tempo = payload
                .iter()
                .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
            Some(RawEventKind::Tempo(tempo))
        }
        META_TRACK_NAME if !payload.is_empty() => Some(RawEventKind::TrackName(
            String::from_utf8_lossy(payload).into_owned(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::test_support::{single_note_file, smf, TrackBuilder};

    fn note_ons(track: &RawTrack) -> Vec<(u64, u8, u8, u8)> {
        track
            .events
            .iter()
            .filter_map(|e| match e.kind {
                RawEventKind::NoteOn {
                    channel,
                    note,
                    velocity,
                } => Some((e.tick, channel, note, velocity)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_header() {
        let data = single_note_file();
        let header = parse_header(&data).unwrap();
        assert_eq!(header.format, 0);
        assert_eq!(header.track_count, 1);
        assert_eq!(header.division, Division::Metrical(480));
        assert_eq!(header.body_offset, 14);
    }

    #[test]
    fn test_header_too_short() {
        let data = b"MThd\x00\x00\x00\x06\x00".to_vec();
        assert!(matches!(parse_header(&data), Err(DecodeError::InvalidHeader(_))));
    }

    #[test]
    fn test_header_bad_tag() {
        let mut data = single_note_file();
        data[0] = b'X';
        assert!(matches!(parse_header(&data), Err(DecodeError::InvalidHeader(_))));
    }

    #[test]
    fn test_header_zero_division() {
        let data = smf(0, 0, &[]);
        assert!(matches!(parse_header(&data), Err(DecodeError::InvalidHeader(_))));
    }

    #[test]
    fn test_header_short_declared_length() {
        let mut data = single_note_file();
        data[7] = 5;
        assert!(matches!(parse_header(&data), Err(DecodeError::InvalidHeader(_))));
    }

    #[test]
    fn test_extended_header_is_skipped() {
        let track = TrackBuilder::new().note_on(0, 0, 60, 100).chunk();
        let mut data = b"MThd".to_vec();
        data.extend(8u32.to_be_bytes());
        data.extend([0, 0, 0, 1, 0x01, 0xE0, 0xAA, 0xBB]);
        data.extend(track);

        let header = parse_header(&data).unwrap();
        assert_eq!(header.body_offset, 16);
        let tracks = decode_tracks(&data, &header);
        assert_eq!(tracks.len(), 1);
        assert_eq!(note_ons(&tracks[0]), vec![(0, 0, 60, 100)]);
    }

    #[test]
    fn test_running_status_note_on() {
        let track = TrackBuilder::new()
            .note_on(0, 3, 60, 100)
            .running(10, 64, 90)
            .running(10, 67, 80)
            .chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);

        assert_eq!(
            note_ons(&tracks[0]),
            vec![(0, 3, 60, 100), (10, 3, 64, 90), (20, 3, 67, 80)]
        );
        assert!(!tracks[0].truncated);
    }

    #[test]
    fn test_running_status_survives_skipped_voice_events() {
        let track = TrackBuilder::new()
            .control(0, 0, 7, 100)
            .running(0, 10, 64)
            .note_on(5, 0, 60, 100)
            .program(0, 1, 5)
            // one data byte under the program-change running status
            .raw(&[0x00, 0x06])
            .chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert_eq!(note_ons(&tracks[0]), vec![(5, 0, 60, 100)]);
        assert!(!tracks[0].truncated);
    }

    #[test]
    fn test_velocity_zero_is_note_off() {
        let track = TrackBuilder::new().note_on(0, 0, 60, 0).chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert_eq!(
            tracks[0].events[0].kind,
            RawEventKind::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0
            }
        );
    }

    #[test]
    fn test_meta_events() {
        let track = TrackBuilder::new()
            .name(0, "Piano")
            .tempo(0, 600_000)
            .meta(0, 0x58, &[4, 2, 24, 8])
            .sysex(0, &[0x7E, 0x7F, 0x09, 0x01, 0xF7])
            .meta(0, 0x51, &[0x07, 0xA1])
            .name(0, "")
            .note_on(0, 0, 60, 100)
            .chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        let kinds: Vec<_> = tracks[0].events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                RawEventKind::TrackName("Piano".to_string()),
                RawEventKind::Tempo(600_000),
                RawEventKind::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100
                },
            ]
        );
    }

    #[test]
    fn test_data_byte_after_meta_stops_track() {
        let track = TrackBuilder::new()
            .note_on(0, 0, 60, 100)
            .end(0)
            .running(0, 62, 100)
            .chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert!(tracks[0].truncated);
        assert_eq!(note_ons(&tracks[0]).len(), 1);
    }

    #[test]
    fn test_truncated_body_keeps_earlier_events() {
        let track = TrackBuilder::new()
            .note_on(0, 0, 60, 100)
            .note_on(10, 0, 62, 100)
            .raw(&[0x00, 0x90, 0x40])
            .chunk();
        let data = smf(0, 480, &[track]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert!(tracks[0].truncated);
        assert_eq!(note_ons(&tracks[0]).len(), 2);
    }

    #[test]
    fn test_track_body_bounded_by_declared_length() {
        let mut first = TrackBuilder::new().note_on(0, 0, 60, 100).chunk();
        // shrink the declared length so the last byte (velocity) falls outside
        let declared = (first.len() - 8 - 1) as u32;
        first[4..8].copy_from_slice(&declared.to_be_bytes());
        first.pop();
        let second = TrackBuilder::new().note_on(0, 0, 72, 90).chunk();
        let data = smf(1, 480, &[first, second]);

        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].truncated);
        assert!(note_ons(&tracks[0]).is_empty());
        assert_eq!(note_ons(&tracks[1]), vec![(0, 0, 72, 90)]);
    }

    #[test]
    fn test_bad_chunk_tag_is_skipped() {
        let one = TrackBuilder::new().note_on(0, 0, 60, 100).chunk();
        let bad = TrackBuilder::new().note_on(0, 0, 61, 100).chunk_with_tag(b"MTrx");
        let three = TrackBuilder::new().note_on(0, 0, 62, 100).chunk();
        let data = smf(1, 480, &[one, bad, three]);

        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert_eq!(tracks.len(), 2);
        assert_eq!(note_ons(&tracks[0])[0].2, 60);
        assert_eq!(note_ons(&tracks[1])[0].2, 62);
        assert_eq!(tracks[0].chunk_index, 0);
        // the skipped chunk still counts
        assert_eq!(tracks[1].chunk_index, 2);
    }

    #[test]
    fn test_overlong_chunk_reads_to_end_of_buffer() {
        let mut chunk = TrackBuilder::new().note_on(0, 0, 60, 100).chunk();
        chunk[4..8].copy_from_slice(&1000u32.to_be_bytes());
        let data = smf(0, 480, &[chunk]);
        let header = parse_header(&data).unwrap();
        let tracks = decode_tracks(&data, &header);
        assert_eq!(tracks.len(), 1);
        assert_eq!(note_ons(&tracks[0]).len(), 1);
    }
}
