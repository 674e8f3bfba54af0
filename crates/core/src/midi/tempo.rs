//! Tempo map and tick → millisecond conversion.
//!
//! Two conversion modes exist:
//! - [`TempoMode::Integrated`] walks the tempo map and sums each segment at
//!   the tempo active there. This is the correct reading of a multi-tempo
//!   file.
//! - [`TempoMode::LatestOnly`] keeps a single "current" tempo that is
//!   replaced whenever a tempo event is met in decode order and applies it to
//!   every later conversion, including the durations of notes opened before
//!   the change. Timestamps then agree bit for bit with older waterfall
//!   renderers that worked this way.
//!
//! Both modes agree on single-tempo files.

use serde::{Deserialize, Serialize};

/// 120 BPM.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Header timing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Division {
    /// Ticks per quarter note.
    Metrical(u16),
    /// SMPTE frames per second and ticks per frame.
    Timecode { fps: u8, subframes: u8 },
}

impl Division {
    /// Decode the raw 16-bit header field.
    pub fn from_raw(raw: u16) -> Self {
        if raw & 0x8000 != 0 {
            // High byte is the negated frame rate (-24, -25, -29, -30).
            let fps = ((raw >> 8) as u8 as i8).unsigned_abs();
            Division::Timecode {
                fps,
                subframes: (raw & 0xFF) as u8,
            }
        } else {
            Division::Metrical(raw)
        }
    }

    /// Ticks per quarter note, or 0 for timecode files.
    pub fn ticks_per_quarter(&self) -> u16 {
        match self {
            Division::Metrical(tpq) => *tpq,
            Division::Timecode { .. } => 0,
        }
    }

    /// Ticks per second for timecode files.
    fn ticks_per_second(&self) -> Option<u64> {
        match self {
            Division::Metrical(_) => None,
            Division::Timecode { fps, subframes } => Some(u64::from(*fps) * u64::from(*subframes)),
        }
    }
}

/// A tempo change at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_quarter: u32,
}

/// Ordered tempo changes, always starting with an entry at tick 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoMap {
    pub fn new() -> Self {
        Self {
            changes: vec![TempoChange {
                tick: 0,
                micros_per_quarter: DEFAULT_TEMPO,
            }],
        }
    }

    /// Record a tempo change. A change at a tick that already has one
    /// replaces it.
    pub fn insert(&mut self, tick: u64, micros_per_quarter: u32) {
        let idx = self.changes.partition_point(|c| c.tick <= tick);
        if idx > 0 && self.changes[idx - 1].tick == tick {
            self.changes[idx - 1].micros_per_quarter = micros_per_quarter;
        } else {
            self.changes.insert(
                idx,
                TempoChange {
                    tick,
                    micros_per_quarter,
                },
            );
        }
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Tempo in effect at `tick`.
    pub fn tempo_at(&self, tick: u64) -> u32 {
        let idx = self.changes.partition_point(|c| c.tick <= tick);
        // changes[0].tick == 0, so idx >= 1
        self.changes[idx.saturating_sub(1)].micros_per_quarter
    }

    /// Sum of `ticks * micros_per_quarter` over `[from, to)`.
    ///
    /// Kept in tick·µs units so the caller divides exactly once.
    fn tick_micros(&self, from: u64, to: u64) -> u128 {
        if to <= from {
            return 0;
        }
        let mut total: u128 = 0;
        for (i, change) in self.changes.iter().enumerate() {
            let seg_start = change.tick.max(from);
            let seg_end = self
                .changes
                .get(i + 1)
                .map_or(to, |next| next.tick.min(to));
            if seg_end > seg_start {
                total += u128::from(seg_end - seg_start) * u128::from(change.micros_per_quarter);
            }
            if seg_end >= to {
                break;
            }
        }
        total
    }
}

/// How tempo changes affect tick → ms conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TempoMode {
    #[default]
    Integrated,
    LatestOnly,
}

fn saturate_ms(value: u128) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Stateful converter used while assembling notes.
///
/// In `LatestOnly` mode it must be told about tempo events as they are met in
/// decode order via [`TickConverter::observe_tempo`].
#[derive(Debug, Clone)]
pub struct TickConverter<'a> {
    division: Division,
    map: &'a TempoMap,
    mode: TempoMode,
    current_tempo: u32,
}

impl<'a> TickConverter<'a> {
    pub fn new(division: Division, map: &'a TempoMap, mode: TempoMode) -> Self {
        Self {
            division,
            map,
            mode,
            current_tempo: DEFAULT_TEMPO,
        }
    }

    pub fn observe_tempo(&mut self, micros_per_quarter: u32) {
        self.current_tempo = micros_per_quarter;
    }

    fn micros_to_ms(&self, tick_micros: u128) -> u32 {
        let tpq = u128::from(self.division.ticks_per_quarter());
        if tpq == 0 {
            return 0;
        }
        saturate_ms(tick_micros / (tpq * 1000))
    }

    fn timecode_ms(ticks: u64, ticks_per_second: u64) -> u32 {
        if ticks_per_second == 0 {
            return 0;
        }
        saturate_ms(u128::from(ticks) * 1000 / u128::from(ticks_per_second))
    }

    /// Milliseconds from the start of the file to `tick`.
    pub fn ms_at(&self, tick: u64) -> u32 {
        self.span_ms(0, tick)
    }

    /// Milliseconds elapsed between two ticks (`from <= to`).
    pub fn span_ms(&self, from: u64, to: u64) -> u32 {
        let ticks = to.saturating_sub(from);
        if let Some(per_second) = self.division.ticks_per_second() {
            return Self::timecode_ms(ticks, per_second);
        }
        match self.mode {
            TempoMode::Integrated => self.micros_to_ms(self.map.tick_micros(from, to)),
            TempoMode::LatestOnly => {
                self.micros_to_ms(u128::from(ticks) * u128::from(self.current_tempo))
            }
        }
    }
}
