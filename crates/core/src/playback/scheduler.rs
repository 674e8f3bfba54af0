//! Frame-driven playback of a decoded [`Sequence`].
//!
//! The embedding loop calls [`Scheduler::tick`] once per frame with the wall
//! time elapsed since the previous frame. The scheduler scales it by the
//! playback speed, fires every note record the clock has reached, and keeps
//! the set of notes a renderer should draw.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::midi::Sequence;

/// Height of the falling-note area in the reference renderer, in pixels.
const DEFAULT_VIEW_HEIGHT_PX: f64 = 750.0;
/// Scroll rate of the reference renderer, in pixels per second.
const DEFAULT_SCROLL_PX_PER_S: f64 = 200.0;

/// Round a clock value to whole microseconds so that sums of the same wall
/// time split into different frames compare equal.
fn snap_to_micros(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

/// How long an ended note must stay visible to scroll `height_px` at
/// `px_per_second`, in milliseconds.
pub fn retention_for_scroll(height_px: f64, px_per_second: f64) -> f64 {
    if px_per_second <= 0.0 {
        return 0.0;
    }
    height_px / px_per_second * 1000.0
}

/// Playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lowest allowed speed multiplier
    pub min_speed: f64,
    /// Highest allowed speed multiplier
    pub max_speed: f64,
    /// Increment used by [`Scheduler::nudge_speed`] callers
    pub speed_step: f64,
    /// Clock time an ended note stays in the active set (ms)
    pub retention_ms: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.1,
            max_speed: 3.0,
            speed_step: 0.1,
            retention_ms: retention_for_scroll(DEFAULT_VIEW_HEIGHT_PX, DEFAULT_SCROLL_PX_PER_S),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Stopped,
    Playing,
    Paused,
}

/// Key press/release fired by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteSignal {
    Press { note: u8, velocity: u8, track: usize },
    Release { note: u8, track: usize },
}

impl NoteSignal {
    pub fn note(&self) -> u8 {
        match self {
            NoteSignal::Press { note, .. } | NoteSignal::Release { note, .. } => *note,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActiveStatus {
    /// Key is held.
    Sounding,
    /// Released at `at_ms` (clock time) and still inside the retention window.
    Ended { at_ms: f64 },
}

/// A note in the active set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveNote {
    pub note: u8,
    pub velocity: u8,
    pub track: usize,
    /// Onset in the sequence (ms)
    pub onset_ms: u32,
    /// Clock time when it was fired (ms)
    pub started_at_ms: f64,
    pub status: ActiveStatus,
}

impl ActiveNote {
    pub fn is_sounding(&self) -> bool {
        self.status == ActiveStatus::Sounding
    }
}

/// What one tick produced.
#[derive(Debug)]
pub struct TickOutcome<'a> {
    /// Signals fired during this tick, in sequence order
    pub signals: Vec<NoteSignal>,
    /// Active set after the tick
    pub active: &'a [ActiveNote],
}

/// Plays a sequence against an externally driven clock.
///
/// Single-threaded: `tick` takes `&mut self`, so it can never run
/// concurrently with itself.
pub struct Scheduler {
    config: SchedulerConfig,
    sequence: Option<Arc<Sequence>>,
    mode: PlaybackMode,
    /// Clock value when the current speed took effect.
    base_ms: f64,
    /// Wall time played at the current speed.
    wall_ms: f64,
    clock_ms: f64,
    speed: f64,
    /// Index of the next unfired note record.
    cursor: usize,
    active: Vec<ActiveNote>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            sequence: None,
            mode: PlaybackMode::Stopped,
            base_ms: 0.0,
            wall_ms: 0.0,
            clock_ms: 0.0,
            speed: 1.0,
            cursor: 0,
            active: Vec::new(),
        }
    }

    /// Replace the current sequence. Resets the clock, cursor and active
    /// set; the speed is kept.
    pub fn load(&mut self, sequence: Arc<Sequence>) {
        log::debug!("Scheduler loaded {} note records", sequence.notes().len());
        self.sequence = Some(sequence);
        self.reset();
    }

    fn reset(&mut self) {
        self.mode = PlaybackMode::Stopped;
        self.base_ms = 0.0;
        self.wall_ms = 0.0;
        self.clock_ms = 0.0;
        self.cursor = 0;
        self.active.clear();
    }

    /// Start or resume. Does nothing without a sequence.
    pub fn play(&mut self) {
        if self.sequence.is_none() {
            log::warn!("play() called with no sequence loaded");
            return;
        }
        if self.mode != PlaybackMode::Playing {
            log::debug!("Playing from {:.1} ms", self.clock_ms);
            self.mode = PlaybackMode::Playing;
        }
    }

    /// Toggle between playing and paused. Does nothing when stopped.
    pub fn pause(&mut self) {
        self.mode = match self.mode {
            PlaybackMode::Playing => PlaybackMode::Paused,
            PlaybackMode::Paused => PlaybackMode::Playing,
            PlaybackMode::Stopped => PlaybackMode::Stopped,
        };
    }

    /// Play when stopped, otherwise toggle pause.
    pub fn play_pause(&mut self) {
        match self.mode {
            PlaybackMode::Stopped => self.play(),
            _ => self.pause(),
        }
    }

    /// Stop and rewind. Returns a release for every key still held.
    pub fn stop(&mut self) -> Vec<NoteSignal> {
        let releases = self
            .active
            .iter()
            .filter(|a| a.is_sounding())
            .map(|a| NoteSignal::Release {
                note: a.note,
                track: a.track,
            })
            .collect();
        self.reset();
        releases
    }

    /// Set the speed multiplier, clamped to the configured range. Applies
    /// from the next tick on.
    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() {
            log::warn!("Ignoring non-finite playback speed {}", speed);
            return;
        }
        let speed = speed.clamp(self.config.min_speed, self.config.max_speed);
        if speed != self.speed {
            self.base_ms = self.clock_ms;
            self.wall_ms = 0.0;
            self.speed = speed;
        }
    }

    /// Change the speed by `delta`, clamped.
    pub fn nudge_speed(&mut self, delta: f64) {
        self.set_speed(self.speed + delta);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.active
    }

    /// True once every note record has fired.
    pub fn is_finished(&self) -> bool {
        self.sequence
            .as_ref()
            .is_some_and(|s| self.cursor >= s.notes().len())
    }

    /// Advance the clock by `elapsed_ms * speed` and fire everything it
    /// reached. A no-op unless playing.
    pub fn tick(&mut self, elapsed_ms: f64) -> TickOutcome<'_> {
        let mut signals = Vec::new();
        if self.mode != PlaybackMode::Playing {
            return TickOutcome {
                signals,
                active: &self.active,
            };
        }
        let Some(sequence) = self.sequence.clone() else {
            return TickOutcome {
                signals,
                active: &self.active,
            };
        };

        // NaN, infinite and negative frames do not move the clock.
        if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            self.wall_ms += elapsed_ms;
            self.clock_ms = snap_to_micros(self.base_ms + self.wall_ms * self.speed);
        }

        let notes = sequence.notes();
        while let Some(record) = notes.get(self.cursor) {
            if f64::from(record.time_ms) > self.clock_ms {
                break;
            }
            self.cursor += 1;

            if record.is_on() && record.velocity > 0 {
                self.active.push(ActiveNote {
                    note: record.note,
                    velocity: record.velocity,
                    track: record.track,
                    onset_ms: record.time_ms,
                    started_at_ms: self.clock_ms,
                    status: ActiveStatus::Sounding,
                });
                signals.push(NoteSignal::Press {
                    note: record.note,
                    velocity: record.velocity,
                    track: record.track,
                });
            } else {
                if let Some(held) = self
                    .active
                    .iter_mut()
                    .find(|a| a.is_sounding() && a.note == record.note)
                {
                    held.status = ActiveStatus::Ended { at_ms: self.clock_ms };
                }
                signals.push(NoteSignal::Release {
                    note: record.note,
                    track: record.track,
                });
            }
        }

        let clock = self.clock_ms;
        let retention = self.config.retention_ms;
        self.active.retain(|a| match a.status {
            ActiveStatus::Sounding => true,
            ActiveStatus::Ended { at_ms } => clock - at_ms <= retention,
        });

        TickOutcome {
            signals,
            active: &self.active,
        }
    }
}
