//! 88-key keyboard state driven by scheduler signals.

use serde::{Deserialize, Serialize};

use super::scheduler::NoteSignal;

/// A0
pub const FIRST_KEY: u8 = 21;
/// C8
pub const LAST_KEY: u8 = 108;
pub const KEY_COUNT: usize = (LAST_KEY - FIRST_KEY + 1) as usize;

/// Pressed/released state of a piano keyboard.
///
/// Notes outside A0..=C8 have no key and are ignored.
#[derive(Debug, Clone)]
pub struct KeyboardState {
    pressed: [bool; KEY_COUNT],
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState {
    pub fn new() -> Self {
        Self {
            pressed: [false; KEY_COUNT],
        }
    }

    fn index(note: u8) -> Option<usize> {
        (FIRST_KEY..=LAST_KEY)
            .contains(&note)
            .then(|| usize::from(note - FIRST_KEY))
    }

    pub fn press(&mut self, note: u8) {
        if let Some(i) = Self::index(note) {
            self.pressed[i] = true;
        }
    }

    pub fn release(&mut self, note: u8) {
        if let Some(i) = Self::index(note) {
            self.pressed[i] = false;
        }
    }

    pub fn apply(&mut self, signal: &NoteSignal) {
        match signal {
            NoteSignal::Press { note, .. } => self.press(*note),
            NoteSignal::Release { note, .. } => self.release(*note),
        }
    }

    pub fn release_all(&mut self) {
        self.pressed = [false; KEY_COUNT];
    }

    pub fn is_pressed(&self, note: u8) -> bool {
        Self::index(note).is_some_and(|i| self.pressed[i])
    }

    /// MIDI numbers of the held keys, low to high.
    pub fn pressed_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.pressed
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(i, _)| FIRST_KEY + i as u8)
    }
}

/// Loudness band a renderer colors a note by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intensity {
    Soft,
    Medium,
    Loud,
}

impl Intensity {
    pub fn from_velocity(velocity: u8) -> Self {
        let level = f32::from(velocity.min(127)) / 127.0;
        if level < 0.33 {
            Intensity::Soft
        } else if level < 0.66 {
            Intensity::Medium
        } else {
            Intensity::Loud
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_range() {
        assert_eq!(KEY_COUNT, 88);
        let mut keys = KeyboardState::new();
        keys.press(20);
        keys.press(109);
        assert_eq!(keys.pressed_notes().count(), 0);
        keys.press(21);
        keys.press(108);
        assert_eq!(keys.pressed_notes().collect::<Vec<_>>(), vec![21, 108]);
    }

    #[test]
    fn test_apply_signals() {
        let mut keys = KeyboardState::new();
        keys.apply(&NoteSignal::Press {
            note: 60,
            velocity: 90,
            track: 0,
        });
        assert!(keys.is_pressed(60));
        keys.apply(&NoteSignal::Release { note: 60, track: 0 });
        assert!(!keys.is_pressed(60));
        assert!(!keys.is_pressed(0));
    }

    #[test]
    fn test_release_all() {
        let mut keys = KeyboardState::new();
        for note in [48, 52, 55] {
            keys.press(note);
        }
        keys.release_all();
        assert_eq!(keys.pressed_notes().count(), 0);
    }

    #[test]
    fn test_intensity_bands() {
        assert_eq!(Intensity::from_velocity(0), Intensity::Soft);
        assert_eq!(Intensity::from_velocity(41), Intensity::Soft);
        assert_eq!(Intensity::from_velocity(42), Intensity::Medium);
        assert_eq!(Intensity::from_velocity(83), Intensity::Medium);
        assert_eq!(Intensity::from_velocity(84), Intensity::Loud);
        assert_eq!(Intensity::from_velocity(127), Intensity::Loud);
    }
}
