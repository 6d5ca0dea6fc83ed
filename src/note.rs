// src/note.rs
//
// Pitch identifiers and the equal-tempered frequency mapping.

use std::fmt;

use serde::Serialize;

use crate::error::NoteOutOfRange;

/// Lowest playable note (C3).
pub const LOWEST_NOTE: u8 = 48;

/// Highest playable note (C6).
pub const HIGHEST_NOTE: u8 = 84;

const A4_NOTE: f64 = 69.0;
const A4_FREQUENCY: f64 = 440.0;

const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A MIDI-style pitch id, guaranteed to lie in `LOWEST_NOTE..=HIGHEST_NOTE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Note(u8);

impl Note {
    pub fn new(id: i64) -> Result<Self, NoteOutOfRange> {
        if (LOWEST_NOTE as i64..=HIGHEST_NOTE as i64).contains(&id) {
            Ok(Self(id as u8))
        } else {
            Err(NoteOutOfRange {
                note: id,
                lowest: LOWEST_NOTE,
                highest: HIGHEST_NOTE,
            })
        }
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn frequency(self) -> f64 {
        frequency_of(self.0)
    }
}

impl TryFrom<u8> for Note {
    type Error = NoteOutOfRange;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id as i64)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = (self.0 / 12) as i32 - 1;
        write!(f, "{}{}", NAMES[(self.0 % 12) as usize], octave)
    }
}

/// Equal-tempered frequency in Hz: `440 * 2^((note - 69) / 12)`.
pub fn frequency_of(note: u8) -> f64 {
    A4_FREQUENCY * 2f64.powf((note as f64 - A4_NOTE) / 12.0)
}
