//! Pitch names and their mapping to MIDI key numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::symbol::SymbolError;

/// Semitone offset of each natural step above C.
const STEP_SEMITONES: [(char, i32); 7] = [
    ('C', 0),
    ('D', 2),
    ('E', 4),
    ('F', 5),
    ('G', 7),
    ('A', 9),
    ('B', 11),
];

/// Spelling used when naming a MIDI key. Flats use `-`, matching the
/// names most notation software writes for decoded MIDI.
const KEY_SPELLING: [&str; 12] = [
    "C", "C#", "D", "E-", "E", "F", "F#", "G", "G#", "A", "B-", "B",
];

/// A single pitch name such as `C4`, `F#3` or `E-5`.
///
/// The name is kept exactly as written so that symbols built from it
/// compare by spelling. `E-4` and `D#4` are different pitches here even
/// though they share a MIDI key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch(String);

impl Pitch {
    /// Validate and wrap a pitch name.
    ///
    /// Syntax: a step letter `A`-`G`, any number of accidentals (`#` sharp,
    /// `-` or `b` flat), then a non-negative octave number.
    pub fn new(name: &str) -> Result<Self, SymbolError> {
        parse_components(name)?;
        Ok(Self(name.to_string()))
    }

    /// Name a MIDI key. Keys below 12 would need a negative octave, which
    /// the name syntax cannot express, so they yield `None`.
    pub fn from_midi(key: u8) -> Option<Self> {
        if !(12..=127).contains(&key) {
            return None;
        }
        let octave = i32::from(key / 12) - 1;
        Some(Self(format!("{}{}", KEY_SPELLING[usize::from(key % 12)], octave)))
    }

    /// `C4`, MIDI key 60.
    pub fn middle_c() -> Self {
        Self("C4".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIDI key number of this pitch (`C4` = 60).
    pub fn midi_key(&self) -> Result<u8, SymbolError> {
        let (step, alter, octave) = parse_components(&self.0)?;
        octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|base| base.checked_add(step + alter))
            .and_then(|key| u8::try_from(key).ok())
            .filter(|k| *k <= 127)
            .ok_or_else(|| SymbolError::OutOfRange(self.0.clone()))
    }
}

/// Split a pitch name into (step semitone, accidental offset, octave).
fn parse_components(name: &str) -> Result<(i32, i32, i32), SymbolError> {
    let malformed = || SymbolError::MalformedSymbol(name.to_string());

    let mut chars = name.chars();
    let letter = chars.next().ok_or_else(malformed)?;
    let step = STEP_SEMITONES
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, s)| *s)
        .ok_or_else(malformed)?;

    let rest = chars.as_str();
    let octave_at = rest.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
    let (accidentals, octave) = rest.split_at(octave_at);

    let mut alter = 0;
    for c in accidentals.chars() {
        match c {
            '#' => alter += 1,
            '-' | 'b' => alter -= 1,
            _ => return Err(malformed()),
        }
    }

    if !octave.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    let octave: i32 = octave.parse().map_err(|_| malformed())?;

    Ok((step, alter, octave))
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pitch {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Pitch {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_components(&value)?;
        Ok(Self(value))
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.0
    }
}
