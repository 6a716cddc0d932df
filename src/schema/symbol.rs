//! Sequence symbols: single pitches, chords and their timed variant.
//!
//! A chord is written as its member pitch names joined with `.`, so the
//! encoded form is lossless and can be split back into the same pitches.
//! Members are always stored lowest first without repeats, so `E4.C4` and
//! `C4.E4` are the same symbol.
//! Timed symbols append `@` and a duration in quarter notes (`C4.E4@3/2`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::pitch::Pitch;

/// Separator between chord members in the encoded form.
pub const CHORD_DELIMITER: char = '.';

/// Separator between a symbol and its duration in the timed encoding.
pub const DURATION_SEPARATOR: char = '@';

/// Longest decimal fraction accepted when parsing a duration.
const MAX_DECIMAL_DIGITS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("malformed symbol: {0:?}")]
    MalformedSymbol(String),
    #[error("malformed duration: {0:?}")]
    MalformedDuration(String),
    #[error("pitch {0} is outside the MIDI key range")]
    OutOfRange(String),
}

/// The atomic unit of a training or generated sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Symbol {
    /// A single sounding pitch.
    Note(Pitch),
    /// Two or more distinct pitches sounding together, lowest first.
    Chord(Vec<Pitch>),
}

impl Symbol {
    /// Build a symbol from the pitches that start together.
    ///
    /// Members are put in canonical order (ascending MIDI key, then name)
    /// and pitches sharing a MIDI key are merged, keeping the first spelling
    /// in that order. Equal pitch sets therefore give equal symbols whatever
    /// order they were written in. One remaining pitch makes a note.
    pub fn chord(pitches: Vec<Pitch>) -> Result<Self, SymbolError> {
        let mut keyed: Vec<(Option<u8>, Pitch)> = pitches
            .into_iter()
            .map(|pitch| (pitch.midi_key().ok(), pitch))
            .collect();
        keyed.sort_by(|a, b| (a.0, a.1.as_str()).cmp(&(b.0, b.1.as_str())));
        keyed.dedup_by(|later, earlier| match (later.0, earlier.0) {
            (Some(a), Some(b)) => a == b,
            _ => later.1 == earlier.1,
        });
        let pitches: Vec<Pitch> = keyed.into_iter().map(|(_, pitch)| pitch).collect();

        match pitches.len() {
            0 => Err(SymbolError::MalformedSymbol(String::new())),
            1 => Ok(Self::Note(pitches.into_iter().next().ok_or_else(|| {
                SymbolError::MalformedSymbol(String::new())
            })?)),
            _ => Ok(Self::Chord(pitches)),
        }
    }

    /// Member pitches: one for a note, all of them for a chord.
    pub fn pitches(&self) -> &[Pitch] {
        match self {
            Self::Note(pitch) => std::slice::from_ref(pitch),
            Self::Chord(pitches) => pitches,
        }
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, Self::Chord(_))
    }

    /// Pair this symbol with a duration.
    pub fn with_duration(self, duration: Duration) -> TimedSymbol {
        TimedSymbol {
            symbol: self,
            duration,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pitch) in self.pitches().iter().enumerate() {
            if i > 0 {
                write!(f, "{}", CHORD_DELIMITER)?;
            }
            f.write_str(pitch.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SymbolError::MalformedSymbol(String::new()));
        }
        let pitches = s
            .split(CHORD_DELIMITER)
            .map(Pitch::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SymbolError::MalformedSymbol(s.to_string()))?;
        Self::chord(pitches)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

/// An exact, reduced rational number of quarter notes.
///
/// Two durations are equal only when they denote the same number, which
/// keeps `1/3` and `0.333` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    numer: u32,
    denom: u32,
}

impl Duration {
    pub const QUARTER: Duration = Duration { numer: 1, denom: 1 };

    pub fn new(numer: u32, denom: u32) -> Result<Self, SymbolError> {
        if denom == 0 {
            return Err(SymbolError::MalformedDuration(format!("{}/{}", numer, denom)));
        }
        let divisor = gcd(u64::from(numer), u64::from(denom)) as u32;
        Ok(Self {
            numer: numer / divisor,
            denom: denom / divisor,
        })
    }

    /// Duration of `ticks` at a metrical resolution of `ticks_per_quarter`.
    pub fn from_ticks(ticks: u64, ticks_per_quarter: u16) -> Result<Self, SymbolError> {
        let malformed = || SymbolError::MalformedDuration(format!("{}/{}", ticks, ticks_per_quarter));
        if ticks_per_quarter == 0 {
            return Err(malformed());
        }
        let divisor = gcd(ticks, u64::from(ticks_per_quarter));
        let numer = u32::try_from(ticks / divisor).map_err(|_| malformed())?;
        let denom = u32::from(ticks_per_quarter) / divisor as u32;
        Self::new(numer, denom)
    }

    pub fn numer(&self) -> u32 {
        self.numer
    }

    pub fn denom(&self) -> u32 {
        self.denom
    }

    pub fn as_quarters(&self) -> f64 {
        f64::from(self.numer) / f64::from(self.denom)
    }

    /// Length in ticks at the given resolution, rounded to the nearest tick.
    pub fn to_ticks(&self, ticks_per_quarter: u16) -> u64 {
        let scaled = u64::from(self.numer) * u64::from(ticks_per_quarter);
        let denom = u64::from(self.denom);
        (2 * scaled + denom) / (2 * denom)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::QUARTER
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

impl FromStr for Duration {
    type Err = SymbolError;

    /// Accepts `3/2`, `2` or a decimal such as `0.25`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SymbolError::MalformedDuration(s.to_string());
        let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());

        if let Some((numer, denom)) = s.split_once('/') {
            if !digits(numer) || !digits(denom) {
                return Err(malformed());
            }
            let numer = numer.parse().map_err(|_| malformed())?;
            let denom = denom.parse().map_err(|_| malformed())?;
            return Self::new(numer, denom).map_err(|_| malformed());
        }

        if let Some((whole, fraction)) = s.split_once('.') {
            if !digits(whole) || !digits(fraction) || fraction.len() > MAX_DECIMAL_DIGITS {
                return Err(malformed());
            }
            let denom = 10u64.pow(fraction.len() as u32);
            let whole: u64 = whole.parse().map_err(|_| malformed())?;
            let fraction: u64 = fraction.parse().map_err(|_| malformed())?;
            let numer = whole
                .checked_mul(denom)
                .and_then(|w| w.checked_add(fraction))
                .ok_or_else(malformed)?;
            let divisor = gcd(numer, denom);
            let numer = u32::try_from(numer / divisor).map_err(|_| malformed())?;
            let denom = u32::try_from(denom / divisor).map_err(|_| malformed())?;
            return Self::new(numer, denom);
        }

        if !digits(s) {
            return Err(malformed());
        }
        Self::new(s.parse().map_err(|_| malformed())?, 1)
    }
}

impl TryFrom<String> for Duration {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Duration> for String {
    fn from(duration: Duration) -> Self {
        duration.to_string()
    }
}

/// A symbol paired with its duration; the pair is the atomic key of the
/// tempo-aware model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimedSymbol {
    pub symbol: Symbol,
    pub duration: Duration,
}

impl TimedSymbol {
    pub fn new(symbol: Symbol, duration: Duration) -> Self {
        Self { symbol, duration }
    }

    /// A symbol played for one quarter note.
    pub fn quarter(symbol: Symbol) -> Self {
        Self::new(symbol, Duration::QUARTER)
    }
}

impl From<Symbol> for TimedSymbol {
    fn from(symbol: Symbol) -> Self {
        Self::quarter(symbol)
    }
}

impl fmt::Display for TimedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.symbol, DURATION_SEPARATOR, self.duration)
    }
}

impl FromStr for TimedSymbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, duration) = s
            .split_once(DURATION_SEPARATOR)
            .ok_or_else(|| SymbolError::MalformedSymbol(s.to_string()))?;
        Ok(Self::new(symbol.parse()?, duration.parse()?))
    }
}

impl TryFrom<String> for TimedSymbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimedSymbol> for String {
    fn from(timed: TimedSymbol) -> Self {
        timed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pitches(names: &[&str]) -> Vec<Pitch> {
        names.iter().map(|n| Pitch::new(n).unwrap()).collect()
    }

    #[test]
    fn chord_splits_back_into_its_pitches() {
        let chord = Symbol::chord(pitches(&["C4", "E4", "G4"])).unwrap();
        let encoded = chord.to_string();
        assert_eq!(encoded, "C4.E4.G4");

        let mut members: Vec<&str> = encoded.split(CHORD_DELIMITER).collect();
        members.sort();
        assert_eq!(members, vec!["C4", "E4", "G4"]);

        let decoded: Symbol = encoded.parse().unwrap();
        assert_eq!(decoded, chord);
        assert!(decoded.is_chord());
    }

    #[test]
    fn single_member_chord_is_a_note() {
        let symbol = Symbol::chord(pitches(&["A3"])).unwrap();
        assert_eq!(symbol, Symbol::Note(Pitch::new("A3").unwrap()));
        assert_eq!("A3".parse::<Symbol>().unwrap(), symbol);
    }

    #[test]
    fn flats_are_not_mistaken_for_delimiters() {
        let symbol: Symbol = "E-4.B-4".parse().unwrap();
        assert_eq!(symbol.pitches().len(), 2);
        assert_eq!(symbol.pitches()[0].midi_key().unwrap(), 63);
    }

    #[test]
    fn member_order_does_not_matter() {
        let written: Symbol = "E4.C4".parse().unwrap();
        let sorted: Symbol = "C4.E4".parse().unwrap();
        assert_eq!(written, sorted);
        assert_eq!(written.to_string(), "C4.E4");

        let mut set = HashSet::new();
        set.insert(written);
        set.insert(sorted);
        set.insert("G4.E4.C4".parse::<Symbol>().unwrap());
        set.insert("C4.G4.E4".parse::<Symbol>().unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn repeated_members_are_merged() {
        let doubled: Symbol = "C4.C4".parse().unwrap();
        assert_eq!(doubled, Symbol::Note(Pitch::new("C4").unwrap()));
        assert_eq!("G4.C4.G4.E4".parse::<Symbol>().unwrap().to_string(), "C4.E4.G4");

        // Enharmonic spellings of one key sound as a single note.
        assert_eq!("E-4.D#4.G4".parse::<Symbol>().unwrap().to_string(), "D#4.G4");
    }

    #[test]
    fn malformed_symbols_are_rejected() {
        for bad in ["", ".", "C4.", ".C4", "C4..E4", "X4", "C4 E4"] {
            assert!(
                matches!(bad.parse::<Symbol>(), Err(SymbolError::MalformedSymbol(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
        assert!(Symbol::chord(Vec::new()).is_err());
    }

    #[test]
    fn durations_reduce_and_compare_exactly() {
        assert_eq!("2/4".parse::<Duration>().unwrap(), "1/2".parse().unwrap());
        assert_eq!("0.25".parse::<Duration>().unwrap(), Duration::new(1, 4).unwrap());
        assert_eq!("1.5".parse::<Duration>().unwrap().to_string(), "3/2");
        assert_eq!("2".parse::<Duration>().unwrap().to_string(), "2");
        assert_ne!("1/3".parse::<Duration>().unwrap(), "0.333".parse().unwrap());

        for bad in ["", "1/0", "a", "1/", "/2", "-1", "0.1234567891"] {
            assert!(bad.parse::<Duration>().is_err(), "expected {:?} to be rejected", bad);
        }
    }

    #[test]
    fn durations_convert_to_and_from_ticks() {
        let dotted = Duration::from_ticks(720, 480).unwrap();
        assert_eq!(dotted, Duration::new(3, 2).unwrap());
        assert_eq!(dotted.to_ticks(480), 720);
        assert_eq!(Duration::new(1, 3).unwrap().to_ticks(480), 160);
        assert_eq!(Duration::from_ticks(0, 480).unwrap().to_ticks(480), 0);
        assert!(Duration::from_ticks(10, 0).is_err());
    }

    #[test]
    fn timed_symbol_is_one_key() {
        let a: TimedSymbol = "C4@1".parse().unwrap();
        let b: TimedSymbol = "C4@1/2".parse().unwrap();
        let c = TimedSymbol::quarter("C4".parse().unwrap());

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(b.clone());
        set.insert(c);
        assert_eq!(set.len(), 2);
        assert_ne!(a, b);

        assert_eq!("C4.E4@3/2".parse::<TimedSymbol>().unwrap().to_string(), "C4.E4@3/2");
        assert!("C4".parse::<TimedSymbol>().is_err());
        assert!("@1".parse::<TimedSymbol>().is_err());
    }

    #[test]
    fn symbols_serialize_as_their_encoding() {
        let timed: TimedSymbol = "G3.B3.D4@1/2".parse().unwrap();
        let serialized = ron::to_string(&timed).unwrap();
        assert_eq!(serialized, "\"G3.B3.D4@1/2\"");

        let back: TimedSymbol = ron::from_str(&serialized).unwrap();
        assert_eq!(back, timed);

        assert!(ron::from_str::<Symbol>("\"C4..E4\"").is_err());
    }
}
