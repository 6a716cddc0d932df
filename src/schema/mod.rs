//! Symbolic music data model: pitches, chord symbols and timed events.

pub mod pitch;
pub mod symbol;
