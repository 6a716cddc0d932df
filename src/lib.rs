//! Markov Composer: first-order Markov chain melody and harmony generation.
//!
//! Learns symbol-to-symbol transition probabilities from a corpus of MIDI
//! files or text transcriptions and samples new sequences from them.
//! Symbols are single pitches, chords, or pitch/chord-duration pairs.

pub mod config;
pub mod core;
pub mod io;
pub mod schema;
