//! Corpus shaping applied to training sequences before fitting.

use crate::schema::pitch::Pitch;
use crate::schema::symbol::{Symbol, TimedSymbol};

/// Closes every training sequence into a loop: appends a fixed sentinel
/// event and then a repeat of the sequence's first event.
///
/// The model learns `last → sentinel → first` for every source, so walks
/// that reach the end of a piece can wander back to a piece opening
/// instead of stopping at a dead end. Empty sequences are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopBack<S> {
    sentinel: S,
}

impl<S: Clone> LoopBack<S> {
    pub fn new(sentinel: S) -> Self {
        Self { sentinel }
    }

    pub fn sentinel(&self) -> &S {
        &self.sentinel
    }

    pub fn apply(&self, sequences: &mut [Vec<S>]) {
        for sequence in sequences.iter_mut() {
            if let Some(first) = sequence.first().cloned() {
                sequence.push(self.sentinel.clone());
                sequence.push(first);
            }
        }
    }
}

impl Default for LoopBack<Symbol> {
    /// A `C4` note.
    fn default() -> Self {
        Self::new(Symbol::Note(Pitch::middle_c()))
    }
}

impl Default for LoopBack<TimedSymbol> {
    /// A `C4` quarter note.
    fn default() -> Self {
        Self::new(TimedSymbol::quarter(Symbol::Note(Pitch::middle_c())))
    }
}
