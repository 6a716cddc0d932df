//! First-order Markov transition model: counting, normalization, inspection.
//!
//! Training counts how often every symbol occurs and how often each ordered
//! pair of adjacent symbols occurs, then turns the pair counts into a
//! row-normalized matrix stored as per-row prefix sums. The overall symbol
//! frequencies become the initial distribution used to pick the first
//! symbol of a generated sequence.

use rand::Rng;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info};

use super::sampler::Sampler;
use super::vocabulary::Vocabulary;

/// Tolerance used when checking that prefix sums end at 1.0.
pub const PROBABILITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("training corpus contains no symbols")]
    EmptyCorpus,
    #[error("requested sequence length must be at least 1")]
    EmptySequenceRequest,
    #[error("reached dead-end state {0} with no outgoing transitions")]
    DeadEndState(String),
    #[error("symbol {0} is not in the model vocabulary")]
    UnknownSymbol(String),
    #[error("corrupt model: {0}")]
    CorruptModel(String),
}

/// Anything a chain can be trained over: hashable, cloneable and printable
/// for diagnostics.
pub trait ChainSymbol: Clone + Eq + Hash + fmt::Display {}

impl<T: Clone + Eq + Hash + fmt::Display> ChainSymbol for T {}

/// Raw occurrence and adjacent-pair counts gathered from training sequences.
///
/// Counts from disjoint parts of a corpus can be merged; merging in corpus
/// order yields exactly the counts of a single sequential pass.
#[derive(Debug, Clone)]
pub struct TransitionCounts<S> {
    vocabulary: Vocabulary<S>,
    occurrences: Vec<u64>,
    pairs: FxHashMap<(usize, usize), u64>,
    sequences: usize,
}

impl<S> Default for TransitionCounts<S> {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            occurrences: Vec::new(),
            pairs: FxHashMap::default(),
            sequences: 0,
        }
    }
}

impl<S: ChainSymbol> TransitionCounts<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one training sequence. Pairs never span two sequences.
    pub fn observe(&mut self, sequence: &[S]) {
        self.sequences += 1;
        let mut previous: Option<usize> = None;
        for symbol in sequence {
            let current = self.intern(symbol);
            self.occurrences[current] += 1;
            if let Some(previous) = previous {
                *self.pairs.entry((previous, current)).or_insert(0) += 1;
            }
            previous = Some(current);
        }
    }

    /// Fold `other` into these counts, appending its unseen symbols after
    /// ours in its own first-seen order.
    pub fn merge(mut self, other: Self) -> Self {
        let remap: Vec<usize> = other
            .vocabulary
            .iter()
            .map(|symbol| self.intern(symbol))
            .collect();

        for (i, count) in other.occurrences.iter().enumerate() {
            self.occurrences[remap[i]] += count;
        }
        for ((from, to), count) in other.pairs {
            *self.pairs.entry((remap[from], remap[to])).or_insert(0) += count;
        }
        self.sequences += other.sequences;
        self
    }

    fn intern(&mut self, symbol: &S) -> usize {
        let index = self.vocabulary.insert(symbol);
        if index == self.occurrences.len() {
            self.occurrences.push(0);
        }
        index
    }

    pub fn vocabulary(&self) -> &Vocabulary<S> {
        &self.vocabulary
    }

    /// Number of sequences observed, empty ones included.
    pub fn sequences(&self) -> usize {
        self.sequences
    }

    pub fn total_occurrences(&self) -> u64 {
        self.occurrences.iter().sum()
    }

    pub fn occurrences_of(&self, symbol: &S) -> u64 {
        self.vocabulary
            .index_of(symbol)
            .map_or(0, |i| self.occurrences[i])
    }

    pub fn pair_count(&self, from: &S, to: &S) -> u64 {
        match (self.vocabulary.index_of(from), self.vocabulary.index_of(to)) {
            (Some(from), Some(to)) => self.pairs.get(&(from, to)).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Normalize the counts into a model.
    pub fn into_model(self) -> Result<MarkovModel<S>, MarkovError> {
        let n = self.vocabulary.len();
        if n == 0 {
            return Err(MarkovError::EmptyCorpus);
        }

        let mut transitions = vec![vec![0.0f64; n]; n];
        for (&(from, to), &count) in &self.pairs {
            transitions[from][to] = count as f64;
        }

        let mut dead_ends = 0usize;
        for row in &mut transitions {
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                for cell in row.iter_mut() {
                    *cell /= total;
                }
            } else {
                dead_ends += 1;
            }
            accumulate(row);
        }

        let total = self.total_occurrences() as f64;
        let mut initial: Vec<f64> = self
            .occurrences
            .iter()
            .map(|&count| count as f64 / total)
            .collect();
        accumulate(&mut initial);

        info!(
            vocabulary = n,
            sequences = self.sequences,
            symbols = self.total_occurrences(),
            distinct_pairs = self.pairs.len(),
            dead_ends,
            "fitted transition model"
        );

        Ok(MarkovModel {
            vocabulary: self.vocabulary,
            transitions,
            initial,
        })
    }
}

/// In-place prefix sums.
fn accumulate(values: &mut [f64]) {
    let mut running = 0.0;
    for value in values.iter_mut() {
        running += *value;
        *value = running;
    }
}

/// Undo `accumulate`.
fn differences(cumulative: &[f64]) -> Vec<f64> {
    let mut previous = 0.0;
    cumulative
        .iter()
        .map(|&c| {
            let p = c - previous;
            previous = c;
            p
        })
        .collect()
}

/// A fitted first-order Markov model over symbols of type `S`.
///
/// Holds the vocabulary, the cumulative transition matrix (one prefix-sum
/// row per vocabulary entry; all-zero rows are dead ends) and the
/// cumulative initial distribution. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize",
    deserialize = "S: Deserialize<'de> + Clone + Eq + Hash"
))]
pub struct MarkovModel<S> {
    vocabulary: Vocabulary<S>,
    transitions: Vec<Vec<f64>>,
    initial: Vec<f64>,
}

impl<S: ChainSymbol> MarkovModel<S> {
    /// Fit a model to training sequences, one per source file.
    ///
    /// Empty sequences are allowed; a corpus without any symbol fails with
    /// `EmptyCorpus`.
    pub fn fit<Q: AsRef<[S]>>(sequences: &[Q]) -> Result<Self, MarkovError> {
        let mut counts = TransitionCounts::new();
        for sequence in sequences {
            counts.observe(sequence.as_ref());
        }
        counts.into_model()
    }

    /// Same result as `fit`, with per-sequence counting spread over the
    /// rayon pool. Partial counts are merged in corpus order.
    pub fn fit_parallel<Q>(sequences: &[Q]) -> Result<Self, MarkovError>
    where
        Q: AsRef<[S]> + Sync,
        S: Send + Sync,
    {
        debug!(sequences = sequences.len(), "counting transitions in parallel");
        let counts = sequences
            .par_iter()
            .map(|sequence| {
                let mut counts = TransitionCounts::new();
                counts.observe(sequence.as_ref());
                counts
            })
            .reduce(TransitionCounts::new, TransitionCounts::merge);
        counts.into_model()
    }

    /// Generate `length` symbols with the default dead-end policy.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<S>, MarkovError> {
        Sampler::new(self).generate(length, rng)
    }

    /// Probability of moving from `from` to `to`; zero for unknown symbols.
    pub fn probability(&self, from: &S, to: &S) -> f64 {
        match (self.vocabulary.index_of(from), self.vocabulary.index_of(to)) {
            (Some(from), Some(to)) => {
                let row = &self.transitions[from];
                let below = if to == 0 { 0.0 } else { row[to - 1] };
                row[to] - below
            }
            _ => 0.0,
        }
    }

    /// Share of all training occurrences that were `symbol`.
    pub fn initial_probability(&self, symbol: &S) -> f64 {
        self.vocabulary.index_of(symbol).map_or(0.0, |i| {
            let below = if i == 0 { 0.0 } else { self.initial[i - 1] };
            self.initial[i] - below
        })
    }

    /// Symbols with no recorded outgoing transition.
    pub fn dead_ends(&self) -> impl Iterator<Item = &S> + '_ {
        self.vocabulary
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_dead_end(*i))
            .map(|(_, symbol)| symbol)
    }
}

impl<S> MarkovModel<S> {
    pub fn vocabulary(&self) -> &Vocabulary<S> {
        &self.vocabulary
    }

    /// Cumulative initial distribution, one entry per vocabulary symbol.
    pub fn cumulative_initial(&self) -> &[f64] {
        &self.initial
    }

    /// Cumulative transition row for the symbol at `index`.
    pub fn cumulative_row(&self, index: usize) -> Option<&[f64]> {
        self.transitions.get(index).map(Vec::as_slice)
    }

    /// Non-cumulative transition probabilities out of the symbol at `index`.
    pub fn transition_row(&self, index: usize) -> Option<Vec<f64>> {
        self.cumulative_row(index).map(differences)
    }

    /// Non-cumulative initial distribution.
    pub fn initial_distribution(&self) -> Vec<f64> {
        differences(&self.initial)
    }

    /// Whether the symbol at `index` has no outgoing transitions.
    pub fn is_dead_end(&self, index: usize) -> bool {
        self.transitions
            .get(index)
            .and_then(|row| row.last())
            .map_or(true, |&total| total <= 0.0)
    }

    /// Check the structural invariants of a model read from outside.
    pub fn validate(&self) -> Result<(), MarkovError> {
        let n = self.vocabulary.len();
        let corrupt = |msg: String| Err(MarkovError::CorruptModel(msg));

        if n == 0 {
            return corrupt("empty vocabulary".to_string());
        }
        if self.initial.len() != n {
            return corrupt(format!(
                "initial distribution has {} entries for {} symbols",
                self.initial.len(),
                n
            ));
        }
        if self.transitions.len() != n {
            return corrupt(format!("transition matrix has {} rows for {} symbols", self.transitions.len(), n));
        }

        check_cumulative(&self.initial, false).map_err(|e| {
            MarkovError::CorruptModel(format!("initial distribution {}", e))
        })?;
        for (i, row) in self.transitions.iter().enumerate() {
            if row.len() != n {
                return corrupt(format!("transition row {} has {} columns", i, row.len()));
            }
            check_cumulative(row, true)
                .map_err(|e| MarkovError::CorruptModel(format!("transition row {} {}", i, e)))?;
        }
        Ok(())
    }

    /// Write the non-cumulative transition matrix as CSV, with the
    /// vocabulary as header row and first column.
    pub fn write_matrix_csv<W: Write>(&self, out: &mut W) -> io::Result<()>
    where
        S: fmt::Display,
    {
        write!(out, "from")?;
        for symbol in self.vocabulary.iter() {
            write!(out, ",{}", csv_field(&symbol.to_string()))?;
        }
        writeln!(out)?;

        for (symbol, row) in self.vocabulary.iter().zip(&self.transitions) {
            write!(out, "{}", csv_field(&symbol.to_string()))?;
            for p in differences(row) {
                write!(out, ",{}", p)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// A valid prefix-sum array is finite, non-decreasing from zero, and ends
/// at 1.0 (or at 0.0 when `allow_empty`).
fn check_cumulative(values: &[f64], allow_empty: bool) -> Result<(), String> {
    let mut previous = 0.0;
    for &value in values {
        if !value.is_finite() {
            return Err("contains a non-finite value".to_string());
        }
        if value < previous - PROBABILITY_EPSILON {
            return Err("is not non-decreasing".to_string());
        }
        previous = value;
    }
    let last = values.last().copied().unwrap_or(0.0);
    if (last - 1.0).abs() <= 1e-6 || (allow_empty && last == 0.0) {
        Ok(())
    } else {
        Err(format!("ends at {} instead of 1.0", last))
    }
}

fn csv_field(field: &str) -> String {
    if field.contains(|c| matches!(c, ',' | '"' | '\n')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
