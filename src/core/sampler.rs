//! Random walks over a fitted model.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::markov::{ChainSymbol, MarkovError, MarkovModel};

/// What a walk does on reaching a symbol that never led anywhere in the
/// training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeadEndPolicy {
    /// Draw the next symbol from the initial distribution and keep going.
    #[default]
    Resample,
    /// Stop and return the shorter sequence generated so far.
    Truncate,
    /// Return `MarkovError::DeadEndState`.
    Fail,
}

impl fmt::Display for DeadEndPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resample => "resample",
            Self::Truncate => "truncate",
            Self::Fail => "fail",
        })
    }
}

impl FromStr for DeadEndPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resample" => Ok(Self::Resample),
            "truncate" => Ok(Self::Truncate),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown dead-end policy {:?} (expected resample, truncate or fail)",
                other
            )),
        }
    }
}

/// Generates sequences from a model. Borrowing the model keeps it shared
/// and read-only across any number of independent walks.
#[derive(Debug, Clone)]
pub struct Sampler<'m, S> {
    model: &'m MarkovModel<S>,
    dead_end: DeadEndPolicy,
}

impl<'m, S: ChainSymbol> Sampler<'m, S> {
    pub fn new(model: &'m MarkovModel<S>) -> Self {
        Self {
            model,
            dead_end: DeadEndPolicy::default(),
        }
    }

    pub fn dead_end_policy(mut self, policy: DeadEndPolicy) -> Self {
        self.dead_end = policy;
        self
    }

    /// Generate up to `length` symbols.
    ///
    /// The first symbol comes from the initial distribution; every later one
    /// from the transition row of its predecessor. Only `Truncate` can make
    /// the result shorter than `length`. Each draw consumes one `f64` from
    /// `rng`, so a fixed rng stream reproduces the output exactly.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<S>, MarkovError> {
        if length == 0 {
            return Err(MarkovError::EmptySequenceRequest);
        }
        let first = self.draw_initial(rng)?;
        self.walk(first, length, rng)
    }

    /// Generate up to `length` symbols, the first of which is `start`.
    pub fn generate_from<R: Rng + ?Sized>(
        &self,
        start: &S,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<S>, MarkovError> {
        if length == 0 {
            return Err(MarkovError::EmptySequenceRequest);
        }
        let first = self
            .model
            .vocabulary()
            .index_of(start)
            .ok_or_else(|| MarkovError::UnknownSymbol(start.to_string()))?;
        self.walk(first, length, rng)
    }

    /// Index of the symbol following `current`, or `None` at a dead end.
    /// Dead ends consume no draw.
    pub fn step<R: Rng + ?Sized>(&self, current: usize, rng: &mut R) -> Option<usize> {
        let row = self.model.cumulative_row(current)?;
        if self.model.is_dead_end(current) {
            return None;
        }
        search_cumulative(row, rng.gen())
    }

    fn walk<R: Rng + ?Sized>(
        &self,
        first: usize,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<S>, MarkovError> {
        let symbols = self.model.vocabulary().symbols();
        let mut walk = Vec::with_capacity(length);
        walk.push(symbols[first].clone());

        let mut current = first;
        while walk.len() < length {
            current = match self.step(current, rng) {
                Some(next) => next,
                None => match self.dead_end {
                    DeadEndPolicy::Resample => {
                        debug!(symbol = %symbols[current], position = walk.len(), "dead end, resampling");
                        self.draw_initial(rng)?
                    }
                    DeadEndPolicy::Truncate => {
                        debug!(symbol = %symbols[current], position = walk.len(), "dead end, truncating");
                        break;
                    }
                    DeadEndPolicy::Fail => {
                        return Err(MarkovError::DeadEndState(symbols[current].to_string()));
                    }
                },
            };
            walk.push(symbols[current].clone());
        }
        Ok(walk)
    }

    fn draw_initial<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, MarkovError> {
        search_cumulative(self.model.cumulative_initial(), rng.gen()).ok_or_else(|| {
            MarkovError::CorruptModel("initial distribution is empty".to_string())
        })
    }
}

/// Inverse-CDF lookup: the first index whose prefix sum exceeds `draw`,
/// for `draw` in `[0, 1)`. Entries with zero probability are never chosen.
/// Returns `None` for an all-zero array.
pub(crate) fn search_cumulative(cumulative: &[f64], draw: f64) -> Option<usize> {
    let total = *cumulative.last()?;
    if total <= 0.0 {
        return None;
    }
    let index = cumulative.partition_point(|&c| c <= draw);
    if index < cumulative.len() {
        Some(index)
    } else {
        // draw landed in the rounding gap just below 1.0
        Some(cumulative.partition_point(|&c| c < total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn search_skips_zero_probability_entries() {
        let cumulative = [0.0, 0.5, 0.5, 1.0];
        assert_eq!(search_cumulative(&cumulative, 0.0), Some(1));
        assert_eq!(search_cumulative(&cumulative, 0.49), Some(1));
        assert_eq!(search_cumulative(&cumulative, 0.5), Some(3));
        assert_eq!(search_cumulative(&cumulative, 0.999), Some(3));
    }

    #[test]
    fn search_handles_rounding_gap_and_empty_rows() {
        let short = [0.3, 0.999_999_999_9, 0.999_999_999_9];
        assert_eq!(search_cumulative(&short, 0.999_999_999_95), Some(1));
        assert_eq!(search_cumulative(&[0.0, 0.0], 0.2), None);
        assert_eq!(search_cumulative(&[], 0.2), None);
    }

    #[test]
    fn zero_length_is_rejected() {
        let model = MarkovModel::fit(&[vec!["A", "B"]]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            model.generate(0, &mut rng),
            Err(MarkovError::EmptySequenceRequest)
        ));
        assert!(matches!(
            Sampler::new(&model).generate_from(&"A", 0, &mut rng),
            Err(MarkovError::EmptySequenceRequest)
        ));
    }

    #[test]
    fn unknown_start_is_rejected() {
        let model = MarkovModel::fit(&[vec!["A", "B"]]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            Sampler::new(&model).generate_from(&"Z", 3, &mut rng),
            Err(MarkovError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn truncate_stops_at_dead_end() {
        let model = MarkovModel::fit(&[vec!["A", "B", "C"]]).unwrap();
        let sampler = Sampler::new(&model).dead_end_policy(DeadEndPolicy::Truncate);
        let mut rng = StdRng::seed_from_u64(3);
        let walk = sampler.generate_from(&"A", 10, &mut rng).unwrap();
        assert_eq!(walk, vec!["A", "B", "C"]);
    }

    #[test]
    fn fail_reports_the_dead_end() {
        let model = MarkovModel::fit(&[vec!["A", "B"]]).unwrap();
        let sampler = Sampler::new(&model).dead_end_policy(DeadEndPolicy::Fail);
        let mut rng = StdRng::seed_from_u64(3);
        match sampler.generate_from(&"A", 5, &mut rng) {
            Err(MarkovError::DeadEndState(symbol)) => assert_eq!(symbol, "B"),
            other => panic!("expected dead end, got {:?}", other),
        }
    }

    #[test]
    fn resample_always_fills_requested_length() {
        let model = MarkovModel::fit(&[vec!["A", "B", "C"], vec!["D"]]).unwrap();
        let sampler = Sampler::new(&model);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let walk = sampler.generate(25, &mut rng).unwrap();
            assert_eq!(walk.len(), 25);
            for pair in walk.windows(2) {
                // A is always followed by B and B by C; C and D are dead ends
                match pair[0] {
                    "A" => assert_eq!(pair[1], "B"),
                    "B" => assert_eq!(pair[1], "C"),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn same_seed_same_walk() {
        let model = MarkovModel::fit(&[
            vec!["C4", "E4", "G4", "E4", "C4"],
            vec!["G4", "G4", "A4", "G4", "E4"],
        ])
        .unwrap();
        let sampler = Sampler::new(&model);

        let first = sampler.generate(64, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = sampler.generate(64, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("Truncate".parse::<DeadEndPolicy>(), Ok(DeadEndPolicy::Truncate));
        assert_eq!(DeadEndPolicy::Fail.to_string(), "fail");
        assert!("stop".parse::<DeadEndPolicy>().is_err());
    }
}
