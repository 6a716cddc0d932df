//! Vocabulary: the ordered set of distinct symbols a model indexes by.

use rustc_hash::FxHashMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::Hash;

use super::markov::MarkovError;

/// Distinct symbols in first-seen order plus a reverse index.
///
/// Positions are the row and column indices of the transition matrix.
/// Only the crate's counting code grows a vocabulary; a fitted model
/// exposes it read-only.
#[derive(Debug, Clone)]
pub struct Vocabulary<S> {
    symbols: Vec<S>,
    index: FxHashMap<S, usize>,
}

impl<S> Default for Vocabulary<S> {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<S: Clone + Eq + Hash> Vocabulary<S> {
    /// Rebuild a vocabulary from its ordered symbol list.
    pub fn from_symbols(symbols: Vec<S>) -> Result<Self, MarkovError> {
        let mut index = FxHashMap::default();
        for (i, symbol) in symbols.iter().enumerate() {
            if index.insert(symbol.clone(), i).is_some() {
                return Err(MarkovError::CorruptModel(format!(
                    "vocabulary repeats the symbol at index {}",
                    i
                )));
            }
        }
        Ok(Self { symbols, index })
    }

    /// Index of `symbol`, appending it if unseen.
    pub(crate) fn insert(&mut self, symbol: &S) -> usize {
        if let Some(&i) = self.index.get(symbol) {
            return i;
        }
        let i = self.symbols.len();
        self.symbols.push(symbol.clone());
        self.index.insert(symbol.clone(), i);
        i
    }

    pub fn index_of(&self, symbol: &S) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &S) -> bool {
        self.index.contains_key(symbol)
    }
}

impl<S> Vocabulary<S> {
    pub fn get(&self, index: usize) -> Option<&S> {
        self.symbols.get(index)
    }

    pub fn symbols(&self) -> &[S] {
        &self.symbols
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// Serialized as the plain symbol list; the index is rebuilt on load.
impl<S: Serialize> Serialize for Vocabulary<S> {
    fn serialize<Se: Serializer>(&self, serializer: Se) -> Result<Se::Ok, Se::Error> {
        self.symbols.serialize(serializer)
    }
}

impl<'de, S> Deserialize<'de> for Vocabulary<S>
where
    S: Deserialize<'de> + Clone + Eq + Hash,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbols = Vec::<S>::deserialize(deserializer)?;
        Self::from_symbols(symbols).map_err(D::Error::custom)
    }
}
