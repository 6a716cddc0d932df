//! Plain-text corpora and text rendering of generated sequences.
//!
//! Format: one training sequence per line, symbols separated by
//! whitespace. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! # minuet, right hand
//! D5@1 G4@1/2 A4@1/2 B4@1/2 C5@1/2 D5@1
//! C4.E4.G4 G4 E4
//! ```

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::schema::symbol::{Symbol, SymbolError, TimedSymbol, DURATION_SEPARATOR};

const COMMENT_PREFIX: char = '#';

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Symbol {
        line: usize,
        #[source]
        source: SymbolError,
    },
}

/// Parse a text corpus whose tokens all use the encoding of `S`.
pub fn parse_corpus<S>(text: &str) -> Result<Vec<Vec<S>>, CorpusError>
where
    S: FromStr<Err = SymbolError>,
{
    parse_lines(text, |token| token.parse())
}

/// Parse a text corpus into timed symbols. Tokens without a duration are
/// read as quarter notes, so untimed corpora load unchanged.
pub fn parse_timed_corpus(text: &str) -> Result<Vec<Vec<TimedSymbol>>, CorpusError> {
    parse_lines(text, |token| {
        if token.contains(DURATION_SEPARATOR) {
            token.parse()
        } else {
            token.parse::<Symbol>().map(TimedSymbol::quarter)
        }
    })
}

fn parse_lines<S>(
    text: &str,
    parse: impl Fn(&str) -> Result<S, SymbolError>,
) -> Result<Vec<Vec<S>>, CorpusError> {
    let mut sequences = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let sequence = trimmed
            .split_whitespace()
            .map(&parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CorpusError::Symbol { line: n + 1, source })?;
        sequences.push(sequence);
    }
    Ok(sequences)
}

/// Read a text corpus file into timed symbol sequences.
pub fn read_corpus_file(path: &Path) -> Result<Vec<Vec<TimedSymbol>>, CorpusError> {
    let text = std::fs::read_to_string(path)?;
    parse_timed_corpus(&text)
}

/// Render a sequence as one line of space-separated symbols, the same
/// encoding the corpus reader accepts.
pub fn render_text<S: fmt::Display>(symbols: &[S]) -> String {
    symbols
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_as_sequences() {
        let text = "# comment\nC4 E4 G4\n\n   \nC4.E4.G4 F#3\n";
        let corpus: Vec<Vec<Symbol>> = parse_corpus(text).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[0].len(), 3);
        assert!(corpus[1][0].is_chord());
        assert_eq!(corpus[1][1].to_string(), "F#3");
    }

    #[test]
    fn reports_line_of_malformed_symbol() {
        let text = "C4 E4\nC4 .. G4\n";
        match parse_corpus::<Symbol>(text) {
            Err(CorpusError::Symbol { line, source }) => {
                assert_eq!(line, 2);
                assert!(matches!(source, SymbolError::MalformedSymbol(_)));
            }
            other => panic!("expected a symbol error, got {:?}", other),
        }
    }

    #[test]
    fn timed_corpus_defaults_to_quarters() {
        let corpus = parse_timed_corpus("C4@1/2 E4 G4.B4@2").unwrap();
        let rendered = render_text(&corpus[0]);
        assert_eq!(rendered, "C4@1/2 E4@1 G4.B4@2");
    }

    #[test]
    fn strict_timed_parse_requires_durations() {
        assert!(parse_corpus::<TimedSymbol>("C4@1 E4").is_err());
    }
}
