//! The composer pipeline: training files → fitted model → generated events.
//!
//! Wires together file discovery, MIDI/text ingest, optional loop-back
//! shaping, model fitting, sampling and output emission.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::corpus::LoopBack;
use crate::core::markov::{MarkovError, MarkovModel};
use crate::core::sampler::{DeadEndPolicy, Sampler};
use crate::io::discovery::{discover_training_files, has_extension, DEFAULT_EXTENSIONS};
use crate::io::midi::{read_midi_file, write_midi, MidiError, MidiWriterConfig};
use crate::io::text::{read_corpus_file, render_text, CorpusError};
use crate::schema::symbol::{Symbol, SymbolError, TimedSymbol};

/// Version written into model files by `save_model`.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Extension that marks a training or output file as plain text.
const TEXT_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("markov error: {0}")]
    Markov(#[from] MarkovError),
    #[error("MIDI error: {0}")]
    Midi(#[from] MidiError),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("symbol error: {0}")]
    Symbol(#[from] SymbolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("unsupported model file version {0}")]
    UnsupportedVersion(u32),
    #[error("no training files found")]
    NoTrainingFiles,
}

/// A fitted model over either symbol space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    /// Pitches and chords only; every generated event is a quarter note.
    Pitch(MarkovModel<Symbol>),
    /// (pitch-or-chord, duration) pairs.
    Timed(MarkovModel<TimedSymbol>),
}

impl TrainedModel {
    /// Fit a model to timed training sequences. Durations are dropped
    /// unless `options.tempo_aware` is set.
    pub fn train(
        sequences: Vec<Vec<TimedSymbol>>,
        options: &TrainingOptions,
    ) -> Result<Self, MarkovError> {
        if options.tempo_aware {
            let mut sequences = sequences;
            if options.loop_back {
                LoopBack::<TimedSymbol>::default().apply(&mut sequences);
            }
            fit(&sequences, options.parallel).map(Self::Timed)
        } else {
            let mut sequences: Vec<Vec<Symbol>> = sequences
                .into_iter()
                .map(|seq| seq.into_iter().map(|event| event.symbol).collect())
                .collect();
            if options.loop_back {
                LoopBack::<Symbol>::default().apply(&mut sequences);
            }
            fit(&sequences, options.parallel).map(Self::Pitch)
        }
    }

    /// Generate up to `length` events. Pitch-only models yield quarter notes.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        dead_end: DeadEndPolicy,
        rng: &mut R,
    ) -> Result<Vec<TimedSymbol>, MarkovError> {
        match self {
            Self::Pitch(model) => Ok(Sampler::new(model)
                .dead_end_policy(dead_end)
                .generate(length, rng)?
                .into_iter()
                .map(TimedSymbol::quarter)
                .collect()),
            Self::Timed(model) => Sampler::new(model)
                .dead_end_policy(dead_end)
                .generate(length, rng),
        }
    }

    pub fn is_tempo_aware(&self) -> bool {
        matches!(self, Self::Timed(_))
    }

    pub fn vocabulary_len(&self) -> usize {
        match self {
            Self::Pitch(model) => model.vocabulary().len(),
            Self::Timed(model) => model.vocabulary().len(),
        }
    }

    pub fn dead_end_count(&self) -> usize {
        match self {
            Self::Pitch(model) => model.dead_ends().count(),
            Self::Timed(model) => model.dead_ends().count(),
        }
    }

    pub fn validate(&self) -> Result<(), MarkovError> {
        match self {
            Self::Pitch(model) => model.validate(),
            Self::Timed(model) => model.validate(),
        }
    }

    pub fn write_matrix_csv<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self {
            Self::Pitch(model) => model.write_matrix_csv(out),
            Self::Timed(model) => model.write_matrix_csv(out),
        }
    }
}

fn fit<S>(sequences: &[Vec<S>], parallel: bool) -> Result<MarkovModel<S>, MarkovError>
where
    S: crate::core::markov::ChainSymbol + Send + Sync,
{
    if parallel {
        MarkovModel::fit_parallel(sequences)
    } else {
        MarkovModel::fit(sequences)
    }
}

/// How training sequences become a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingOptions {
    pub tempo_aware: bool,
    pub loop_back: bool,
    pub parallel: bool,
}

#[derive(Serialize)]
struct ModelFileRef<'a> {
    version: u32,
    model: &'a TrainedModel,
}

#[derive(Deserialize)]
struct ModelFile {
    version: u32,
    model: TrainedModel,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

/// Serialize a model to a RON file.
pub fn save_model(model: &TrainedModel, path: &Path) -> Result<(), ComposerError> {
    let file = ModelFileRef {
        version: MODEL_FORMAT_VERSION,
        model,
    };
    let serialized = ron::ser::to_string_pretty(&file, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, serialized)?;
    info!(path = %path.display(), "saved model");
    Ok(())
}

/// Load and validate a model from a RON file.
pub fn load_model(path: &Path) -> Result<TrainedModel, ComposerError> {
    let contents = std::fs::read_to_string(path)?;
    parse_model(&contents)
}

/// Parse and validate a model from RON text.
pub fn parse_model(contents: &str) -> Result<TrainedModel, ComposerError> {
    let file: ModelFile = match ron::from_str(contents) {
        Ok(file) => file,
        Err(err) => {
            // A newer layout may not parse at all; report its version instead.
            if let Ok(header) = ron::from_str::<VersionHeader>(contents) {
                if header.version != MODEL_FORMAT_VERSION {
                    return Err(ComposerError::UnsupportedVersion(header.version));
                }
            }
            return Err(err.into());
        }
    };
    if file.version != MODEL_FORMAT_VERSION {
        return Err(ComposerError::UnsupportedVersion(file.version));
    }
    file.model.validate()?;
    Ok(file.model)
}

/// Read one training file. Text corpora (`.txt`) may hold many sequences,
/// one per line; a MIDI file is a single sequence.
pub fn read_training_file(path: &Path) -> Result<Vec<Vec<TimedSymbol>>, ComposerError> {
    if has_extension(path, &[TEXT_EXTENSION]) {
        Ok(read_corpus_file(path)?)
    } else {
        Ok(vec![read_midi_file(path)?])
    }
}

/// Discover and read every training file under `inputs`.
pub fn ingest_corpus<P: AsRef<Path>, E: AsRef<str>>(
    inputs: &[P],
    extensions: &[E],
) -> Result<Vec<Vec<TimedSymbol>>, ComposerError> {
    let files = discover_training_files(inputs, extensions)?;
    if files.is_empty() {
        return Err(ComposerError::NoTrainingFiles);
    }

    let mut sequences = Vec::new();
    for file in &files {
        let read = read_training_file(file)?;
        let events: usize = read.iter().map(Vec::len).sum();
        if events == 0 {
            warn!(file = %file.display(), "training file contains no notes");
        }
        debug!(file = %file.display(), sequences = read.len(), events, "ingested training file");
        sequences.extend(read);
    }
    info!(files = files.len(), sequences = sequences.len(), "ingested corpus");
    Ok(sequences)
}

/// Write generated events: plain text for `.txt` paths, MIDI otherwise.
pub fn write_output(
    events: &[TimedSymbol],
    path: &Path,
    midi: &MidiWriterConfig,
) -> Result<(), ComposerError> {
    if has_extension(path, &[TEXT_EXTENSION]) {
        let mut line = render_text(events);
        line.push('\n');
        std::fs::write(path, line)?;
    } else {
        write_midi(events, midi, path)?;
    }
    info!(path = %path.display(), events = events.len(), "wrote composition");
    Ok(())
}

/// A trained model plus the settings used to draw from it. Built via
/// `Composer::builder()`.
#[derive(Debug, Clone)]
pub struct Composer {
    model: TrainedModel,
    dead_end: DeadEndPolicy,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `Composer`.
#[derive(Debug, Clone)]
pub struct ComposerBuilder {
    corpus: Vec<PathBuf>,
    extensions: Vec<String>,
    options: TrainingOptions,
    dead_end: DeadEndPolicy,
    seed: u64,
    /// Directly provided sequences (for use without files).
    sequences: Option<Vec<Vec<TimedSymbol>>>,
    /// A model fitted or loaded elsewhere.
    model: Option<TrainedModel>,
}

impl Composer {
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder {
            corpus: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            options: TrainingOptions::default(),
            dead_end: DeadEndPolicy::default(),
            seed: 0,
            sequences: None,
            model: None,
        }
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn into_model(self) -> TrainedModel {
        self.model
    }

    /// Generate up to `length` events.
    ///
    /// Each call draws from a fresh rng seeded with the composer seed plus
    /// the number of earlier calls, so consecutive pieces differ while a
    /// whole run stays reproducible.
    pub fn compose(&mut self, length: usize) -> Result<Vec<TimedSymbol>, ComposerError> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.generation_count));
        let events = self.compose_with(length, &mut rng)?;
        self.generation_count += 1;
        Ok(events)
    }

    /// Generate with a caller-supplied randomness source.
    pub fn compose_with<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<TimedSymbol>, ComposerError> {
        Ok(self.model.generate(length, self.dead_end, rng)?)
    }
}

impl ComposerBuilder {
    /// Training files and directories.
    pub fn corpus<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        self.corpus = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Extensions picked up when scanning corpus directories.
    pub fn extensions<E: AsRef<str>>(mut self, extensions: &[E]) -> Self {
        self.extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    /// Provide training sequences directly (for use without files).
    pub fn with_sequences(mut self, sequences: Vec<Vec<TimedSymbol>>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    /// Use an already fitted model; no corpus is read.
    pub fn with_model(mut self, model: TrainedModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tempo_aware(mut self, tempo_aware: bool) -> Self {
        self.options.tempo_aware = tempo_aware;
        self
    }

    pub fn loop_back(mut self, loop_back: bool) -> Self {
        self.options.loop_back = loop_back;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.options.parallel = parallel;
        self
    }

    pub fn dead_end_policy(mut self, policy: DeadEndPolicy) -> Self {
        self.dead_end = policy;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<Composer, ComposerError> {
        let model = match self.model {
            Some(model) => {
                model.validate()?;
                model
            }
            None => {
                let sequences = match self.sequences {
                    Some(sequences) => sequences,
                    None => ingest_corpus(&self.corpus, &self.extensions)?,
                };
                TrainedModel::train(sequences, &self.options)?
            }
        };

        info!(
            tempo_aware = model.is_tempo_aware(),
            vocabulary = model.vocabulary_len(),
            dead_ends = model.dead_end_count(),
            "composer ready"
        );

        Ok(Composer {
            model,
            dead_end: self.dead_end,
            seed: self.seed,
            generation_count: 0,
        })
    }
}
