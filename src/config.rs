//! Batch configuration: shared training and output settings plus a list
//! of corpus → output jobs, read from RON.
//!
//! ```ron
//! (
//!     tempo_aware: true,
//!     loop_back: true,
//!     seed: 7,
//!     midi: (tempo_bpm: 96),
//!     jobs: [
//!         (corpus: ["corpora/bach"], length: 200, output: "out/bach.mid"),
//!         (corpus: ["corpora/folk.txt"], output: "out/folk.txt", tempo_aware: Some(false)),
//!     ],
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::pipeline::{write_output, Composer, ComposerBuilder, ComposerError};
use crate::core::sampler::DeadEndPolicy;
use crate::io::discovery::DEFAULT_EXTENSIONS;
use crate::io::midi::MidiWriterConfig;
use crate::schema::symbol::TimedSymbol;

/// Output length used when a job does not name one.
pub const DEFAULT_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Extensions picked up when scanning corpus directories.
    pub extensions: Vec<String>,
    pub tempo_aware: bool,
    pub loop_back: bool,
    pub dead_end: DeadEndPolicy,
    pub seed: u64,
    /// Count transitions on the rayon pool.
    pub parallel: bool,
    pub midi: MidiWriterConfig,
    pub jobs: Vec<CompositionJob>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            tempo_aware: false,
            loop_back: false,
            dead_end: DeadEndPolicy::default(),
            seed: 0,
            parallel: false,
            midi: MidiWriterConfig::default(),
            jobs: Vec::new(),
        }
    }
}

/// One independent corpus → output run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionJob {
    /// Training files and directories.
    pub corpus: Vec<PathBuf>,
    #[serde(default = "default_length")]
    pub length: usize,
    /// `.txt` for text output, anything else is written as MIDI.
    pub output: PathBuf,
    /// Overrides the shared `tempo_aware` setting.
    #[serde(default)]
    pub tempo_aware: Option<bool>,
}

fn default_length() -> usize {
    DEFAULT_LENGTH
}

impl ComposerConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, ComposerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(contents: &str) -> Result<Self, ComposerError> {
        let config: Self = ron::from_str(contents)?;
        config.midi.validate()?;
        Ok(config)
    }

    /// A composer builder carrying the shared settings and the job's corpus.
    pub fn builder_for(&self, job: &CompositionJob) -> ComposerBuilder {
        Composer::builder()
            .corpus(&job.corpus)
            .extensions(&self.extensions)
            .tempo_aware(job.tempo_aware.unwrap_or(self.tempo_aware))
            .loop_back(self.loop_back)
            .parallel(self.parallel)
            .dead_end_policy(self.dead_end)
            .seed(self.seed)
    }

    /// Train on the job's corpus, compose and write the output file.
    pub fn run_job(&self, job: &CompositionJob) -> Result<Vec<TimedSymbol>, ComposerError> {
        let mut composer = self.builder_for(job).build()?;
        let events = composer.compose(job.length)?;
        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_output(&events, &job.output, &self.midi)?;
        Ok(events)
    }

    /// Run every job in order, stopping at the first failure.
    pub fn run_all(&self) -> Result<(), ComposerError> {
        for (i, job) in self.jobs.iter().enumerate() {
            info!(job = i, output = %job.output.display(), "running composition job");
            self.run_job(job)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ComposerConfig::parse_ron("()").unwrap();
        assert_eq!(config, ComposerConfig::default());
        assert_eq!(config.extensions, vec!["mid", "midi"]);
        assert_eq!(config.midi.ticks_per_quarter, 480);
    }

    #[test]
    fn parses_jobs_and_overrides() {
        let config = ComposerConfig::parse_ron(
            r#"(
                tempo_aware: true,
                dead_end: Truncate,
                seed: 9,
                midi: (tempo_bpm: 90),
                jobs: [
                    (corpus: ["a", "b.mid"], length: 12, output: "out.mid"),
                    (corpus: ["c.txt"], output: "out.txt", tempo_aware: Some(false)),
                ],
            )"#,
        )
        .unwrap();

        assert!(config.tempo_aware);
        assert_eq!(config.dead_end, DeadEndPolicy::Truncate);
        assert_eq!(config.midi.tempo_bpm, 90);
        assert_eq!(config.midi.velocity, 80);
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.jobs[0].length, 12);
        assert_eq!(config.jobs[1].length, DEFAULT_LENGTH);
        assert_eq!(config.jobs[1].tempo_aware, Some(false));
    }

    #[test]
    fn invalid_writer_settings_are_rejected() {
        let result = ComposerConfig::parse_ron("(midi: (velocity: 0))");
        assert!(matches!(result, Err(ComposerError::Midi(_))));
    }
}
