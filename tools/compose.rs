/// Compose: generates pieces from a saved model or runs a batch config.
///
/// Usage: compose --model <model.ron> --output <piece.mid|piece.txt> [--length <n>]
///        [--seed <n>] [--dead-end resample|truncate|fail] [--print] [--verbose]
///    or: compose --config <jobs.ron> [--verbose]
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::filter::LevelFilter;

use markov_composer::config::{ComposerConfig, DEFAULT_LENGTH};
use markov_composer::core::pipeline::{load_model, write_output, Composer};
use markov_composer::core::sampler::DeadEndPolicy;
use markov_composer::io::midi::MidiWriterConfig;
use markov_composer::io::text::render_text;

#[derive(Debug, Parser)]
#[command(name = "compose", version, about = "Generate music from a trained Markov model")]
struct Cli {
    /// Saved model (from corpus_trainer)
    #[arg(short, long, conflicts_with = "config", required_unless_present = "config")]
    model: Option<PathBuf>,

    /// Batch configuration listing corpus → output jobs
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of events to generate
    #[arg(short, long, default_value_t = DEFAULT_LENGTH)]
    length: usize,

    /// RNG seed (same seed => same piece)
    #[arg(long, default_value_t = 0u64)]
    seed: u64,

    /// Output path; `.txt` writes text, anything else MIDI
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do at a symbol with no recorded successor
    #[arg(long, default_value_t = DeadEndPolicy::Resample)]
    dead_end: DeadEndPolicy,

    /// Tempo of the written MIDI file
    #[arg(long, default_value_t = 120u32)]
    bpm: u32,

    /// Print the generated symbols to stdout
    #[arg(long)]
    print: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    prepare_logging(cli.verbose);

    if let Some(path) = &cli.config {
        let config = ComposerConfig::load_from_ron(path).unwrap_or_else(|e| {
            eprintln!("Error loading config '{}': {}", path.display(), e);
            process::exit(1);
        });
        if config.jobs.is_empty() {
            eprintln!("Config '{}' lists no jobs", path.display());
            process::exit(1);
        }
        config.run_all().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });
        println!("Completed {} jobs", config.jobs.len());
        return;
    }

    let Some(model_path) = &cli.model else {
        eprintln!("Error: --model or --config is required");
        process::exit(1);
    };
    let model = load_model(model_path).unwrap_or_else(|e| {
        eprintln!("Error loading model '{}': {}", model_path.display(), e);
        process::exit(1);
    });

    let mut composer = Composer::builder()
        .with_model(model)
        .dead_end_policy(cli.dead_end)
        .seed(cli.seed)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });

    let events = composer.compose(cli.length).unwrap_or_else(|e| {
        eprintln!("Error generating: {}", e);
        process::exit(1);
    });

    if cli.print || cli.output.is_none() {
        println!("{}", render_text(&events));
    }

    if let Some(output) = &cli.output {
        let midi = MidiWriterConfig {
            tempo_bpm: cli.bpm,
            ..MidiWriterConfig::default()
        };
        write_output(&events, output, &midi).unwrap_or_else(|e| {
            eprintln!("Error writing '{}': {}", output.display(), e);
            process::exit(1);
        });
        println!("Wrote {} events to '{}'", events.len(), output.display());
    }
}

fn prepare_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
