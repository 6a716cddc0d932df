/// Corpus Trainer: fits a transition model to MIDI files or text corpora.
///
/// Usage: corpus_trainer <inputs>... --output <model.ron> [--tempo-aware] [--loop-back]
///        [--parallel] [--extensions mid,midi] [--matrix-csv <matrix.csv>] [--verbose]
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::filter::LevelFilter;

use markov_composer::core::pipeline::{ingest_corpus, save_model, TrainedModel, TrainingOptions};

#[derive(Debug, Parser)]
#[command(name = "corpus_trainer", version, about = "Fit a Markov model to a music corpus")]
struct Cli {
    /// Training files and directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Where to write the model (RON)
    #[arg(short, long)]
    output: PathBuf,

    /// Learn (pitch-or-chord, duration) pairs instead of pitches alone
    #[arg(long)]
    tempo_aware: bool,

    /// Close every training piece back onto its opening
    #[arg(long)]
    loop_back: bool,

    /// Count transitions on all cores
    #[arg(long)]
    parallel: bool,

    /// Extensions picked up when scanning directories
    #[arg(long, value_delimiter = ',', default_value = "mid,midi")]
    extensions: Vec<String>,

    /// Also export the transition matrix as CSV
    #[arg(long)]
    matrix_csv: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    prepare_logging(cli.verbose);

    let sequences = ingest_corpus(&cli.inputs, &cli.extensions).unwrap_or_else(|e| {
        eprintln!("Error reading corpus: {}", e);
        process::exit(1);
    });

    let options = TrainingOptions {
        tempo_aware: cli.tempo_aware,
        loop_back: cli.loop_back,
        parallel: cli.parallel,
    };
    println!(
        "Training {} model from {} sequences...",
        if options.tempo_aware { "tempo-aware" } else { "pitch" },
        sequences.len()
    );
    let model = TrainedModel::train(sequences, &options).unwrap_or_else(|e| {
        eprintln!("Error training model: {}", e);
        process::exit(1);
    });
    println!(
        "Model trained: {} symbols, {} dead ends",
        model.vocabulary_len(),
        model.dead_end_count()
    );

    save_model(&model, &cli.output).unwrap_or_else(|e| {
        eprintln!("Error saving model to '{}': {}", cli.output.display(), e);
        process::exit(1);
    });
    println!("Model saved to '{}'", cli.output.display());

    if let Some(path) = &cli.matrix_csv {
        let written = std::fs::File::create(path)
            .map(std::io::BufWriter::new)
            .and_then(|mut out| {
                model.write_matrix_csv(&mut out)?;
                out.flush()
            });
        if let Err(e) = written {
            eprintln!("Error writing matrix to '{}': {}", path.display(), e);
            process::exit(1);
        }
        println!("Transition matrix written to '{}'", path.display());
    }
}

fn prepare_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
