/// Pipeline integration tests: corpus files to models, pieces and output files.

use markov_composer::config::ComposerConfig;
use markov_composer::core::pipeline::{
    ingest_corpus, load_model, read_training_file, save_model, write_output, Composer,
    ComposerError,
};
use markov_composer::core::sampler::DeadEndPolicy;
use markov_composer::io::midi::{read_midi_file, MidiWriterConfig};
use markov_composer::io::text::read_corpus_file;
use std::fs;
use std::path::PathBuf;

fn output_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("test_output").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn text_corpus_trains_tempo_aware_composer() {
    let mut composer = Composer::builder()
        .corpus(&["tests/fixtures/folk_tunes.txt"])
        .tempo_aware(true)
        .loop_back(true)
        .seed(5)
        .build()
        .unwrap();

    assert!(composer.model().is_tempo_aware());
    assert_eq!(composer.model().dead_end_count(), 0);

    let piece = composer.compose(64).unwrap();
    assert_eq!(piece.len(), 64);
    // No corpus event is longer than a half note.
    let longest = piece
        .iter()
        .map(|e| e.duration.as_quarters())
        .fold(0.0, f64::max);
    assert!(longest <= 2.0);
}

#[test]
fn midi_round_trip_through_composer() {
    let dir = output_dir("midi_round_trip");
    let mut composer = Composer::builder()
        .corpus(&["tests/fixtures/folk_tunes.txt"])
        .tempo_aware(true)
        .loop_back(true)
        .seed(12)
        .build()
        .unwrap();
    let piece = composer.compose(40).unwrap();

    let path = dir.join("piece.mid");
    write_output(&piece, &path, &MidiWriterConfig::default()).unwrap();
    let read_back = read_midi_file(&path).unwrap();
    assert_eq!(read_back, piece);

    // The written file is itself a valid training file.
    let retrained = Composer::builder()
        .corpus(&[&dir])
        .tempo_aware(true)
        .build()
        .unwrap();
    assert!(retrained.model().vocabulary_len() <= composer.model().vocabulary_len());
}

#[test]
fn text_output_is_a_readable_corpus() {
    let dir = output_dir("text_output");
    let mut composer = Composer::builder()
        .corpus(&["tests/fixtures/pitch_corpus.txt"])
        .seed(3)
        .build()
        .unwrap();
    let piece = composer.compose(30).unwrap();

    let path = dir.join("piece.txt");
    write_output(&piece, &path, &MidiWriterConfig::default()).unwrap();
    let corpus = read_corpus_file(&path).unwrap();
    assert_eq!(corpus, vec![piece]);
}

#[test]
fn saved_model_reproduces_pieces() {
    let dir = output_dir("saved_model");
    let composer = Composer::builder()
        .corpus(&["tests/fixtures/pitch_corpus.txt"])
        .loop_back(true)
        .seed(8)
        .build()
        .unwrap();

    let path = dir.join("model.ron");
    save_model(composer.model(), &path).unwrap();
    let loaded = load_model(&path).unwrap();
    assert!(!loaded.is_tempo_aware());
    assert_eq!(loaded.vocabulary_len(), composer.model().vocabulary_len());

    let mut original = composer;
    let mut reloaded = Composer::builder().with_model(loaded).seed(8).build().unwrap();
    assert_eq!(original.compose(50).unwrap(), reloaded.compose(50).unwrap());
}

#[test]
fn matrix_csv_lists_every_symbol() {
    let composer = Composer::builder()
        .corpus(&["tests/fixtures/pitch_corpus.txt"])
        .build()
        .unwrap();
    let mut out = Vec::new();
    composer.model().write_matrix_csv(&mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), composer.model().vocabulary_len() + 1);
    assert!(lines[0].starts_with("from,C4,E4,G4,C5"));
    assert!(lines.iter().any(|l| l.starts_with("C4.E4.G4,")));
}

#[test]
fn truncate_policy_stops_at_corpus_end() {
    let dir = output_dir("truncate");
    let corpus = dir.join("line.txt");
    fs::write(&corpus, "C4 D4 E4 F4 G4\n").unwrap();

    let mut composer = Composer::builder()
        .corpus(&[&corpus])
        .dead_end_policy(DeadEndPolicy::Truncate)
        .build()
        .unwrap();
    let piece = composer.compose(100).unwrap();
    assert!(piece.len() <= 5);
    assert_eq!(piece.last().unwrap().symbol.to_string(), "G4");

    let mut failing = Composer::builder()
        .corpus(&[&corpus])
        .dead_end_policy(DeadEndPolicy::Fail)
        .build()
        .unwrap();
    assert!(matches!(failing.compose(100), Err(ComposerError::Markov(_))));
}

#[test]
fn directory_without_training_files_is_an_error() {
    let dir = output_dir("no_training_files");
    fs::write(dir.join("readme.md"), "nothing here").unwrap();
    let result = ingest_corpus(&[&dir], &["mid", "midi"]);
    assert!(matches!(result, Err(ComposerError::NoTrainingFiles)));
}

#[test]
fn malformed_corpus_reports_line() {
    let dir = output_dir("malformed");
    let corpus = dir.join("bad.txt");
    fs::write(&corpus, "C4 E4\n# fine\nC4 X9\n").unwrap();
    let err = read_training_file(&corpus).unwrap_err();
    assert!(err.to_string().contains("line 3"), "{}", err);
}

#[test]
fn config_jobs_write_their_outputs() {
    let config = ComposerConfig::load_from_ron(std::path::Path::new("tests/fixtures/jobs.ron"))
        .unwrap();
    assert_eq!(config.jobs.len(), 2);
    let _ = fs::remove_dir_all("target/test_output/jobs");

    config.run_all().unwrap();

    let folk = read_midi_file(&config.jobs[0].output).unwrap();
    assert_eq!(folk.len(), 32);

    let text = fs::read_to_string(&config.jobs[1].output).unwrap();
    assert_eq!(text.split_whitespace().count(), 50);
    assert!(text.split_whitespace().all(|t| t.ends_with("@1")));
}
