//! WASM bindings for markov-composer: powers the in-browser demo.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use markov_composer::core::pipeline::{Composer, ComposerError};
use markov_composer::core::sampler::DeadEndPolicy;
use markov_composer::io::midi::{encode_midi, MidiWriterConfig};
use markov_composer::io::text::parse_timed_corpus;
use markov_composer::schema::symbol::TimedSymbol;

// ---------------------------------------------------------------------------
// Embedded demo corpus, compiled into the WASM binary
// ---------------------------------------------------------------------------
const DEMO_CORPUS: &str = include_str!("../../tests/fixtures/folk_tunes.txt");

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct EventInfo {
    symbol: String,
    pitches: Vec<String>,
    duration: String,
    quarters: f64,
}

impl From<&TimedSymbol> for EventInfo {
    fn from(event: &TimedSymbol) -> Self {
        Self {
            symbol: event.symbol.to_string(),
            pitches: event.symbol.pitches().iter().map(|p| p.to_string()).collect(),
            duration: event.duration.to_string(),
            quarters: event.duration.as_quarters(),
        }
    }
}

fn js_error(context: &str, e: ComposerError) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// ComposerDemo, the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct ComposerDemo {
    composer: Composer,
    last: Vec<TimedSymbol>,
}

#[wasm_bindgen]
impl ComposerDemo {
    /// Train on a text corpus (one piece per line). An empty string trains
    /// on the built-in demo corpus.
    #[wasm_bindgen(constructor)]
    pub fn new(corpus: &str, tempo_aware: bool, seed: u64) -> Result<ComposerDemo, JsError> {
        let text = if corpus.trim().is_empty() { DEMO_CORPUS } else { corpus };
        let sequences = parse_timed_corpus(text)
            .map_err(|e| JsError::new(&format!("Corpus parse error: {e}")))?;

        let composer = Composer::builder()
            .with_sequences(sequences)
            .tempo_aware(tempo_aware)
            .loop_back(tempo_aware)
            .seed(seed)
            .build()
            .map_err(|e| js_error("Training error", e))?;

        Ok(ComposerDemo {
            composer,
            last: Vec::new(),
        })
    }

    /// Generate a piece and return its events as a JSON array.
    pub fn generate(&mut self, length: usize) -> Result<String, JsError> {
        self.last = self
            .composer
            .compose(length)
            .map_err(|e| js_error("Generation error", e))?;
        let info: Vec<EventInfo> = self.last.iter().map(EventInfo::from).collect();
        serde_json::to_string(&info)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Generate with an explicit seed and dead-end policy name
    /// (`resample`, `truncate` or `fail`), without advancing the composer.
    pub fn generate_seeded(
        &self,
        length: usize,
        seed: u64,
        dead_end: &str,
    ) -> Result<String, JsError> {
        let policy: DeadEndPolicy = dead_end.parse().map_err(|e: String| JsError::new(&e))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let events = self
            .composer
            .model()
            .generate(length, policy, &mut rng)
            .map_err(|e| JsError::new(&format!("Generation error: {e}")))?;
        let info: Vec<EventInfo> = events.iter().map(EventInfo::from).collect();
        serde_json::to_string(&info)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// The last generated piece as Standard MIDI File bytes.
    pub fn last_as_midi(&self, tempo_bpm: u32) -> Result<Vec<u8>, JsError> {
        let config = MidiWriterConfig {
            tempo_bpm,
            ..MidiWriterConfig::default()
        };
        encode_midi(&self.last, &config).map_err(|e| JsError::new(&format!("MIDI error: {e}")))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.composer.model().vocabulary_len()
    }

    pub fn is_tempo_aware(&self) -> bool {
        self.composer.model().is_tempo_aware()
    }

    pub fn demo_corpus() -> String {
        DEMO_CORPUS.to_string()
    }
}
