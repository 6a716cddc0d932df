//! MIDI ingest and emit.
//!
//! Reading turns one Standard MIDI File into a sequence of timed symbols.
//! Only one instrument is read: the first pitched channel of the first
//! track holding pitched notes. Its notes that start on the same tick
//! become a chord, and each event lasts as long as its longest member. Writing does
//! the reverse, producing a single-track SMF in which every symbol sounds
//! for its duration, one after another.
//!
//! Uses the `midly` crate for parsing and writing.

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::pitch::Pitch;
use crate::schema::symbol::{Duration, Symbol, SymbolError, TimedSymbol};

/// General MIDI percussion channel (channel 10, zero-based 9).
const PERCUSSION_CHANNEL: u8 = 9;

/// Largest delta-time a track event can carry.
const MAX_DELTA_TICKS: u64 = (1 << 28) - 1;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MIDI parse error: {0}")]
    Parse(#[from] midly::Error),
    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,
    #[error("invalid MIDI writer setting: {0}")]
    InvalidConfig(String),
    #[error("event {0} is too long to encode")]
    DurationTooLong(String),
    #[error("symbol error: {0}")]
    Symbol(#[from] SymbolError),
}

/// Settings for the MIDI emitter. Passed explicitly to every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiWriterConfig {
    /// Metrical resolution of the written file.
    pub ticks_per_quarter: u16,
    pub tempo_bpm: u32,
    /// Note-on velocity, 1-127.
    pub velocity: u8,
    /// General MIDI program, 0-127 (0 is acoustic grand piano).
    pub program: u8,
    /// Zero-based channel, 0-15.
    pub channel: u8,
}

impl Default for MidiWriterConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: 480,
            tempo_bpm: 120,
            velocity: 80,
            program: 0,
            channel: 0,
        }
    }
}

impl MidiWriterConfig {
    pub fn validate(&self) -> Result<(), MidiError> {
        let invalid = |msg: &str| Err(MidiError::InvalidConfig(msg.to_string()));
        if self.ticks_per_quarter == 0 || self.ticks_per_quarter > 0x7fff {
            return invalid("ticks_per_quarter must be between 1 and 32767");
        }
        if !(4..=60_000_000).contains(&self.tempo_bpm) {
            return invalid("tempo_bpm must be between 4 and 60000000");
        }
        if self.velocity == 0 || self.velocity > 127 {
            return invalid("velocity must be between 1 and 127");
        }
        if self.program > 127 {
            return invalid("program must be between 0 and 127");
        }
        if self.channel > 15 {
            return invalid("channel must be between 0 and 15");
        }
        Ok(())
    }

    fn microseconds_per_quarter(&self) -> u32 {
        60_000_000 / self.tempo_bpm
    }
}

/// A sounding note recovered from note-on/note-off pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NoteSpan {
    start: u64,
    key: u8,
    end: u64,
}

/// Read a MIDI file into a timed symbol sequence.
pub fn read_midi_file(path: &Path) -> Result<Vec<TimedSymbol>, MidiError> {
    let bytes = std::fs::read(path)?;
    let events = extract_events(&bytes)?;
    debug!(file = %path.display(), events = events.len(), "extracted MIDI events");
    Ok(events)
}

/// Decode SMF bytes into a timed symbol sequence.
///
/// Only the first track that holds pitched notes is read, and within it
/// only the first channel to sound a note. Percussion on channel 10 is
/// ignored, as are keys too low to name.
pub fn extract_events(bytes: &[u8]) -> Result<Vec<TimedSymbol>, MidiError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) if ticks.as_int() > 0 => ticks.as_int(),
        _ => return Err(MidiError::UnsupportedTiming),
    };

    for track in &smf.tracks {
        let spans = collect_note_spans(track);
        if !spans.is_empty() {
            return group_into_events(spans, ticks_per_quarter);
        }
    }
    Ok(Vec::new())
}

fn collect_note_spans(track: &[TrackEvent<'_>]) -> Vec<NoteSpan> {
    let mut spans = Vec::new();
    // (channel, key) -> onsets still sounding, oldest first
    let mut sounding: FxHashMap<(u8, u8), VecDeque<u64>> = FxHashMap::default();
    let mut tick: u64 = 0;
    // first channel to sound a note; the rest of the track is ignored
    let mut voice: Option<u8> = None;

    for event in track {
        tick += u64::from(event.delta.as_int());
        let TrackEventKind::Midi { channel, message } = event.kind else {
            continue;
        };
        let channel = channel.as_int();
        if channel == PERCUSSION_CHANNEL || voice.is_some_and(|v| v != channel) {
            continue;
        }

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                voice = Some(channel);
                sounding
                    .entry((channel, key.as_int()))
                    .or_default()
                    .push_back(tick);
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let key = key.as_int();
                if let Some(start) = sounding
                    .get_mut(&(channel, key))
                    .and_then(VecDeque::pop_front)
                {
                    spans.push(NoteSpan { start, key, end: tick });
                }
            }
            _ => {}
        }
    }

    // notes never released run to the end of the track
    for ((_, key), onsets) in sounding {
        spans.extend(onsets.into_iter().map(|start| NoteSpan { start, key, end: tick }));
    }

    spans.sort();
    spans
}

fn group_into_events(spans: Vec<NoteSpan>, ticks_per_quarter: u16) -> Result<Vec<TimedSymbol>, MidiError> {
    let mut events = Vec::new();
    let mut i = 0;

    while i < spans.len() {
        let start = spans[i].start;
        let mut j = i;
        let mut longest = 0u64;
        let mut keys: Vec<u8> = Vec::new();
        while j < spans.len() && spans[j].start == start {
            longest = longest.max(spans[j].end - spans[j].start);
            if keys.last() != Some(&spans[j].key) {
                keys.push(spans[j].key);
            }
            j += 1;
        }
        i = j;

        let pitches: Vec<Pitch> = keys
            .iter()
            .filter_map(|&key| {
                let pitch = Pitch::from_midi(key);
                if pitch.is_none() {
                    warn!(key, tick = start, "skipping MIDI key below the nameable range");
                }
                pitch
            })
            .collect();
        if pitches.is_empty() {
            continue;
        }

        let duration = Duration::from_ticks(longest, ticks_per_quarter)?;
        events.push(TimedSymbol::new(Symbol::chord(pitches)?, duration));
    }

    Ok(events)
}

/// Encode timed symbols as a single-track SMF.
pub fn events_to_smf(
    events: &[TimedSymbol],
    config: &MidiWriterConfig,
) -> Result<Smf<'static>, MidiError> {
    config.validate()?;
    let channel = u4::new(config.channel);
    let velocity = u7::new(config.velocity);

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(config.ticks_per_quarter)),
    ));

    let mut track: Track<'static> = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(config.microseconds_per_quarter()))),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(config.program),
            },
        },
    });

    for event in events {
        let keys = event
            .symbol
            .pitches()
            .iter()
            .map(Pitch::midi_key)
            .collect::<Result<Vec<_>, _>>()?;
        let ticks = event.duration.to_ticks(config.ticks_per_quarter);
        if ticks > MAX_DELTA_TICKS {
            return Err(MidiError::DurationTooLong(event.to_string()));
        }

        for &key in &keys {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key: u7::new(key), vel: velocity },
                },
            });
        }
        for (n, &key) in keys.iter().enumerate() {
            let delta = if n == 0 { ticks as u32 } else { 0 };
            track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) },
                },
            });
        }
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    Ok(smf)
}

/// Encode timed symbols to SMF bytes.
pub fn encode_midi(events: &[TimedSymbol], config: &MidiWriterConfig) -> Result<Vec<u8>, MidiError> {
    let smf = events_to_smf(events, config)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Write timed symbols to a MIDI file.
pub fn write_midi(events: &[TimedSymbol], config: &MidiWriterConfig, path: &Path) -> Result<(), MidiError> {
    let buf = encode_midi(events, config)?;
    std::fs::write(path, &buf)?;
    debug!(file = %path.display(), events = events.len(), "wrote MIDI file");
    Ok(())
}
