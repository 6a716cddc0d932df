//! File collaborators: corpus discovery, MIDI and plain-text ingest/emit.

pub mod discovery;
pub mod midi;
pub mod text;
