// Error types for the accompaniment pipeline.
//
// Only input-dependent failures are errors: an empty or atonal melody, a
// malformed MIDI file, an unreadable config. The search itself (mutation,
// crossover, selection) operates on well-formed in-memory values and cannot
// fail; its length invariants are checked with debug assertions instead.

use crate::pitch::PitchClassSet;
use thiserror::Error;

/// Key detection found no usable major or minor key for the melody.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyDetectionError {
    #[error("no major or minor key contains every melody pitch class {pitch_classes}")]
    NoCandidateKey { pitch_classes: PitchClassSet },
    #[error("candidate keys exist but none matches the melody's final note")]
    NoCascadeMatch,
}

#[derive(Debug, Error)]
pub enum AccompanimentError {
    #[error("melody contains no notes")]
    EmptyMelody,
    #[error(transparent)]
    KeyDetection(#[from] KeyDetectionError),
    #[error("midi: {0}")]
    Midi(#[from] midly::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("timecode-based MIDI timing is not supported; bar lengths need ticks per quarter note")]
    UnsupportedTiming,
    #[error("track {track} runs past the last representable tick")]
    TrackTooLong { track: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
