// Accompanist: chord accompaniment for monophonic melodies.
//
// Given a melody, the system infers its key and evolves a sequence of chords,
// one per bar, that fits the melody under a heuristic fitness function.
//
// Architecture:
// - pitch.rs: Pitch classes and 12-bit pitch-class sets
// - melody.rs: Note events, bar count, per-bar segmentation, averages
// - key.rs: Diatonic tables for the 24 major/minor keys + tie-break key choice
// - chord.rs: Diatonic chords, voicing shapes, gated voicing mutation
// - chromosome.rs: Chord sequences and their fitness (stability + metrical
//   alignment + optional tonic framing)
// - population.rs: Genetic search (crossover, mutation, elitist truncation)
// - accompaniment.rs: The end-to-end pipeline
// - config.rs: JSON-loadable run configuration
// - midi.rs: Reading melodies from and writing accompaniment to MIDI files
// - error.rs: Error types
//
// The search is deterministic given a seed.

pub mod accompaniment;
pub mod chord;
pub mod chromosome;
pub mod config;
pub mod error;
pub mod key;
pub mod melody;
pub mod midi;
pub mod pitch;
pub mod population;
