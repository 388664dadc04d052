// Ambient MIDI Generator
//
// Builds a multi-track ambient piece from random chord progressions that stay
// inside each part's key. Six tracks realize the same chord sequence in
// different ways (block chords, a slow melody line, accent ostinatos, a track
// that marks key changes) and every track emits relative-time events only,
// so the whole design hinges on each track's scheduler keeping its carried
// silence exact.
//
// Architecture:
// - pitch.rs: pitch-class names, enharmonic normalization, note codes
// - event.rs: relative-time note events and append-only event tracks
// - scheduler.rs: per-track state machine and the four realizations
//   (silence, block, melody, accent)
// - theory.rs: modes, keys, chord vocabulary, roman numerals
// - chords.rs: chord sequence for one part (seed progression + random)
// - config.rs: JSON song configuration and validation
// - driver.rs: per-step track decisions (DriverPolicy) and the song loop
// - midi.rs: Standard MIDI File output
// - error.rs: the crate error type
//
// Generation is deterministic given a seed; all randomness comes from one
// `ambient_midi_prng::SongRng`.

pub mod chords;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod midi;
pub mod pitch;
pub mod scheduler;
pub mod theory;

pub use error::{GenError, Result};
