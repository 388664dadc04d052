// Error type shared by every stage of song generation.
//
// All failures are deterministic given the inputs (a bad pitch name, a
// progression longer than its part, a key with no usable chords), so nothing
// here is retried. A failing realization call never leaves partial events on
// its track; see scheduler.rs.

use thiserror::Error;

use crate::event::Ticks;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("invalid pitch name {0:?}: expected C, C#, D, Eb, E, F, F#, G, Ab, A, Bb or B")]
    InvalidPitchName(String),

    #[error("invalid octave {0}: expected 0-10")]
    InvalidOctave(i32),

    #[error("note code {0} out of range 0-127")]
    CodeOutOfRange(i32),

    #[error("realization consumed {consumed} ticks but only {allotted} were allotted")]
    DurationUnderrun { consumed: Ticks, allotted: Ticks },

    #[error("seed progression has {seed} chords but the part only has {total}")]
    EmptyChordCount { seed: usize, total: usize },

    #[error("no chord in the vocabulary lies entirely within key {0}")]
    EmptyCandidateSet(String),

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("unknown roman numeral {0:?}")]
    UnknownNumeral(String),

    #[error("invalid song configuration: {0}")]
    InvalidConfig(String),

    #[error("delta time {0} does not fit in a MIDI variable-length quantity")]
    DeltaOverflow(u32),

    #[error("carried silence of {0} ticks overflows the tick counter")]
    TickOverflow(Ticks),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
