// Keys, modes and the chord vocabulary.
//
// A part of a song is in a key: a tonic pitch class plus a mode. The key
// supplies the seven scale notes that chords are filtered against, and the
// scale degrees that roman-numeral progressions are resolved on.
//
// Key names follow the usual shorthand: an uppercase tonic ("A", "Bb") is
// major, a lowercase tonic ("f", "c#") is minor, and any mode can be spelled
// out ("D dorian", "e phrygian").
//
// Chords are spelled with the canonical names from pitch.rs, root first.
// Used by chords.rs to build chord sequences.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GenError, Result};
use crate::pitch::PitchClass;

/// The seven diatonic modes, each defined by its intervals above the tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Major: C D E F G A B
    Ionian,
    /// Minor with raised 6th: D E F G A B C
    Dorian,
    /// Minor with lowered 2nd: E F G A B C D
    Phrygian,
    /// Major with raised 4th: F G A B C D E
    Lydian,
    /// Major with lowered 7th: G A B C D E F
    Mixolydian,
    /// Natural minor: A B C D E F G
    Aeolian,
    /// Diminished tonic: B C D E F G A
    Locrian,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Ionian,
        Mode::Dorian,
        Mode::Phrygian,
        Mode::Lydian,
        Mode::Mixolydian,
        Mode::Aeolian,
        Mode::Locrian,
    ];

    /// Semitones from the tonic to each of the seven scale degrees.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Mode::Ionian => [0, 2, 4, 5, 7, 9, 11],
            Mode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            Mode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            Mode::Aeolian => [0, 2, 3, 5, 7, 8, 10],
            Mode::Locrian => [0, 1, 3, 5, 6, 8, 10],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Ionian => "ionian",
            Mode::Dorian => "dorian",
            Mode::Phrygian => "phrygian",
            Mode::Lydian => "lydian",
            Mode::Mixolydian => "mixolydian",
            Mode::Aeolian => "aeolian",
            Mode::Locrian => "locrian",
        }
    }

    fn from_name(name: &str) -> Option<Mode> {
        match name.to_lowercase().as_str() {
            "major" => Some(Mode::Ionian),
            "minor" => Some(Mode::Aeolian),
            other => Mode::ALL.into_iter().find(|m| m.name() == other),
        }
    }
}

/// A tonic and a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Key { tonic, mode }
    }

    /// The seven scale notes, tonic first.
    pub fn notes(&self) -> [PitchClass; 7] {
        self.mode
            .intervals()
            .map(|iv| self.tonic.transpose(i32::from(iv)))
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.notes().contains(&pc)
    }

    /// Diatonic chord on a 0-based scale degree: stacked scale thirds, three
    /// of them for a triad, four with `seventh`.
    pub fn diatonic_chord(&self, degree: usize, seventh: bool) -> Chord {
        let notes = self.notes();
        let size = if seventh { 4 } else { 3 };
        Chord::new((0..size).map(|i| notes[(degree + 2 * i) % 7]).collect())
    }

    /// Resolve a roman numeral (`I`..`VII`, any case, optional `7` suffix).
    pub fn numeral_chord(&self, numeral: &str) -> Result<Chord> {
        let (body, seventh) = match numeral.strip_suffix('7') {
            Some(body) => (body, true),
            None => (numeral, false),
        };
        const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];
        let degree = NUMERALS
            .iter()
            .position(|n| n.eq_ignore_ascii_case(body))
            .ok_or_else(|| GenError::UnknownNumeral(numeral.to_string()))?;
        Ok(self.diatonic_chord(degree, seventh))
    }
}

impl FromStr for Key {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || GenError::UnknownKey(s.to_string());
        let mut words = s.split_whitespace();
        let tonic_word = words.next().ok_or_else(unknown)?;

        // Capitalize the letter so "f#" parses as F#; remember the case.
        let mut letters = tonic_word.chars();
        let first = letters.next().ok_or_else(unknown)?;
        let lowercase = first.is_ascii_lowercase();
        let normalized: String = first.to_ascii_uppercase().to_string() + letters.as_str();
        let tonic: PitchClass = normalized.parse().map_err(|_| unknown())?;

        let mode = match words.next() {
            Some(mode_word) => Mode::from_name(mode_word).ok_or_else(unknown)?,
            None if lowercase => Mode::Aeolian,
            None => Mode::Ionian,
        };
        if words.next().is_some() {
            return Err(unknown());
        }
        Ok(Key::new(tonic, mode))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode.name())
    }
}

/// Chord shapes the random progression draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Major7,
    Minor7,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 4] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Major7,
        ChordQuality::Minor7,
    ];

    /// Semitones above the root.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "min",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "min7",
        }
    }

    pub fn build(self, root: PitchClass) -> Chord {
        Chord::new(
            self.intervals()
                .iter()
                .map(|&iv| root.transpose(i32::from(iv)))
                .collect(),
        )
    }
}

/// Ordered chord tones. Order matters: the scheduler addresses tones by
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    notes: Vec<PitchClass>,
}

impl Chord {
    pub fn new(notes: Vec<PitchClass>) -> Self {
        Chord { notes }
    }

    pub fn notes(&self) -> &[PitchClass] {
        &self.notes
    }

    /// Tone names as the scheduler consumes them.
    pub fn names(&self) -> Vec<&'static str> {
        self.notes.iter().map(|pc| pc.name()).collect()
    }

    pub fn in_key(&self, key: &Key) -> bool {
        self.notes.iter().all(|&pc| key.contains(pc))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(" "))
    }
}

/// Every vocabulary chord rooted on a scale note whose tones all lie in the
/// key, in scale-note-major order.
pub fn candidate_chords(key: &Key) -> Vec<Chord> {
    ChordQuality::ALL
        .iter()
        .flat_map(|&q| key.notes().map(|root| q.build(root)))
        .filter(|c| c.in_key(key))
        .collect()
}
