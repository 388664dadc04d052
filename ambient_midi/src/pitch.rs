// Pitch names and note codes.
//
// Chords travel through the generator as pitch-class names drawn from a fixed
// 12-symbol alphabet. This module normalizes enharmonic spellings onto that
// alphabet and turns a (name, octave) pair into a 7-bit note code:
// `code = index_in_alphabet + 12 * octave`, so C0 = 0 and C#4 = 49.
//
// Used by scheduler.rs for every emitted note and by theory.rs to spell the
// chords it builds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GenError, Result};

/// Canonical pitch-class names, indexed by pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

pub const NOTES_IN_OCTAVE: i32 = 12;

/// Inclusive octave range accepted by [`resolve`].
pub const MIN_OCTAVE: i32 = 0;
pub const MAX_OCTAVE: i32 = 10;

/// Highest 7-bit note code.
pub const MAX_CODE: i32 = 127;

/// Spellings outside the alphabet and the alphabet member each one means.
const ENHARMONICS: [(&str, &str); 7] = [
    ("Db", "C#"),
    ("D#", "Eb"),
    ("E#", "F"),
    ("Gb", "F#"),
    ("G#", "Ab"),
    ("A#", "Bb"),
    ("B#", "C"),
];

/// Map an enharmonic spelling onto the alphabet. Names already in the
/// alphabet, and names this table doesn't know, come back unchanged.
pub fn normalize(name: &str) -> &str {
    ENHARMONICS
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

/// One of the twelve pitch classes, stored as its index (0 = C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);

    /// Pitch class for any integer, wrapping by octave.
    pub fn from_index(index: i32) -> Self {
        PitchClass(index.rem_euclid(NOTES_IN_OCTAVE) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Canonical name, e.g. `"Eb"` for 3.
    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.0 as usize]
    }

    /// Pitch class `semitones` above this one.
    pub fn transpose(self, semitones: i32) -> Self {
        PitchClass::from_index(i32::from(self.0) + semitones)
    }
}

impl FromStr for PitchClass {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize(s);
        NOTE_NAMES
            .iter()
            .position(|&n| n == normalized)
            .map(|i| PitchClass(i as u8))
            .ok_or_else(|| GenError::InvalidPitchName(s.to_string()))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a pitch name and octave to a note code in `[0, 127]`.
pub fn resolve(name: &str, octave: i32) -> Result<u8> {
    let pc: PitchClass = name.parse()?;
    if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
        return Err(GenError::InvalidOctave(octave));
    }
    let code = i32::from(pc.index()) + NOTES_IN_OCTAVE * octave;
    if !(0..=MAX_CODE).contains(&code) {
        return Err(GenError::CodeOutOfRange(code));
    }
    Ok(code as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_codes() {
        assert_eq!(resolve("C#", 4).unwrap(), 49);
        assert_eq!(resolve("Db", 4).unwrap(), 49);
        assert_eq!(resolve("C", 0).unwrap(), 0);
        assert_eq!(resolve("G", 10).unwrap(), 127);
    }

    #[test]
    fn test_resolve_invalid_name() {
        assert!(matches!(
            resolve("H", 4),
            Err(GenError::InvalidPitchName(ref n)) if n == "H"
        ));
        assert!(matches!(resolve("", 4), Err(GenError::InvalidPitchName(_))));
        assert!(matches!(resolve("c", 4), Err(GenError::InvalidPitchName(_))));
    }

    #[test]
    fn test_resolve_invalid_octave() {
        assert!(matches!(resolve("C", -1), Err(GenError::InvalidOctave(-1))));
        assert!(matches!(resolve("C", 11), Err(GenError::InvalidOctave(11))));
    }

    #[test]
    fn test_resolve_top_octave_overflow() {
        // Ab10 would be 128.
        assert!(matches!(resolve("Ab", 10), Err(GenError::CodeOutOfRange(128))));
        assert!(matches!(resolve("B", 10), Err(GenError::CodeOutOfRange(131))));
    }

    #[test]
    fn test_every_name_and_octave_in_range() {
        for name in NOTE_NAMES {
            let mut prev: Option<u8> = None;
            for octave in MIN_OCTAVE..=MAX_OCTAVE {
                match resolve(name, octave) {
                    Ok(code) => {
                        assert!(i32::from(code) <= MAX_CODE);
                        if let Some(p) = prev {
                            assert!(code > p, "{name}{octave} should rise with octave");
                        }
                        prev = Some(code);
                    }
                    Err(GenError::CodeOutOfRange(c)) => {
                        assert_eq!(octave, MAX_OCTAVE);
                        assert!(c > MAX_CODE);
                    }
                    Err(e) => panic!("unexpected error for {name}{octave}: {e}"),
                }
            }
        }
    }

    #[test]
    fn test_octave_boundary_is_contiguous() {
        assert_eq!(resolve("B", 4).unwrap() + 1, resolve("C", 5).unwrap());
    }

    #[test]
    fn test_normalize_idempotent() {
        for name in NOTE_NAMES {
            assert_eq!(normalize(name), name);
        }
        for (from, to) in ENHARMONICS {
            assert_eq!(normalize(normalize(from)), to);
        }
    }

    #[test]
    fn test_enharmonic_equivalence() {
        for octave in MIN_OCTAVE..MAX_OCTAVE {
            assert_eq!(resolve("Db", octave).unwrap(), resolve("C#", octave).unwrap());
            assert_eq!(resolve("G#", octave).unwrap(), resolve("Ab", octave).unwrap());
        }
        // B# wraps to C of the same octave number, not the next one.
        assert_eq!(resolve("B#", 4).unwrap(), resolve("C", 4).unwrap());
    }

    #[test]
    fn test_pitch_class_transpose_wraps() {
        let b: PitchClass = "B".parse().unwrap();
        assert_eq!(b.transpose(1), PitchClass::C);
        assert_eq!(PitchClass::C.transpose(-1).name(), "B");
        assert_eq!(PitchClass::from_index(15).to_string(), "Eb");
    }
}
