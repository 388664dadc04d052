// Chord sequence generation for one part of a song.
//
// A part asks for `num_chords` chords in its key. The seed progression (roman
// numerals) is played first; the rest are drawn uniformly from the key's
// candidate chords (theory.rs), so every chord lies in the key.
//
// Drawing from the pre-filtered candidate list replaces "pick any chord,
// retry until it fits": the distribution is the same, and a key with no
// candidates fails immediately instead of spinning.

use ambient_midi_prng::SongRng;

use crate::config::PartSpec;
use crate::error::{GenError, Result};
use crate::theory::{Chord, Key, candidate_chords};

/// Build the chord sequence for a part.
pub fn generate_chord_sequence(part: &PartSpec, rng: &mut SongRng) -> Result<Vec<Chord>> {
    let key: Key = part.key.parse()?;
    build_sequence(&key, part.num_chords, &part.seed_progression, rng)
}

/// Seed progression first, then random in-key chords up to `num_chords`.
pub fn build_sequence(
    key: &Key,
    num_chords: usize,
    seed_progression: &[String],
    rng: &mut SongRng,
) -> Result<Vec<Chord>> {
    if seed_progression.len() > num_chords {
        return Err(GenError::EmptyChordCount {
            seed: seed_progression.len(),
            total: num_chords,
        });
    }

    let mut sequence = seed_progression
        .iter()
        .map(|numeral| key.numeral_chord(numeral))
        .collect::<Result<Vec<_>>>()?;

    let remaining = num_chords - sequence.len();
    if remaining == 0 {
        return Ok(sequence);
    }

    let candidates = candidate_chords(key);
    if candidates.is_empty() {
        return Err(GenError::EmptyCandidateSet(key.to_string()));
    }
    for _ in 0..remaining {
        let chord = rng
            .choose(&candidates)
            .ok_or_else(|| GenError::EmptyCandidateSet(key.to_string()))?;
        sequence.push(chord.clone());
    }
    Ok(sequence)
}
