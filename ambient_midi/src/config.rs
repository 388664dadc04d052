// Song configuration.
//
// A `SongSpec` describes everything a generation run needs apart from the
// seed: tempo and timing resolution, the octave tracks play in, the list of
// parts (key, chord count, seed progression, duration choices, accent
// offsets), and the probabilities the random driver policy uses. It is loaded
// from JSON; any field left out takes its default, and `SongSpec::default()`
// is the three-part demo song the CLI plays when no file is given.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{GenError, Result};
use crate::event::Ticks;

/// Beats in a bar; every song is in 4/4.
pub const BEATS_PER_BAR: u32 = 4;

/// Tempo range in beats per minute. Below the minimum, microseconds per beat
/// no longer fit the 24-bit tempo field.
const MIN_TEMPO_BPM: u32 = 4;
const MAX_TEMPO_BPM: u32 = 1000;

/// MIDI metrical timing is a 15-bit field.
const MAX_TICKS_PER_BEAT: u32 = 0x7fff;

/// Playing octaves that leave room for the accent tracks' +/-2 octave swing.
pub const MIN_PLAY_OCTAVE: i32 = 2;
pub const MAX_PLAY_OCTAVE: i32 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SongSpec {
    pub tempo_bpm: u32,
    pub ticks_per_beat: u32,
    pub octave: i32,
    pub parts: Vec<PartSpec>,
    pub policy: PolicyConfig,
}

/// One section of the song, in one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartSpec {
    /// "A" (major), "f" (minor) or "D dorian".
    pub key: String,
    /// Chord lengths to pick from, in bars.
    pub duration_choices_bars: Vec<u32>,
    pub num_chords: usize,
    /// Roman numerals played before the random chords.
    pub seed_progression: Vec<String>,
    /// Bars the first accent track waits into each chord.
    pub accent_offset_bars: u32,
    /// Bars the second accent track waits into each chord.
    pub accent2_offset_bars: u32,
}

/// Probabilities behind the random per-step decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Chance the chord track rests instead of playing a block chord.
    pub rest_probability: f64,
    /// Chance each partial accent track plays rather than rests.
    pub accent_probability: f64,
    /// Chance a one-bar step is played again with the same chord.
    pub repeat_probability: f64,
}

impl Default for SongSpec {
    fn default() -> Self {
        SongSpec {
            tempo_bpm: 60,
            ticks_per_beat: 480,
            octave: 4,
            parts: vec![
                PartSpec {
                    key: "A".to_string(),
                    duration_choices_bars: vec![1, 2, 4, 8, 16],
                    num_chords: 8,
                    seed_progression: ["I", "V", "vi", "IV"].map(String::from).to_vec(),
                    accent_offset_bars: 1,
                    ..PartSpec::default()
                },
                PartSpec {
                    key: "f".to_string(),
                    duration_choices_bars: vec![2, 4, 8],
                    num_chords: 4,
                    accent_offset_bars: 1,
                    ..PartSpec::default()
                },
                PartSpec {
                    key: "C".to_string(),
                    duration_choices_bars: vec![1, 2, 4],
                    num_chords: 4,
                    accent_offset_bars: 2,
                    ..PartSpec::default()
                },
            ],
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for PartSpec {
    fn default() -> Self {
        PartSpec {
            key: "C".to_string(),
            duration_choices_bars: vec![1, 2, 4],
            num_chords: 4,
            seed_progression: Vec::new(),
            accent_offset_bars: 1,
            accent2_offset_bars: 2,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            rest_probability: 0.1,
            accent_probability: 0.5,
            repeat_probability: 0.5,
        }
    }
}

impl SongSpec {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let spec: SongSpec = serde_json::from_str(&data)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn ticks_per_bar(&self) -> Ticks {
        self.ticks_per_beat * BEATS_PER_BAR
    }

    /// Microseconds per beat, as the MIDI tempo meta event stores it.
    pub fn micros_per_beat(&self) -> u32 {
        60_000_000 / self.tempo_bpm
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(GenError::InvalidConfig(msg)) };

        if !(MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&self.tempo_bpm) {
            return invalid(format!(
                "tempo_bpm {} outside {MIN_TEMPO_BPM}-{MAX_TEMPO_BPM}",
                self.tempo_bpm
            ));
        }
        if self.ticks_per_beat == 0 || self.ticks_per_beat > MAX_TICKS_PER_BEAT {
            return invalid(format!(
                "ticks_per_beat {} outside 1-{MAX_TICKS_PER_BEAT}",
                self.ticks_per_beat
            ));
        }
        if self.ticks_per_bar() % 8 != 0 {
            warn!(
                ticks_per_beat = self.ticks_per_beat,
                "eighth-bar accents will be rounded down to whole ticks"
            );
        }
        if !(MIN_PLAY_OCTAVE..=MAX_PLAY_OCTAVE).contains(&self.octave) {
            return invalid(format!(
                "octave {} outside {MIN_PLAY_OCTAVE}-{MAX_PLAY_OCTAVE}",
                self.octave
            ));
        }

        if self.parts.is_empty() {
            return invalid("song has no parts".to_string());
        }
        for (i, part) in self.parts.iter().enumerate() {
            if part.duration_choices_bars.is_empty() {
                return invalid(format!("part {i} has no duration choices"));
            }
            if part.duration_choices_bars.contains(&0) {
                return invalid(format!("part {i} has a zero-bar duration choice"));
            }
            let longest = part.duration_choices_bars.iter().max().copied().unwrap_or(0);
            if u64::from(longest) * u64::from(self.ticks_per_bar()) > u64::from(u32::MAX) {
                return invalid(format!("part {i} duration choice {longest} bars is too long"));
            }
        }

        let p = &self.policy;
        for (name, value) in [
            ("rest_probability", p.rest_probability),
            ("accent_probability", p.accent_probability),
            ("repeat_probability", p.repeat_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} {value} outside 0-1"));
            }
        }
        if p.repeat_probability >= 1.0 {
            return invalid(
                "repeat_probability must be below 1 or steps repeat forever".to_string(),
            );
        }
        Ok(())
    }
}
