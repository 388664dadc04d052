// Section driver: walks the song's parts and feeds every track each step.
//
// For every chord of every part the driver picks a duration, then calls
// exactly one realization on each of the six tracks for that duration. No
// track is ever skipped for a step; a track with nothing to play still gets
// `add_silence`, which is what keeps all six on one bar grid (see
// scheduler.rs).
//
// Which realization each track uses is a random decision, but it is made
// through the `DriverPolicy` trait so tests can script it. `RandomPolicy` is
// the production policy, driven by `PolicyConfig` and the shared `SongRng`.
//
// Track roles:
// - Chord: block chords, occasionally resting
// - Melody: three-note melody line over every chord
// - Accent / Accent 2: partial accent runs with per-part lead-ins, or rests
// - Full accent: a steady quarter-bar ostinato over every chord
// - Key change: sounds only the first chord of each part after the first

use ambient_midi_prng::SongRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chords::generate_chord_sequence;
use crate::config::{MAX_PLAY_OCTAVE, MIN_PLAY_OCTAVE, PolicyConfig, SongSpec};
use crate::error::{GenError, Result};
use crate::event::{EventTrack, Ticks};
use crate::scheduler::{Checkpoint, TrackScheduler};
use crate::theory::Chord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackRole {
    Chord = 0,
    Melody = 1,
    Accent = 2,
    Accent2 = 3,
    FullAccent = 4,
    KeyChange = 5,
}

impl TrackRole {
    pub const ALL: [TrackRole; 6] = [
        TrackRole::Chord,
        TrackRole::Melody,
        TrackRole::Accent,
        TrackRole::Accent2,
        TrackRole::FullAccent,
        TrackRole::KeyChange,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn track_name(self) -> &'static str {
        match self {
            TrackRole::Chord => "Chord track",
            TrackRole::Melody => "Melody track",
            TrackRole::Accent => "Accent track",
            TrackRole::Accent2 => "Accent track 2",
            TrackRole::FullAccent => "Full accent track",
            TrackRole::KeyChange => "Key change track",
        }
    }
}

/// The per-step decisions the driver delegates.
pub trait DriverPolicy {
    /// Chord length in bars, from the part's choices. `None` if there are none.
    fn choose_duration(&mut self, choices_bars: &[u32], rng: &mut SongRng) -> Option<u32>;

    /// Whether the chord track rests this step.
    fn chord_rests(&mut self, rng: &mut SongRng) -> bool;

    /// Whether a partial accent track plays this step.
    fn accent_plays(&mut self, role: TrackRole, rng: &mut SongRng) -> bool;

    /// Whether a one-bar step is played once more with the same chord.
    fn repeat_step(&mut self, rng: &mut SongRng) -> bool;
}

/// Independent coin flips with the configured probabilities.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    config: PolicyConfig,
}

impl RandomPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        RandomPolicy { config }
    }
}

impl DriverPolicy for RandomPolicy {
    fn choose_duration(&mut self, choices_bars: &[u32], rng: &mut SongRng) -> Option<u32> {
        rng.choose(choices_bars).copied()
    }

    fn chord_rests(&mut self, rng: &mut SongRng) -> bool {
        rng.random_bool(self.config.rest_probability)
    }

    fn accent_plays(&mut self, _role: TrackRole, rng: &mut SongRng) -> bool {
        rng.random_bool(self.config.accent_probability)
    }

    fn repeat_step(&mut self, rng: &mut SongRng) -> bool {
        rng.random_bool(self.config.repeat_probability)
    }
}

/// One (chord, duration) step as every track sees it.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub chord: &'a Chord,
    pub duration: Ticks,
    /// Lead-in bars for the Accent and Accent 2 tracks.
    pub accent_offsets_bars: [u32; 2],
    /// First chord of a part after the first.
    pub key_change: bool,
}

/// Finished output: one event track per role plus the global tempo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub tempo_bpm: u32,
    pub ticks_per_beat: u32,
    pub tracks: Vec<EventTrack>,
}

impl Timeline {
    /// Length of the longest track, trailing silence included.
    pub fn length(&self) -> u64 {
        self.tracks.iter().map(EventTrack::length).max().unwrap_or(0)
    }

    /// Whether every track ends on the same tick.
    pub fn is_synchronized(&self) -> bool {
        let len = self.length();
        self.tracks.iter().all(|t| t.length() == len)
    }
}

/// One scheduler per track role, advanced together step by step.
#[derive(Debug, Clone)]
pub struct Session {
    schedulers: Vec<TrackScheduler>,
    steps: u32,
}

impl Session {
    /// Fails if `octave` leaves no room for the accent tracks' octave swing.
    pub fn new(ticks_per_bar: Ticks, octave: i32) -> Result<Self> {
        if !(MIN_PLAY_OCTAVE..=MAX_PLAY_OCTAVE).contains(&octave) {
            return Err(GenError::InvalidOctave(octave));
        }
        Ok(Session {
            schedulers: TrackRole::ALL
                .iter()
                .map(|role| {
                    TrackScheduler::new(role.track_name(), ticks_per_bar).with_octave(octave)
                })
                .collect(),
            steps: 0,
        })
    }

    pub fn scheduler(&self, role: TrackRole) -> &TrackScheduler {
        &self.schedulers[role.index()]
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Realize one step on every track.
    ///
    /// Either every track advances or none does: if a track fails, the tracks
    /// already realized for this step are rolled back. The policy and `rng`
    /// are not rewound.
    pub fn step(
        &mut self,
        step: &Step<'_>,
        policy: &mut impl DriverPolicy,
        rng: &mut SongRng,
    ) -> Result<()> {
        let saved: Vec<Checkpoint> =
            self.schedulers.iter().map(TrackScheduler::checkpoint).collect();
        if let Err(err) = self.realize(step, policy, rng) {
            for (scheduler, checkpoint) in self.schedulers.iter_mut().zip(saved) {
                scheduler.rollback(checkpoint);
            }
            warn!(step = self.steps + 1, chord = %step.chord, %err, "step rolled back");
            return Err(err);
        }
        self.steps += 1;
        debug!(step = self.steps, chord = %step.chord, duration = step.duration, "step realized");
        Ok(())
    }

    fn realize(
        &mut self,
        step: &Step<'_>,
        policy: &mut impl DriverPolicy,
        rng: &mut SongRng,
    ) -> Result<()> {
        let names = step.chord.names();
        let d = step.duration;

        let chord = &mut self.schedulers[TrackRole::Chord.index()];
        if policy.chord_rests(rng) {
            chord.add_silence(d)?;
        } else {
            chord.add_block(&names, d)?;
        }

        self.schedulers[TrackRole::Melody.index()].add_melody(&names, d, rng)?;

        for (role, offset) in [TrackRole::Accent, TrackRole::Accent2]
            .into_iter()
            .zip(step.accent_offsets_bars)
        {
            let accent = &mut self.schedulers[role.index()];
            if policy.accent_plays(role, rng) {
                accent.add_accent(&names, d, offset, false, rng)?;
            } else {
                accent.add_silence(d)?;
            }
        }

        self.schedulers[TrackRole::FullAccent.index()].add_accent(&names, d, 0, true, rng)?;

        let key_change = &mut self.schedulers[TrackRole::KeyChange.index()];
        if step.key_change {
            key_change.add_block(&names, d)
        } else {
            key_change.add_silence(d)
        }
    }

    pub fn finish(self, tempo_bpm: u32, ticks_per_beat: u32) -> Timeline {
        Timeline {
            tempo_bpm,
            ticks_per_beat,
            tracks: self.schedulers.into_iter().map(TrackScheduler::finish).collect(),
        }
    }
}

/// Generate the whole song.
pub fn generate_song(
    spec: &SongSpec,
    policy: &mut impl DriverPolicy,
    rng: &mut SongRng,
) -> Result<Timeline> {
    spec.validate()?;
    let ticks_per_bar = spec.ticks_per_bar();
    let mut session = Session::new(ticks_per_bar, spec.octave)?;

    for (part_num, part) in spec.parts.iter().enumerate() {
        let chords = generate_chord_sequence(part, rng)?;
        let shown: Vec<String> = chords.iter().map(Chord::to_string).collect();
        info!(
            part = part_num,
            key = %part.key,
            num_chords = chords.len(),
            accent_offset_bars = part.accent_offset_bars,
            chords = %shown.join(" "),
            "creating section"
        );

        for (chord_num, chord) in chords.iter().enumerate() {
            let bars = policy
                .choose_duration(&part.duration_choices_bars, rng)
                .ok_or_else(|| {
                    GenError::InvalidConfig(format!("part {part_num} has no duration choices"))
                })?;
            let duration = bars.checked_mul(ticks_per_bar).ok_or_else(|| {
                GenError::InvalidConfig(format!(
                    "part {part_num}: {bars} bars overflows the tick counter"
                ))
            })?;
            let step = Step {
                chord,
                duration,
                accent_offsets_bars: [part.accent_offset_bars, part.accent2_offset_bars],
                key_change: part_num != 0 && chord_num == 0,
            };
            loop {
                session.step(&step, policy, rng)?;
                // Only the shortest chords get repeated.
                if bars != 1 || !policy.repeat_step(rng) {
                    break;
                }
            }
        }
    }

    info!(steps = session.steps(), "song generated");
    Ok(session.finish(spec.tempo_bpm, spec.ticks_per_beat))
}
