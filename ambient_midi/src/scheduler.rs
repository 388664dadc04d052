// Per-track scheduler: turns (chord, duration) steps into relative-time events.
//
// Each output track owns one `TrackScheduler`. Tracks realize the same chord
// progression in different ways (block chords, a three-note melody line,
// accent ostinatos, rests) but every track receives the same sequence of
// chord durations, and every track must stay on the same absolute bar grid
// while only ever emitting deltas.
//
// The mechanism is the carried gap `next_time`. A realization call that
// sounds for `time_added` ticks of its `chord_duration` leaves
// `chord_duration - time_added` ticks of silence pending; the next onset this
// track emits, whenever that is, absorbs the whole pending gap into its delta.
// A call that emits nothing (a rest, or an accent that didn't fit) simply
// adds its full duration to the gap. So for every track:
//
//     sum(emitted deltas) + next_time == sum(chord durations so far)
//
// Every strategy builds its events in a local buffer and hands them to
// `commit`, which checks the time budget, folds the carried gap into the
// first event, and only then appends to the track. A failure (bad pitch name,
// over-consumption) leaves both the track and the carried state untouched.

use ambient_midi_prng::SongRng;
use tracing::debug;

use crate::error::{GenError, Result};
use crate::event::{Event, EventTrack, Ticks};
use crate::pitch::resolve;

/// Hit cap for a full accent run; large enough that the duration always ends
/// the run first.
pub const MAX_ACCENTS_IN_SECTION: u32 = 1000;

/// Octave every realization plays in unless configured otherwise.
pub const DEFAULT_OCTAVE: i32 = 4;

/// The melody line uses at most this many chord tones per chord.
const MELODY_NOTES: usize = 3;

/// Bounds of the random hit cap for a partial accent run.
const MIN_ACCENTS: u32 = 2;
const MAX_ACCENTS: u32 = 30;

/// Largest octave shift an accent run re-rolls to, in either direction.
const ACCENT_OCTAVE_SWING: i32 = 2;

/// Accent runs re-roll their octave shift on every hit whose 1-based index is
/// a multiple of this.
const ACCENT_REROLL_EVERY: u32 = 3;

/// Scheduler state saved before a multi-track step, so a step that fails on a
/// later track can be undone on the earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    events: usize,
    next_time: Ticks,
    time_added: Ticks,
    prev_chord_duration: Ticks,
    num_chords_added: u32,
}

#[derive(Debug, Clone)]
pub struct TrackScheduler {
    track: EventTrack,
    ticks_per_bar: Ticks,
    octave: i32,
    /// Delta for the next onset: silence carried since the track last sounded.
    next_time: Ticks,
    /// Ticks of sounding content produced by the most recent call.
    time_added: Ticks,
    prev_chord_duration: Ticks,
    num_chords_added: u32,
}

impl TrackScheduler {
    pub fn new(name: impl Into<String>, ticks_per_bar: Ticks) -> Self {
        TrackScheduler {
            track: EventTrack::new(name),
            ticks_per_bar,
            octave: DEFAULT_OCTAVE,
            next_time: 0,
            time_added: 0,
            prev_chord_duration: 0,
            num_chords_added: 0,
        }
    }

    pub fn with_octave(mut self, octave: i32) -> Self {
        self.octave = octave;
        self
    }

    pub fn name(&self) -> &str {
        &self.track.name
    }

    pub fn ticks_per_bar(&self) -> Ticks {
        self.ticks_per_bar
    }

    pub fn next_time(&self) -> Ticks {
        self.next_time
    }

    pub fn time_added(&self) -> Ticks {
        self.time_added
    }

    pub fn prev_chord_duration(&self) -> Ticks {
        self.prev_chord_duration
    }

    pub fn num_chords_added(&self) -> u32 {
        self.num_chords_added
    }

    pub fn track(&self) -> &EventTrack {
        &self.track
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            events: self.track.len(),
            next_time: self.next_time,
            time_added: self.time_added,
            prev_chord_duration: self.prev_chord_duration,
            num_chords_added: self.num_chords_added,
        }
    }

    /// Drop everything appended since `checkpoint` was taken.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.track.events.truncate(checkpoint.events);
        self.next_time = checkpoint.next_time;
        self.time_added = checkpoint.time_added;
        self.prev_chord_duration = checkpoint.prev_chord_duration;
        self.num_chords_added = checkpoint.num_chords_added;
    }

    /// End the session: the still-pending gap becomes the track's trailing
    /// silence so the track's length matches every other track's.
    pub fn finish(mut self) -> EventTrack {
        self.track.trailing_ticks = self.next_time;
        self.track
    }

    /// Rest for the whole duration.
    pub fn add_silence(&mut self, chord_duration: Ticks) -> Result<()> {
        self.commit("silence", Vec::new(), chord_duration, 0)
    }

    /// Every chord tone sounds for the whole duration.
    ///
    /// Onsets after the first and releases after the first carry delta 0,
    /// which is how a relative-time stream says "at the same instant".
    pub fn add_block<S: AsRef<str>>(&mut self, chord: &[S], chord_duration: Ticks) -> Result<()> {
        if chord.is_empty() || chord_duration == 0 {
            return self.add_silence(chord_duration);
        }
        let codes = self.resolve_all(chord)?;

        let mut events = Vec::with_capacity(codes.len() * 2);
        events.extend(codes.iter().map(|&code| Event::on(code, 0)));
        events.extend(
            codes
                .iter()
                .enumerate()
                .map(|(i, &code)| Event::off(code, if i == 0 { chord_duration } else { 0 })),
        );
        self.commit("block", events, chord_duration, chord_duration)
    }

    /// A monophonic line over the first (up to) three chord tones, each held
    /// for a random whole number of bars, the spans together filling every
    /// whole bar of the duration.
    ///
    /// A duration shorter than one bar is played as a single note of exactly
    /// that length. Ticks past the last whole bar are left as silence for the
    /// next call.
    pub fn add_melody<S: AsRef<str>>(
        &mut self,
        chord: &[S],
        chord_duration: Ticks,
        rng: &mut SongRng,
    ) -> Result<()> {
        if chord.is_empty() || chord_duration == 0 {
            return self.add_silence(chord_duration);
        }
        let voices = chord.len().min(MELODY_NOTES);
        let codes = self.resolve_all(&chord[..voices])?;

        let bars = chord_duration / self.ticks_per_bar;
        let (lengths, time_added) = if bars == 0 {
            (vec![chord_duration], chord_duration)
        } else {
            let spans = melody_spans(bars, rng);
            // Fewer chord tones than spans: the last tone holds the rest.
            let mut lengths: Vec<Ticks> = spans[..voices]
                .iter()
                .map(|&b| b * self.ticks_per_bar)
                .collect();
            let leftover: u32 = spans[voices..].iter().sum();
            if let Some(last) = lengths.last_mut() {
                *last += leftover * self.ticks_per_bar;
            }
            (lengths, bars * self.ticks_per_bar)
        };

        let mut events = Vec::with_capacity(MELODY_NOTES * 2);
        for (&code, &length) in codes.iter().zip(&lengths) {
            if length == 0 {
                continue;
            }
            events.push(Event::on(code, 0));
            events.push(Event::off(code, length));
        }
        self.commit("melody", events, chord_duration, time_added)
    }

    /// A run of short hits cycling through the chord tones.
    ///
    /// With `full`, the run starts immediately with quarter-bar hits and keeps
    /// going for as long as hits fit. Otherwise it starts
    /// `starting_offset_bars` bars in, uses a random hit length of 1/2, 1/4 or
    /// 1/8 bar, and stops after a random 2-30 hits at most.
    ///
    /// A hit is only played if it ends strictly before `chord_duration`; the
    /// run never spills into the next chord. If not even the first hit fits,
    /// nothing is emitted and the chord counts as a rest.
    pub fn add_accent<S: AsRef<str>>(
        &mut self,
        chord: &[S],
        chord_duration: Ticks,
        starting_offset_bars: u32,
        full: bool,
        rng: &mut SongRng,
    ) -> Result<()> {
        if chord.is_empty() {
            return self.add_silence(chord_duration);
        }
        let (cap, accent_time, lead) = if full {
            (MAX_ACCENTS_IN_SECTION, self.ticks_per_bar / 4, 0u64)
        } else {
            let cap = rng.range_u32(MIN_ACCENTS, MAX_ACCENTS);
            let divisor = 1u32 << rng.range_u32(1, 3);
            let lead = u64::from(starting_offset_bars) * u64::from(self.ticks_per_bar);
            (cap, self.ticks_per_bar / divisor, lead)
        };

        let mut events = Vec::new();
        let mut used = lead;
        let mut octave_shift = 0;
        if accent_time > 0 {
            for hit in 1..=cap {
                if used + u64::from(accent_time) >= u64::from(chord_duration) {
                    break;
                }
                if hit % ACCENT_REROLL_EVERY == 0 {
                    octave_shift = rng.range_i32(-ACCENT_OCTAVE_SWING, ACCENT_OCTAVE_SWING);
                }
                let name = chord[hit as usize % chord.len()].as_ref();
                let code = resolve(name, self.octave + octave_shift)?;
                // The first hit waits out the lead-in; later hits follow the
                // previous release directly.
                let delta = if events.is_empty() { lead as Ticks } else { 0 };
                events.push(Event::on(code, delta));
                events.push(Event::off(code, accent_time));
                used += u64::from(accent_time);
            }
        }

        // `used < chord_duration` whenever a hit was played.
        let time_added = if events.is_empty() { 0 } else { used as Ticks };
        self.commit("accent", events, chord_duration, time_added)
    }

    fn resolve_all<S: AsRef<str>>(&self, chord: &[S]) -> Result<Vec<u8>> {
        chord
            .iter()
            .map(|name| resolve(name.as_ref(), self.octave))
            .collect()
    }

    /// Append one realization's events and advance the carried state.
    ///
    /// `events` must start at the realization's own start (its first delta is
    /// any lead-in within the chord) and its deltas must sum to `time_added`.
    fn commit(
        &mut self,
        strategy: &'static str,
        mut events: Vec<Event>,
        chord_duration: Ticks,
        time_added: Ticks,
    ) -> Result<()> {
        debug_assert_eq!(
            events.iter().map(|e| u64::from(e.delta)).sum::<u64>(),
            u64::from(time_added),
        );
        let remainder = chord_duration
            .checked_sub(time_added)
            .ok_or(GenError::DurationUnderrun {
                consumed: time_added,
                allotted: chord_duration,
            })?;

        let carried = self.next_time;
        let next_time = match events.first_mut() {
            Some(first) => {
                first.delta = first
                    .delta
                    .checked_add(carried)
                    .ok_or(GenError::TickOverflow(carried))?;
                remainder
            }
            None => carried
                .checked_add(remainder)
                .ok_or(GenError::TickOverflow(carried))?,
        };

        debug!(
            track = %self.track.name,
            strategy,
            chord_duration,
            time_added,
            events = events.len(),
            next_time,
            "realized chord"
        );
        self.track.extend(events);
        self.next_time = next_time;
        self.time_added = time_added;
        self.prev_chord_duration = chord_duration;
        self.num_chords_added += 1;
        Ok(())
    }
}

/// Split `bars` (at least 1) into up to three melody spans, in bars, that sum
/// to `bars` exactly. The first span is 1..=round(bars / 2); the second takes
/// 1..=whatever is left; the third is the remainder and may be 0.
pub fn melody_spans(bars: u32, rng: &mut SongRng) -> [u32; 3] {
    debug_assert!(bars >= 1);
    let span1 = rng.range_u32(1, round_half(bars).max(1));
    if span1 >= bars {
        return [bars, 0, 0];
    }
    let span2 = rng.range_u32(1, bars - span1);
    [span1, span2, bars - span1 - span2]
}

/// `bars / 2` rounded half to even, so 1 -> 0, 3 -> 2, 5 -> 2, 7 -> 4.
fn round_half(bars: u32) -> u32 {
    let half = bars / 2;
    if bars % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    const TPB: Ticks = 1920;

    fn deltas(s: &TrackScheduler) -> Vec<Ticks> {
        s.track().events.iter().map(|e| e.delta).collect()
    }

    #[test]
    fn test_block_on_fresh_scheduler() {
        let mut s = TrackScheduler::new("chords", TPB);
        s.add_block(&["C", "E", "G"], 1920).unwrap();

        let events = &s.track().events;
        assert_eq!(events.len(), 6);
        assert_eq!(deltas(&s), vec![0, 0, 0, 1920, 0, 0]);
        let keys: Vec<u8> = events.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![48, 52, 55, 48, 52, 55]);
        assert!(events[..3].iter().all(|e| e.kind == EventKind::On));
        assert!(events[3..].iter().all(|e| e.kind == EventKind::Off));
        assert_eq!(s.next_time(), 0);
        assert_eq!(s.time_added(), 1920);
        assert_eq!(s.num_chords_added(), 1);
    }

    #[test]
    fn test_silence_delays_next_block() {
        let mut s = TrackScheduler::new("chords", TPB);
        s.add_silence(960).unwrap();
        assert_eq!(s.next_time(), 960);
        assert!(s.track().is_empty());

        s.add_block(&["C", "E", "G"], 1920).unwrap();
        assert_eq!(s.track().events[0].delta, 960);
        assert_eq!(s.next_time(), 0);
        assert_eq!(s.prev_chord_duration(), 1920);
        assert_eq!(s.num_chords_added(), 2);
    }

    #[test]
    fn test_consecutive_silences_accumulate() {
        let mut s = TrackScheduler::new("accent", TPB);
        s.add_silence(1920).unwrap();
        s.add_silence(3840).unwrap();
        s.add_block(&["D"], 1920).unwrap();
        assert_eq!(s.track().events[0].delta, 5760);
    }

    #[test]
    fn test_empty_chord_is_a_rest() {
        let mut s = TrackScheduler::new("t", TPB);
        let empty: [&str; 0] = [];
        let mut rng = SongRng::new(1);
        s.add_block(&empty, 1920).unwrap();
        s.add_melody(&empty, 1920, &mut rng).unwrap();
        s.add_accent(&empty, 1920, 0, true, &mut rng).unwrap();
        assert!(s.track().is_empty());
        assert_eq!(s.next_time(), 3 * 1920);
    }

    #[test]
    fn test_bad_pitch_leaves_state_untouched() {
        let mut s = TrackScheduler::new("t", TPB);
        s.add_silence(480).unwrap();
        let err = s.add_block(&["C", "H", "G"], 1920).unwrap_err();
        assert!(matches!(err, GenError::InvalidPitchName(_)));
        assert!(s.track().is_empty());
        assert_eq!(s.next_time(), 480);
        assert_eq!(s.num_chords_added(), 1);
    }

    #[test]
    fn test_over_consumption_rejected() {
        let mut s = TrackScheduler::new("t", TPB);
        let events = vec![Event::on(60, 0), Event::off(60, 2000)];
        let err = s.commit("test", events, 1920, 2000).unwrap_err();
        assert!(matches!(
            err,
            GenError::DurationUnderrun {
                consumed: 2000,
                allotted: 1920
            }
        ));
        assert!(s.track().is_empty());
        assert_eq!(s.num_chords_added(), 0);
    }

    #[test]
    fn test_round_half_ties_to_even() {
        let expected = [(1, 0), (2, 1), (3, 2), (4, 2), (5, 2), (7, 4), (8, 4), (16, 8)];
        for (bars, half) in expected {
            assert_eq!(round_half(bars), half, "round({bars} / 2)");
        }
    }

    #[test]
    fn test_melody_spans_partition_bars() {
        let mut rng = SongRng::new(2024);
        for bars in 1..=32 {
            for _ in 0..200 {
                let spans = melody_spans(bars, &mut rng);
                assert_eq!(spans.iter().sum::<u32>(), bars, "spans {spans:?}");
                assert!(spans[0] >= 1);
                assert!(spans[0] <= round_half(bars).max(1));
                if spans[0] < bars {
                    assert!(spans[1] >= 1);
                } else {
                    assert_eq!(spans[1..], [0, 0]);
                }
            }
        }
    }

    #[test]
    fn test_melody_fills_whole_bars() {
        for seed in 0..200 {
            let mut rng = SongRng::new(seed);
            let mut s = TrackScheduler::new("melody", TPB);
            s.add_melody(&["A", "C#", "E", "G#"], 8 * TPB, &mut rng).unwrap();

            let events = &s.track().events;
            assert!(events.len() <= 6);
            assert_eq!(events[0].kind, EventKind::On);
            let offs: Ticks = events
                .iter()
                .filter(|e| e.kind == EventKind::Off)
                .map(|e| e.delta)
                .sum();
            assert_eq!(offs, 8 * TPB);
            // A fourth chord tone is never used.
            assert!(events.iter().all(|e| e.key != 56));
            assert_eq!(s.next_time(), 0);
        }
    }

    #[test]
    fn test_melody_one_bar_plays_first_note_only() {
        let mut rng = SongRng::new(3);
        let mut s = TrackScheduler::new("melody", TPB);
        s.add_melody(&["F", "A", "C"], TPB, &mut rng).unwrap();
        assert_eq!(deltas(&s), vec![0, TPB]);
        assert_eq!(s.track().events[0].key, 53);
    }

    #[test]
    fn test_melody_shorter_than_a_bar() {
        let mut rng = SongRng::new(3);
        let mut s = TrackScheduler::new("melody", TPB);
        s.add_silence(100).unwrap();
        s.add_melody(&["F", "A", "C"], 960, &mut rng).unwrap();
        assert_eq!(deltas(&s), vec![100, 960]);
        assert_eq!(s.time_added(), 960);
        assert_eq!(s.next_time(), 0);
    }

    #[test]
    fn test_melody_single_tone_holds_every_bar() {
        let mut rng = SongRng::new(11);
        let mut s = TrackScheduler::new("melody", TPB);
        s.add_melody(&["E"], 4 * TPB, &mut rng).unwrap();
        assert_eq!(deltas(&s), vec![0, 4 * TPB]);
    }

    #[test]
    fn test_melody_partial_bar_remainder_carried() {
        let mut rng = SongRng::new(5);
        let mut s = TrackScheduler::new("melody", TPB);
        s.add_melody(&["C", "E", "G"], 2 * TPB + 500, &mut rng).unwrap();
        assert_eq!(s.time_added(), 2 * TPB);
        assert_eq!(s.next_time(), 500);
    }

    #[test]
    fn test_full_accent_one_bar() {
        let mut rng = SongRng::new(9);
        let mut s = TrackScheduler::new("full accent", TPB);
        s.add_silence(240).unwrap();
        s.add_accent(&["C", "E", "G"], TPB, 5, true, &mut rng).unwrap();

        // Quarter-bar hits; the fourth would end exactly on the bar line.
        assert_eq!(deltas(&s), vec![240, 480, 0, 480, 0, 480]);
        let pcs: Vec<u8> = s.track().events.iter().step_by(2).map(|e| e.key % 12).collect();
        // 1-based hit index cycles E, G, C.
        assert_eq!(pcs, vec![4, 7, 0]);
        assert_eq!(s.time_added(), 1440);
        assert_eq!(s.next_time(), 480);
    }

    #[test]
    fn test_accent_offset_delays_first_hit() {
        for seed in 0..100 {
            let mut rng = SongRng::new(seed);
            let mut s = TrackScheduler::new("accent", TPB);
            s.add_silence(100).unwrap();
            s.add_accent(&["D", "F", "A"], 8 * TPB, 2, false, &mut rng).unwrap();

            let events = &s.track().events;
            assert!(events.len() >= 4 && events.len() <= 60);
            assert_eq!(events[0].delta, 100 + 2 * TPB);
            assert!(events.iter().skip(2).step_by(2).all(|e| e.delta == 0));
            let hit = events[1].delta;
            assert!([TPB / 2, TPB / 4, TPB / 8].contains(&hit));
            assert_eq!(s.time_added(), 2 * TPB + hit * (events.len() as Ticks / 2));
        }
    }

    #[test]
    fn test_accent_offset_past_chord_is_a_rest() {
        let mut rng = SongRng::new(4);
        let mut s = TrackScheduler::new("accent", TPB);
        s.add_accent(&["C", "E", "G"], TPB, 2, false, &mut rng).unwrap();
        assert!(s.track().is_empty());
        assert_eq!(s.time_added(), 0);
        assert_eq!(s.next_time(), TPB);
    }

    #[test]
    fn test_accent_never_exceeds_duration() {
        let mut rng = SongRng::new(77);
        for _ in 0..2000 {
            let duration = rng.range_u32(1, 16) * TPB + rng.range_u32(0, 3) * 240;
            let offset = rng.range_u32(0, 4);
            let full = rng.random_bool(0.3);
            let mut s = TrackScheduler::new("accent", TPB);
            s.add_accent(&["C", "Eb", "G", "Bb"], duration, offset, full, &mut rng)
                .unwrap();
            assert!(s.time_added() <= duration);
            assert_eq!(
                s.track().total_delta() + u64::from(s.next_time()),
                u64::from(duration)
            );
        }
    }

    #[test]
    fn test_accent_octave_stays_within_swing() {
        let mut rng = SongRng::new(12);
        let mut s = TrackScheduler::new("full accent", TPB);
        s.add_accent(&["C"], 64 * TPB, 0, true, &mut rng).unwrap();
        let c4 = 48;
        for e in &s.track().events {
            assert_eq!(e.key % 12, 0);
            assert!(e.key >= c4 - 24 && e.key <= c4 + 24);
        }
        assert_eq!(s.track().onset_count(), 64 * 4 - 1);
    }

    #[test]
    fn test_tracks_stay_synchronized() {
        let chords: [&[&str]; 4] = [
            &["A", "C#", "E"],
            &["E", "G#", "B"],
            &["F#", "A", "C#", "E"],
            &["D", "F#", "A"],
        ];
        for seed in 0..50 {
            let mut rng = SongRng::new(seed);
            let mut s = TrackScheduler::new("mixed", TPB);
            let mut total: u64 = 0;
            for step in 0..40 {
                let chord = chords[step % chords.len()];
                let duration = *rng.choose(&[1, 2, 4, 8, 16]).unwrap() * TPB;
                match rng.range_u32(0, 4) {
                    0 => s.add_silence(duration).unwrap(),
                    1 => s.add_block(chord, duration).unwrap(),
                    2 => s.add_melody(chord, duration, &mut rng).unwrap(),
                    3 => s
                        .add_accent(chord, duration, rng.range_u32(0, 2), false, &mut rng)
                        .unwrap(),
                    _ => s.add_accent(chord, duration, 0, true, &mut rng).unwrap(),
                }
                total += u64::from(duration);
                assert_eq!(
                    s.track().total_delta() + u64::from(s.next_time()),
                    total,
                    "seed {seed} step {step}"
                );
            }
            let pending = s.next_time();
            let track = s.finish();
            assert_eq!(track.trailing_ticks, pending);
            assert_eq!(track.length(), total);
        }
    }

    #[test]
    fn test_carried_gap_overflow_leaves_state_untouched() {
        let mut s = TrackScheduler::new("rests", TPB);
        s.add_silence(TPB).unwrap();
        assert!(matches!(
            s.add_silence(u32::MAX),
            Err(GenError::TickOverflow(carried)) if carried == TPB
        ));
        assert_eq!(s.next_time(), TPB);
        assert_eq!(s.num_chords_added(), 1);
        assert_eq!(s.prev_chord_duration(), TPB);

        // A later onset still absorbs the original gap.
        s.add_block(&["C"], TPB).unwrap();
        assert_eq!(deltas(&s), vec![TPB, TPB]);
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut rng = SongRng::new(4);
        let mut s = TrackScheduler::new("melody", TPB);
        s.add_silence(960).unwrap();
        let saved = s.checkpoint();

        s.add_melody(&["C", "E", "G"], 4 * TPB, &mut rng).unwrap();
        s.add_block(&["F", "A", "C"], TPB).unwrap();
        assert_ne!(s.checkpoint(), saved);

        s.rollback(saved);
        assert_eq!(s.checkpoint(), saved);
        assert!(s.track().is_empty());
        assert_eq!(s.next_time(), 960);
        assert_eq!(s.num_chords_added(), 1);
    }
}
