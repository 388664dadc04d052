// MIDI output from a finished timeline.
//
// Writes a Standard MIDI File, format 1 (parallel tracks), with metrical
// timing at the timeline's ticks per beat. Track 0 carries only the tempo;
// each timeline track becomes its own MTrk with a track name, on its own
// channel. Event deltas are already relative, so they are copied through
// unchanged; the trailing silence becomes the End of Track delta so every
// track ends on the same tick.
//
// Uses the `midly` crate for the container encoding.

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;
use tracing::info;

use crate::driver::Timeline;
use crate::error::{GenError, Result};
use crate::event::{EventKind, Ticks};

/// Largest delta a variable-length quantity can hold.
const MAX_DELTA: u32 = (1 << 28) - 1;

/// MIDI channels available to melodic tracks (channel 10 is drums).
const CHANNELS: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];

/// Convert a timeline to MIDI and write it to a file.
pub fn write_midi(timeline: &Timeline, path: &Path) -> Result<()> {
    let bytes = timeline_to_bytes(timeline)?;
    std::fs::write(path, &bytes)?;
    info!(
        path = %path.display(),
        bytes = bytes.len(),
        tracks = timeline.tracks.len(),
        "wrote MIDI file"
    );
    Ok(())
}

/// Encode a timeline as SMF bytes.
pub fn timeline_to_bytes(timeline: &Timeline) -> Result<Vec<u8>> {
    let smf = timeline_to_smf(timeline)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Convert a timeline to an in-memory SMF borrowing its track names.
pub fn timeline_to_smf(timeline: &Timeline) -> Result<Smf<'_>> {
    let ticks_per_beat = u16::try_from(timeline.ticks_per_beat)
        .ok()
        .filter(|&t| t > 0 && t <= 0x7fff)
        .ok_or_else(|| {
            GenError::InvalidConfig(format!(
                "ticks_per_beat {} outside 1-32767",
                timeline.ticks_per_beat
            ))
        })?;
    let micros_per_beat = match timeline.tempo_bpm {
        0 => None,
        bpm => Some(60_000_000 / bpm).filter(|&us| us <= 0xff_ffff),
    }
    .ok_or_else(|| {
        GenError::InvalidConfig(format!("tempo {} bpm out of range", timeline.tempo_bpm))
    })?;

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(ticks_per_beat)),
    ));

    let mut tempo_track: Track<'_> = Vec::new();
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_beat))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    for (i, source) in timeline.tracks.iter().enumerate() {
        let channel = u4::new(CHANNELS[i % CHANNELS.len()]);
        let mut track: Track<'_> = Vec::with_capacity(source.events.len() + 2);

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(source.name.as_bytes())),
        });

        for event in &source.events {
            let key = u7::new(event.key);
            let vel = u7::new(event.velocity);
            let message = match event.kind {
                EventKind::On => MidiMessage::NoteOn { key, vel },
                EventKind::Off => MidiMessage::NoteOff { key, vel },
            };
            track.push(TrackEvent {
                delta: vlq_delta(event.delta)?,
                kind: TrackEventKind::Midi { channel, message },
            });
        }

        track.push(TrackEvent {
            delta: vlq_delta(source.trailing_ticks)?,
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    Ok(smf)
}

fn vlq_delta(delta: Ticks) -> Result<u28> {
    if delta > MAX_DELTA {
        return Err(GenError::DeltaOverflow(delta));
    }
    Ok(u28::new(delta))
}
