// Relative-time note events and the tracks they are appended to.
//
// Every event carries the number of ticks since the previous event on the
// same track, the way a MIDI track chunk stores time. A group of
// simultaneous events is one event with the real delta followed by events
// with delta 0. Replaying a track by summing deltas gives absolute times;
// see `EventTrack::absolute`.
//
// A track also remembers `trailing_ticks`: silence still pending when its
// scheduler was finished. The sum of all deltas plus the trailing ticks is
// the track's length, and it is the same for every track of a song.

use serde::{Deserialize, Serialize};

/// Atomic time unit. One bar is `4 * ticks_per_beat`.
pub type Ticks = u32;

/// Velocity used for every note.
pub const DEFAULT_VELOCITY: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Note code, 0-127.
    pub key: u8,
    pub kind: EventKind,
    /// Ticks since the previous event on this track.
    pub delta: Ticks,
    pub velocity: u8,
}

impl Event {
    pub fn on(key: u8, delta: Ticks) -> Self {
        Event {
            key,
            kind: EventKind::On,
            delta,
            velocity: DEFAULT_VELOCITY,
        }
    }

    pub fn off(key: u8, delta: Ticks) -> Self {
        Event {
            key,
            kind: EventKind::Off,
            delta,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

/// An event placed on the absolute timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Ticks since the start of the track. Wider than `Ticks` because a long
    /// song's deltas can sum past `u32::MAX`.
    pub time: u64,
    pub key: u8,
    pub kind: EventKind,
}

/// Append-only sequence of events for one output track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTrack {
    pub name: String,
    pub events: Vec<Event>,
    /// Pending silence after the last event.
    pub trailing_ticks: Ticks,
}

impl EventTrack {
    pub fn new(name: impl Into<String>) -> Self {
        EventTrack {
            name: name.into(),
            events: Vec::new(),
            trailing_ticks: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of every emitted delta. Widened so long songs can't overflow.
    pub fn total_delta(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.delta)).sum()
    }

    /// Total length including the trailing silence.
    pub fn length(&self) -> u64 {
        self.total_delta() + u64::from(self.trailing_ticks)
    }

    /// Replay deltas into absolute times.
    pub fn absolute(&self) -> Vec<TimedEvent> {
        let mut now: u64 = 0;
        self.events
            .iter()
            .map(|e| {
                now += u64::from(e.delta);
                TimedEvent {
                    time: now,
                    key: e.key,
                    kind: e.kind,
                }
            })
            .collect()
    }

    /// Number of note-on events.
    pub fn onset_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind == EventKind::On).count()
    }
}
