// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Schedule compilation.
//!
//! Turns a chord chart plus a tempo into an ordered list of timed events.
//! Compilation is a pure function: identical input produces an identical
//! event list, so a chart can be recompiled at any time (tempo change,
//! mid-edit restart) and the result compared or re-submitted safely.

use crate::music::{Chord, StrummingPattern};
use crate::timing::TransportTiming;

/// What a scheduled event triggers when it fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// The chord at `chord` becomes active
    ChordChange { chord: usize },
    /// A beat elapsed; `beat` counts from 0 within the chord
    BeatTick { chord: usize, beat: u32 },
    /// The instrument strums the chord at `chord`
    Strum { chord: usize },
    /// End of the schedule
    Finish,
}

/// A compiled, immutable schedule entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Absolute offset in seconds from the start of the run
    pub time: f64,
    pub kind: EventKind,
}

impl ScheduledEvent {
    fn at(time: f64, kind: EventKind) -> Self {
        Self { time, kind }
    }
}

/// Compile a chord chart at a tempo into a timed event schedule.
///
/// Per chord, per beat `b`: a `BeatTick` fires at `(offset + b) * spb`.
/// The chord's first beat also carries a `ChordChange` (ordered before the
/// coincident tick, so a consumer never sees a beat index ahead of its
/// chord) and a `Strum`. `Down` chords strum on every beat; all other
/// patterns strum once and leave the articulation to the instrument layer.
/// Exactly one `Finish` trails the schedule at the total duration.
///
/// An empty chart compiles to a single `Finish` at time zero. Tempi
/// outside the supported range are clamped; callers that want rejection
/// validate before compiling.
pub fn compile(chords: &[Chord], bpm: f64) -> Vec<ScheduledEvent> {
    let spb = TransportTiming::new(bpm).seconds_per_beat();

    let mut events = Vec::new();
    let mut offset: u64 = 0;

    for (index, chord) in chords.iter().enumerate() {
        for beat in 0..chord.beats {
            let time = (offset + beat as u64) as f64 * spb;
            if beat == 0 {
                events.push(ScheduledEvent::at(time, EventKind::ChordChange { chord: index }));
            }
            events.push(ScheduledEvent::at(
                time,
                EventKind::BeatTick {
                    chord: index,
                    beat,
                },
            ));
            if beat == 0 || chord.pattern == StrummingPattern::Down {
                events.push(ScheduledEvent::at(time, EventKind::Strum { chord: index }));
            }
        }
        offset += chord.beats as u64;
    }

    events.push(ScheduledEvent::at(offset as f64 * spb, EventKind::Finish));
    events
}

/// Total duration of a compiled schedule in seconds (the `Finish` time)
pub fn total_duration(events: &[ScheduledEvent]) -> f64 {
    events
        .iter()
        .rev()
        .find(|event| event.kind == EventKind::Finish)
        .map(|event| event.time)
        .unwrap_or(0.0)
}
