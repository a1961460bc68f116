// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport controller.
//!
//! Owns the playback lifecycle: validates a chart, compiles it, arms the
//! clock, and routes fired events to the instrument and the UI queue.
//!
//! Every `play` and `stop` performs a full cancel of the previous schedule
//! and bumps a run epoch; an event that fires carrying a stale epoch is a
//! no-op. A leaked callback from a dead run corrupting the UI's notion of
//! the current position is the failure mode this design exists to prevent.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use super::compiler::{compile, total_duration, EventKind, ScheduledEvent};
use crate::audio::Instrument;
use crate::messaging::{UiEvent, UiSender};
use crate::music::{Chord, ChordError, Progression};
use crate::timing::{tempo_in_range, Dispatch, SoftwareClock, TransportTiming};

/// Lifecycle of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing scheduled
    Idle,
    /// A schedule is being armed
    Scheduled,
    /// The clock is advancing through a schedule
    Running,
    /// Explicitly stopped; transitions straight back to `Idle`
    Stopped,
    /// Ran to its finish; transitions straight back to `Idle`
    Finished,
}

/// Errors reported at `play`/`set_tempo` time
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("progression is empty; nothing to schedule")]
    EmptyProgression,
    #[error(transparent)]
    InvalidChord(#[from] ChordError),
    #[error("tempo {0} BPM is outside the supported 20-300 BPM range")]
    TempoOutOfRange(f64),
    #[error("audio runtime unavailable: {0}")]
    AudioUnavailable(String),
}

impl TransportError {
    /// Whether retrying the operation can succeed (e.g. after a user
    /// gesture unlocks the audio runtime)
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::AudioUnavailable(_))
    }
}

/// A compiled event tagged with the run that scheduled it
#[derive(Debug, Clone, Copy)]
struct FiredEvent {
    epoch: u64,
    event: ScheduledEvent,
}

/// State shared with the clock dispatch thread
struct RunState {
    state: PlaybackState,
    /// Incremented on every play/stop; stale events check against it
    epoch: u64,
    /// The chart as it was when the schedule compiled
    snapshot: Vec<Chord>,
    seconds_per_beat: f64,
    /// Mixer-resolved audibility of the chords track; gates strums only
    chords_audible: bool,
    capo: u8,
}

/// Owns playback: compile, arm, run, cancel.
pub struct TransportController {
    clock: SoftwareClock<FiredEvent>,
    run: Arc<Mutex<RunState>>,
    ui: UiSender,
    instrument: Arc<Mutex<dyn Instrument>>,
    timing: TransportTiming,
    looping: bool,
}

impl TransportController {
    pub fn new(instrument: Arc<Mutex<dyn Instrument>>, ui: UiSender) -> Self {
        let run = Arc::new(Mutex::new(RunState {
            state: PlaybackState::Idle,
            epoch: 0,
            snapshot: Vec::new(),
            seconds_per_beat: TransportTiming::default().seconds_per_beat(),
            chords_audible: true,
            capo: 0,
        }));

        let handler_run = Arc::clone(&run);
        let handler_ui = ui.clone();
        let handler_instrument = Arc::clone(&instrument);
        let clock = SoftwareClock::new(move |fired| {
            dispatch(&handler_run, &handler_ui, &handler_instrument, fired)
        });

        Self {
            clock,
            run,
            ui,
            instrument,
            timing: TransportTiming::default(),
            looping: false,
        }
    }

    /// Compile the progression and start playing it from the top.
    ///
    /// If a run is already in progress its schedule is fully canceled
    /// first; no event of the old run can fire into the new one.
    pub fn play(&mut self, progression: &Progression, bpm: f64) -> Result<(), TransportError> {
        if !tempo_in_range(bpm) {
            return Err(TransportError::TempoOutOfRange(bpm));
        }
        if progression.is_empty() {
            return Err(TransportError::EmptyProgression);
        }
        progression.validate()?;

        let snapshot = progression.chords().to_vec();
        info!(
            chords = snapshot.len(),
            bpm,
            looping = self.looping,
            "starting playback"
        );
        self.schedule_run(snapshot, bpm, 0.0);
        Ok(())
    }

    /// Cancel everything, halt and rewind the clock, and clear the UI's
    /// active chord. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Ok(mut run) = self.run.lock() {
            run.epoch += 1;
            run.state = PlaybackState::Idle;
        }
        self.clock.cancel_all();
        self.clock.stop();
        if let Ok(mut instrument) = self.instrument.lock() {
            instrument.silence();
        }
        // Synchronous sentinel so the UI cannot keep showing a stale chord
        self.ui.send(UiEvent::ChordChange(None));
        debug!("transport stopped");
    }

    /// Change tempo. While running this recompiles and reschedules,
    /// keeping the playhead at the same beat.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), TransportError> {
        if !tempo_in_range(bpm) {
            return Err(TransportError::TempoOutOfRange(bpm));
        }
        if self.state() == PlaybackState::Running {
            let beats = self.playhead_beats();
            let snapshot = self
                .run
                .lock()
                .map(|run| run.snapshot.clone())
                .unwrap_or_default();
            self.schedule_run(snapshot, bpm, beats);
        } else {
            self.timing = TransportTiming::new(bpm);
        }
        Ok(())
    }

    /// Jump the playhead to a beat position
    pub fn seek(&mut self, beats: f64) {
        self.clock.seek(self.timing.beats_to_seconds(beats.max(0.0)));
    }

    /// Enable or disable looping. While running, the schedule is re-armed
    /// at the current beat with the loop boundary applied.
    pub fn set_looping(&mut self, looping: bool) {
        if self.looping == looping {
            return;
        }
        self.looping = looping;
        if self.state() == PlaybackState::Running {
            let beats = self.playhead_beats();
            let (snapshot, bpm) = match self.run.lock() {
                Ok(run) => (run.snapshot.clone(), self.timing.tempo()),
                Err(_) => return,
            };
            self.schedule_run(snapshot, bpm, beats);
        }
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Current playhead position in beats, for scrubbing and visual sync
    pub fn playhead_beats(&self) -> f64 {
        self.timing.seconds_to_beats(self.clock.position())
    }

    pub fn state(&self) -> PlaybackState {
        self.run
            .lock()
            .map(|run| run.state)
            .unwrap_or(PlaybackState::Idle)
    }

    pub fn timing(&self) -> TransportTiming {
        self.timing
    }

    /// Mixer feedback: whether strums should sound
    pub fn set_chords_audible(&mut self, audible: bool) {
        if let Ok(mut run) = self.run.lock() {
            run.chords_audible = audible;
        }
    }

    pub fn set_capo(&mut self, capo: u8) {
        if let Ok(mut run) = self.run.lock() {
            run.capo = capo.min(crate::music::MAX_CAPO);
        }
    }

    /// Number of armed-but-unfired events (diagnostics and tests)
    pub fn pending_events(&self) -> usize {
        self.clock.pending_len()
    }

    /// Total duration of the current run's schedule in seconds
    pub fn run_total_seconds(&self) -> f64 {
        self.run
            .lock()
            .map(|run| {
                let beats: u64 = run.snapshot.iter().map(|c| c.beats as u64).sum();
                beats as f64 * run.seconds_per_beat
            })
            .unwrap_or(0.0)
    }

    /// Cancel the previous run, arm a fresh schedule, and start the clock
    /// at `start_beats`.
    fn schedule_run(&mut self, snapshot: Vec<Chord>, bpm: f64, start_beats: f64) {
        self.timing = TransportTiming::new(bpm);
        let spb = self.timing.seconds_per_beat();
        let events = compile(&snapshot, bpm);
        let total = total_duration(&events);

        // Bump the epoch before touching the clock so an event already in
        // flight on the dispatch thread lands dead.
        let epoch = match self.run.lock() {
            Ok(mut run) => {
                run.epoch += 1;
                run.state = PlaybackState::Scheduled;
                run.snapshot = snapshot;
                run.seconds_per_beat = spb;
                run.epoch
            }
            Err(_) => return,
        };
        self.clock.cancel_all();
        self.clock.stop();

        for event in &events {
            // Looping suppresses Finish in favor of the implicit wrap
            if self.looping && event.kind == EventKind::Finish {
                continue;
            }
            self.clock.schedule_at(
                event.time,
                FiredEvent {
                    epoch,
                    event: *event,
                },
            );
        }
        self.clock.set_loop(self.looping.then_some(total));
        if start_beats > 0.0 {
            self.clock.seek(self.timing.beats_to_seconds(start_beats));
        }
        // Running must be observable before the first event can fire, or a
        // time-zero event would be discarded as stale
        if let Ok(mut run) = self.run.lock() {
            run.state = PlaybackState::Running;
        }
        self.clock.start();
        debug!(events = events.len(), total_secs = total, "schedule armed");
    }
}

/// Clock-thread event dispatch. Runs with no transport locks held on
/// entry; anything stale (old epoch, not running) is a no-op.
fn dispatch(
    run: &Arc<Mutex<RunState>>,
    ui: &UiSender,
    instrument: &Arc<Mutex<dyn Instrument>>,
    fired: FiredEvent,
) -> Dispatch {
    let Ok(mut state) = run.lock() else {
        return Dispatch::Continue;
    };
    if fired.epoch != state.epoch || state.state != PlaybackState::Running {
        return Dispatch::Continue;
    }

    match fired.event.kind {
        EventKind::ChordChange { chord } => {
            ui.send(UiEvent::ChordChange(Some(chord)));
            Dispatch::Continue
        }
        EventKind::BeatTick { chord, beat } => {
            ui.send(UiEvent::Beat { chord, beat });
            Dispatch::Continue
        }
        EventKind::Strum { chord } => {
            if state.chords_audible {
                if let Some(chord) = state.snapshot.get(chord).cloned() {
                    let capo = state.capo;
                    let spb = state.seconds_per_beat;
                    drop(state);
                    if let Ok(mut instrument) = instrument.lock() {
                        instrument.strum_chord(&chord, capo, spb);
                    }
                }
            }
            Dispatch::Continue
        }
        EventKind::Finish => {
            // Finished is momentary; the run settles back to Idle and the
            // epoch bump retires any stragglers
            state.state = PlaybackState::Idle;
            state.epoch += 1;
            drop(state);
            ui.send(UiEvent::Finished);
            ui.send(UiEvent::ChordChange(None));
            Dispatch::Stop
        }
    }
}
