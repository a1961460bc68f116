// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for chordloop
//!
//! These tests verify that the compiler, transport, mixer, and clip
//! synchronizer hold their contracts when wired together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chordloop::audio::{ClipAudio, ClipDeck, Instrument, VoicePlacement};
use chordloop::engine::Engine;
use chordloop::messaging::ui_channel;
use chordloop::music::{Chord, MidiNote, Progression, StrummingPattern};
use chordloop::playback::{
    compile, total_duration, ClipId, ClipSynchronizer, EventKind, NewClip, PlaybackState,
    TrackMixer, TransportController,
};
use chordloop::timing::TransportTiming;

fn random_chart(rng: &mut StdRng) -> Vec<Chord> {
    let len = rng.gen_range(1..=12);
    (0..len)
        .map(|i| {
            let beats = rng.gen_range(1..=8);
            let pattern = match rng.gen_range(0..5) {
                0 => StrummingPattern::Once,
                1 => StrummingPattern::Down,
                2 => StrummingPattern::DownUp,
                3 => StrummingPattern::DownDownUp,
                _ => StrummingPattern::Folk,
            };
            let mut fingering = [-1i8; 6];
            for fret in fingering.iter_mut() {
                *fret = rng.gen_range(-1..=12);
            }
            Chord::new(format!("chord{i}"), beats, fingering).with_pattern(pattern)
        })
        .collect()
}

fn random_tempo(rng: &mut StdRng) -> f64 {
    rng.gen_range(20.0..=300.0)
}

/// Compiling the same chart twice yields byte-identical schedules
#[test]
fn test_compile_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    for _ in 0..50 {
        let chart = random_chart(&mut rng);
        let bpm = random_tempo(&mut rng);
        assert_eq!(compile(&chart, bpm), compile(&chart, bpm));
    }
}

/// The finish event lands at sum(beats) * 60/bpm
#[test]
fn test_total_duration_matches_beat_sum() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let chart = random_chart(&mut rng);
        let bpm = random_tempo(&mut rng);
        let beats: u64 = chart.iter().map(|c| c.beats as u64).sum();
        let expected = beats as f64 * 60.0 / bpm.clamp(20.0, 300.0);
        let events = compile(&chart, bpm);
        assert!((total_duration(&events) - expected).abs() < 1e-9);
    }
}

/// Event times never decrease
#[test]
fn test_schedule_is_time_ordered() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let chart = random_chart(&mut rng);
        let events = compile(&chart, random_tempo(&mut rng));
        for pair in events.windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
    }
}

/// Every chord change coincides with its chord's beat-0 tick and is
/// ordered no later than it
#[test]
fn test_chord_change_coincides_with_first_tick() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..50 {
        let chart = random_chart(&mut rng);
        let events = compile(&chart, random_tempo(&mut rng));
        for index in 0..chart.len() {
            let change = events
                .iter()
                .position(|e| e.kind == EventKind::ChordChange { chord: index })
                .expect("every chord gets a change event");
            let tick = events
                .iter()
                .position(|e| e.kind == (EventKind::BeatTick { chord: index, beat: 0 }))
                .expect("every chord gets a beat-0 tick");
            assert!(change < tick);
            assert_eq!(events[change].time, events[tick].time);
        }
    }
}

// ---------------------------------------------------------------------------

struct NullInstrument;

impl Instrument for NullInstrument {
    fn strum_chord(&mut self, _chord: &Chord, _capo: u8, _spb: f64) {}
    fn trigger_notes(&mut self, _notes: &[MidiNote], _velocity: u8, _stagger: f64) {}
    fn trigger_note(&mut self, _string: usize, _fret: i8, _capo: u8) {}
    fn silence(&mut self) {}
}

fn test_transport() -> (TransportController, chordloop::messaging::UiEventQueue) {
    let instrument: Arc<Mutex<dyn Instrument>> = Arc::new(Mutex::new(NullInstrument));
    let (ui, queue) = ui_channel();
    (TransportController::new(instrument, ui), queue)
}

/// Rapid play/play and stop/stop cycles never accumulate events beyond a
/// single compiled schedule
#[test]
fn test_rapid_cycles_cancel_cleanly() {
    let (mut transport, _queue) = test_transport();
    // Slow enough that nothing fires mid-test
    let chart = Progression::from_chords([
        Chord::new("C", 16, [-1, 3, 2, 0, 1, 0]),
        Chord::new("G", 16, [3, 2, 0, 0, 0, 3]),
    ]);
    let one_schedule = compile(chart.chords(), 20.0).len();

    for _ in 0..8 {
        transport.play(&chart, 20.0).unwrap();
    }
    assert!(transport.pending_events() <= one_schedule);

    transport.stop();
    transport.stop();
    assert_eq!(transport.pending_events(), 0);
    assert_eq!(transport.state(), PlaybackState::Idle);
}

/// A short run drives chord/beat callbacks in order and finishes
#[test]
fn test_transport_end_to_end_callbacks() {
    use chordloop::messaging::UiEvent;

    let (mut transport, queue) = test_transport();
    let chart = Progression::from_chords([
        Chord::new("C", 1, [-1, 3, 2, 0, 1, 0]),
        Chord::new("G", 1, [3, 2, 0, 0, 0, 3]),
    ]);
    transport.play(&chart, 300.0).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.state() != PlaybackState::Idle && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(transport.state(), PlaybackState::Idle);

    let events = queue.drain();
    let changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::ChordChange(Some(i)) => Some(*i),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![0, 1]);

    // The chord index must never be observed after a beat of a later chord
    let mut current = None;
    for event in &events {
        match event {
            UiEvent::ChordChange(Some(i)) => current = Some(*i),
            UiEvent::Beat { chord, .. } => assert_eq!(Some(*chord), current),
            _ => {}
        }
    }
    assert!(events.contains(&UiEvent::Finished));
}

// ---------------------------------------------------------------------------

/// Soloing one track silences the others; mute wins over solo on the
/// same track
#[test]
fn test_solo_precedence_scenario() {
    let mut mixer = TrackMixer::new();
    let a = mixer.add_audio_track("A");
    let b = mixer.add_audio_track("B");
    let c = mixer.add_audio_track("C");
    mixer.set_soloed(a, true).unwrap();
    mixer.set_muted(c, true).unwrap();
    mixer.set_soloed(c, true).unwrap();

    let audibility = mixer.resolve_audibility();
    assert_eq!(audibility[&a], true);
    assert_eq!(audibility[&b], false);
    assert_eq!(audibility[&c], false);
}

// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingDeck {
    added: Vec<(ClipId, VoicePlacement)>,
    removed: Vec<ClipId>,
}

impl ClipDeck for RecordingDeck {
    fn add_voice(
        &mut self,
        id: ClipId,
        _audio: ClipAudio,
        placement: VoicePlacement,
        _gain: f32,
        _silent: bool,
    ) {
        self.added.push((id, placement));
    }
    fn remove_voice(&mut self, id: ClipId) {
        self.removed.push(id);
    }
    fn set_voice_silent(&mut self, _id: ClipId, _silent: bool) {}
    fn set_voice_gain(&mut self, _id: ClipId, _gain: f32) {}
    fn set_voice_placement(&mut self, _id: ClipId, _placement: VoicePlacement) {}
}

fn write_test_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..441 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// A clip at startBeat 4 lands exactly on the second chord's change time
/// in a [C(4), G(4)] chart at 120 BPM
#[test]
fn test_clip_aligns_with_chord_change() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("clip.wav");
    write_test_wav(&wav);

    let chart = [
        Chord::new("C", 4, [-1, 3, 2, 0, 1, 0]),
        Chord::new("G", 4, [3, 2, 0, 0, 0, 3]),
    ];
    let timing = TransportTiming::new(120.0);
    let events = compile(&chart, 120.0);
    let second_change = events
        .iter()
        .find(|e| e.kind == EventKind::ChordChange { chord: 1 })
        .unwrap();

    let mut mixer = TrackMixer::new();
    let track = mixer.add_audio_track("Backing");
    let (ui, _queue) = ui_channel();
    let mut sync = ClipSynchronizer::new();
    let mut deck = RecordingDeck::default();
    sync.add_clip(NewClip {
        track,
        name: String::from("backing"),
        source: wav,
        start_beat: 4.0,
        beats: 8.0,
        offset_beats: 0.0,
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while deck.added.is_empty() && Instant::now() < deadline {
        sync.pump(&mut deck, &timing, &mixer, &ui);
        thread::sleep(Duration::from_millis(5));
    }

    let (_, placement) = deck.added[0];
    assert!((placement.start_secs - 2.0).abs() < 1e-12);
    assert!((placement.start_secs - second_change.time).abs() < 1e-12);
}

/// Deleting a track takes its clips with it in the same operation
#[test]
fn test_track_deletion_cascade() {
    let mut engine = Engine::new();
    let doomed = engine.add_track();
    let kept = engine.add_track();

    let clip = |track, name: &str| NewClip {
        track,
        name: name.into(),
        source: PathBuf::from("missing.wav"),
        start_beat: 0.0,
        beats: 4.0,
        offset_beats: 0.0,
    };
    engine.add_clip(clip(doomed, "one")).unwrap();
    engine.add_clip(clip(doomed, "two")).unwrap();
    engine.add_clip(clip(kept, "three")).unwrap();

    engine.remove_track(doomed).unwrap();
    assert_eq!(engine.clip_count(), 1);
    assert!(engine.clips().all(|c| c.track == kept));
}

// ---------------------------------------------------------------------------

/// The full 60 BPM two-chord scenario: exact times, tags, and payloads
#[test]
fn test_sixty_bpm_scenario_event_list() {
    let chart = [
        Chord::new("C", 4, [-1, 3, 2, 0, 1, 0]).with_pattern(StrummingPattern::Once),
        Chord::new("G", 4, [3, 2, 0, 0, 0, 3]).with_pattern(StrummingPattern::Down),
    ];
    let events = compile(&chart, 60.0);

    let expected: Vec<(f64, EventKind)> = vec![
        (0.0, EventKind::ChordChange { chord: 0 }),
        (0.0, EventKind::BeatTick { chord: 0, beat: 0 }),
        (0.0, EventKind::Strum { chord: 0 }),
        (1.0, EventKind::BeatTick { chord: 0, beat: 1 }),
        (2.0, EventKind::BeatTick { chord: 0, beat: 2 }),
        (3.0, EventKind::BeatTick { chord: 0, beat: 3 }),
        (4.0, EventKind::ChordChange { chord: 1 }),
        (4.0, EventKind::BeatTick { chord: 1, beat: 0 }),
        (4.0, EventKind::Strum { chord: 1 }),
        (5.0, EventKind::BeatTick { chord: 1, beat: 1 }),
        (5.0, EventKind::Strum { chord: 1 }),
        (6.0, EventKind::BeatTick { chord: 1, beat: 2 }),
        (6.0, EventKind::Strum { chord: 1 }),
        (7.0, EventKind::BeatTick { chord: 1, beat: 3 }),
        (7.0, EventKind::Strum { chord: 1 }),
        (8.0, EventKind::Finish),
    ];

    assert_eq!(events.len(), expected.len());
    for (event, (time, kind)) in events.iter().zip(&expected) {
        assert_eq!(event.time, *time);
        assert_eq!(event.kind, *kind);
    }
}
