// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};

use chordloop::config::{SessionEvent, SessionFile, SessionWatcher};
use chordloop::engine::Engine;
use chordloop::messaging::UiEvent;
use chordloop::music::Progression;
use chordloop::playback::{compile, EventKind, NewClip, TrackId, TrackKind};

fn print_usage() {
    println!("CHORDLOOP - Chord progression playback engine");
    println!();
    println!("Usage: chordloop <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  play <session.yaml> [--watch]   Play a session (--watch hot-reloads edits)");
    println!("  check <session.yaml>            Validate a session and print its schedule");
    println!("  init <session.yaml>             Write a starter session file");
    println!("  --help                          Show this help message");
}

/// Push a session's tracks, clips, and settings into the engine,
/// returning the chart to play. Existing audio tracks are torn down
/// first so a hot reload starts clean.
fn apply_session(engine: &mut Engine, session: &SessionFile) -> Result<Progression> {
    engine.stop();
    engine.set_capo(session.session.capo);
    engine.set_sound_bank(session.session.sound_bank);
    if let Some(soundfont) = &session.session.soundfont {
        engine.load_soundfont(soundfont)?;
    }
    engine.set_looping(session.session.looping);

    let stale: Vec<TrackId> = engine
        .tracks()
        .iter()
        .filter(|t| t.kind == TrackKind::Audio)
        .map(|t| t.id)
        .collect();
    for id in stale {
        engine.remove_track(id)?;
    }

    let mut track_ids = Vec::with_capacity(session.tracks.len());
    for spec in &session.tracks {
        let id = engine.add_track_named(spec.name.clone());
        engine.set_track_muted(id, spec.muted)?;
        engine.set_track_soloed(id, spec.soloed)?;
        engine.set_track_gain(id, spec.gain)?;
        track_ids.push(id);
    }

    for spec in &session.clips {
        let track = *track_ids
            .get(spec.track)
            .ok_or_else(|| anyhow!("clip '{}' references missing track {}", spec.name, spec.track))?;
        let id = engine.add_clip(NewClip {
            track,
            name: spec.name.clone(),
            source: spec.file.clone(),
            start_beat: spec.start_beat,
            beats: spec.beats,
            offset_beats: spec.offset_beats,
        })?;
        if spec.muted {
            engine.set_clip_muted(id, true)?;
        }
    }

    session.progression()
}

fn load_checked(path: &str) -> Result<SessionFile> {
    let session = SessionFile::load(path)?;
    let problems = session.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        return Err(anyhow!("{} problem(s) in {}", problems.len(), path));
    }
    Ok(session)
}

fn play_command(path: &str, watch: bool) -> Result<()> {
    let mut session = load_checked(path)?;
    let watcher = if watch {
        Some(SessionWatcher::new(path, None)?)
    } else {
        None
    };

    let mut engine = Engine::new();
    let mut progression = apply_session(&mut engine, &session)?;
    engine
        .play(&progression, session.session.tempo)
        .map_err(|e| {
            if e.is_retryable() {
                anyhow!("{e} (is an audio output device available?)")
            } else {
                anyhow!(e)
            }
        })?;

    let mut chord_names: Vec<String> = progression
        .chords()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    println!(
        "Playing '{}' at {} BPM ({} chords, {} beats{})",
        session.session.name,
        session.session.tempo,
        chord_names.len(),
        progression.total_beats(),
        if session.session.looping { ", looping" } else { "" },
    );
    if session.session.looping || watch {
        println!("Press Ctrl+C to stop.");
    }

    let mut finished = false;
    loop {
        for event in engine.poll_events() {
            match event {
                UiEvent::ChordChange(Some(index)) => {
                    if let Some(name) = chord_names.get(index) {
                        println!("  > {name}");
                    }
                }
                UiEvent::ChordChange(None) => {}
                UiEvent::Beat { .. } => {}
                UiEvent::Finished => {
                    println!("Done.");
                    finished = true;
                }
                UiEvent::ClipLoadFailed { clip, message } => {
                    eprintln!("warning: {clip} failed to load: {message}");
                }
            }
        }

        if let Some(watcher) = &watcher {
            match watcher.try_recv() {
                Some(SessionEvent::Reloaded(reloaded)) => {
                    println!("Session changed; reloading...");
                    session = *reloaded;
                    progression = apply_session(&mut engine, &session)?;
                    engine.play(&progression, session.session.tempo)?;
                    chord_names = progression.chords().iter().map(|c| c.name.clone()).collect();
                    finished = false;
                }
                Some(SessionEvent::Error(message)) => {
                    eprintln!("warning: session not reloaded: {message}");
                }
                None => {}
            }
        }

        if finished && !watch {
            break;
        }
        // Display refresh cadence
        thread::sleep(Duration::from_millis(16));
    }

    engine.stop();
    Ok(())
}

fn check_command(path: &str) -> Result<()> {
    let session = load_checked(path)?;
    let progression = session.progression()?;
    let events = compile(progression.chords(), session.session.tempo);

    println!(
        "'{}': {} chords, {} beats at {} BPM",
        session.session.name,
        progression.len(),
        progression.total_beats(),
        session.session.tempo
    );
    println!();
    for event in &events {
        let description = match event.kind {
            EventKind::ChordChange { chord } => {
                format!("chord  -> {}", progression.chords()[chord].name)
            }
            EventKind::BeatTick { chord, beat } => {
                format!("beat   {} of {}", beat + 1, progression.chords()[chord].name)
            }
            EventKind::Strum { chord } => {
                format!("strum  {}", progression.chords()[chord].name)
            }
            EventKind::Finish => String::from("finish"),
        };
        println!("{:>9.3}s  {description}", event.time);
    }
    println!();
    println!("{} events OK", events.len());
    Ok(())
}

fn init_command(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        return Err(anyhow!("{path} already exists; not overwriting"));
    }
    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("Untitled"));
    SessionFile::starter(name).save(path)?;
    println!("Wrote starter session to {path}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("CHORDLOOP - Chord progression playback engine");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "play" => {
            if args.len() < 3 {
                eprintln!("Error: play requires a session file");
                std::process::exit(1);
            }
            let watch = args.iter().any(|a| a == "--watch");
            play_command(&args[2], watch)?;
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("Error: check requires a session file");
                std::process::exit(1);
            }
            check_command(&args[2])?;
        }
        "init" => {
            if args.len() < 3 {
                eprintln!("Error: init requires a target file");
                std::process::exit(1);
            }
            init_command(&args[2])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
