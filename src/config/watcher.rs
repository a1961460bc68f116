// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Session file watcher for hot reload.
//!
//! Watches one session file and emits a reparsed `SessionFile` when it
//! changes. Edits are debounced; a file that fails to parse emits an
//! error event and the previous session stays in effect.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use super::SessionFile;

/// Events emitted by the session watcher
#[derive(Debug)]
pub enum SessionEvent {
    /// The file changed and parsed cleanly
    Reloaded(Box<SessionFile>),
    /// The file changed but could not be parsed or validated
    Error(String),
}

/// Watches a session file and reports debounced reloads
pub struct SessionWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<SessionEvent>,
    path: PathBuf,
}

impl SessionWatcher {
    /// Watch `path`, debouncing rapid edits by `debounce_ms` (default 300)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let debounce = Duration::from_millis(debounce_ms.unwrap_or(300));

        let (event_tx, event_rx): (Sender<SessionEvent>, Receiver<SessionEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch {:?}: {}", path, e))?;

        let reload_path = path.clone();
        std::thread::spawn(move || {
            let mut dirty_since: Option<Instant> = None;
            loop {
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            dirty_since = Some(Instant::now());
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }

                let due = dirty_since.is_some_and(|since| since.elapsed() >= debounce);
                if due {
                    dirty_since = None;
                    let outcome = reload(&reload_path);
                    if event_tx.send(outcome).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            events: event_rx,
            path,
        })
    }

    /// The watched path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking poll for the next watcher event
    pub fn try_recv(&self) -> Option<SessionEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Re-read and validate the watched session file
fn reload(path: &Path) -> SessionEvent {
    match SessionFile::load(path) {
        Ok(session) => {
            let problems = session.validate();
            if problems.is_empty() {
                SessionEvent::Reloaded(Box::new(session))
            } else {
                warn!(?path, "reloaded session failed validation");
                SessionEvent::Error(problems.join("; "))
            }
        }
        Err(error) => SessionEvent::Error(error.to_string()),
    }
}
