// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio-domain to UI-domain hand-off.
//!
//! Clock callbacks run on the dispatch thread; anything the view layer
//! needs to see is enqueued here as a `UiEvent` and drained once per
//! display refresh. UI state updates never happen on the audio path.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use crate::playback::ClipId;

/// Progress and status notifications for the embedding view layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The active chord changed; `None` means no chord is active
    ChordChange(Option<usize>),
    /// A beat elapsed within the active chord
    Beat { chord: usize, beat: u32 },
    /// The schedule ran to completion
    Finished,
    /// A clip's audio source failed to load; playback continues without it
    ClipLoadFailed { clip: ClipId, message: String },
}

/// Producer half, cloned into clock and loader threads
#[derive(Clone)]
pub struct UiSender {
    tx: Sender<UiEvent>,
}

impl UiSender {
    /// Enqueue an event; silently dropped if the consumer is gone
    pub fn send(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

/// Consumer half, owned by the engine and drained by the view layer
pub struct UiEventQueue {
    rx: Receiver<UiEvent>,
}

impl UiEventQueue {
    /// Take every queued event, oldest first
    pub fn drain(&self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

/// Create a connected sender/queue pair
pub fn ui_channel() -> (UiSender, UiEventQueue) {
    let (tx, rx) = channel();
    (UiSender { tx }, UiEventQueue { rx })
}
