// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Software transport clock.
//!
//! A cancelable queue of time-keyed events dispatched by a background
//! thread against a monotonic clock. Supports full cancelation, seeking,
//! and a loop boundary that re-arms the whole queue on each wrap.
//!
//! Dispatch runs on the clock thread with no locks held, so handlers may
//! call back into shared state without deadlocking the scheduler.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shortest sleep between dispatch passes
const MIN_NAP: Duration = Duration::from_micros(100);

/// Sleep used when idle or when no event is near
const IDLE_NAP: Duration = Duration::from_millis(2);

/// Handler verdict after an event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep the clock running
    Continue,
    /// Halt the clock and rewind to zero (end of a run)
    Stop,
}

/// A scheduled item keyed by absolute time in seconds.
///
/// Ordered by (time, submission sequence), reversed for min-heap behavior.
#[derive(Debug, Clone)]
struct Queued<T> {
    time: f64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Queued<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<T> Eq for Queued<T> {}

impl<T> Ord for Queued<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior; seq breaks ties so
        // same-time events fire in submission order
        other
            .time
            .total_cmp(&self.time)
            .then(other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Queued<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner<T> {
    /// Events not yet fired this pass
    pending: BinaryHeap<Queued<T>>,
    /// Full schedule, kept for loop re-arm and backward seeks
    armed: Vec<Queued<T>>,
    /// Wall-clock anchor while running
    started: Option<Instant>,
    /// Position in seconds at the anchor
    base: f64,
    running: bool,
    /// Loop boundary in seconds; wrapping re-arms the schedule
    loop_end: Option<f64>,
    seq: u64,
}

impl<T: Clone> Inner<T> {
    fn new() -> Self {
        Self {
            pending: BinaryHeap::new(),
            armed: Vec::new(),
            started: None,
            base: 0.0,
            running: false,
            loop_end: None,
            seq: 0,
        }
    }

    fn raw_position(&self) -> f64 {
        let elapsed = self
            .started
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.base + elapsed
    }

    fn rearm(&mut self) {
        self.pending = self.armed.iter().cloned().collect();
    }

    fn halt(&mut self) {
        self.running = false;
        self.started = None;
        self.base = 0.0;
        self.pending.clear();
    }

    /// Pop every event due at the current position, wrapping at the loop
    /// boundary as many times as the elapsed time requires.
    fn poll_due(&mut self) -> Vec<T> {
        if !self.running {
            return Vec::new();
        }
        let mut due = Vec::new();
        let mut pos = self.raw_position();
        loop {
            while self
                .pending
                .peek()
                .is_some_and(|queued| queued.time <= pos)
            {
                if let Some(queued) = self.pending.pop() {
                    due.push(queued.item);
                }
            }
            match self.loop_end {
                Some(end) if end > 0.0 && pos >= end => {
                    self.base -= end;
                    pos -= end;
                    self.rearm();
                }
                _ => break,
            }
        }
        due
    }

    fn time_until_next(&self) -> Option<Duration> {
        let next = self.pending.peek()?.time;
        let pos = self.raw_position();
        if next <= pos {
            Some(Duration::ZERO)
        } else {
            Some(Duration::from_secs_f64(next - pos))
        }
    }
}

/// Timed-event dispatcher for the transport.
///
/// Events are scheduled at absolute second offsets from position zero and
/// handed to the handler on a dedicated thread once due. `cancel_all`
/// removes every pending event; there is no partial cancelation.
pub struct SoftwareClock<T> {
    inner: Arc<Mutex<Inner<T>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> SoftwareClock<T> {
    /// Create a clock dispatching into `handler`
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(T) -> Dispatch + Send + Sync + 'static,
    {
        let inner = Arc::new(Mutex::new(Inner::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_inner = Arc::clone(&inner);
        let thread_shutdown = Arc::clone(&shutdown);
        let thread = thread::spawn(move || {
            dispatch_loop(thread_inner, thread_shutdown, handler);
        });

        Self {
            inner,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Schedule an event at an absolute second offset
    pub fn schedule_at(&self, time: f64, item: T) {
        if let Ok(mut inner) = self.inner.lock() {
            let queued = Queued {
                time,
                seq: inner.seq,
                item,
            };
            inner.seq += 1;
            inner.pending.push(queued.clone());
            inner.armed.push(queued);
        }
    }

    /// Remove every scheduled event, armed and pending alike
    pub fn cancel_all(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pending.clear();
            inner.armed.clear();
        }
    }

    /// Begin advancing from the current position
    pub fn start(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.running {
                inner.running = true;
                inner.started = Some(Instant::now());
            }
        }
    }

    /// Halt and rewind the position to zero
    pub fn stop(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.running = false;
            inner.started = None;
            inner.base = 0.0;
        }
    }

    /// Jump to a position in seconds.
    ///
    /// The pending queue is rebuilt from the armed schedule so seeking
    /// backward re-arms events that already fired.
    pub fn seek(&self, seconds: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.base = seconds.max(0.0);
            if inner.running {
                inner.started = Some(Instant::now());
            }
            let rearmed: BinaryHeap<Queued<T>> = inner
                .armed
                .iter()
                .filter(|queued| queued.time >= seconds)
                .cloned()
                .collect();
            inner.pending = rearmed;
        }
    }

    /// Set or clear the loop boundary in seconds
    pub fn set_loop(&self, end: Option<f64>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.loop_end = end.filter(|&e| e > 0.0);
        }
    }

    /// Current position in seconds (wrapped when looping)
    pub fn position(&self) -> f64 {
        self.inner
            .lock()
            .map(|inner| {
                let pos = inner.raw_position();
                match inner.loop_end {
                    Some(end) if inner.running && pos >= end => pos % end,
                    _ => pos,
                }
            })
            .unwrap_or(0.0)
    }

    /// Whether the clock is advancing
    pub fn is_running(&self) -> bool {
        self.inner.lock().map(|inner| inner.running).unwrap_or(false)
    }

    /// Number of events waiting to fire this pass
    pub fn pending_len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.pending.len())
            .unwrap_or(0)
    }
}

impl<T> Drop for SoftwareClock<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, AtomicOrdering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn dispatch_loop<T, F>(inner: Arc<Mutex<Inner<T>>>, shutdown: Arc<AtomicBool>, handler: F)
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Dispatch + Send + Sync + 'static,
{
    while !shutdown.load(AtomicOrdering::Relaxed) {
        let due = match inner.lock() {
            Ok(mut guard) => guard.poll_due(),
            Err(_) => break,
        };

        let mut stop = false;
        for item in due {
            if handler(item) == Dispatch::Stop {
                stop = true;
            }
        }
        if stop {
            if let Ok(mut guard) = inner.lock() {
                guard.halt();
            }
        }

        let nap = inner
            .lock()
            .ok()
            .and_then(|guard| {
                if guard.running {
                    guard.time_until_next()
                } else {
                    None
                }
            })
            .map(|until| (until / 2).clamp(MIN_NAP, IDLE_NAP))
            .unwrap_or(IDLE_NAP);
        thread::sleep(nap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_clock() -> (SoftwareClock<u32>, Arc<Mutex<Vec<u32>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let clock = SoftwareClock::new(move |item| {
            sink.lock().unwrap().push(item);
            Dispatch::Continue
        });
        (clock, fired)
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let (clock, fired) = collecting_clock();
        clock.schedule_at(0.03, 2);
        clock.schedule_at(0.0, 1);
        clock.schedule_at(0.06, 3);
        clock.start();

        thread::sleep(Duration::from_millis(120));
        assert_eq!(*fired.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_same_time_fires_in_submission_order() {
        let (clock, fired) = collecting_clock();
        for item in 0..5u32 {
            clock.schedule_at(0.01, item);
        }
        clock.start();

        thread::sleep(Duration::from_millis(60));
        assert_eq!(*fired.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_all_clears_everything() {
        let (clock, fired) = collecting_clock();
        clock.schedule_at(10.0, 1);
        clock.schedule_at(20.0, 2);
        assert_eq!(clock.pending_len(), 2);

        clock.cancel_all();
        assert_eq!(clock.pending_len(), 0);

        clock.start();
        thread::sleep(Duration::from_millis(20));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_rewinds_position() {
        let (clock, _) = collecting_clock();
        clock.start();
        thread::sleep(Duration::from_millis(30));
        assert!(clock.position() > 0.0);

        clock.stop();
        assert_eq!(clock.position(), 0.0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_stop_handler_halts_clock() {
        let clock = SoftwareClock::new(|_: u32| Dispatch::Stop);
        clock.schedule_at(0.0, 1);
        clock.start();

        thread::sleep(Duration::from_millis(40));
        assert!(!clock.is_running());
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn test_loop_rearms_schedule() {
        let (clock, fired) = collecting_clock();
        clock.schedule_at(0.0, 7);
        clock.set_loop(Some(0.02));
        clock.start();

        // Several loop passes should re-fire the same event
        thread::sleep(Duration::from_millis(100));
        assert!(fired.lock().unwrap().len() >= 3);
    }

    #[test]
    fn test_seek_drops_earlier_events() {
        let (clock, fired) = collecting_clock();
        clock.schedule_at(0.0, 1);
        clock.schedule_at(5.0, 2);
        clock.seek(1.0);
        assert_eq!(clock.pending_len(), 1);

        // Seeking back re-arms the earlier event
        clock.seek(0.0);
        assert_eq!(clock.pending_len(), 2);
        drop(fired);
    }
}
