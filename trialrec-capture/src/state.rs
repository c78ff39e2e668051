//! Shared capture state: the pending event queue, the held key/button sets,
//! pointer tracking and the global sequence counter, all behind one mutex.

use crate::clock::Clock;
use crate::event::{Event, EventPayload, FrameEvent};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Result of the per-tick activity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub should_capture: bool,
    pub mouse_is_moving: bool,
}

/// Events and held state attributed to one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    pub events: Vec<FrameEvent>,
    pub held_keys: Vec<String>,
    pub held_buttons: Vec<String>,
    pub mouse_xy: [f64; 2],
}

#[derive(Debug)]
pub struct CaptureState {
    pending: Vec<Event>,
    held_keys: BTreeSet<String>,
    held_buttons: BTreeSet<String>,
    last_move_time: f64,
    last_position: [f64; 2],
    next_sequence: u64,
    previous_frame_timestamp: f64,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            held_keys: BTreeSet::new(),
            held_buttons: BTreeSet::new(),
            last_move_time: f64::NEG_INFINITY,
            last_position: [0.0, 0.0],
            next_sequence: 0,
            previous_frame_timestamp: f64::NEG_INFINITY,
        }
    }
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh trial window at `now`.
    ///
    /// Held sets are cleared too: releases that happened while not recording
    /// were never observed.
    pub fn reset(&mut self, now: f64) {
        self.pending.clear();
        self.held_keys.clear();
        self.held_buttons.clear();
        self.last_move_time = f64::NEG_INFINITY;
        self.next_sequence = 0;
        self.previous_frame_timestamp = now;
    }

    fn append(&mut self, now: f64, payload: EventPayload) {
        let event = Event::new(self.next_sequence, now, payload);
        self.next_sequence += 1;
        self.pending.push(event);
    }

    /// Returns true if an event was emitted (the key was not already held).
    pub fn press_key(&mut self, name: &str, now: f64) -> bool {
        if !self.held_keys.insert(name.to_string()) {
            return false;
        }
        self.append(now, EventPayload::Key(name.to_string()));
        true
    }

    /// Returns true if an event was emitted (the key was held).
    pub fn release_key(&mut self, name: &str, now: f64) -> bool {
        if !self.held_keys.remove(name) {
            return false;
        }
        self.append(now, EventPayload::Key(name.to_string()));
        true
    }

    /// Clicks always emit; only the held set is idempotent.
    pub fn click_button(&mut self, name: &str, pressed: bool, now: f64) {
        if pressed {
            self.held_buttons.insert(name.to_string());
        } else {
            self.held_buttons.remove(name);
        }
        self.append(now, EventPayload::Button(name.to_string()));
    }

    pub fn move_to(&mut self, x: f64, y: f64, now: f64) {
        let delta = [x - self.last_position[0], y - self.last_position[1]];
        self.last_position = [x, y];
        self.last_move_time = now;
        self.append(now, EventPayload::Move { xy: [x, y], delta });
    }

    /// Raw deltas count as movement but leave the tracked position alone.
    pub fn raw_delta(&mut self, dx: f64, dy: f64, now: f64) {
        self.last_move_time = now;
        self.append(now, EventPayload::RawDelta { delta: [dx, dy] });
    }

    pub fn activity(&self, now: f64, movement_timeout: Duration) -> Activity {
        let mouse_is_moving = now - self.last_move_time < movement_timeout.as_secs_f64();
        Activity {
            should_capture: !self.held_keys.is_empty()
                || !self.held_buttons.is_empty()
                || mouse_is_moving,
            mouse_is_moving,
        }
    }

    /// Remove every pending event in `(previous_frame_timestamp, frame_timestamp]`
    /// and advance the boundary.
    ///
    /// Events keep their queue order and are numbered from zero. Anything
    /// outside the window stays pending.
    pub fn take_window(&mut self, frame_timestamp: f64) -> FrameWindow {
        let previous = self.previous_frame_timestamp;
        let mut events = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());

        for event in self.pending.drain(..) {
            if previous < event.timestamp && event.timestamp <= frame_timestamp {
                events.push(FrameEvent {
                    number: events.len() as u64,
                    event,
                });
            } else {
                remaining.push(event);
            }
        }
        self.pending = remaining;
        self.previous_frame_timestamp = frame_timestamp;

        FrameWindow {
            events,
            held_keys: self.held_keys.iter().cloned().collect(),
            held_buttons: self.held_buttons.iter().cloned().collect(),
            mouse_xy: self.last_position,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of events appended since the last reset
    pub fn sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn held_keys(&self) -> &BTreeSet<String> {
        &self.held_keys
    }

    pub fn held_buttons(&self) -> &BTreeSet<String> {
        &self.held_buttons
    }

    pub fn last_position(&self) -> [f64; 2] {
        self.last_position
    }

    pub fn previous_frame_timestamp(&self) -> f64 {
        self.previous_frame_timestamp
    }
}

struct Shared {
    state: Mutex<CaptureState>,
    recording: AtomicBool,
    clock: Arc<dyn Clock>,
}

/// Cloneable handle to the one capture state of the process.
#[derive(Clone)]
pub struct SharedCapture {
    inner: Arc<Shared>,
}

impl SharedCapture {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(CaptureState::new()),
                recording: AtomicBool::new(false),
                clock,
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn is_recording(&self) -> bool {
        self.inner.recording.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, recording: bool) {
        self.inner.recording.store(recording, Ordering::SeqCst);
    }

    pub fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock with a timestamp read inside the critical
    /// section, so queue order and timestamp order agree.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CaptureState, f64) -> R) -> R {
        let mut state = self.lock();
        let now = self.inner.clock.now();
        f(&mut state, now)
    }
}
