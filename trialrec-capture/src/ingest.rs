//! Event ingestion: turns hook callbacks into queued [`Event`](crate::Event)s.
//!
//! Keyboard and mouse callbacks append straight into the shared state. Raw
//! pointer deltas go through a channel first, so the device callback never
//! contends on the state lock; a poller drains it on a short interval.

use crate::state::SharedCapture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};
use trialrec_input::{HookEvent, HookHandler};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Receiving end of the raw delta channel. The recorder keeps one handle for
/// its whole life; each trial's poller borrows another.
pub type RawDeltaReceiver = Arc<Mutex<Receiver<RawDelta>>>;

/// Create the intermediate list between a raw pointer tap and its poller.
pub fn raw_delta_channel() -> (Sender<RawDelta>, RawDeltaReceiver) {
    let (tx, rx) = mpsc::channel();
    (tx, Arc::new(Mutex::new(rx)))
}

/// Hook subscriber that feeds the shared capture state.
///
/// All callbacks are no-ops while the capture is not recording.
pub struct Ingestor {
    capture: SharedCapture,
    raw_tap: Option<Sender<RawDelta>>,
    tap_closed: AtomicBool,
}

impl Ingestor {
    pub fn new(capture: SharedCapture) -> Self {
        Self {
            capture,
            raw_tap: None,
            tap_closed: AtomicBool::new(false),
        }
    }

    /// Route pointer deltas into `tap` instead of appending them directly.
    pub fn with_raw_tap(mut self, tap: Sender<RawDelta>) -> Self {
        self.raw_tap = Some(tap);
        self
    }
}

impl HookHandler for Ingestor {
    fn handle(&self, event: HookEvent) {
        if !self.capture.is_recording() {
            return;
        }
        trace!("hook event: {:?}", event);

        match event {
            HookEvent::KeyPress(name) => {
                self.capture.with_state(|s, now| s.press_key(&name, now));
            }
            HookEvent::KeyRelease(name) => {
                self.capture.with_state(|s, now| s.release_key(&name, now));
            }
            HookEvent::MouseClick { button, pressed } => {
                self.capture
                    .with_state(|s, now| s.click_button(button.name(), pressed, now));
            }
            HookEvent::MouseMove { x, y } => {
                self.capture.with_state(|s, now| s.move_to(x, y, now));
            }
            HookEvent::PointerDelta { dx, dy } => match &self.raw_tap {
                Some(tap) => {
                    if tap.send(RawDelta { dx, dy }).is_err()
                        && !self.tap_closed.swap(true, Ordering::Relaxed)
                    {
                        warn!("raw pointer channel closed; pointer deltas are being dropped");
                    }
                }
                None => {
                    self.capture.with_state(|s, now| s.raw_delta(dx, dy, now));
                }
            },
        }
    }
}

/// Background drain of the raw delta channel for one trial.
pub struct RawDeltaPoller {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl RawDeltaPoller {
    /// Start draining `rx` into `capture` every `interval`.
    pub fn spawn(
        capture: SharedCapture,
        rx: RawDeltaReceiver,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("raw-delta-poller".to_string())
            .spawn(move || {
                while !stop_thread.load(Ordering::SeqCst) {
                    capture.clock().sleep(interval);
                    drain_raw_deltas(&capture, &rx);
                }
            })?;

        Ok(Self { stop, thread })
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if self.thread.join().is_err() {
            warn!("raw pointer poller panicked");
        }
    }
}

/// Convert everything currently queued on `rx` into events.
///
/// Items are stamped at drain time, under the state lock.
pub fn drain_raw_deltas(capture: &SharedCapture, rx: &RawDeltaReceiver) -> usize {
    let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
    capture.with_state(|s, now| {
        let mut drained = 0;
        for delta in rx.try_iter() {
            s.raw_delta(delta.dx, delta.dy, now);
            drained += 1;
        }
        if drained > 0 {
            debug!("drained {} raw deltas", drained);
        }
        drained
    })
}

/// Throw away deltas left over from an earlier trial.
pub fn discard_raw_deltas(rx: &RawDeltaReceiver) -> usize {
    let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
    let stale = rx.try_iter().count();
    if stale > 0 {
        debug!("discarded {} stale raw deltas", stale);
    }
    stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use trialrec_input::MouseButton;

    fn recording_capture() -> (Arc<ManualClock>, SharedCapture) {
        let clock = Arc::new(ManualClock::new(100.0));
        let capture = SharedCapture::new(clock.clone());
        capture.with_state(|s, now| s.reset(now - 1.0));
        capture.set_recording(true);
        (clock, capture)
    }

    #[test]
    fn callbacks_are_gated_by_recording_flag() {
        let (_clock, capture) = recording_capture();
        capture.set_recording(false);
        let ingestor = Ingestor::new(capture.clone());
        ingestor.handle(HookEvent::KeyPress("a".to_string()));
        ingestor.handle(HookEvent::MouseMove { x: 1.0, y: 1.0 });
        assert_eq!(capture.lock().pending_len(), 0);
        assert!(capture.lock().held_keys().is_empty());
    }

    #[test]
    fn producers_share_one_sequence() {
        let (clock, capture) = recording_capture();
        let ingestor = Ingestor::new(capture.clone());
        ingestor.handle(HookEvent::KeyPress("a".to_string()));
        clock.advance(Duration::from_millis(1));
        ingestor.handle(HookEvent::MouseClick {
            button: MouseButton::Left,
            pressed: true,
        });
        clock.advance(Duration::from_millis(1));
        ingestor.handle(HookEvent::MouseMove { x: 4.0, y: 2.0 });

        let window = capture.with_state(|s, now| s.take_window(now));
        let numbers: Vec<u64> = window.events.iter().map(|e| e.event.global_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(window.events[1].event.mouse_buttons, vec!["Button.left".to_string()]);
        assert_eq!(window.held_buttons, vec!["Button.left".to_string()]);
    }

    #[test]
    fn pointer_deltas_without_tap_append_directly() {
        let (_clock, capture) = recording_capture();
        Ingestor::new(capture.clone()).handle(HookEvent::PointerDelta { dx: 1.0, dy: 2.0 });
        assert_eq!(capture.lock().pending_len(), 1);
    }

    #[test]
    fn tapped_deltas_wait_for_the_poller() {
        let (_clock, capture) = recording_capture();
        let (tx, rx) = raw_delta_channel();
        let ingestor = Ingestor::new(capture.clone()).with_raw_tap(tx);

        ingestor.handle(HookEvent::PointerDelta { dx: 1.0, dy: 0.0 });
        ingestor.handle(HookEvent::PointerDelta { dx: 0.0, dy: -1.0 });
        assert_eq!(capture.lock().pending_len(), 0);

        assert_eq!(drain_raw_deltas(&capture, &rx), 2);
        let window = capture.with_state(|s, now| s.take_window(now));
        assert!(window.events.iter().all(|e| e.event.raw_input));
        assert!(window.events.iter().all(|e| e.event.mouse_xy.is_none()));
        assert_eq!(window.events[1].event.mouse_delta, Some([0.0, -1.0]));
    }

    #[test]
    fn receiver_outlives_a_stopped_poller() {
        let (_clock, capture) = recording_capture();
        let (tx, rx) = raw_delta_channel();
        let interval = Duration::from_millis(10);
        let poller =
            RawDeltaPoller::spawn(capture.clone(), Arc::clone(&rx), interval).expect("spawn");
        tx.send(RawDelta { dx: 3.0, dy: 3.0 }).unwrap();
        poller.stop();
        drain_raw_deltas(&capture, &rx);
        assert_eq!(capture.lock().pending_len(), 1);

        tx.send(RawDelta { dx: 1.0, dy: 1.0 }).unwrap();
        assert_eq!(drain_raw_deltas(&capture, &rx), 1);
        assert_eq!(capture.lock().pending_len(), 2);
    }

    #[test]
    fn stale_deltas_are_discarded() {
        let (_clock, capture) = recording_capture();
        let (tx, rx) = raw_delta_channel();
        tx.send(RawDelta { dx: 1.0, dy: 0.0 }).unwrap();
        tx.send(RawDelta { dx: 2.0, dy: 0.0 }).unwrap();
        assert_eq!(discard_raw_deltas(&rx), 2);
        assert_eq!(drain_raw_deltas(&capture, &rx), 0);
        assert_eq!(capture.lock().pending_len(), 0);
    }

    #[test]
    fn closed_tap_is_reported_once() {
        let (_clock, capture) = recording_capture();
        let (tx, rx) = raw_delta_channel();
        drop(rx);
        let ingestor = Ingestor::new(capture.clone()).with_raw_tap(tx);
        assert!(!ingestor.tap_closed.load(Ordering::Relaxed));

        ingestor.handle(HookEvent::PointerDelta { dx: 1.0, dy: 0.0 });
        ingestor.handle(HookEvent::PointerDelta { dx: 1.0, dy: 0.0 });
        assert!(ingestor.tap_closed.load(Ordering::Relaxed));
        assert_eq!(capture.lock().pending_len(), 0);
    }
}
