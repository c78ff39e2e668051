//! Hook capability: a background reader that turns raw evdev traffic into
//! normalized [`HookEvent`]s and hands them to a subscriber.

use crate::error::{Error, Result};
use crate::keyboard::{is_keyboard_code, key_name};
use crate::mouse::MouseButton;
use evdev::{Device, EventType, InputEvent, Key, RelativeAxisType, Synchronization};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// A normalized input occurrence delivered by a hook
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    KeyPress(String),
    KeyRelease(String),
    MouseClick { button: MouseButton, pressed: bool },
    /// Absolute pointer position in screen pixels
    MouseMove { x: f64, y: f64 },
    /// High-resolution relative motion, no position
    PointerDelta { dx: f64, dy: f64 },
}

/// How pointer motion is reported for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointerMode {
    /// Integrate motion into an on-screen position and emit `MouseMove`
    #[default]
    Absolute,
    /// Emit raw `PointerDelta` values straight from the device
    Raw,
}

pub trait HookHandler: Send + Sync {
    fn handle(&self, event: HookEvent);
}

impl<F> HookHandler for F
where
    F: Fn(HookEvent) + Send + Sync,
{
    fn handle(&self, event: HookEvent) {
        self(event)
    }
}

/// A source of input callbacks. Subscribing starts delivery and returns a
/// handle that keeps it alive.
pub trait InputHook: Send {
    fn subscribe(self: Box<Self>, handler: Arc<dyn HookHandler>) -> Result<HookHandle>;
}

/// Keeps a hook thread alive; dropping it stops delivery.
pub struct HookHandle {
    label: String,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HookHandle {
    pub fn new(label: impl Into<String>, shutdown: Arc<AtomicBool>, thread: JoinHandle<()>) -> Self {
        Self {
            label: label.into(),
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for HookHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Converts evdev events into [`HookEvent`]s, accumulating relative motion
/// until the end of each report.
pub struct MotionTracker {
    mode: PointerMode,
    bounds: (f64, f64),
    position: (f64, f64),
    pending: (i32, i32),
}

impl MotionTracker {
    /// `bounds` is the screen size; the absolute cursor starts at its center.
    pub fn new(mode: PointerMode, bounds: (u32, u32)) -> Self {
        let bounds = (bounds.0.max(1) as f64, bounds.1.max(1) as f64);
        Self {
            mode,
            bounds,
            position: (bounds.0 / 2.0, bounds.1 / 2.0),
            pending: (0, 0),
        }
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn translate(&mut self, event: &InputEvent) -> Option<HookEvent> {
        match event.event_type() {
            EventType::KEY => self.translate_key(event.code(), event.value()),
            EventType::RELATIVE => {
                let code = event.code();
                if code == RelativeAxisType::REL_X.0 {
                    self.pending.0 += event.value();
                } else if code == RelativeAxisType::REL_Y.0 {
                    self.pending.1 += event.value();
                }
                None
            }
            EventType::SYNCHRONIZATION if event.code() == Synchronization::SYN_REPORT.0 => {
                self.flush()
            }
            _ => None,
        }
    }

    /// Emit any motion accumulated since the last report
    pub fn flush(&mut self) -> Option<HookEvent> {
        let (dx, dy) = std::mem::take(&mut self.pending);
        if dx == 0 && dy == 0 {
            return None;
        }

        match self.mode {
            PointerMode::Raw => Some(HookEvent::PointerDelta {
                dx: dx as f64,
                dy: dy as f64,
            }),
            PointerMode::Absolute => {
                let x = (self.position.0 + dx as f64).clamp(0.0, self.bounds.0 - 1.0);
                let y = (self.position.1 + dy as f64).clamp(0.0, self.bounds.1 - 1.0);
                if (x, y) == self.position {
                    return None;
                }
                self.position = (x, y);
                Some(HookEvent::MouseMove { x, y })
            }
        }
    }

    fn translate_key(&self, code: u16, value: i32) -> Option<HookEvent> {
        // 0 = up, 1 = down, 2 = autorepeat
        let pressed = match value {
            0 => false,
            1 => true,
            _ => return None,
        };

        let key = Key::new(code);
        if let Some(button) = MouseButton::from_key(key) {
            return Some(HookEvent::MouseClick { button, pressed });
        }
        if !is_keyboard_code(code) {
            return None;
        }

        let name = key_name(key);
        Some(if pressed {
            HookEvent::KeyPress(name)
        } else {
            HookEvent::KeyRelease(name)
        })
    }
}

/// Reads one evdev device on a background thread
pub struct EvdevHook {
    device: Device,
    tracker: MotionTracker,
}

impl EvdevHook {
    pub fn new(device: Device, mode: PointerMode, bounds: (u32, u32)) -> Self {
        Self {
            device,
            tracker: MotionTracker::new(mode, bounds),
        }
    }
}

impl InputHook for EvdevHook {
    fn subscribe(self: Box<Self>, handler: Arc<dyn HookHandler>) -> Result<HookHandle> {
        let EvdevHook {
            mut device,
            mut tracker,
        } = *self;
        let label = device.name().unwrap_or("unknown device").to_string();

        if let Err(e) = set_nonblocking(&device) {
            warn!("Failed to set {} non-blocking: {}", label, e);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);
        let thread_label = label.clone();

        let thread = thread::Builder::new()
            .name(format!("hook-{}", label))
            .spawn(move || {
                debug!("Hook thread started for {}", thread_label);
                while !shutdown_thread.load(Ordering::Relaxed) {
                    match device.fetch_events() {
                        Ok(events) => {
                            for event in events {
                                if let Some(hook_event) = tracker.translate(&event) {
                                    handler.handle(hook_event);
                                }
                            }
                            if let Some(hook_event) = tracker.flush() {
                                handler.handle(hook_event);
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(1));
                        }
                        Err(e) => {
                            warn!("Input device {} stopped delivering: {}", thread_label, e);
                            break;
                        }
                    }
                }
                debug!("Hook thread for {} exited", thread_label);
            })
            .map_err(Error::Spawn)?;

        Ok(HookHandle::new(label, shutdown, thread))
    }
}

fn set_nonblocking(device: &Device) -> std::io::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(device.as_raw_fd(), FcntlArg::F_GETFL)?);
    let new_flags = flags | OFlag::O_NONBLOCK;
    fcntl(device.as_raw_fd(), FcntlArg::F_SETFL(new_flags))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, code.code(), value)
    }

    fn rel(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
    }

    #[test]
    fn key_press_and_release() {
        let mut tracker = MotionTracker::new(PointerMode::Absolute, (100, 100));
        assert_eq!(
            tracker.translate(&key(Key::KEY_W, 1)),
            Some(HookEvent::KeyPress("w".to_string()))
        );
        assert_eq!(
            tracker.translate(&key(Key::KEY_W, 0)),
            Some(HookEvent::KeyRelease("w".to_string()))
        );
    }

    #[test]
    fn autorepeat_is_ignored() {
        let mut tracker = MotionTracker::new(PointerMode::Absolute, (100, 100));
        assert_eq!(tracker.translate(&key(Key::KEY_W, 2)), None);
    }

    #[test]
    fn buttons_become_clicks() {
        let mut tracker = MotionTracker::new(PointerMode::Absolute, (100, 100));
        assert_eq!(
            tracker.translate(&key(Key::BTN_RIGHT, 1)),
            Some(HookEvent::MouseClick {
                button: MouseButton::Right,
                pressed: true
            })
        );
        assert_eq!(tracker.translate(&key(Key::BTN_TOUCH, 1)), None);
    }

    #[test]
    fn absolute_mode_integrates_and_clamps() {
        let mut tracker = MotionTracker::new(PointerMode::Absolute, (100, 80));
        assert_eq!(tracker.position(), (50.0, 40.0));

        assert_eq!(tracker.translate(&rel(RelativeAxisType::REL_X, 5)), None);
        assert_eq!(tracker.translate(&rel(RelativeAxisType::REL_Y, -3)), None);
        assert_eq!(
            tracker.translate(&syn()),
            Some(HookEvent::MouseMove { x: 55.0, y: 37.0 })
        );

        tracker.translate(&rel(RelativeAxisType::REL_X, 1000));
        assert_eq!(
            tracker.translate(&syn()),
            Some(HookEvent::MouseMove { x: 99.0, y: 37.0 })
        );

        // Pinned against the edge: no movement, no event
        tracker.translate(&rel(RelativeAxisType::REL_X, 10));
        assert_eq!(tracker.translate(&syn()), None);
    }

    #[test]
    fn raw_mode_reports_deltas() {
        let mut tracker = MotionTracker::new(PointerMode::Raw, (100, 100));
        tracker.translate(&rel(RelativeAxisType::REL_X, -2));
        tracker.translate(&rel(RelativeAxisType::REL_X, -1));
        tracker.translate(&rel(RelativeAxisType::REL_Y, 4));
        assert_eq!(
            tracker.translate(&syn()),
            Some(HookEvent::PointerDelta { dx: -3.0, dy: 4.0 })
        );
        assert_eq!(tracker.flush(), None);
    }

    #[test]
    fn wheel_motion_is_not_pointer_motion() {
        let mut tracker = MotionTracker::new(PointerMode::Raw, (100, 100));
        tracker.translate(&rel(RelativeAxisType::REL_WHEEL, 1));
        assert_eq!(tracker.translate(&syn()), None);
    }

    #[test]
    fn closures_are_handlers() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn HookHandler> = Arc::new(move |event: HookEvent| {
            sink.lock().unwrap().push(event);
        });
        handler.handle(HookEvent::KeyPress("a".to_string()));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
