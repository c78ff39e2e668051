//! trialrec-input: keyboard and mouse hooks for trial recording on Linux.
//!
//! Devices are read through evdev, so this works under both X11 and Wayland
//! as long as the user can open `/dev/input/event*` (typically via the
//! `input` group).

pub mod device;
pub mod error;
pub mod hook;
pub mod keyboard;
pub mod mouse;

pub use device::{list_devices, open_device, resolve_device, select_device, DeviceRole};
pub use error::{Error, Result};
pub use evdev::Key;
pub use hook::{EvdevHook, HookEvent, HookHandle, HookHandler, InputHook, MotionTracker, PointerMode};
pub use keyboard::key_name;
pub use mouse::MouseButton;
