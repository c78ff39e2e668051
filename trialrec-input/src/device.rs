//! Discovery and interactive selection of evdev input devices.

use crate::error::{Error, Result};
use dialoguer::{theme::ColorfulTheme, Select};
use evdev::{Device, Key, RelativeAxisType};
use std::path::{Path, PathBuf};

/// What a device is used for during recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Keyboard,
    Pointer,
}

impl DeviceRole {
    fn label(self) -> &'static str {
        match self {
            DeviceRole::Keyboard => "keyboard",
            DeviceRole::Pointer => "pointer",
        }
    }

    /// Whether a device advertises the capabilities this role needs
    pub fn matches(self, device: &Device) -> bool {
        match self {
            DeviceRole::Keyboard => device
                .supported_keys()
                .map_or(false, |keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_ENTER)),
            DeviceRole::Pointer => {
                let has_axes = device.supported_relative_axes().map_or(false, |axes| {
                    axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y)
                });
                let has_buttons = device
                    .supported_keys()
                    .map_or(false, |keys| keys.contains(Key::BTN_LEFT));
                has_axes && has_buttons
            }
        }
    }
}

pub fn open_device(path: impl AsRef<Path>) -> Result<Device> {
    let path = path.as_ref();
    Device::open(path).map_err(|source| Error::DeviceOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// All readable devices suitable for `role`
pub fn list_devices(role: DeviceRole) -> Vec<(PathBuf, Device)> {
    let mut devices: Vec<_> = evdev::enumerate().collect();
    devices.retain(|(_, dev)| role.matches(dev));
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    devices
}

/// Prompt the user to pick a device for `role`
pub fn select_device(role: DeviceRole) -> Result<Device> {
    let devices = list_devices(role);
    if devices.is_empty() {
        return Err(Error::NoDevices(role.label()));
    }

    let selections: Vec<String> = devices
        .iter()
        .map(|(p, d)| format!("{} ({})", d.name().unwrap_or("?"), p.display()))
        .collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Select {}", role.label()))
        .items(&selections)
        .default(0)
        .interact()?;

    open_device(&devices[selection].0)
}

/// Open `path` if given, otherwise fall back to the interactive picker
pub fn resolve_device(path: Option<&str>, role: DeviceRole) -> Result<Device> {
    match path {
        Some(path) => open_device(path),
        None => select_device(role),
    }
}
