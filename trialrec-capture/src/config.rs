use crate::error::Result;
use crate::scheduler::SchedulerConfig;
use crate::trial::TrialSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use trialrec_input::PointerMode;

/// Main configuration for trialrec
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub dataset: DatasetSettings,
}

/// Screen sampling configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptureSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_movement_timeout_ms")]
    pub movement_timeout_ms: u64,
    #[serde(default = "default_frame_side")]
    pub frame_width: u32,
    #[serde(default = "default_frame_side")]
    pub frame_height: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Monitor name; the primary monitor when unset
    #[serde(default)]
    pub monitor: Option<String>,
    /// Seconds between throughput log lines
    #[serde(default)]
    pub stats_interval_secs: Option<u64>,
}

fn default_fps() -> u32 {
    30
}

fn default_movement_timeout_ms() -> u64 {
    200
}

fn default_frame_side() -> u32 {
    480
}

fn default_quality() -> u8 {
    70
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            movement_timeout_ms: default_movement_timeout_ms(),
            frame_width: default_frame_side(),
            frame_height: default_frame_side(),
            quality: default_quality(),
            monitor: None,
            stats_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerSetting {
    #[default]
    Absolute,
    Raw,
}

impl From<PointerSetting> for PointerMode {
    fn from(setting: PointerSetting) -> Self {
        match setting {
            PointerSetting::Absolute => PointerMode::Absolute,
            PointerSetting::Raw => PointerMode::Raw,
        }
    }
}

/// Input device configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputSettings {
    #[serde(default)]
    pub pointer_mode: PointerSetting,
    #[serde(default = "default_raw_poll_interval_ms")]
    pub raw_poll_interval_ms: u64,
    /// evdev path, e.g. `/dev/input/event3`; prompted for when unset
    #[serde(default)]
    pub keyboard_device: Option<String>,
    #[serde(default)]
    pub mouse_device: Option<String>,
}

fn default_raw_poll_interval_ms() -> u64 {
    10
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            pointer_mode: PointerSetting::default(),
            raw_poll_interval_ms: default_raw_poll_interval_ms(),
            keyboard_device: None,
            mouse_device: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasetSettings {
    /// Dataset folder to bind at startup instead of prompting
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/trialrec/config.toml")
    }

    /// Load config from file, returning defaults if file doesn't exist
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => warn!("Failed to parse config {}: {}", path.display(), e),
                },
                Err(e) => warn!("Failed to read config {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            fps: self.capture.fps.max(1),
            movement_timeout: Duration::from_millis(self.capture.movement_timeout_ms),
            frame_width: self.capture.frame_width.max(1),
            frame_height: self.capture.frame_height.max(1),
            stats_interval: self.capture.stats_interval_secs.map(Duration::from_secs),
        }
    }

    pub fn trial_settings(&self) -> TrialSettings {
        TrialSettings {
            scheduler: self.scheduler_config(),
            pointer_mode: self.input.pointer_mode.into(),
            raw_poll_interval: Duration::from_millis(self.input.raw_poll_interval_ms.max(1)),
        }
    }
}
