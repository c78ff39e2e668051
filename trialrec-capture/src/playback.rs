//! Read-only browsing of a sealed trial.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::event::{FrameRecord, LogEntry};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::PathBuf;
use tracing::debug;

/// Frames skipped by a jump
pub const JUMP: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    JumpForward,
    JumpBack,
}

pub struct Playback {
    trial: u64,
    trial_dir: PathBuf,
    frames: Vec<FrameRecord>,
    index: usize,
}

impl Playback {
    /// Open `trial`, or the highest existing trial when `None`.
    pub fn open(dataset: &Dataset, trial: Option<u64>) -> Result<Self> {
        let trial = match trial {
            Some(trial) => trial,
            None => dataset
                .last_trial()?
                .ok_or_else(|| Error::NoTrials(dataset.root().to_path_buf()))?,
        };

        let frames: Vec<FrameRecord> = dataset
            .read_log(trial)?
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Frame(frame) => Some(frame),
                LogEntry::Marker(_) => None,
            })
            .collect();
        if frames.is_empty() {
            return Err(Error::NoFrames(trial));
        }

        let trial_dir = dataset.trial_dir(trial);
        if !trial_dir.is_dir() {
            return Err(Error::TrialFolderMissing {
                trial,
                path: trial_dir,
            });
        }

        debug!("opened trial {} with {} frames", trial, frames.len());
        Ok(Self {
            trial,
            trial_dir,
            frames,
            index: 0,
        })
    }

    pub fn trial(&self) -> u64 {
        self.trial
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn current(&self) -> &FrameRecord {
        &self.frames[self.index]
    }

    /// Move and clamp to the frame range. Returns true if the index changed.
    pub fn navigate(&mut self, nav: Navigation) -> bool {
        let last = self.frames.len().saturating_sub(1);
        let target = match nav {
            Navigation::Next => self.index.saturating_add(1),
            Navigation::Previous => self.index.saturating_sub(1),
            Navigation::JumpForward => self.index.saturating_add(JUMP),
            Navigation::JumpBack => self.index.saturating_sub(JUMP),
        }
        .min(last);

        let changed = target != self.index;
        self.index = target;
        changed
    }

    pub fn current_image_path(&self) -> PathBuf {
        self.trial_dir.join(&self.current().filename)
    }

    pub fn load_current_image(&self) -> Result<RgbImage> {
        let path = self.current_image_path();
        if !path.is_file() {
            return Err(Error::FrameMissing(path));
        }
        Ok(image::open(&path)?.to_rgb8())
    }
}

pub fn format_local_time(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    match DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("{:.4}", timestamp),
    }
}

pub fn format_xy(xy: Option<[f64; 2]>) -> String {
    match xy {
        Some([x, y]) => format!("[{}, {}]", x, y),
        None => "--".to_string(),
    }
}
