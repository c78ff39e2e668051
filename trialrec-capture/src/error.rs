//! Error types for trialrec-capture.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no dataset is bound; set one up first")]
    NoDataset,

    #[error("invalid trial number: {0:?}")]
    InvalidTrialNumber(String),

    #[error("a trial is already recording; stop it first")]
    AlreadyRecording,

    #[error("no trial is recording")]
    NotRecording,

    #[error("unknown command: {0:?} (type h for help)")]
    UnknownCommand(String),

    #[error("no trials found in {0}")]
    NoTrials(PathBuf),

    #[error("log for trial {trial} not found at {path}")]
    TrialNotFound { trial: u64, path: PathBuf },

    #[error("folder for trial {trial} not found: {path}")]
    TrialFolderMissing { trial: u64, path: PathBuf },

    #[error("no frame entries in trial {0}")]
    NoFrames(u64),

    #[error("frame not found: {0}")]
    FrameMissing(PathBuf),

    #[error("screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("display capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("capture scheduler stopped unexpectedly")]
    SchedulerPanicked,

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("input error: {0}")]
    Input(#[from] trialrec_input::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
