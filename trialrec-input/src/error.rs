use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open input device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no {0} devices found (are you in the input group?)")]
    NoDevices(&'static str),

    #[error("device selection failed: {0}")]
    Selection(#[from] dialoguer::Error),

    #[error("failed to spawn hook thread: {0}")]
    Spawn(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
