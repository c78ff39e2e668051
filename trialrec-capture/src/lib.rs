//! trialrec-capture: synchronized screen sampling and input capture into
//! trial datasets.
//!
//! This crate provides:
//! - A shared capture state fed by keyboard and mouse hooks
//! - A fixed-rate scheduler that pairs each screen grab with the input
//!   events of its time window
//! - Trial lifecycle and dataset persistence (`Trial_<n>/`, `TrialData_<n>.json`)
//! - Read-only playback of sealed trials, browsed in a ratatui terminal view

pub mod capture;
pub mod clock;
pub mod command;
pub mod config;
pub mod dataset;
pub mod error;
pub mod event;
pub mod ingest;
pub mod playback;
pub mod primitives;
pub mod scheduler;
pub mod state;
pub mod trial;
pub mod viewer;

// Re-export common types at crate root
pub use capture::{CaptureFrame, FrameSource, MonitorSourceFactory, SourceFactory};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dataset::Dataset;
pub use error::{Error, Result};
pub use event::{Event, FrameEvent, FrameRecord, LogEntry, MarkerKind, TrialMarker};
pub use ingest::Ingestor;
pub use playback::{Navigation, Playback};
pub use primitives::{ImageWriter, JpegWriter};
pub use scheduler::{CaptureScheduler, SchedulerConfig, SchedulerReport, SchedulerStats, TickOutcome};
pub use state::{CaptureState, SharedCapture};
pub use trial::{TrialRecorder, TrialSettings, TrialState, TrialSummary};
