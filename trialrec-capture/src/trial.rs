//! Trial lifecycle: `Idle` -> `start` -> `Recording` -> `stop` -> `Idle`.
//!
//! A trial owns the scheduler thread (and the raw delta poller, when the
//! pointer runs in raw mode) for as long as it records. Producers are never
//! re-registered; they follow the shared `recording` flag.

use crate::capture::SourceFactory;
use crate::dataset::{next_trial_number, Dataset};
use crate::error::{Error, Result};
use crate::event::LogEntry;
use crate::ingest::{
    discard_raw_deltas, drain_raw_deltas, raw_delta_channel, Ingestor, RawDelta, RawDeltaPoller,
    RawDeltaReceiver,
};
use crate::primitives::ImageWriter;
use crate::scheduler::{CaptureScheduler, SchedulerConfig, SchedulerReport, SchedulerStats};
use crate::state::SharedCapture;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};
use trialrec_input::PointerMode;

#[derive(Debug, Clone)]
pub struct TrialSettings {
    pub scheduler: SchedulerConfig,
    pub pointer_mode: PointerMode,
    pub raw_poll_interval: Duration,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            pointer_mode: PointerMode::Absolute,
            raw_poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    Recording { trial: u64 },
}

/// What a sealed trial produced.
#[derive(Debug, Clone)]
pub struct TrialSummary {
    pub trial: u64,
    pub frames: usize,
    pub log_path: PathBuf,
    pub stats: SchedulerStats,
    /// Events still pending when the trial stopped
    pub unattributed_events: usize,
}

struct ActiveTrial {
    number: u64,
    dataset: Dataset,
    start_marker: LogEntry,
    stop: Arc<AtomicBool>,
    scheduler: JoinHandle<Option<SchedulerReport>>,
    poller: Option<RawDeltaPoller>,
}

pub struct TrialRecorder {
    capture: SharedCapture,
    settings: TrialSettings,
    sources: Arc<dyn SourceFactory>,
    writer: Arc<dyn ImageWriter>,
    dataset: Option<Dataset>,
    next_trial: u64,
    raw_tap: Option<Sender<RawDelta>>,
    raw_rx: Option<RawDeltaReceiver>,
    active: Option<ActiveTrial>,
}

impl TrialRecorder {
    pub fn new(
        capture: SharedCapture,
        settings: TrialSettings,
        sources: Arc<dyn SourceFactory>,
        writer: Arc<dyn ImageWriter>,
    ) -> Self {
        let (raw_tap, raw_rx) = match settings.pointer_mode {
            PointerMode::Raw => {
                let (tx, rx) = raw_delta_channel();
                (Some(tx), Some(rx))
            }
            PointerMode::Absolute => (None, None),
        };

        Self {
            capture,
            settings,
            sources,
            writer,
            dataset: None,
            next_trial: 0,
            raw_tap,
            raw_rx,
            active: None,
        }
    }

    /// Hook subscriber wired to this recorder's state and raw delta channel.
    pub fn ingestor(&self) -> Ingestor {
        let ingestor = Ingestor::new(self.capture.clone());
        match &self.raw_tap {
            Some(tap) => ingestor.with_raw_tap(tap.clone()),
            None => ingestor,
        }
    }

    pub fn capture(&self) -> &SharedCapture {
        &self.capture
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn next_trial_number(&self) -> u64 {
        self.next_trial
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> TrialState {
        match &self.active {
            Some(active) => TrialState::Recording {
                trial: active.number,
            },
            None => TrialState::Idle,
        }
    }

    /// Bind (or rebind) a dataset and rescan its trial numbers.
    ///
    /// Returns how many trials the dataset already holds.
    pub fn bind_dataset(&mut self, dataset: Dataset) -> Result<usize> {
        if self.is_recording() {
            warn!("cannot change dataset while a trial is recording");
            return Err(Error::AlreadyRecording);
        }
        let trials = dataset.scan_trials()?;
        self.next_trial = next_trial_number(&trials);
        info!(
            "dataset {} has {} trials, next is {}",
            dataset.root().display(),
            trials.len(),
            self.next_trial
        );
        self.dataset = Some(dataset);
        Ok(trials.len())
    }

    pub fn start(&mut self) -> Result<u64> {
        if let Some(active) = &self.active {
            warn!("trial {} is already recording", active.number);
            return Err(Error::AlreadyRecording);
        }
        let dataset = self.dataset.clone().ok_or(Error::NoDataset)?;

        let number = self.next_trial;
        let trial_dir = dataset.create_trial_dir(number)?;
        if let Some(rx) = &self.raw_rx {
            // Deltas that slipped past the gate after the last stop.
            discard_raw_deltas(rx);
        }
        let started_at = self.capture.with_state(|state, now| {
            state.reset(now);
            now
        });

        let stop = Arc::new(AtomicBool::new(false));
        let scheduler = match self.spawn_scheduler(trial_dir.clone(), Arc::clone(&stop)) {
            Ok(handle) => handle,
            Err(e) => {
                // Only removes the folder if nothing was written into it.
                let _ = fs::remove_dir(&trial_dir);
                return Err(e);
            }
        };

        self.capture.set_recording(true);
        let poller = self.spawn_poller();

        info!("trial {} recording into {}", number, trial_dir.display());
        self.active = Some(ActiveTrial {
            number,
            dataset,
            start_marker: LogEntry::trial_start(number, started_at),
            stop,
            scheduler,
            poller,
        });
        Ok(number)
    }

    fn spawn_scheduler(
        &self,
        trial_dir: PathBuf,
        stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<Option<SchedulerReport>>> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let sources = Arc::clone(&self.sources);
        let writer = Arc::clone(&self.writer);
        let capture = self.capture.clone();
        let config = self.settings.scheduler.clone();

        let handle = thread::Builder::new()
            .name("capture-scheduler".to_string())
            .spawn(move || {
                let source = match sources.open() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return None;
                    }
                };
                let scheduler = CaptureScheduler::new(config, capture, source, writer, trial_dir);
                Some(scheduler.run(&stop))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::SchedulerPanicked)
            }
        }
    }

    fn spawn_poller(&self) -> Option<RawDeltaPoller> {
        let rx = Arc::clone(self.raw_rx.as_ref()?);
        match RawDeltaPoller::spawn(
            self.capture.clone(),
            rx,
            self.settings.raw_poll_interval,
        ) {
            Ok(poller) => Some(poller),
            Err(e) => {
                warn!("raw pointer poller not started, deltas are drained at stop: {}", e);
                None
            }
        }
    }

    /// Stop the scheduler, wait for it, and write the sealed log.
    pub fn stop(&mut self) -> Result<TrialSummary> {
        let active = match self.active.take() {
            Some(active) => active,
            None => {
                warn!("no trial is recording");
                return Err(Error::NotRecording);
            }
        };

        self.capture.set_recording(false);
        active.stop.store(true, Ordering::SeqCst);
        let report = match active.scheduler.join() {
            Ok(Some(report)) => report,
            _ => {
                error!("capture scheduler for trial {} did not finish cleanly", active.number);
                SchedulerReport::default()
            }
        };

        if let Some(poller) = active.poller {
            poller.stop();
        }
        if let Some(rx) = &self.raw_rx {
            drain_raw_deltas(&self.capture, rx);
        }

        let unattributed_events = self.capture.lock().pending_len();
        if unattributed_events > 0 {
            warn!(
                "trial {}: {} events arrived after the last frame",
                active.number, unattributed_events
            );
        }
        if report.stats.failed_writes > 0 {
            warn!(
                "trial {}: {} frame writes failed, {} events lost",
                active.number, report.stats.failed_writes, report.stats.lost_events
            );
        }

        let ended_at = self.capture.clock().now();
        let frames = report.frames.len();
        let mut entries = Vec::with_capacity(frames + 2);
        entries.push(active.start_marker);
        entries.extend(report.frames.into_iter().map(LogEntry::Frame));
        entries.push(LogEntry::trial_end(active.number, ended_at));

        // The folder exists either way; never reuse its number.
        self.next_trial = active.number + 1;
        let log_path = active.dataset.write_log(active.number, &entries)?;

        info!("trial {} sealed with {} frames", active.number, frames);
        Ok(TrialSummary {
            trial: active.number,
            frames,
            log_path,
            stats: report.stats,
            unattributed_events,
        })
    }
}

impl Drop for TrialRecorder {
    fn drop(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.stop() {
                error!("failed to seal trial on shutdown: {}", e);
            }
        }
    }
}
