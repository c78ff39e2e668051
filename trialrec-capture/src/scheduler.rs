//! Fixed-rate capture loop.
//!
//! Every tick decides from the shared state whether anything is happening.
//! Active ticks grab the screen, take the events of the window that ends at
//! the grab, and write the frame image. Nothing is grabbed while idle.

use crate::capture::FrameSource;
use crate::event::{frame_file_name, FrameRecord};
use crate::primitives::{normalize_frame, ImageWriter};
use crate::state::SharedCapture;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub fps: u32,
    pub movement_timeout: Duration,
    pub frame_width: u32,
    pub frame_height: u32,
    /// How often to log throughput while running
    pub stats_interval: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            movement_timeout: Duration::from_millis(200),
            frame_width: 480,
            frame_height: 480,
            stats_interval: None,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Captured(u64),
    GrabFailed,
    WriteFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub captured: u64,
    pub idle: u64,
    pub failed_grabs: u64,
    pub failed_writes: u64,
    /// Events attributed to frames whose image could not be written
    pub lost_events: u64,
    /// Ticks that overran the frame interval
    pub slow_ticks: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
    pub frames: Vec<FrameRecord>,
    pub stats: SchedulerStats,
}

pub struct CaptureScheduler {
    config: SchedulerConfig,
    capture: SharedCapture,
    source: Box<dyn FrameSource>,
    writer: Arc<dyn ImageWriter>,
    trial_dir: PathBuf,
    frames: Vec<FrameRecord>,
    next_index: u64,
    stats: SchedulerStats,
}

impl CaptureScheduler {
    pub fn new(
        config: SchedulerConfig,
        capture: SharedCapture,
        source: Box<dyn FrameSource>,
        writer: Arc<dyn ImageWriter>,
        trial_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            capture,
            source,
            writer,
            trial_dir,
            frames: Vec::new(),
            next_index: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// One activity check, and a capture if it passes.
    pub fn tick(&mut self) -> TickOutcome {
        let timeout = self.config.movement_timeout;
        let activity = self
            .capture
            .with_state(|state, now| state.activity(now, timeout));
        if !activity.should_capture {
            self.stats.idle += 1;
            return TickOutcome::Idle;
        }

        let image = match self
            .source
            .grab()
            .and_then(|frame| normalize_frame(&frame, self.config.frame_width, self.config.frame_height))
        {
            Ok(image) => image,
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.stats.failed_grabs += 1;
                return TickOutcome::GrabFailed;
            }
        };

        // The frame timestamp is read under the lock, after the grab.
        let (timestamp, window) = self
            .capture
            .with_state(|state, now| (now, state.take_window(now)));

        let index = self.next_index;
        let filename = frame_file_name(index, self.writer.extension());
        let path = self.trial_dir.join(&filename);
        if let Err(e) = self.writer.write_image(&path, &image) {
            warn!(
                "Failed to write {}: {} ({} events dropped)",
                path.display(),
                e,
                window.events.len()
            );
            self.stats.failed_writes += 1;
            self.stats.lost_events += window.events.len() as u64;
            return TickOutcome::WriteFailed;
        }

        debug!(
            "frame {} at {:.4} with {} events",
            index,
            timestamp,
            window.events.len()
        );
        self.frames.push(FrameRecord {
            filename,
            timestamp,
            events: window.events,
            held_keys: window.held_keys,
            held_buttons: window.held_buttons,
            mouse_is_moving: activity.mouse_is_moving,
            mouse_xy: window.mouse_xy,
        });
        self.next_index += 1;
        self.stats.captured += 1;
        TickOutcome::Captured(index)
    }

    /// Tick at the configured rate until `stop` is set.
    pub fn run(mut self, stop: &AtomicBool) -> SchedulerReport {
        let clock = Arc::clone(self.capture.clock());
        let interval = self.config.frame_interval().as_secs_f64();
        let stats_every = self.config.stats_interval.map(|d| d.as_secs_f64());
        let started_at = clock.now();
        let mut last_stats_at = started_at;

        while !stop.load(Ordering::SeqCst) {
            let tick_start = clock.now();
            self.stats.ticks += 1;
            self.tick();

            if let Some(every) = stats_every {
                let now = clock.now();
                if now - last_stats_at >= every {
                    let elapsed = now - started_at;
                    let fps_actual = if elapsed > 0.0 {
                        self.stats.captured as f64 / elapsed
                    } else {
                        0.0
                    };
                    info!(
                        "frames={} fps={:.1} idle={} slow={}",
                        self.stats.captured, fps_actual, self.stats.idle, self.stats.slow_ticks
                    );
                    last_stats_at = now;
                }
            }

            let remaining = interval - (clock.now() - tick_start);
            if remaining > 0.0 {
                clock.sleep(Duration::from_secs_f64(remaining));
            } else {
                self.stats.slow_ticks += 1;
            }
        }

        self.finish()
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn finish(self) -> SchedulerReport {
        SchedulerReport {
            frames: self.frames,
            stats: self.stats,
        }
    }
}
