use super::{CaptureFrame, FrameSource, SourceFactory};
use crate::error::{Error, Result};
use tracing::{debug, info};
use xcap::Monitor;

/// Screen grab of a single monitor through xcap.
pub struct MonitorSource {
    monitor: Monitor,
}

impl MonitorSource {
    /// Open the named monitor, or the primary one when `name` is `None`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let monitor = find_monitor(name)?;
        info!(
            "capturing monitor {} ({}x{})",
            monitor.name().unwrap_or_default(),
            monitor.width().unwrap_or(0),
            monitor.height().unwrap_or(0)
        );
        Ok(Self { monitor })
    }
}

impl FrameSource for MonitorSource {
    fn grab(&mut self) -> Result<CaptureFrame> {
        let image = self
            .monitor
            .capture_image()
            .map_err(|e| Error::ScreenshotFailed(e.to_string()))?;
        let width = image.width();
        let height = image.height();
        Ok(CaptureFrame {
            rgba: image.into_raw(),
            width,
            height,
        })
    }
}

pub struct MonitorSourceFactory {
    pub name: Option<String>,
}

impl SourceFactory for MonitorSourceFactory {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(MonitorSource::open(self.name.as_deref())?))
    }
}

/// Pixel size of the monitor the pointer tracker should clamp to.
pub fn monitor_size(name: Option<&str>) -> Result<(u32, u32)> {
    let monitor = find_monitor(name)?;
    let width = monitor
        .width()
        .map_err(|e| Error::CaptureUnavailable(e.to_string()))?;
    let height = monitor
        .height()
        .map_err(|e| Error::CaptureUnavailable(e.to_string()))?;
    Ok((width, height))
}

fn find_monitor(name: Option<&str>) -> Result<Monitor> {
    let monitors = Monitor::all().map_err(|e| Error::CaptureUnavailable(e.to_string()))?;
    debug!("found {} monitors", monitors.len());

    let found = match name {
        Some(wanted) => monitors
            .into_iter()
            .find(|m| m.name().map(|n| n == wanted).unwrap_or(false)),
        None => {
            let mut monitors = monitors;
            let primary = monitors
                .iter()
                .position(|m| m.is_primary().unwrap_or(false))
                .unwrap_or(0);
            if monitors.is_empty() {
                None
            } else {
                Some(monitors.swap_remove(primary))
            }
        }
    };

    found.ok_or_else(|| {
        Error::CaptureUnavailable(match name {
            Some(wanted) => format!("no monitor named {wanted:?}"),
            None => "no monitors available".to_string(),
        })
    })
}
