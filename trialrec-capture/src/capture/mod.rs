pub mod monitor;

use crate::Result;

pub use monitor::{monitor_size, MonitorSource, MonitorSourceFactory};

/// One grabbed screen image, tightly packed RGBA8.
#[derive(Clone)]
pub struct CaptureFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

pub trait FrameSource {
    fn grab(&mut self) -> Result<CaptureFrame>;
}

/// Opens a [`FrameSource`] on the scheduler thread.
///
/// Display handles are not always `Send`, so the trial hands the scheduler a
/// factory instead of a source.
pub trait SourceFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceFactory for F
where
    F: Fn() -> Result<Box<dyn FrameSource>> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        self()
    }
}
