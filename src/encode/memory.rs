use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::encode::format::VideoFormat;
use crate::encode::sink::{CaptureHost, CaptureSink, EncodedVideo, SinkConfig};
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::render::backend::FrameRGBA;

/// Counters shared by an [`InMemoryCaptureHost`] and every sink it created.
#[derive(Debug, Default)]
pub struct InMemoryStats {
    /// Calls to `is_available`.
    pub availability_checks: AtomicUsize,
    /// Calls to `is_type_supported`.
    pub probes: AtomicUsize,
    /// Sinks handed out.
    pub sinks_created: AtomicUsize,
    /// Frames accepted across all sinks.
    pub frames_captured: AtomicU64,
    /// Sinks that finished with output.
    pub finished: AtomicUsize,
    /// Sinks that were aborted.
    pub aborted: AtomicUsize,
}

impl InMemoryStats {
    /// Current value of one counter.
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Deterministic capture host for tests and debugging.
///
/// The encoded buffer is the concatenation of the captured raw frames.
#[derive(Clone, Debug)]
pub struct InMemoryCaptureHost {
    available: bool,
    reports_support: bool,
    supported: Vec<VideoFormat>,
    fail_after: Option<u64>,
    stats: Arc<InMemoryStats>,
}

impl Default for InMemoryCaptureHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCaptureHost {
    /// Available host supporting every default preference.
    pub fn new() -> Self {
        Self {
            available: true,
            reports_support: true,
            supported: VideoFormat::default_preferences(),
            fail_after: None,
            stats: Arc::new(InMemoryStats::default()),
        }
    }

    /// Host that reports no capture capability.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Replace the formats the host claims to support.
    pub fn with_supported(mut self, supported: Vec<VideoFormat>) -> Self {
        self.supported = supported;
        self
    }

    /// Host that answers every support probe with "don't know".
    pub fn without_support_reporting(mut self) -> Self {
        self.reports_support = false;
        self
    }

    /// Sinks report a runtime failure once `frames` frames were captured.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Counters shared with every sink this host creates.
    pub fn stats(&self) -> Arc<InMemoryStats> {
        self.stats.clone()
    }
}

impl CaptureHost for InMemoryCaptureHost {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn is_available(&self) -> bool {
        self.stats
            .availability_checks
            .fetch_add(1, Ordering::SeqCst);
        self.available
    }

    fn is_type_supported(&self, format: &VideoFormat) -> Option<bool> {
        self.stats.probes.fetch_add(1, Ordering::SeqCst);
        self.reports_support
            .then(|| self.supported.contains(format))
    }

    fn create_sink(&self, format: Option<&VideoFormat>) -> SlideReelResult<Box<dyn CaptureSink>> {
        if !self.available {
            return Err(SlideReelError::capability("in-memory host is disabled"));
        }
        self.stats.sinks_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySink {
            format: format
                .cloned()
                .unwrap_or_else(|| VideoFormat::new(VideoFormat::RAW_RGBA)),
            cfg: None,
            bytes: Vec::new(),
            frames: 0,
            fail_after: self.fail_after,
            stopped: false,
            stats: self.stats.clone(),
        }))
    }
}

/// Sink created by [`InMemoryCaptureHost`].
#[derive(Debug)]
pub struct InMemorySink {
    format: VideoFormat,
    cfg: Option<SinkConfig>,
    bytes: Vec<u8>,
    frames: u64,
    fail_after: Option<u64>,
    stopped: bool,
    stats: Arc<InMemoryStats>,
}

impl CaptureSink for InMemorySink {
    fn start(&mut self, cfg: &SinkConfig) -> SlideReelResult<()> {
        self.cfg = Some(cfg.clone());
        self.bytes.clear();
        self.frames = 0;
        self.stopped = false;
        Ok(())
    }

    fn capture_frame(&mut self, frame: &FrameRGBA) -> SlideReelResult<()> {
        if self.stopped {
            return Err(SlideReelError::sink("in-memory sink is stopped"));
        }
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| SlideReelError::sink("in-memory sink not started"))?;
        if frame.width != cfg.canvas.width || frame.height != cfg.canvas.height {
            return Err(SlideReelError::sink(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.canvas.width, cfg.canvas.height
            )));
        }
        self.bytes.extend_from_slice(&frame.data);
        self.frames += 1;
        self.stats.frames_captured.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn check_health(&mut self) -> SlideReelResult<()> {
        match self.fail_after {
            Some(limit) if self.frames >= limit => Err(SlideReelError::sink(format!(
                "injected failure after {} frames",
                self.frames
            ))),
            _ => Ok(()),
        }
    }

    fn finish(mut self: Box<Self>) -> SlideReelResult<EncodedVideo> {
        if self.cfg.is_none() {
            return Err(SlideReelError::sink("in-memory sink not started"));
        }
        self.stopped = true;
        self.stats.finished.fetch_add(1, Ordering::SeqCst);
        Ok(EncodedVideo {
            format: self.format.clone(),
            bytes: std::mem::take(&mut self.bytes),
            frames: self.frames,
            decode_warnings: Vec::new(),
        })
    }

    fn abort(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.bytes.clear();
            self.stats.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}
