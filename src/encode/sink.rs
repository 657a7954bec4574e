use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assets::prefetch::DecodeWarning;
use crate::encode::format::VideoFormat;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::SlideReelResult;
use crate::render::backend::FrameRGBA;

/// Configuration handed to a [`CaptureSink`] before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    /// Size of every captured frame.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Color translucent pixels are flattened over.
    pub background: Color,
}

/// Sink contract for sampling a surface and producing encoded output.
///
/// Sampling contract: every `capture_frame` call becomes exactly one output frame, in call order.
/// The sinks in this crate do not sample on a clock of their own, so real-time pacing never drops
/// or duplicates frames with them.
pub trait CaptureSink: Send {
    /// Called once before any frame is captured.
    fn start(&mut self, cfg: &SinkConfig) -> SlideReelResult<()>;

    /// Sample the current surface contents.
    fn capture_frame(&mut self, frame: &FrameRGBA) -> SlideReelResult<()>;

    /// Report a failure the sink hit asynchronously since the last call.
    fn check_health(&mut self) -> SlideReelResult<()> {
        Ok(())
    }

    /// Stop sampling and wait for the encoded buffer.
    fn finish(self: Box<Self>) -> SlideReelResult<EncodedVideo>;

    /// Stop immediately and discard any output. Safe to call more than once.
    fn abort(&mut self);
}

/// Host-provided capture/encode capability.
pub trait CaptureHost: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Whether capture is possible at all on this host.
    fn is_available(&self) -> bool;

    /// `Some(supported)` when the host can tell, `None` when it cannot.
    fn is_type_supported(&self, format: &VideoFormat) -> Option<bool>;

    /// Build a sink for `format`, or for the host default when `None`.
    fn create_sink(&self, format: Option<&VideoFormat>) -> SlideReelResult<Box<dyn CaptureSink>>;
}

/// Final output of an export run.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedVideo {
    /// Negotiated container/codec of `bytes`.
    pub format: VideoFormat,
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
    /// Number of frames handed to the sink.
    pub frames: u64,
    /// Slides that rendered without their image.
    pub decode_warnings: Vec<DecodeWarning>,
}

impl EncodedVideo {
    /// File extension of the container.
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Write the buffer to `path`, adding the format's extension when `path` has none.
    pub fn write_to(&self, path: &Path) -> SlideReelResult<PathBuf> {
        let path = if path.extension().is_none() {
            path.with_extension(self.extension())
        } else {
            path.to_path_buf()
        };
        ensure_parent_dir(&path)?;
        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("write video '{}'", path.display()))?;
        Ok(path)
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SlideReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
