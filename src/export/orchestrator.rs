use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::assets::prefetch::{ImageDecoder, SourceDecoder, prefetch_images};
use crate::config::{ExportConfig, FontConfig, Pacing};
use crate::encode::ffmpeg::FfmpegHost;
use crate::encode::format::{VideoFormat, negotiate};
use crate::encode::sink::{CaptureHost, CaptureSink, EncodedVideo, SinkConfig};
use crate::export::plan::{frame_progress, plan_frames};
use crate::export::state::{ExportProgress, ExportRun, ExportState, ProgressFn};
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::render::backend::SurfaceProvider;
use crate::render::compositor::render_frame;
use crate::render::cpu::CpuSurfaceProvider;
use crate::render::fonts::FontSet;
use crate::slide::{Slide, validate_slides};

/// Owns the sink for the rendering phase and aborts it on every early exit.
struct SinkGuard {
    sink: Option<Box<dyn CaptureSink>>,
}

impl SinkGuard {
    fn new(sink: Box<dyn CaptureSink>) -> Self {
        Self { sink: Some(sink) }
    }

    fn sink(&mut self) -> SlideReelResult<&mut (dyn CaptureSink + 'static)> {
        self.sink
            .as_deref_mut()
            .ok_or_else(|| SlideReelError::sink("capture sink already released"))
    }

    fn release(mut self) -> SlideReelResult<Box<dyn CaptureSink>> {
        self.sink
            .take()
            .ok_or_else(|| SlideReelError::sink("capture sink already released"))
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.abort();
            tracing::debug!("capture sink aborted");
        }
    }
}

/// Renders a slide sequence into one encoded video.
///
/// Every call to [`Exporter::export`] creates its own surface and sink, so one exporter can serve
/// concurrent runs.
#[derive(Clone)]
pub struct Exporter {
    config: ExportConfig,
    host: Arc<dyn CaptureHost>,
    decoder: Arc<dyn ImageDecoder>,
    surfaces: Arc<dyn SurfaceProvider>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("host", &self.host.name())
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Exporter over explicit host capabilities.
    pub fn new(
        config: ExportConfig,
        host: Arc<dyn CaptureHost>,
        decoder: Arc<dyn ImageDecoder>,
        surfaces: Arc<dyn SurfaceProvider>,
    ) -> Self {
        Self {
            config,
            host,
            decoder,
            surfaces,
        }
    }

    /// Exporter using `ffmpeg`, the data-URI decoder and a CPU surface with system fonts.
    pub fn with_defaults(config: ExportConfig, fonts: &FontConfig) -> SlideReelResult<Self> {
        let fonts = FontSet::load(fonts)?;
        Ok(Self::new(
            config,
            Arc::new(FfmpegHost::new()),
            Arc::new(SourceDecoder::new()),
            Arc::new(CpuSurfaceProvider::new(fonts)),
        ))
    }

    /// Configuration every run uses.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Format the host would be asked for, or `None` for the host default.
    pub fn negotiate_format(&self) -> Option<VideoFormat> {
        negotiate(&self.config.formats, |f| self.host.is_type_supported(f))
    }

    /// Render `slides` and return the encoded video, reporting progress after every frame.
    pub async fn export(
        &self,
        slides: &[Slide],
        progress: Option<ProgressFn<'_>>,
    ) -> SlideReelResult<EncodedVideo> {
        self.export_with_cancel(slides, progress, &CancellationToken::new())
            .await
    }

    /// Like [`Exporter::export`], stopping at the next frame boundary once `cancel` fires.
    #[tracing::instrument(skip_all, fields(slides = slides.len(), host = self.host.name()))]
    pub async fn export_with_cancel(
        &self,
        slides: &[Slide],
        progress: Option<ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> SlideReelResult<EncodedVideo> {
        let mut run = ExportRun::new();
        let result = self.run(&mut run, slides, progress, cancel).await;
        match &result {
            Ok(video) => {
                tracing::info!(
                    format = %video.format,
                    bytes = video.bytes.len(),
                    frames = video.frames,
                    warnings = video.decode_warnings.len(),
                    "export finished"
                );
            }
            Err(SlideReelError::Cancelled) => {
                run.fail();
                tracing::info!("export cancelled");
            }
            Err(err) => {
                run.fail();
                tracing::error!(state = %run.state(), error = %err, "export failed");
            }
        }
        run.settle();
        tracing::debug!(states = ?run.history(), "export run settled");
        result
    }

    async fn run(
        &self,
        run: &mut ExportRun,
        slides: &[Slide],
        mut progress: Option<ProgressFn<'_>>,
        cancel: &CancellationToken,
    ) -> SlideReelResult<EncodedVideo> {
        // Nothing is probed or rendered for an invalid request.
        validate_slides(slides)?;
        self.config.render.validate()?;
        let render = &self.config.render;

        run.transition(ExportState::Preparing)?;
        if !self.host.is_available() {
            return Err(SlideReelError::capability(format!(
                "capture host '{}' is not available",
                self.host.name()
            )));
        }
        let format = self.negotiate_format();
        match &format {
            Some(format) => tracing::debug!(%format, "format negotiated"),
            None => tracing::debug!("no candidate reported support, using host default"),
        }

        let plan = plan_frames(slides, render.fps)?;
        tracing::info!(
            slides = slides.len(),
            total_frames = plan.total,
            width = render.canvas.width,
            height = render.canvas.height,
            "export started"
        );

        let prefetched = prefetch_images(slides, self.decoder.as_ref()).await;

        let mut surface = self
            .surfaces
            .create_surface(render.canvas)
            .map_err(|err| match err {
                SlideReelError::Resource(_) => err,
                other => SlideReelError::resource(format!("failed to create surface: {other}")),
            })?;

        let sink = self
            .host
            .create_sink(format.as_ref())
            .map_err(|err| match err {
                SlideReelError::Capability(_) => err,
                other => SlideReelError::capability(format!("no capture sink: {other}")),
            })?;
        let mut guard = SinkGuard::new(sink);
        guard.sink()?.start(&SinkConfig {
            canvas: render.canvas,
            fps: render.fps,
            background: self.config.background,
        })?;

        run.transition(ExportState::Rendering)?;
        let interval = render.fps.frame_interval();
        let mut captured = 0u64;
        for (slide_index, (slide, &count)) in slides.iter().zip(&plan.per_slide).enumerate() {
            let image = prefetched.images[slide_index].as_ref();
            for f in 0..count {
                if cancel.is_cancelled() {
                    return Err(SlideReelError::Cancelled);
                }

                render_frame(
                    surface.as_mut(),
                    &render.layout,
                    slide,
                    image,
                    frame_progress(f, count),
                );
                let frame = surface.snapshot()?;
                let sink = guard.sink()?;
                sink.capture_frame(&frame)?;
                sink.check_health()?;
                captured += 1;

                if let Some(cb) = progress.as_deref_mut() {
                    cb(ExportProgress {
                        fraction: captured as f64 / plan.total as f64,
                        frames_captured: captured,
                        total_frames: plan.total,
                        slide_index,
                    });
                }

                if self.config.pacing == Pacing::RealTime {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SlideReelError::Cancelled),
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
        }
        drop(surface);

        run.transition(ExportState::Finalizing)?;
        let sink = guard.release()?;
        let mut video = tokio::task::spawn_blocking(move || sink.finish())
            .await
            .map_err(|e| SlideReelError::sink(format!("sink finalization task failed: {e}")))??;
        video.decode_warnings = prefetched.warnings;
        Ok(video)
    }
}

/// Export `slides` with the default configuration, ffmpeg host and system fonts.
pub async fn export_to_video(
    slides: &[Slide],
    progress: Option<ProgressFn<'_>>,
) -> SlideReelResult<EncodedVideo> {
    // Checked here too so an empty deck fails before fonts are even looked up.
    validate_slides(slides)?;
    Exporter::with_defaults(ExportConfig::default(), &FontConfig::default())?
        .export(slides, progress)
        .await
}
