//! SlideReel turns a sequence of slides into a vertical video.
//!
//! - Describe scenes as [`Slide`] values (or load a [`SlideDeck`] from JSON)
//! - Render any single frame with [`render_frame`] onto a [`Surface`]
//! - Export the whole deck through an [`Exporter`] into an [`EncodedVideo`]
//!
//! Host capabilities (drawing surface, capture sink, image decoding, text measurement) are traits,
//! so the pipeline runs against `ffmpeg` and a CPU rasterizer in production and against
//! deterministic fakes in tests.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod animation;
pub(crate) mod assets;
pub(crate) mod config;
pub(crate) mod encode;
pub(crate) mod export;
pub(crate) mod layout;
pub(crate) mod render;
pub(crate) mod slide;

pub use crate::foundation::color::Color;
pub use crate::foundation::core::{Affine, Canvas, Fps, Point, Rect, Vec2};
pub use crate::foundation::error::{SlideReelError, SlideReelResult};

pub use crate::animation::ease::{clamp_progress, ease_in_out_cubic};
pub use crate::animation::entrance::Entrance;
pub use crate::assets::decode::{Bitmap, decode_image, parse_data_uri};
pub use crate::assets::prefetch::{
    DecodeWarning, ImageDecoder, Prefetched, SourceDecoder, prefetch_images,
};
pub use crate::config::{
    ExportConfig, FontConfig, LayoutConfig, Pacing, PipelineConfig, RenderConfig,
};
pub use crate::encode::ffmpeg::{FFMPEG_ENV, FfmpegCaptureSink, FfmpegHost};
pub use crate::encode::format::{VideoFormat, negotiate};
pub use crate::encode::memory::{InMemoryCaptureHost, InMemorySink, InMemoryStats};
pub use crate::encode::sink::{
    CaptureHost, CaptureSink, EncodedVideo, SinkConfig, ensure_parent_dir,
};
pub use crate::export::orchestrator::{Exporter, export_to_video};
pub use crate::export::plan::{FramePlan, frame_progress, plan_frames};
pub use crate::export::state::{ExportProgress, ExportState, ProgressFn};
pub use crate::layout::wrap::{
    FontSpec, FontWeight, PlacedLine, TextMeasurer, WrapBox, WrappedText, wrap_text,
};
pub use crate::render::backend::{FrameRGBA, Surface, SurfaceProvider};
pub use crate::render::compositor::{SlideLayout, anchor_y, cover_rect, layout_slide, render_frame};
pub use crate::render::cpu::{CpuSurface, CpuSurfaceProvider};
pub use crate::render::fonts::{FontFace, FontSet};
pub use crate::slide::{
    Alignment, COPY_MARKER, MAX_SLIDE_DURATION_SECS, Slide, SlideDeck, SlideId, create_default_slide, duplicate,
    validate_slides,
};
pub use tokio_util::sync::CancellationToken;
