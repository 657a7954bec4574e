//! Immutable configuration for the compositor and the export pipeline.
//!
//! Geometry is expressed as fractions of the canvas so one [`LayoutConfig`] works for any aspect
//! ratio. Several configurations can coexist; nothing here is global.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::encode::format::VideoFormat;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{SlideReelError, SlideReelResult};

/// Layout and entrance-animation constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Left margin of the text block, fraction of canvas width.
    pub margin_x: f64,
    /// Accent bar height, fraction of canvas height.
    pub accent_height: f64,
    /// Fully-grown accent bar width, fraction of canvas width.
    pub accent_width: f64,
    /// Gap between the accent bar and the first title line, fraction of canvas height.
    pub accent_title_gap: f64,
    /// Title font size, fraction of canvas height.
    pub title_size: f64,
    /// Title line height as a multiple of its font size.
    pub title_line_height: f64,
    /// Subtitle font size, fraction of canvas height.
    pub subtitle_size: f64,
    /// Subtitle line height as a multiple of its font size.
    pub subtitle_line_height: f64,
    /// Gap between the title cursor and the subtitle, fraction of canvas height.
    pub subtitle_gap: f64,
    /// Block anchor for `top` alignment, fraction of canvas height.
    pub top_padding: f64,
    /// Distance of the `bottom` anchor from the canvas bottom, fraction of canvas height.
    pub bottom_padding: f64,
    /// Height kept free below the `bottom` anchor for the text itself, fraction of canvas height.
    pub bottom_text_reserve: f64,
    /// How far above the vertical center the `center` anchor sits, fraction of canvas height.
    pub center_offset: f64,
    /// Initial downward offset of the block, fraction of canvas height (60px at 1280).
    pub entrance_offset: f64,
    /// Block opacity at the start of the entrance.
    pub entrance_start_opacity: f64,
    /// Opacity of the black scrim laid over background images.
    pub scrim_opacity: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin_x: 0.075,
            accent_height: 0.0075,
            accent_width: 0.28,
            accent_title_gap: 0.025,
            title_size: 0.07,
            title_line_height: 1.15,
            subtitle_size: 0.035,
            subtitle_line_height: 1.4,
            subtitle_gap: 0.02,
            top_padding: 0.15,
            bottom_padding: 0.12,
            bottom_text_reserve: 0.25,
            center_offset: 0.12,
            entrance_offset: 60.0 / 1280.0,
            entrance_start_opacity: 0.8,
            scrim_opacity: 0.35,
        }
    }
}

/// Everything the compositor needs to draw a frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output size; both dimensions must be even.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Layout and entrance constants.
    pub layout: LayoutConfig,
}

impl RenderConfig {
    /// Reject canvases the encoders cannot take and zero frame rates.
    pub fn validate(&self) -> SlideReelResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(SlideReelError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(SlideReelError::validation(
                "canvas width/height must be even",
            ));
        }
        if self.canvas.width > u32::from(u16::MAX) || self.canvas.height > u32::from(u16::MAX) {
            return Err(SlideReelError::validation("canvas dimensions exceed u16"));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }
}

/// How the render loop paces itself against wall-clock time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Hold every frame for `1/fps` seconds before producing the next one.
    #[default]
    RealTime,
    /// Produce frames as fast as the sink accepts them.
    Unpaced,
}

/// Settings for one [`Exporter`](crate::Exporter).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Canvas, frame rate and layout.
    pub render: RenderConfig,
    /// Candidate output formats in preference order.
    pub formats: Vec<VideoFormat>,
    /// Frame pacing of the render loop.
    pub pacing: Pacing,
    /// Color translucent pixels are flattened over before encoding.
    pub background: Color,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            formats: VideoFormat::default_preferences(),
            pacing: Pacing::RealTime,
            background: Color::BLACK,
        }
    }
}

/// Font files used by the CPU surface.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Regular face for subtitles; searched on the system when unset.
    pub regular: Option<PathBuf>,
    /// Bold face for titles; searched on the system when unset.
    pub bold: Option<PathBuf>,
}

/// Top-level configuration file read by the CLI (`--config`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Export settings.
    pub export: ExportConfig,
    /// Font files.
    pub fonts: FontConfig,
}

impl PipelineConfig {
    /// Load a JSON config file. Missing keys take their defaults; the render settings are
    /// validated.
    pub fn from_path(path: &Path) -> SlideReelResult<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: PipelineConfig = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| SlideReelError::validation(format!("parse config JSON: {e}")))?;
        cfg.export.render.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_portrait_30fps_realtime() {
        let cfg = ExportConfig::default();
        assert_eq!(cfg.render.canvas, Canvas::PORTRAIT_720P);
        assert_eq!(cfg.render.fps, Fps::default());
        assert_eq!(cfg.pacing, Pacing::RealTime);
        assert!(!cfg.formats.is_empty());
        cfg.render.validate().unwrap();
    }

    #[test]
    fn entrance_offset_is_sixty_px_at_720p() {
        let layout = LayoutConfig::default();
        let px = layout.entrance_offset * Canvas::PORTRAIT_720P.height_f64();
        assert!((px - 60.0).abs() < 1e-9);
    }

    #[test]
    fn validate_catches_bad_canvas_and_fps() {
        let mut cfg = RenderConfig::default();
        cfg.canvas.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RenderConfig::default();
        cfg.canvas.height = 1279;
        assert!(cfg.validate().is_err());

        let mut cfg = RenderConfig::default();
        cfg.fps.num = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "export": { "render": { "canvas": { "width": 1080, "height": 1920 } }, "pacing": "unpaced" } }"#;
        let cfg: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.export.render.canvas.width, 1080);
        assert_eq!(cfg.export.render.fps, Fps::default());
        assert_eq!(cfg.export.pacing, Pacing::Unpaced);
        assert_eq!(cfg.export.render.layout, LayoutConfig::default());
        assert!(cfg.fonts.regular.is_none());
    }
}
