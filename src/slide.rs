//! Slide values and deck files.
//!
//! A [`Slide`] is an immutable-per-edit description of one scene. Export borrows a snapshot of the
//! deck for the length of a run.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::color::Color;
use crate::foundation::core::Fps;
use crate::foundation::error::{SlideReelError, SlideReelResult};

/// Suffix appended to the title of a duplicated slide.
pub const COPY_MARKER: &str = " (Copy)";

/// Longest slide duration an export accepts, in seconds (one day).
pub const MAX_SLIDE_DURATION_SECS: f64 = 86_400.0;

/// Opaque slide identity, stable for the slide's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(String);

impl SlideId {
    /// Fresh random identifier (UUIDv4 backed by the OS random source).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SlideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlideId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Vertical anchor of the accent/title/subtitle block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Near the top edge.
    Top,
    /// Slightly above the vertical center.
    #[default]
    Center,
    /// Near the bottom edge, leaving room for the text below the anchor.
    Bottom,
}

/// One scene: text, colors, optional background image and how long it stays on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Stable identity.
    pub id: SlideId,
    /// Bold headline.
    pub title: String,
    /// Smaller line(s) under the title.
    pub subtitle: String,
    /// Canvas fill behind everything.
    pub background_color: Color,
    /// Title and subtitle color.
    pub text_color: Color,
    /// Accent bar color.
    pub accent_color: Color,
    /// Seconds on screen; must be finite and `> 0`.
    pub duration: f64,
    /// Embedded image reference (usually a base64 `data:` URI). Shared, never re-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<Arc<str>>,
    /// Vertical placement of the text block.
    #[serde(default)]
    pub alignment: Alignment,
}

impl Default for Slide {
    fn default() -> Self {
        create_default_slide()
    }
}

/// A new scene with a fresh id and the stock look.
pub fn create_default_slide() -> Slide {
    Slide {
        id: SlideId::generate(),
        title: "New Scene".to_owned(),
        subtitle: "Add a subtitle".to_owned(),
        background_color: Color::rgb(0x0f, 0x17, 0x2a),
        text_color: Color::rgb(0xf8, 0xfa, 0xfc),
        accent_color: Color::rgb(0xf9, 0x73, 0x16),
        duration: 3.0,
        image_data_url: None,
        alignment: Alignment::Center,
    }
}

/// Copy `slide` under a new identity. The image reference is shared, not decoded again.
pub fn duplicate(slide: &Slide) -> Slide {
    Slide {
        id: SlideId::generate(),
        title: format!("{}{COPY_MARKER}", slide.title),
        ..slide.clone()
    }
}

impl Slide {
    /// Number of frames this slide occupies at `fps`.
    pub fn frame_count(&self, fps: Fps) -> u64 {
        fps.secs_to_frames(self.duration)
    }

    /// Check that the duration is finite, positive and at most [`MAX_SLIDE_DURATION_SECS`].
    pub fn validate(&self) -> SlideReelResult<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(SlideReelError::validation(format!(
                "slide '{}' duration must be finite and > 0 (got {})",
                self.id, self.duration
            )));
        }
        if self.duration > MAX_SLIDE_DURATION_SECS {
            return Err(SlideReelError::validation(format!(
                "slide '{}' duration {}s exceeds the {MAX_SLIDE_DURATION_SECS}s limit",
                self.id, self.duration
            )));
        }
        Ok(())
    }
}

/// Ordered slide sequence as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SlideDeck {
    /// Slides in playback order.
    pub slides: Vec<Slide>,
}

impl<'de> Deserialize<'de> for SlideDeck {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Wrapped { slides: Vec<Slide> },
            Bare(Vec<Slide>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Wrapped { slides } | Repr::Bare(slides) => Self { slides },
        })
    }
}

impl SlideDeck {
    /// Deck holding `slides`.
    pub fn new(slides: Vec<Slide>) -> Self {
        Self { slides }
    }

    /// Read a deck file holding either `{ "slides": [...] }` or a bare array.
    pub fn from_path(path: &Path) -> SlideReelResult<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open slide deck '{}'", path.display()))?;
        let deck: SlideDeck = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| SlideReelError::validation(format!("parse slide deck JSON: {e}")))?;
        Ok(deck)
    }

    /// Write the deck as pretty-printed `{ "slides": [...] }` JSON.
    pub fn write_to(&self, path: &Path) -> SlideReelResult<()> {
        let f = std::fs::File::create(path)
            .with_context(|| format!("create slide deck '{}'", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(f), self)
            .context("write slide deck JSON")?;
        Ok(())
    }

    /// Same checks as [`validate_slides`].
    pub fn validate(&self) -> SlideReelResult<()> {
        validate_slides(&self.slides)
    }
}

/// Check the export preconditions: at least one slide, every duration positive and within
/// [`MAX_SLIDE_DURATION_SECS`].
pub fn validate_slides(slides: &[Slide]) -> SlideReelResult<()> {
    if slides.is_empty() {
        return Err(SlideReelError::validation(
            "slide sequence must contain at least one slide",
        ));
    }
    slides.iter().try_for_each(Slide::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slide_has_stock_values_and_fresh_ids() {
        let a = create_default_slide();
        let b = create_default_slide();
        assert_ne!(a.id, b.id);
        assert_eq!(a.title, "New Scene");
        assert_eq!(a.duration, 3.0);
        assert_eq!(a.alignment, Alignment::Center);
        assert!(a.image_data_url.is_none());
        assert_eq!(a.accent_color, Color::rgb(0xf9, 0x73, 0x16));
    }

    #[test]
    fn duplicate_gets_new_id_and_copy_marker() {
        let mut original = create_default_slide();
        original.image_data_url = Some(Arc::from("data:image/png;base64,AAAA"));
        original.alignment = Alignment::Bottom;

        let copy = duplicate(&original);
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.title, "New Scene (Copy)");
        assert_eq!(copy.subtitle, original.subtitle);
        assert_eq!(copy.alignment, Alignment::Bottom);
        assert!(Arc::ptr_eq(
            copy.image_data_url.as_ref().unwrap(),
            original.image_data_url.as_ref().unwrap()
        ));
    }

    #[test]
    fn editing_a_duplicate_leaves_original_untouched() {
        let original = create_default_slide();
        let mut copy = duplicate(&original);
        copy.subtitle.push_str(" edited");
        copy.duration = 9.0;
        assert_eq!(original.subtitle, "Add a subtitle");
        assert_eq!(original.duration, 3.0);
    }

    #[test]
    fn frame_count_follows_rounding_rule() {
        let mut s = create_default_slide();
        assert_eq!(s.frame_count(Fps::default()), 90);
        s.duration = 0.1;
        assert_eq!(s.frame_count(Fps::default()), 3);
    }

    #[test]
    fn validate_rejects_empty_and_bad_durations() {
        assert!(matches!(
            validate_slides(&[]),
            Err(SlideReelError::Validation(_))
        ));

        let mut s = create_default_slide();
        s.duration = 0.0;
        assert!(validate_slides(std::slice::from_ref(&s)).is_err());
        s.duration = f64::INFINITY;
        assert!(validate_slides(std::slice::from_ref(&s)).is_err());
        s.duration = 1e300;
        assert!(matches!(
            validate_slides(std::slice::from_ref(&s)),
            Err(SlideReelError::Validation(_))
        ));
        s.duration = MAX_SLIDE_DURATION_SECS;
        validate_slides(std::slice::from_ref(&s)).unwrap();
        s.duration = 1.5;
        validate_slides(&[s]).unwrap();
    }

    #[test]
    fn json_uses_camel_case_and_both_deck_shapes() {
        let json = r##"[{
            "id": "s1",
            "title": "Hello",
            "subtitle": "World",
            "backgroundColor": "#000000",
            "textColor": "#ffffff",
            "accentColor": "#ff8800",
            "duration": 2.5,
            "alignment": "top"
        }]"##;
        let deck: SlideDeck = serde_json::from_str(json).unwrap();
        assert_eq!(deck.slides.len(), 1);
        assert_eq!(deck.slides[0].id.as_str(), "s1");
        assert_eq!(deck.slides[0].alignment, Alignment::Top);
        assert!(deck.slides[0].image_data_url.is_none());

        let wrapped = serde_json::to_string(&deck).unwrap();
        assert!(wrapped.contains("\"backgroundColor\":\"#000000\""));
        let back: SlideDeck = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(back, deck);
    }
}
