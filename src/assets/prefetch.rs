//! Resolve every slide's optional image before the first frame is rendered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::assets::decode::{Bitmap, decode_image, normalize_rel_path, parse_data_uri};
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::slide::{Slide, SlideId};

/// Host capability that turns an image reference into pixels.
#[async_trait::async_trait]
pub trait ImageDecoder: Send + Sync {
    /// Resolve `source` (a slide's image reference) into premultiplied pixels.
    async fn decode(&self, source: &str) -> SlideReelResult<Bitmap>;
}

/// Decodes base64 `data:` URIs, and deck-relative file paths when a base directory is set.
///
/// Decoding runs on the blocking pool so a batch of images is decoded in parallel.
#[derive(Clone, Debug, Default)]
pub struct SourceDecoder {
    base_dir: Option<PathBuf>,
}

impl SourceDecoder {
    /// Decoder for `data:` URIs only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that also reads files relative to `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve_path(&self, source: &str) -> SlideReelResult<PathBuf> {
        let base = self.base_dir.as_deref().ok_or_else(|| {
            SlideReelError::decode("image is not a data: URI and no base directory is set")
        })?;
        Ok(base.join(normalize_rel_path(source)?))
    }
}

enum ImageSource {
    DataUri(String),
    File(PathBuf),
}

impl ImageSource {
    fn load(self) -> SlideReelResult<Bitmap> {
        let bytes = match self {
            Self::DataUri(uri) => parse_data_uri(&uri)?,
            Self::File(path) => read_file(&path)?,
        };
        decode_image(&bytes)
    }
}

fn read_file(path: &Path) -> SlideReelResult<Vec<u8>> {
    std::fs::read(path)
        .with_context(|| format!("read image '{}'", path.display()))
        .map_err(|e| SlideReelError::decode(format!("{e:#}")))
}

#[async_trait::async_trait]
impl ImageDecoder for SourceDecoder {
    async fn decode(&self, source: &str) -> SlideReelResult<Bitmap> {
        let source = source.trim();
        let job = if source.starts_with("data:") {
            ImageSource::DataUri(source.to_owned())
        } else {
            ImageSource::File(self.resolve_path(source)?)
        };

        tokio::task::spawn_blocking(move || job.load())
            .await
            .map_err(|e| SlideReelError::decode(format!("image decode task failed: {e}")))?
    }
}

/// A slide whose image could not be decoded. The slide still renders, without the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Position of the slide in the exported sequence.
    pub slide_index: usize,
    /// Identity of the slide.
    pub slide_id: SlideId,
    /// Why the image was skipped.
    pub message: String,
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slide {} ('{}') image skipped: {}",
            self.slide_index, self.slide_id, self.message
        )
    }
}

/// Result of [`prefetch_images`].
#[derive(Clone, Debug, Default)]
pub struct Prefetched {
    /// One entry per input slide, in input order.
    pub images: Vec<Option<Bitmap>>,
    /// One entry per slide whose image failed, in slide order.
    pub warnings: Vec<DecodeWarning>,
}

/// Decode all slide images concurrently.
///
/// Identical references are decoded once and shared. A failed decode only blanks that slide's
/// entry and records a [`DecodeWarning`]; the batch always completes.
#[tracing::instrument(skip_all, fields(slides = slides.len()))]
pub async fn prefetch_images(slides: &[Slide], decoder: &dyn ImageDecoder) -> Prefetched {
    let mut unique: Vec<&str> = Vec::new();
    let mut slot_of: HashMap<&str, usize> = HashMap::new();
    let slots: Vec<Option<usize>> = slides
        .iter()
        .map(|slide| {
            let src = slide.image_data_url.as_deref()?;
            Some(*slot_of.entry(src).or_insert_with(|| {
                unique.push(src);
                unique.len() - 1
            }))
        })
        .collect();

    let decoded = futures::future::join_all(unique.iter().map(|src| decoder.decode(src))).await;

    let mut out = Prefetched {
        images: Vec::with_capacity(slides.len()),
        warnings: Vec::new(),
    };
    for (index, (slide, slot)) in slides.iter().zip(slots).enumerate() {
        let Some(slot) = slot else {
            out.images.push(None);
            continue;
        };
        match &decoded[slot] {
            Ok(bitmap) => out.images.push(Some(bitmap.clone())),
            Err(err) => {
                let warning = DecodeWarning {
                    slide_index: index,
                    slide_id: slide.id.clone(),
                    message: err.to_string(),
                };
                tracing::warn!(slide = index, id = %slide.id, error = %err, "image decode failed");
                out.warnings.push(warning);
                out.images.push(None);
            }
        }
    }

    tracing::debug!(
        unique_sources = unique.len(),
        warnings = out.warnings.len(),
        "images prefetched"
    );
    out
}
