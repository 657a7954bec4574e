//! Font files for the CPU surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::config::FontConfig;
use crate::foundation::error::SlideReelResult;

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Raw bytes of one font face plus the handle the rasterizer draws glyphs with.
#[derive(Clone)]
pub struct FontFace {
    pub(crate) bytes: Arc<Vec<u8>>,
    pub(crate) data: vello_cpu::peniko::FontData,
}

impl FontFace {
    /// Wrap font file contents. The rasterizer handle and text shaping share one buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bytes = Arc::new(bytes);
        let blob = vello_cpu::peniko::Blob::<u8>::new(bytes.clone());
        let data = vello_cpu::peniko::FontData::new(blob, 0);
        Self { bytes, data }
    }

    /// Read a font file from disk.
    pub fn from_path(path: &Path) -> SlideReelResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Regular face plus an optional bold face (titles fall back to regular without one).
#[derive(Clone, Debug)]
pub struct FontSet {
    /// Face for subtitles, and titles without a bold face.
    pub regular: FontFace,
    /// Face for titles.
    pub bold: Option<FontFace>,
}

impl FontSet {
    /// Set from already loaded faces.
    pub fn new(regular: FontFace, bold: Option<FontFace>) -> Self {
        Self { regular, bold }
    }

    /// Load the configured faces, or search well-known system locations for missing ones.
    ///
    /// Explicitly configured paths must be readable. Returns `None` when no regular face is
    /// configured and none was found on the system.
    pub fn load(cfg: &FontConfig) -> SlideReelResult<Option<Self>> {
        let regular = match &cfg.regular {
            Some(path) => Some(FontFace::from_path(path)?),
            None => first_existing(REGULAR_CANDIDATES)
                .map(|p| FontFace::from_path(&p))
                .transpose()?,
        };
        let Some(regular) = regular else {
            return Ok(None);
        };

        let bold = match &cfg.bold {
            Some(path) => Some(FontFace::from_path(path)?),
            None => first_existing(BOLD_CANDIDATES)
                .map(|p| FontFace::from_path(&p))
                .transpose()?,
        };

        tracing::debug!(bold = bold.is_some(), "loaded fonts");
        Ok(Some(Self::new(regular, bold)))
    }
}

/// Blob handed to the shaper's font collection; the same allocation the rasterizer draws from.
pub(crate) fn register_blob(face: &FontFace) -> vello_cpu::peniko::Blob<u8> {
    face.data.data.clone()
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().map(PathBuf::from).find(|p| p.is_file())
}
