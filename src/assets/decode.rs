use std::sync::Arc;

use anyhow::Context as _;
use base64::Engine as _;

use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decoded raster image in premultiplied RGBA8, shared read-only during rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Wrap premultiplied pixels; the buffer must hold exactly `width * height` pixels.
    pub fn from_premul_rgba8(width: u32, height: u32, data: Vec<u8>) -> SlideReelResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(SlideReelError::decode(format!(
                "bitmap data is {} bytes, expected {}x{}x4",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        })
    }
}

/// Decode any format the `image` crate understands into a premultiplied [`Bitmap`].
pub fn decode_image(bytes: &[u8]) -> SlideReelResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| SlideReelError::decode(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Bitmap::from_premul_rgba8(width, height, rgba8_premul)
}

/// Payload of a `data:` URI. Only the base64 form carries binary images.
pub fn parse_data_uri(uri: &str) -> SlideReelResult<Vec<u8>> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| SlideReelError::decode("not a data: URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SlideReelError::decode("data: URI has no ',' separator"))?;
    if !meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(SlideReelError::decode(
            "only base64 data: URIs are supported",
        ));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| SlideReelError::decode(format!("invalid base64 payload: {e}")))
}

/// Normalize and validate a deck-relative image path.
///
/// The result uses `/` separators, drops `.` segments, and rejects absolute paths and `..`.
pub fn normalize_rel_path(source: &str) -> SlideReelResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') || s.contains(':') {
        return Err(SlideReelError::decode("image paths must be relative"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(SlideReelError::decode("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(SlideReelError::decode("image path must contain a file name"));
    }
    Ok(out.join("/"))
}
