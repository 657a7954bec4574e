use serde::{Deserialize, Serialize};

/// Output container/codec identified by its MIME type, e.g. `video/webm;codecs=vp9`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoFormat {
    mime: String,
}

impl VideoFormat {
    /// WebM with VP9.
    pub const WEBM_VP9: &'static str = "video/webm;codecs=vp9";
    /// WebM with VP8.
    pub const WEBM_VP8: &'static str = "video/webm;codecs=vp8";
    /// WebM with the host's default codec.
    pub const WEBM: &'static str = "video/webm";
    /// Fragmented MP4 with H.264.
    pub const MP4_AVC1: &'static str = "video/mp4;codecs=avc1";
    /// Concatenated raw RGBA8 frames.
    pub const RAW_RGBA: &'static str = "video/x-raw;format=rgba";

    /// Wrap a MIME type; it is not checked against the known constants.
    pub fn new(mime: impl Into<String>) -> Self {
        Self { mime: mime.into() }
    }

    /// Candidates in the order they are tried when nothing else is configured.
    pub fn default_preferences() -> Vec<Self> {
        [Self::WEBM_VP9, Self::WEBM_VP8, Self::WEBM, Self::MP4_AVC1]
            .into_iter()
            .map(Self::new)
            .collect()
    }

    /// Full MIME type as given.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Container part of the MIME type, lowercased (`video/webm`).
    pub fn container(&self) -> String {
        self.mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// First entry of the `codecs=` parameter, if any.
    pub fn codec(&self) -> Option<String> {
        self.mime.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("codecs") {
                return None;
            }
            let value = value.trim().trim_matches('"');
            value
                .split(',')
                .next()
                .map(|c| c.trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty())
        })
    }

    /// File extension matching the container.
    pub fn extension(&self) -> &'static str {
        match self.container().as_str() {
            "video/webm" => "webm",
            "video/mp4" => "mp4",
            "video/x-matroska" => "mkv",
            "video/x-raw" => "rgba",
            _ => "bin",
        }
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.mime)
    }
}

/// Pick the first candidate the host reports as supported.
///
/// `probe` returns `None` when the host cannot tell. When no candidate is positively supported
/// the result is `None` and the host's own default is used.
pub fn negotiate(
    candidates: &[VideoFormat],
    mut probe: impl FnMut(&VideoFormat) -> Option<bool>,
) -> Option<VideoFormat> {
    candidates
        .iter()
        .find(|candidate| probe(candidate) == Some(true))
        .cloned()
}
