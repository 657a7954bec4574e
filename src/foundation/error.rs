/// Convenience result type used across slidereel.
pub type SlideReelResult<T> = Result<T, SlideReelError>;

/// Every failure an export (or any library call) can resolve with.
///
/// Per-slide image problems are not errors at the export level: they surface as
/// [`DecodeWarning`](crate::DecodeWarning) values and the slide renders without its image.
#[derive(thiserror::Error, Debug)]
pub enum SlideReelError {
    /// Invalid slides or configuration, rejected before anything is probed or rendered.
    #[error("validation error: {0}")]
    Validation(String),

    /// The capture host is missing or could not construct a sink.
    #[error("capability error: {0}")]
    Capability(String),

    /// The drawing surface could not be allocated.
    #[error("resource error: {0}")]
    Resource(String),

    /// An image reference could not be resolved or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The capture sink failed while recording or finalizing.
    #[error("sink error: {0}")]
    Sink(String),

    /// The run was cancelled through its token.
    #[error("export cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlideReelError {
    /// Build a [`SlideReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SlideReelError::Capability`] value.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Build a [`SlideReelError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`SlideReelError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`SlideReelError::Sink`] value.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}
