//! Capture sinks: consume rendered frames in order and assemble an encoded buffer.

pub(crate) mod ffmpeg;
pub(crate) mod format;
pub(crate) mod memory;
pub(crate) mod sink;
