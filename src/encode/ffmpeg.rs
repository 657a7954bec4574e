use std::collections::HashSet;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread::JoinHandle;

use crate::encode::format::VideoFormat;
use crate::encode::sink::{CaptureHost, CaptureSink, EncodedVideo, SinkConfig};
use crate::foundation::core::Fps;
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::foundation::math::flatten_premul_over_bg;
use crate::render::backend::FrameRGBA;

/// Environment variable naming the `ffmpeg` executable to use instead of the one on `PATH`.
pub const FFMPEG_ENV: &str = "SLIDEREEL_FFMPEG";

const FRAGMENTED_MP4: &[&str] = &["-movflags", "frag_keyframe+empty_moov+default_base_moof"];
const VPX_REALTIME: &[&str] = &["-deadline", "realtime", "-cpu-used", "8"];

/// How one [`VideoFormat`] maps onto an ffmpeg encoder and muxer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EncoderPlan {
    encoder: &'static str,
    muxer: &'static str,
    extra: &'static [&'static str],
}

fn plan_for(format: &VideoFormat) -> Option<EncoderPlan> {
    let codec = format.codec();
    match (format.container().as_str(), codec.as_deref()) {
        ("video/webm", Some("vp9" | "vp09")) => Some(EncoderPlan {
            encoder: "libvpx-vp9",
            muxer: "webm",
            extra: VPX_REALTIME,
        }),
        ("video/webm", None | Some("vp8")) => Some(EncoderPlan {
            encoder: "libvpx",
            muxer: "webm",
            extra: VPX_REALTIME,
        }),
        ("video/mp4", None | Some("avc1" | "h264")) => Some(EncoderPlan {
            encoder: "libx264",
            muxer: "mp4",
            extra: FRAGMENTED_MP4,
        }),
        _ => None,
    }
}

/// Extract encoder names from `ffmpeg -encoders` output.
fn parse_encoder_list(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            flags.starts_with('V').then(|| name.to_owned())
        })
        .collect()
}

/// Capture host backed by the system `ffmpeg`.
///
/// Frames stream as raw RGBA on stdin, the encoded container is read back from stdout.
#[derive(Debug)]
pub struct FfmpegHost {
    program: PathBuf,
    available: OnceLock<bool>,
    encoders: OnceLock<Option<HashSet<String>>>,
}

impl Default for FfmpegHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegHost {
    /// Use `$SLIDEREEL_FFMPEG` when set, `ffmpeg` from `PATH` otherwise.
    pub fn new() -> Self {
        let program = std::env::var_os(FFMPEG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        Self::with_program(program)
    }

    /// Use an explicit `ffmpeg` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            available: OnceLock::new(),
            encoders: OnceLock::new(),
        }
    }

    /// Executable this host spawns.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn encoders(&self) -> Option<&HashSet<String>> {
        self.encoders
            .get_or_init(|| {
                let out = Command::new(&self.program)
                    .args(["-hide_banner", "-encoders"])
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .ok()?;
                if !out.status.success() {
                    return None;
                }
                let list = parse_encoder_list(&String::from_utf8_lossy(&out.stdout));
                tracing::debug!(count = list.len(), "ffmpeg video encoders listed");
                Some(list)
            })
            .as_ref()
    }

    fn default_format(&self) -> VideoFormat {
        VideoFormat::default_preferences()
            .into_iter()
            .find(|f| self.is_type_supported(f) == Some(true))
            .unwrap_or_else(|| VideoFormat::new(VideoFormat::WEBM))
    }
}

impl CaptureHost for FfmpegHost {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            Command::new(&self.program)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn is_type_supported(&self, format: &VideoFormat) -> Option<bool> {
        let Some(plan) = plan_for(format) else {
            return Some(false);
        };
        self.encoders().map(|list| list.contains(plan.encoder))
    }

    fn create_sink(&self, format: Option<&VideoFormat>) -> SlideReelResult<Box<dyn CaptureSink>> {
        let format = match format {
            Some(f) => f.clone(),
            None => self.default_format(),
        };
        let plan = plan_for(&format).ok_or_else(|| {
            SlideReelError::capability(format!("ffmpeg host cannot encode '{format}'"))
        })?;
        Ok(Box::new(FfmpegCaptureSink::new(
            self.program.clone(),
            format,
            plan,
        )))
    }
}

type Drain = JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_drain(mut pipe: impl Read + Send + 'static) -> Drain {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(handle: Option<Drain>, what: &str) -> SlideReelResult<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| SlideReelError::sink(format!("ffmpeg {what} drain thread panicked")))?
            .map_err(|e| SlideReelError::sink(format!("ffmpeg {what} read failed: {e}"))),
        None => Ok(Vec::new()),
    }
}

/// Sink that streams flattened frames into an `ffmpeg` child process.
pub struct FfmpegCaptureSink {
    program: PathBuf,
    format: VideoFormat,
    plan: EncoderPlan,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<Drain>,
    stderr_drain: Option<Drain>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    frames: u64,
}

impl std::fmt::Debug for FfmpegCaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegCaptureSink")
            .field("program", &self.program)
            .field("format", &self.format)
            .field("encoder", &self.plan.encoder)
            .field("running", &self.child.is_some())
            .field("frames", &self.frames)
            .finish()
    }
}

impl FfmpegCaptureSink {
    fn new(program: PathBuf, format: VideoFormat, plan: EncoderPlan) -> Self {
        Self {
            program,
            format,
            plan,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            frames: 0,
        }
    }

    fn command(&self, cfg: &SinkConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Input: opaque RGBA8, flattened in capture_frame since ffmpeg has no premul input.
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.canvas.width, cfg.canvas.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an", "-c:v", self.plan.encoder]);
        cmd.args(["-pix_fmt", "yuv420p"]);
        cmd.args(self.plan.extra);
        cmd.args(["-f", self.plan.muxer, "pipe:1"]);
        cmd
    }

    /// Reap a child that already exited and turn its stderr into an error.
    fn exited_error(&mut self, status: ExitStatus) -> SlideReelError {
        self.child = None;
        drop(self.stdin.take());
        drop(self.stdout_drain.take());
        let stderr = join_drain(self.stderr_drain.take(), "stderr").unwrap_or_default();
        SlideReelError::sink(format!(
            "ffmpeg exited with status {}: {}",
            status,
            String::from_utf8_lossy(&stderr).trim()
        ))
    }
}

impl CaptureSink for FfmpegCaptureSink {
    fn start(&mut self, cfg: &SinkConfig) -> SlideReelResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(SlideReelError::validation("fps must be non-zero"));
        }
        if cfg.canvas.width == 0 || cfg.canvas.height == 0 {
            return Err(SlideReelError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.canvas.width.is_multiple_of(2) || !cfg.canvas.height.is_multiple_of(2) {
            return Err(SlideReelError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p output)",
            ));
        }
        if self.child.is_some() {
            return Err(SlideReelError::sink("ffmpeg sink already started"));
        }

        let mut child = self.command(cfg).spawn().map_err(|e| {
            SlideReelError::capability(format!(
                "failed to spawn '{}' (is ffmpeg installed?): {e}",
                self.program.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlideReelError::sink("failed to open ffmpeg stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SlideReelError::sink("failed to open ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SlideReelError::sink("failed to open ffmpeg stderr"))?;

        tracing::debug!(
            encoder = self.plan.encoder,
            format = %self.format,
            width = cfg.canvas.width,
            height = cfg.canvas.height,
            "ffmpeg capture started"
        );

        self.scratch = vec![0u8; cfg.canvas.byte_len()];
        self.stdout_drain = Some(spawn_drain(stdout));
        self.stderr_drain = Some(spawn_drain(stderr));
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.cfg = Some(cfg.clone());
        self.frames = 0;
        Ok(())
    }

    fn capture_frame(&mut self, frame: &FrameRGBA) -> SlideReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| SlideReelError::sink("ffmpeg sink not started"))?;
        if frame.width != cfg.canvas.width || frame.height != cfg.canvas.height {
            return Err(SlideReelError::sink(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.canvas.width, cfg.canvas.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(SlideReelError::sink(
                "frame.data size mismatch with width*height*4",
            ));
        }

        let bg = cfg.background;
        if frame.premultiplied {
            flatten_premul_over_bg(&mut self.scratch, &frame.data, [bg.r, bg.g, bg.b]);
        } else {
            self.scratch.copy_from_slice(&frame.data);
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SlideReelError::sink("ffmpeg sink is already finalized"));
        };
        if let Err(e) = stdin.write_all(&self.scratch) {
            if let Some(child) = self.child.as_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                return Err(self.exited_error(status));
            }
            return Err(SlideReelError::sink(format!(
                "failed to write frame to ffmpeg stdin: {e}"
            )));
        }
        self.frames += 1;
        Ok(())
    }

    fn check_health(&mut self) -> SlideReelResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(self.exited_error(status)),
            Err(e) => Err(SlideReelError::sink(format!("failed to poll ffmpeg: {e}"))),
        }
    }

    fn finish(mut self: Box<Self>) -> SlideReelResult<EncodedVideo> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| SlideReelError::sink("ffmpeg sink not started"))?;

        let status = child
            .wait()
            .map_err(|e| SlideReelError::sink(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stdout = join_drain(self.stdout_drain.take(), "stdout")?;
        let stderr = join_drain(self.stderr_drain.take(), "stderr")?;

        if !status.success() {
            return Err(SlideReelError::sink(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        if stdout.is_empty() {
            return Err(SlideReelError::sink("ffmpeg produced no output"));
        }

        tracing::debug!(bytes = stdout.len(), frames = self.frames, "ffmpeg capture finished");
        self.cfg = None;
        Ok(EncodedVideo {
            format: self.format.clone(),
            bytes: stdout,
            frames: self.frames,
            decode_warnings: Vec::new(),
        })
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!("ffmpeg capture aborted");
        }
        // Both pipes are closed now, so the drain threads end on their own.
        drop(self.stdout_drain.take());
        drop(self.stderr_drain.take());
        self.cfg = None;
    }
}

impl Drop for FfmpegCaptureSink {
    fn drop(&mut self) {
        self.abort();
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // rawvideo input takes its rate from `-r` before `-i`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D libvpx               libvpx VP8 (codec vp8)
 A....D libopus              libopus Opus (codec opus)
";

    #[test]
    fn parses_video_encoders_only() {
        let list = parse_encoder_list(ENCODERS);
        assert!(list.contains("libx264"));
        assert!(list.contains("libvpx"));
        assert!(!list.contains("libopus"));
        assert!(!list.contains("="));
    }

    #[test]
    fn maps_formats_to_encoders() {
        let enc = |mime: &str| plan_for(&VideoFormat::new(mime)).map(|p| p.encoder);
        assert_eq!(enc(VideoFormat::WEBM_VP9), Some("libvpx-vp9"));
        assert_eq!(enc(VideoFormat::WEBM_VP8), Some("libvpx"));
        assert_eq!(enc(VideoFormat::WEBM), Some("libvpx"));
        assert_eq!(enc(VideoFormat::MP4_AVC1), Some("libx264"));
        assert_eq!(enc("video/ogg;codecs=theora"), None);

        let mp4 = plan_for(&VideoFormat::new(VideoFormat::MP4_AVC1)).unwrap();
        assert!(mp4.extra.iter().any(|a| a.contains("empty_moov")));
    }

    #[test]
    fn support_follows_encoder_list() {
        let host = FfmpegHost {
            program: PathBuf::from("ffmpeg"),
            available: OnceLock::from(true),
            encoders: OnceLock::from(Some(parse_encoder_list(ENCODERS))),
        };
        assert_eq!(
            host.is_type_supported(&VideoFormat::new(VideoFormat::WEBM_VP9)),
            Some(false)
        );
        assert_eq!(
            host.is_type_supported(&VideoFormat::new(VideoFormat::WEBM_VP8)),
            Some(true)
        );
        assert_eq!(
            host.is_type_supported(&VideoFormat::new("video/ogg")),
            Some(false)
        );
        assert_eq!(host.default_format().mime(), VideoFormat::WEBM_VP8);

        let unknown = FfmpegHost {
            program: PathBuf::from("ffmpeg"),
            available: OnceLock::from(true),
            encoders: OnceLock::from(None),
        };
        assert_eq!(
            unknown.is_type_supported(&VideoFormat::new(VideoFormat::WEBM_VP9)),
            None
        );
    }

    #[test]
    fn missing_program_is_unavailable() {
        let host = FfmpegHost::with_program("/nonexistent/slidereel-ffmpeg");
        assert!(!host.is_available());
        assert_eq!(
            host.is_type_supported(&VideoFormat::new(VideoFormat::WEBM)),
            None
        );
    }

    #[test]
    fn unsupported_format_has_no_sink() {
        let host = FfmpegHost::with_program("ffmpeg");
        assert!(matches!(
            host.create_sink(Some(&VideoFormat::new("video/ogg"))),
            Err(SlideReelError::Capability(_))
        ));
    }
}
