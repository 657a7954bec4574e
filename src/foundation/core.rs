use std::time::Duration;

use crate::foundation::error::{SlideReelError, SlideReelResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Validated frame rate; both parts must be non-zero.
    pub fn new(num: u32, den: u32) -> SlideReelResult<Self> {
        if den == 0 {
            return Err(SlideReelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(SlideReelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Seconds one frame lasts.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Wall-clock interval one frame is held on screen for.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs_f64(self.frame_duration_secs())
    }

    /// Number of frames a scene of `secs` occupies: `max(1, round(secs * fps))`.
    ///
    /// Non-finite or negative durations collapse to a single frame. Counts past `u64::MAX`
    /// saturate.
    pub fn secs_to_frames(self, secs: f64) -> u64 {
        let frames = (secs * self.as_f64()).round();
        if frames.is_finite() && frames >= 1.0 {
            frames as u64
        } else {
            1
        }
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Portrait 9:16 canvas used when nothing else is configured.
    pub const PORTRAIT_720P: Canvas = Canvas {
        width: 720,
        height: 1280,
    };

    /// Width as `f64` for geometry.
    pub fn width_f64(self) -> f64 {
        f64::from(self.width)
    }

    /// Height as `f64` for geometry.
    pub fn height_f64(self) -> f64 {
        f64::from(self.height)
    }

    /// Full-canvas rectangle at the origin.
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, self.width_f64(), self.height_f64())
    }

    /// Size of one RGBA8 frame in bytes.
    pub fn byte_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::PORTRAIT_720P
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert_eq!(Fps::new(30, 1).unwrap(), Fps::default());
    }

    #[test]
    fn secs_to_frames_rounds_with_floor_of_one() {
        let fps = Fps::default();
        assert_eq!(fps.secs_to_frames(3.0), 90);
        assert_eq!(fps.secs_to_frames(0.1), 3);
        assert_eq!(fps.secs_to_frames(0.01), 1);
        assert_eq!(fps.secs_to_frames(0.0), 1);
        assert_eq!(fps.secs_to_frames(f64::NAN), 1);
        assert_eq!(fps.secs_to_frames(2.0) + fps.secs_to_frames(1.0), 90);
    }

    #[test]
    fn ntsc_rate_frame_interval() {
        let fps = Fps::new(30000, 1001).unwrap();
        let interval = fps.frame_interval();
        assert!((interval.as_secs_f64() - 1001.0 / 30000.0).abs() < 1e-9);
    }

    #[test]
    fn canvas_default_is_portrait() {
        let c = Canvas::default();
        assert_eq!((c.width, c.height), (720, 1280));
        assert_eq!(c.byte_len(), 720 * 1280 * 4);
        assert_eq!(c.rect(), Rect::new(0.0, 0.0, 720.0, 1280.0));
    }
}
