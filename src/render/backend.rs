use crate::assets::decode::Bitmap;
use crate::foundation::color::Color;
use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::foundation::error::SlideReelResult;
use crate::layout::wrap::{FontSpec, TextMeasurer};

/// One captured frame of pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied by alpha.
    pub premultiplied: bool,
}

/// Drawing capability the compositor renders into and the capture sink samples from.
///
/// Coordinates are canvas pixels with the origin at the top-left. Draw calls are affected by the
/// current transform and by every opacity layer pushed and not yet popped.
pub trait Surface: TextMeasurer + Send {
    /// Size the surface was created with.
    fn canvas(&self) -> Canvas;

    /// Drop all content, reset the transform to identity and discard open opacity layers.
    fn clear(&mut self);

    /// Replace the transform applied to subsequent draw calls.
    fn set_transform(&mut self, transform: Affine);

    /// Start a layer that is composited with `opacity` when popped.
    fn push_opacity(&mut self, opacity: f32);

    /// Close the innermost opacity layer.
    fn pop_opacity(&mut self);

    /// Fill `rect` with a solid color.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw `image` stretched into `dest`.
    fn draw_image(&mut self, image: &Bitmap, dest: Rect);

    /// Draw a single line of text; `origin` is the top-left corner of its line box.
    fn fill_text(&mut self, text: &str, font: &FontSpec, origin: Point, color: Color);

    /// Resolve everything drawn so far into pixels.
    fn snapshot(&mut self) -> SlideReelResult<FrameRGBA>;
}

/// Hands out fresh surfaces. Every export run owns the surface it was given.
pub trait SurfaceProvider: Send + Sync {
    /// Allocate a cleared surface of `canvas` size.
    fn create_surface(&self, canvas: Canvas) -> SlideReelResult<Box<dyn Surface>>;
}
