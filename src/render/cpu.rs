use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::decode::Bitmap;
use crate::foundation::color::Color;
use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::layout::wrap::{FontSpec, FontWeight, TextMeasurer};
use crate::render::backend::{FrameRGBA, Surface, SurfaceProvider};
use crate::render::fonts::{FontFace, FontSet, register_blob};

/// Average advance as a fraction of font size, used when no font is available.
const FALLBACK_ADVANCE_REGULAR: f64 = 0.55;
const FALLBACK_ADVANCE_BOLD: f64 = 0.6;

/// [`Surface`] rasterized on the CPU with `vello_cpu`, text shaped with `parley`.
pub struct CpuSurface {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    transform: Affine,
    opacity_depth: usize,
    text: Option<TextShaper>,
    warned_missing_fonts: bool,
    // Keyed by pixel buffer address; the `Arc` clone keeps the address from being reused.
    image_cache: HashMap<usize, (Arc<Vec<u8>>, vello_cpu::Image)>,
}

impl CpuSurface {
    /// Cleared surface of `canvas` size; without fonts text is measured by estimate and not drawn.
    pub fn new(canvas: Canvas, fonts: Option<Arc<FontSet>>) -> SlideReelResult<Self> {
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| SlideReelError::resource("surface width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| SlideReelError::resource("surface height exceeds u16"))?;
        if width == 0 || height == 0 {
            return Err(SlideReelError::resource(
                "surface width/height must be non-zero",
            ));
        }

        Ok(Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width, height),
            pixmap: vello_cpu::Pixmap::new(width, height),
            transform: Affine::IDENTITY,
            opacity_depth: 0,
            text: fonts.map(TextShaper::new),
            warned_missing_fonts: false,
            image_cache: HashMap::new(),
        })
    }

    fn image_paint_for(&mut self, image: &Bitmap) -> SlideReelResult<vello_cpu::Image> {
        let key = Arc::as_ptr(&image.rgba8_premul) as usize;
        if let Some((_, paint)) = self.image_cache.get(&key) {
            return Ok(paint.clone());
        }

        let pixmap =
            image_premul_bytes_to_pixmap(image.rgba8_premul.as_slice(), image.width, image.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image_cache
            .insert(key, (image.rgba8_premul.clone(), paint.clone()));
        Ok(paint)
    }
}

impl TextMeasurer for CpuSurface {
    fn measure_text(&mut self, text: &str, font: &FontSpec) -> f64 {
        match self.text.as_mut() {
            Some(shaper) => match shaper.layout(text, font, Color::BLACK) {
                Ok(layout) => f64::from(layout.width()),
                Err(err) => {
                    tracing::warn!(error = %err, "text shaping failed, estimating width");
                    estimate_width(text, font)
                }
            },
            None => estimate_width(text, font),
        }
    }
}

impl Surface for CpuSurface {
    fn canvas(&self) -> Canvas {
        Canvas {
            width: u32::from(self.width),
            height: u32::from(self.height),
        }
    }

    fn clear(&mut self) {
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        clear_pixmap(&mut self.pixmap, [0, 0, 0, 0]);
        self.transform = Affine::IDENTITY;
        self.opacity_depth = 0;
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn push_opacity(&mut self, opacity: f32) {
        self.ctx.push_opacity_layer(opacity.clamp(0.0, 1.0));
        self.opacity_depth += 1;
    }

    fn pop_opacity(&mut self) {
        if self.opacity_depth > 0 {
            self.ctx.pop_layer();
            self.opacity_depth -= 1;
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(self.transform));
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_rect(&rect_to_cpu(rect));
    }

    fn draw_image(&mut self, image: &Bitmap, dest: Rect) {
        if image.width == 0 || image.height == 0 || dest.width() <= 0.0 || dest.height() <= 0.0 {
            return;
        }
        let paint = match self.image_paint_for(image) {
            Ok(paint) => paint,
            Err(err) => {
                tracing::warn!(error = %err, "skipping image that cannot be uploaded");
                return;
            }
        };

        let (w, h) = (f64::from(image.width), f64::from(image.height));
        let placement = Affine::translate((dest.x0, dest.y0))
            * Affine::scale_non_uniform(dest.width() / w, dest.height() / h);

        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_transform(affine_to_cpu(self.transform * placement));
        self.ctx.set_paint(paint);
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
    }

    fn fill_text(&mut self, text: &str, font: &FontSpec, origin: Point, color: Color) {
        if text.is_empty() {
            return;
        }
        let Some(shaper) = self.text.as_mut() else {
            if !self.warned_missing_fonts {
                tracing::warn!("no fonts available, text is not drawn");
                self.warned_missing_fonts = true;
            }
            return;
        };

        let layout = match shaper.layout(text, font, color) {
            Ok(layout) => layout,
            Err(err) => {
                tracing::warn!(error = %err, "text shaping failed, line skipped");
                return;
            }
        };
        let face = shaper.face(font.weight).data.clone();

        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(
            self.transform * Affine::translate((origin.x, origin.y)),
        ));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&face)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }

    fn snapshot(&mut self) -> SlideReelResult<FrameRGBA> {
        while self.opacity_depth > 0 {
            self.pop_opacity();
        }
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        Ok(FrameRGBA {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

/// Builds [`CpuSurface`]s sharing one loaded [`FontSet`].
#[derive(Clone, Debug, Default)]
pub struct CpuSurfaceProvider {
    fonts: Option<Arc<FontSet>>,
}

impl CpuSurfaceProvider {
    /// Provider handing `fonts` to every surface it creates.
    pub fn new(fonts: Option<FontSet>) -> Self {
        if fonts.is_none() {
            tracing::warn!("no fonts configured or found, slides will render without text");
        }
        Self {
            fonts: fonts.map(Arc::new),
        }
    }
}

impl SurfaceProvider for CpuSurfaceProvider {
    fn create_surface(&self, canvas: Canvas) -> SlideReelResult<Box<dyn Surface>> {
        Ok(Box::new(CpuSurface::new(canvas, self.fonts.clone())?))
    }
}

/// Stateful helper for building Parley single-line layouts from the loaded faces.
struct TextShaper {
    fonts: Arc<FontSet>,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Color>,
    regular_family: Option<String>,
    bold_family: Option<String>,
}

impl TextShaper {
    fn new(fonts: Arc<FontSet>) -> Self {
        let mut font_ctx = parley::FontContext::default();
        let regular_family = register_face(&mut font_ctx, &fonts.regular);
        let bold_family = fonts
            .bold
            .as_ref()
            .and_then(|face| register_face(&mut font_ctx, face));

        Self {
            fonts,
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            regular_family,
            bold_family,
        }
    }

    fn face(&self, weight: FontWeight) -> &FontFace {
        match (weight, self.fonts.bold.as_ref()) {
            (FontWeight::Bold, Some(bold)) => bold,
            _ => &self.fonts.regular,
        }
    }

    fn layout(
        &mut self,
        text: &str,
        font: &FontSpec,
        brush: Color,
    ) -> SlideReelResult<parley::Layout<Color>> {
        if !font.size_px.is_finite() || font.size_px <= 0.0 {
            return Err(SlideReelError::validation(
                "font size_px must be finite and > 0",
            ));
        }

        let family = match font.weight {
            FontWeight::Bold => self.bold_family.as_ref().or(self.regular_family.as_ref()),
            FontWeight::Regular => self.regular_family.as_ref(),
        }
        .ok_or_else(|| SlideReelError::resource("no font family registered"))?
        .clone();
        let weight = match font.weight {
            FontWeight::Bold => parley::style::FontWeight::BOLD,
            FontWeight::Regular => parley::style::FontWeight::NORMAL,
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(font.size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(weight));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<Color> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

fn register_face(font_ctx: &mut parley::FontContext, face: &FontFace) -> Option<String> {
    let families = font_ctx
        .collection
        .register_fonts(register_blob(face), None);
    let (family_id, _) = families.first()?;
    font_ctx
        .collection
        .family_name(*family_id)
        .map(str::to_owned)
}

fn estimate_width(text: &str, font: &FontSpec) -> f64 {
    let advance = match font.weight {
        FontWeight::Regular => FALLBACK_ADVANCE_REGULAR,
        FontWeight::Bold => FALLBACK_ADVANCE_BOLD,
    };
    text.chars().count() as f64 * f64::from(font.size_px) * advance
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> SlideReelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| SlideReelError::resource("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| SlideReelError::resource("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(SlideReelError::resource("bitmap byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(w: u32, h: u32) -> CpuSurface {
        CpuSurface::new(
            Canvas {
                width: w,
                height: h,
            },
            None,
        )
        .unwrap()
    }

    fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        [
            frame.data[i],
            frame.data[i + 1],
            frame.data[i + 2],
            frame.data[i + 3],
        ]
    }

    #[test]
    fn rejects_degenerate_canvas() {
        assert!(matches!(
            CpuSurface::new(Canvas { width: 0, height: 4 }, None),
            Err(SlideReelError::Resource(_))
        ));
        assert!(
            CpuSurface::new(
                Canvas {
                    width: 70_000,
                    height: 4
                },
                None
            )
            .is_err()
        );
    }

    #[test]
    fn fill_rect_covers_only_its_area() {
        let mut s = surface(8, 8);
        s.clear();
        s.fill_rect(Rect::new(0.0, 0.0, 4.0, 8.0), Color::rgb(255, 0, 0));
        let frame = s.snapshot().unwrap();
        assert_eq!(frame.data.len(), 8 * 8 * 4);
        assert!(frame.premultiplied);
        assert_eq!(pixel(&frame, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 6, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn transform_moves_fills() {
        let mut s = surface(8, 8);
        s.clear();
        s.set_transform(Affine::translate((4.0, 0.0)));
        s.fill_rect(Rect::new(0.0, 0.0, 4.0, 8.0), Color::rgb(0, 255, 0));
        let frame = s.snapshot().unwrap();
        assert_eq!(pixel(&frame, 1, 1), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 6, 1), [0, 255, 0, 255]);
    }

    #[test]
    fn clear_discards_previous_content() {
        let mut s = surface(4, 4);
        s.clear();
        s.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::rgb(9, 9, 9));
        s.snapshot().unwrap();
        s.clear();
        let frame = s.snapshot().unwrap();
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn draw_image_scales_into_destination() {
        let bitmap = Bitmap::from_premul_rgba8(1, 1, vec![0, 0, 255, 255]).unwrap();
        let mut s = surface(8, 8);
        s.clear();
        s.draw_image(&bitmap, Rect::new(0.0, 0.0, 8.0, 8.0));
        let frame = s.snapshot().unwrap();
        assert_eq!(pixel(&frame, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&frame, 7, 7), [0, 0, 255, 255]);
    }

    #[test]
    fn missing_fonts_estimate_width_and_skip_text() {
        let mut s = surface(16, 16);
        let w = s.measure_text("abcd", &FontSpec::regular(10.0));
        assert!((w - 22.0).abs() < 1e-9);
        assert!(s.measure_text("abcd", &FontSpec::bold(10.0)) > w);

        s.clear();
        s.fill_text("abcd", &FontSpec::regular(10.0), Point::ZERO, Color::rgb(255, 255, 255));
        let frame = s.snapshot().unwrap();
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn unbalanced_pop_is_ignored() {
        let mut s = surface(4, 4);
        s.clear();
        s.pop_opacity();
        s.push_opacity(0.5);
        s.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::rgb(255, 255, 255));
        let frame = s.snapshot().unwrap();
        let a = pixel(&frame, 2, 2)[3];
        assert!((126..=129).contains(&a), "alpha was {a}");
    }
}
