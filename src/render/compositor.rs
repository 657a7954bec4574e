//! Frame compositor: background, optional image with scrim, accent bar, title, subtitle.
//!
//! [`render_frame`] is a pure function of `(slide, image, t)`; it clears the surface first and
//! never reads back what an earlier frame left behind.

use crate::animation::entrance::Entrance;
use crate::assets::decode::Bitmap;
use crate::config::LayoutConfig;
use crate::foundation::color::Color;
use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::layout::wrap::{FontSpec, TextMeasurer, WrapBox, WrappedText, wrap_text};
use crate::render::backend::Surface;
use crate::slide::{Alignment, Slide};

/// Resolved geometry of the animated text block for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideLayout {
    /// Entrance state the block is drawn with.
    pub entrance: Entrance,
    /// Vertical anchor of the block before the entrance offset is applied.
    pub base_y: f64,
    /// Accent bar, before the entrance transform.
    pub accent: Rect,
    /// Title font.
    pub title_font: FontSpec,
    /// Wrapped title lines.
    pub title: WrappedText,
    /// Subtitle font.
    pub subtitle_font: FontSpec,
    /// Wrapped subtitle lines, placed below the title.
    pub subtitle: WrappedText,
}

/// Vertical anchor of the text block for `alignment`.
pub fn anchor_y(alignment: Alignment, canvas: Canvas, layout: &LayoutConfig) -> f64 {
    let h = canvas.height_f64();
    match alignment {
        Alignment::Top => layout.top_padding * h,
        Alignment::Center => h * 0.5 - layout.center_offset * h,
        Alignment::Bottom => h - layout.bottom_padding * h - layout.bottom_text_reserve * h,
    }
}

/// Aspect-fill placement: scale the image until it covers the canvas, centered.
pub fn cover_rect(image_width: u32, image_height: u32, canvas: Canvas) -> Option<Rect> {
    if image_width == 0 || image_height == 0 {
        return None;
    }
    let (iw, ih) = (f64::from(image_width), f64::from(image_height));
    let (cw, ch) = (canvas.width_f64(), canvas.height_f64());
    let scale = (cw / iw).max(ch / ih);
    let (w, h) = (iw * scale, ih * scale);
    let x = (cw - w) / 2.0;
    let y = (ch - h) / 2.0;
    Some(Rect::new(x, y, x + w, y + h))
}

/// Lay out accent bar and text for `slide` at progress `t` (clamped to `[0, 1]`).
pub fn layout_slide(
    measurer: &mut dyn TextMeasurer,
    canvas: Canvas,
    layout: &LayoutConfig,
    slide: &Slide,
    t: f64,
) -> SlideLayout {
    let (w, h) = (canvas.width_f64(), canvas.height_f64());
    let entrance = Entrance::at(t, canvas, layout);
    let base_y = anchor_y(slide.alignment, canvas, layout);
    let margin = layout.margin_x * w;
    let max_width = (w - 2.0 * margin).max(0.0);

    let accent_height = layout.accent_height * h;
    let accent = Rect::new(
        margin,
        base_y,
        margin + layout.accent_width * w * entrance.eased,
        base_y + accent_height,
    );

    let title_font = FontSpec::bold((layout.title_size * h) as f32);
    let title = wrap_text(
        measurer,
        &slide.title,
        &title_font,
        WrapBox {
            x: margin,
            y: base_y + accent_height + layout.accent_title_gap * h,
            max_width,
            line_height: f64::from(title_font.size_px) * layout.title_line_height,
        },
    );

    let subtitle_font = FontSpec::regular((layout.subtitle_size * h) as f32);
    let subtitle = wrap_text(
        measurer,
        &slide.subtitle,
        &subtitle_font,
        WrapBox {
            x: margin,
            y: title.next_y + layout.subtitle_gap * h,
            max_width,
            line_height: f64::from(subtitle_font.size_px) * layout.subtitle_line_height,
        },
    );

    SlideLayout {
        entrance,
        base_y,
        accent,
        title_font,
        title,
        subtitle_font,
        subtitle,
    }
}

/// Draw one complete frame of `slide` at progress `t`.
///
/// Missing images and empty text are simply left out; this never fails.
pub fn render_frame(
    surface: &mut dyn Surface,
    layout: &LayoutConfig,
    slide: &Slide,
    image: Option<&Bitmap>,
    t: f64,
) {
    let canvas = surface.canvas();
    surface.clear();
    surface.set_transform(Affine::IDENTITY);
    surface.fill_rect(canvas.rect(), slide.background_color);

    if let Some(image) = image
        && let Some(dest) = cover_rect(image.width, image.height, canvas)
    {
        surface.draw_image(image, dest);
        surface.fill_rect(
            canvas.rect(),
            Color::BLACK.with_opacity(layout.scrim_opacity),
        );
    }

    let block = layout_slide(&mut *surface, canvas, layout, slide, t);

    surface.set_transform(Affine::translate((0.0, block.entrance.offset_y)));
    surface.push_opacity(block.entrance.opacity as f32);

    if block.accent.width() > 0.0 {
        surface.fill_rect(block.accent, slide.accent_color);
    }
    for line in &block.title.lines {
        surface.fill_text(
            &line.text,
            &block.title_font,
            Point::new(line.x, line.y),
            slide.text_color,
        );
    }
    for line in &block.subtitle.lines {
        surface.fill_text(
            &line.text,
            &block.subtitle_font,
            Point::new(line.x, line.y),
            slide.text_color,
        );
    }

    surface.pop_opacity();
    surface.set_transform(Affine::IDENTITY);
}
