use slidereel::{
    Affine, Alignment, Bitmap, Canvas, Color, CpuSurface, FontSpec, FrameRGBA, LayoutConfig,
    Point, Rect, Slide, SlideReelResult, Surface, TextMeasurer, create_default_slide,
    render_frame,
};

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Clear,
    Transform(Affine),
    PushOpacity(f32),
    PopOpacity,
    Fill(Rect, Color),
    Image(Rect),
    Text(String, FontSpec, Point),
}

/// Surface that records draw calls; text is 10px per char at any size.
struct RecordingSurface {
    canvas: Canvas,
    ops: Vec<Op>,
}

impl RecordingSurface {
    fn new() -> Self {
        Self {
            canvas: Canvas::PORTRAIT_720P,
            ops: Vec::new(),
        }
    }

    fn fills(&self) -> Vec<(Rect, Color)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Fill(r, c) => Some((*r, *c)),
                _ => None,
            })
            .collect()
    }

    fn texts(&self) -> Vec<(String, Point)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(s, _, p) => Some((s.clone(), *p)),
                _ => None,
            })
            .collect()
    }
}

impl TextMeasurer for RecordingSurface {
    fn measure_text(&mut self, text: &str, _font: &FontSpec) -> f64 {
        text.chars().count() as f64 * 10.0
    }
}

impl Surface for RecordingSurface {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.ops.push(Op::Clear);
    }

    fn set_transform(&mut self, transform: Affine) {
        self.ops.push(Op::Transform(transform));
    }

    fn push_opacity(&mut self, opacity: f32) {
        self.ops.push(Op::PushOpacity(opacity));
    }

    fn pop_opacity(&mut self) {
        self.ops.push(Op::PopOpacity);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(Op::Fill(rect, color));
    }

    fn draw_image(&mut self, _image: &Bitmap, dest: Rect) {
        self.ops.push(Op::Image(dest));
    }

    fn fill_text(&mut self, text: &str, font: &FontSpec, origin: Point, _color: Color) {
        self.ops.push(Op::Text(text.to_owned(), *font, origin));
    }

    fn snapshot(&mut self) -> SlideReelResult<FrameRGBA> {
        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: Vec::new(),
            premultiplied: true,
        })
    }
}

fn bitmap(width: u32, height: u32) -> Bitmap {
    Bitmap::from_premul_rgba8(width, height, vec![255; (width * height * 4) as usize]).unwrap()
}

#[test]
fn draws_layers_in_order() {
    let mut surface = RecordingSurface::new();
    let slide = create_default_slide();
    render_frame(&mut surface, &LayoutConfig::default(), &slide, None, 1.0);

    assert_eq!(surface.ops[0], Op::Clear);
    let first_fill = surface
        .ops
        .iter()
        .position(|op| matches!(op, Op::Fill(..)))
        .unwrap();
    assert_eq!(
        surface.ops[first_fill],
        Op::Fill(Canvas::PORTRAIT_720P.rect(), slide.background_color)
    );

    let push = surface
        .ops
        .iter()
        .position(|op| matches!(op, Op::PushOpacity(_)))
        .unwrap();
    let pop = surface
        .ops
        .iter()
        .rposition(|op| matches!(op, Op::PopOpacity))
        .unwrap();
    let first_text = surface
        .ops
        .iter()
        .position(|op| matches!(op, Op::Text(..)))
        .unwrap();
    assert!(push < first_text && first_text < pop);
    assert_eq!(surface.ops.last(), Some(&Op::Transform(Affine::IDENTITY)));
    assert!(!surface.ops.iter().any(|op| matches!(op, Op::Image(_))));
}

#[test]
fn image_gets_cover_placement_and_scrim() {
    let mut surface = RecordingSurface::new();
    let slide = create_default_slide();
    render_frame(
        &mut surface,
        &LayoutConfig::default(),
        &slide,
        Some(&bitmap(100, 100)),
        1.0,
    );

    let dest = surface
        .ops
        .iter()
        .find_map(|op| match op {
            Op::Image(r) => Some(*r),
            _ => None,
        })
        .unwrap();
    // Square image on a 9:16 canvas is scaled to the full height and centered.
    assert!((dest.height() - 1280.0).abs() < 1e-9);
    assert!((dest.width() - 1280.0).abs() < 1e-9);
    assert!((dest.x0 + 280.0).abs() < 1e-9);

    let fills = surface.fills();
    assert_eq!(fills[1].0, Canvas::PORTRAIT_720P.rect());
    assert_eq!(fills[1].1, Color::BLACK.with_opacity(0.35));
}

#[test]
fn settled_accent_spans_configured_width() {
    let mut surface = RecordingSurface::new();
    let slide = create_default_slide();
    render_frame(&mut surface, &LayoutConfig::default(), &slide, None, 1.0);

    let accent = surface
        .fills()
        .into_iter()
        .find(|(_, c)| *c == slide.accent_color)
        .unwrap()
        .0;
    assert!((accent.width() - 0.28 * 720.0).abs() < 1e-9);
    assert!((accent.x0 - 0.075 * 720.0).abs() < 1e-9);
    assert!(surface.ops.contains(&Op::PushOpacity(1.0)));
    assert!(surface.ops.contains(&Op::Transform(Affine::translate((0.0, 0.0)))));
}

#[test]
fn first_frame_has_no_accent_and_offset_text() {
    let mut surface = RecordingSurface::new();
    let slide = create_default_slide();
    render_frame(&mut surface, &LayoutConfig::default(), &slide, None, 0.0);

    assert!(
        !surface
            .fills()
            .iter()
            .any(|(_, c)| *c == slide.accent_color)
    );
    assert!(surface.ops.contains(&Op::PushOpacity(0.8)));
    let Some(Op::Transform(offset)) = surface
        .ops
        .iter()
        .find(|op| matches!(op, Op::Transform(a) if *a != Affine::IDENTITY))
    else {
        panic!("expected entrance transform");
    };
    assert!((offset.translation().y - 60.0).abs() < 1e-9);
}

#[test]
fn progress_outside_unit_range_is_clamped() {
    let layout = LayoutConfig::default();
    let slide = create_default_slide();
    for (outside, inside) in [(-3.0, 0.0), (7.5, 1.0), (f64::INFINITY, 1.0)] {
        let mut a = RecordingSurface::new();
        let mut b = RecordingSurface::new();
        render_frame(&mut a, &layout, &slide, None, outside);
        render_frame(&mut b, &layout, &slide, None, inside);
        assert_eq!(a.ops, b.ops, "t = {outside}");
    }
}

#[test]
fn long_words_wrap_one_per_line() {
    let slide = Slide {
        // Each word is wider than half of the 612px text box at 10px per char.
        title: "abcdefghijklmnopqrstuvwxyzabcdefgh abcdefghijklmnopqrstuvwxyzabcdefgh abcdefghijklmnopqrstuvwxyzabcdefgh".into(),
        subtitle: String::new(),
        ..create_default_slide()
    };
    let mut surface = RecordingSurface::new();
    render_frame(&mut surface, &LayoutConfig::default(), &slide, None, 1.0);

    let texts = surface.texts();
    assert_eq!(texts.len(), 3);
    assert!(texts.windows(2).all(|w| w[0].1.y < w[1].1.y));
    assert!(texts.iter().all(|(s, _)| !s.contains(' ')));
}

#[test]
fn empty_text_and_alignment_degrade_gracefully() {
    let layout = LayoutConfig::default();
    let mut ys = Vec::new();
    for alignment in [Alignment::Top, Alignment::Center, Alignment::Bottom] {
        let slide = Slide {
            title: String::new(),
            subtitle: "   ".into(),
            alignment,
            ..create_default_slide()
        };
        let mut surface = RecordingSurface::new();
        render_frame(&mut surface, &layout, &slide, None, 1.0);
        assert!(surface.texts().is_empty());
        let accent = surface
            .fills()
            .into_iter()
            .find(|(_, c)| *c == slide.accent_color)
            .unwrap()
            .0;
        ys.push(accent.y0);
    }
    assert!(ys[0] < ys[1] && ys[1] < ys[2]);
}

#[test]
fn zero_sized_image_is_skipped() {
    let mut surface = RecordingSurface::new();
    let empty = Bitmap::from_premul_rgba8(0, 0, Vec::new()).unwrap();
    render_frame(
        &mut surface,
        &LayoutConfig::default(),
        &create_default_slide(),
        Some(&empty),
        0.5,
    );
    assert!(!surface.ops.iter().any(|op| matches!(op, Op::Image(_))));
    assert_eq!(surface.fills().len(), 2);
}

#[test]
fn cpu_frames_are_pixel_identical_for_identical_input() {
    let canvas = Canvas {
        width: 90,
        height: 160,
    };
    let slide = Slide {
        background_color: Color::rgb(20, 40, 60),
        ..create_default_slide()
    };
    let image = bitmap(4, 4);
    let layout = LayoutConfig::default();

    let mut surface = CpuSurface::new(canvas, None).unwrap();
    render_frame(&mut surface, &layout, &slide, Some(&image), 0.4);
    let first = surface.snapshot().unwrap();

    // Something different in between must not leak into the next frame.
    render_frame(&mut surface, &layout, &create_default_slide(), None, 1.0);
    surface.snapshot().unwrap();

    render_frame(&mut surface, &layout, &slide, Some(&image), 0.4);
    let second = surface.snapshot().unwrap();
    assert_eq!(first, second);

    let mut fresh = CpuSurface::new(canvas, None).unwrap();
    render_frame(&mut fresh, &layout, &slide, Some(&image), 0.4);
    assert_eq!(fresh.snapshot().unwrap(), first);
    assert_eq!(first.data.len(), 90 * 160 * 4);
}
