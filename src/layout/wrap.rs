//! Greedy word wrap against a measured pixel width.

use serde::{Deserialize, Serialize};

/// Weight of the face text is set in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular face (subtitles).
    #[default]
    Regular,
    /// Bold face (titles).
    Bold,
}

/// Font selection for one run of text.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Font size in pixels.
    pub size_px: f32,
    /// Face weight.
    pub weight: FontWeight,
}

impl FontSpec {
    /// Regular weight at `size_px`.
    pub fn regular(size_px: f32) -> Self {
        Self {
            size_px,
            weight: FontWeight::Regular,
        }
    }

    /// Bold weight at `size_px`.
    pub fn bold(size_px: f32) -> Self {
        Self {
            size_px,
            weight: FontWeight::Bold,
        }
    }
}

/// Width measurement capability supplied by a rendering surface.
pub trait TextMeasurer {
    /// Advance width of `text` set in `font`, in pixels.
    fn measure_text(&mut self, text: &str, font: &FontSpec) -> f64;
}

/// One committed line with the vertical position it was placed at.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    /// Line content, words joined by single spaces.
    pub text: String,
    /// Left edge of the line.
    pub x: f64,
    /// Top of the line box.
    pub y: f64,
}

/// Output of [`wrap_text`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WrappedText {
    /// Committed lines, top to bottom.
    pub lines: Vec<PlacedLine>,
    /// Vertical cursor after the last line (one `line_height` below it).
    pub next_y: f64,
}

/// Parameters for [`wrap_text`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WrapBox {
    /// Left edge of every line.
    pub x: f64,
    /// Top of the first line.
    pub y: f64,
    /// Width a line may grow to before wrapping.
    pub max_width: f64,
    /// Vertical advance per line.
    pub line_height: f64,
}

/// Greedily wrap `text` into lines no wider than `max_width` where possible.
///
/// Words are split on whitespace and never broken: a single word wider than the box sits alone on
/// its own (overflowing) line. An empty string commits no lines, but the cursor still advances by
/// one `line_height`.
pub fn wrap_text(
    measurer: &mut dyn TextMeasurer,
    text: &str,
    font: &FontSpec,
    bx: WrapBox,
) -> WrappedText {
    let mut lines = Vec::new();
    let mut y = bx.y;
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_owned()
        } else {
            format!("{line} {word}")
        };

        if !line.is_empty() && measurer.measure_text(&candidate, font) > bx.max_width {
            lines.push(PlacedLine {
                text: std::mem::take(&mut line),
                x: bx.x,
                y,
            });
            y += bx.line_height;
            line.push_str(word);
        } else {
            line = candidate;
        }
    }

    if !line.is_empty() {
        lines.push(PlacedLine { text: line, x: bx.x, y });
    }

    WrappedText {
        lines,
        next_y: y + bx.line_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is `advance` pixels wide.
    struct CharWidth {
        advance: f64,
    }

    impl TextMeasurer for CharWidth {
        fn measure_text(&mut self, text: &str, _font: &FontSpec) -> f64 {
            text.chars().count() as f64 * self.advance
        }
    }

    fn measurer() -> CharWidth {
        CharWidth { advance: 10.0 }
    }

    fn bx(max_width: f64) -> WrapBox {
        WrapBox {
            x: 5.0,
            y: 100.0,
            max_width,
            line_height: 20.0,
        }
    }

    #[test]
    fn empty_string_commits_nothing_but_advances_cursor() {
        let out = wrap_text(&mut measurer(), "", &FontSpec::regular(16.0), bx(100.0));
        assert!(out.lines.is_empty());
        assert_eq!(out.next_y, 120.0);

        let blank = wrap_text(&mut measurer(), "   \t ", &FontSpec::regular(16.0), bx(100.0));
        assert!(blank.lines.is_empty());
    }

    #[test]
    fn short_text_fits_one_line() {
        let out = wrap_text(&mut measurer(), "hi there", &FontSpec::regular(16.0), bx(100.0));
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.lines[0].text, "hi there");
        assert_eq!((out.lines[0].x, out.lines[0].y), (5.0, 100.0));
        assert_eq!(out.next_y, 120.0);
    }

    #[test]
    fn words_wider_than_half_the_box_get_one_line_each() {
        // 6 chars * 10px = 60px > 100/2.
        let text = "alpha1 bravo2 charl3 delta4";
        let out = wrap_text(&mut measurer(), text, &FontSpec::bold(16.0), bx(100.0));
        let texts: Vec<&str> = out.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha1", "bravo2", "charl3", "delta4"]);
        let ys: Vec<f64> = out.lines.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![100.0, 120.0, 140.0, 160.0]);
        assert_eq!(out.next_y, 180.0);
    }

    #[test]
    fn oversized_word_is_not_broken() {
        let out = wrap_text(
            &mut measurer(),
            "a supercalifragilistic b",
            &FontSpec::regular(16.0),
            bx(50.0),
        );
        let texts: Vec<&str> = out.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn greedy_fill_packs_words_until_overflow() {
        // "aa bb cc" = 80px fits, "aa bb cc dd" = 110px does not.
        let out = wrap_text(
            &mut measurer(),
            "aa bb cc dd ee",
            &FontSpec::regular(16.0),
            bx(100.0),
        );
        let texts: Vec<&str> = out.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["aa bb cc", "dd ee"]);
    }

    #[test]
    fn collapses_runs_of_whitespace() {
        let out = wrap_text(
            &mut measurer(),
            "  one \n two  ",
            &FontSpec::regular(16.0),
            bx(1000.0),
        );
        assert_eq!(out.lines.len(), 1);
        assert_eq!(out.lines[0].text, "one two");
    }
}
