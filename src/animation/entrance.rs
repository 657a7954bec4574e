use crate::animation::ease::ease_in_out_cubic;
use crate::config::LayoutConfig;
use crate::foundation::core::Canvas;

/// Settle-and-fade entrance of the text block at one progress value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entrance {
    /// Eased progress in `[0, 1]`.
    pub eased: f64,
    /// Downward translation of the block in pixels; `0` once settled.
    pub offset_y: f64,
    /// Block opacity, rising from `entrance_start_opacity` to `1`.
    pub opacity: f64,
}

impl Entrance {
    /// Entrance state at raw progress `t`; out-of-range values are clamped before easing.
    pub fn at(t: f64, canvas: Canvas, layout: &LayoutConfig) -> Self {
        let eased = ease_in_out_cubic(t);
        let start = layout.entrance_start_opacity.clamp(0.0, 1.0);
        Self {
            eased,
            offset_y: (1.0 - eased) * layout.entrance_offset * canvas.height_f64(),
            opacity: start + (1.0 - start) * eased,
        }
    }
}
