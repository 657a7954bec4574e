use crate::foundation::core::Fps;
use crate::foundation::error::{SlideReelError, SlideReelResult};
use crate::slide::Slide;

/// Frame counts for one export run, computed once before rendering starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePlan {
    /// Frames per slide, in slide order.
    pub per_slide: Vec<u64>,
    /// Sum of `per_slide`; the progress denominator.
    pub total: u64,
}

/// Frame count of every slide at `fps` and their total.
///
/// Fails with a validation error when the total does not fit in a `u64`.
pub fn plan_frames(slides: &[Slide], fps: Fps) -> SlideReelResult<FramePlan> {
    let per_slide: Vec<u64> = slides.iter().map(|s| s.frame_count(fps)).collect();
    let total = per_slide
        .iter()
        .try_fold(0u64, |acc, &n| acc.checked_add(n))
        .ok_or_else(|| SlideReelError::validation("total frame count overflows"))?;
    Ok(FramePlan { per_slide, total })
}

/// Animation progress of frame `index` out of `count`: `0` on the first frame, `1` on the last.
///
/// Single-frame slides render their settled state.
pub fn frame_progress(index: u64, count: u64) -> f64 {
    if count <= 1 {
        return 1.0;
    }
    index as f64 / (count - 1) as f64
}
