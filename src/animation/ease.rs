/// Clamp an animation progress value into `[0, 1]`. `NaN` maps to the settled state.
pub fn clamp_progress(t: f64) -> f64 {
    if t.is_nan() { 1.0 } else { t.clamp(0.0, 1.0) }
}

/// Cubic ease-in-out: `4t³` below `0.5`, `1 - (-2t + 2)³ / 2` above. Input is clamped first.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = clamp_progress(t);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
    }
}
