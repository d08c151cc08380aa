//! Viridis colour map sampled at nine anchors and linearly interpolated.

use plotters::style::RGBColor;

const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

/// Colour for `t` in `[0, 1]`; values outside are clamped, NaN maps to the low end.
pub fn viridis(t: f32) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f32;
    let (r0, g0, b0) = VIRIDIS[lower];
    let (r1, g1, b1) = VIRIDIS[lower + 1];
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

/// Relative luminance in `[0, 1]`, used to pick readable annotation text.
pub fn luminance(color: &RGBColor) -> f32 {
    (0.2126 * color.0 as f32 + 0.7152 * color.1 as f32 + 0.0722 * color.2 as f32) / 255.0
}

/// Map `value` into `[0, 1]` given the colour scale limits.
pub fn normalize(value: f32, min: f32, max: f32) -> f32 {
    let span = max - min;
    if span <= f32::EPSILON {
        // flat matrix: draw it mid-scale
        0.5
    } else {
        ((value - min) / span).clamp(0.0, 1.0)
    }
}
