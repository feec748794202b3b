//! Amplitude envelopes: smoothed absolute value, Shannon energy,
//! Teager-Kaiser energy, and a smoothed RMS follower.

use crate::kernels::moving_average;
use crate::tuning::Tuning;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn smooth_window(sr: u32, seconds: f32) -> usize {
    1.max((seconds * sr as f32).round() as usize)
}

/// Moving-average-smoothed absolute envelope.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn smoothed_abs(x: &[f32], sr: u32) -> Vec<f32> {
    let rectified: Vec<f32> = x.iter().map(|v| v.abs()).collect();
    let win = smooth_window(sr, Tuning::ENVELOPE_SMOOTH_S);
    if win <= 1 {
        return rectified;
    }
    moving_average(&rectified, win)
}

/// Shannon energy envelope, `-x^2 * ln(x^2 + eps)`, smoothed like
/// [`smoothed_abs`]. Emphasizes mid-amplitude transients over both the noise
/// floor and dominant peaks.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn shannon(x: &[f32], sr: u32) -> Vec<f32> {
    let energy: Vec<f32> = x
        .iter()
        .map(|&v| {
            let e = v * v;
            -(e * (e + 1e-9).ln())
        })
        .collect();
    moving_average(&energy, smooth_window(sr, Tuning::ENVELOPE_SMOOTH_S))
}

/// Teager-Kaiser energy operator, `x[t]^2 - x[t-1] * x[t+1]`, clamped to be
/// non-negative, zero at the boundaries.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn tkeo(x: &[f32]) -> Vec<f32> {
    let n = x.len();
    if n < 3 {
        return vec![0.; n];
    }
    let mut out = vec![0f32; n];
    for t in 1..n - 1 {
        out[t] = x[t].mul_add(x[t], -(x[t - 1] * x[t + 1])).max(0.);
    }
    out
}

/// RMS follower: square-root of the moving-average power over `win_s`.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn smoothed_rms(x: &[f32], sr: u32, win_s: f32) -> Vec<f32> {
    let power: Vec<f32> = x.iter().map(|&v| v * v).collect();
    moving_average(&power, smooth_window(sr, win_s))
        .into_iter()
        .map(f32::sqrt)
        .collect()
}

/// Scale a series so its absolute maximum is ~1; all-zero input stays zero.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn normalize_peak(x: &[f32]) -> Vec<f32> {
    let peak = x.iter().fold(0f32, |acc, v| acc.max(v.abs()));
    x.iter().map(|&v| v / (peak + 1e-9)).collect()
}
