//! Frame grid and per-frame features feeding the segmenter.
//!
//! The signal is framed at a 20 ms hop with a 40 ms window; each frame
//! contributes (envelope, envelope derivative, spectral flux, HF/LF band
//! ratio), column-normalized into [0, 1].

use ndarray::Array2;
use rustfft::FftPlanner;

use crate::kernels::{band_power, hann_window, mean, population_std, windowed_magnitudes};

/// Frame hop, in seconds.
pub const FRAME_HOP_S: f32 = 0.02;
/// Frame window, in seconds.
pub const FRAME_WIN_S: f32 = 0.04;
/// Low heart-sound band, Hz (closed-open).
pub const LF_BAND: (f32, f32) = (20., 150.);
/// High murmur-leaning band, Hz (closed).
pub const HF_BAND: (f32, f32) = (150., 400.);

/// Frame layout over a signal of `n` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGrid {
    pub hop: usize,
    pub win: usize,
    pub frames: usize,
}

impl FrameGrid {
    /// Grid for `n` samples at `sr` Hz; signals shorter than one window are
    /// zero-padded into a single frame.
    #[must_use]
    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn new(n: usize, sr: u32) -> Self {
        let hop = 1.max((FRAME_HOP_S * sr as f32).round() as usize);
        let win = hop.max((FRAME_WIN_S * sr as f32).round() as usize);
        let frames = if n < win { 1 } else { 1 + (n - win) / hop };
        Self { hop, win, frames }
    }

    /// Frames per second.
    #[must_use]
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_rate(&self, sr: u32) -> f32 {
        sr as f32 / self.hop as f32
    }
}

/// Per-frame feature set: a frames x 4 normalized matrix plus the raw
/// series the SQI block reports on.
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    pub grid: FrameGrid,
    /// Columns: env, d_env, flux, hf_ratio, z-scored / clipped / remapped.
    pub matrix: Array2<f32>,
    /// Envelope sampled at frame centers, before normalization.
    pub raw_env: Vec<f32>,
    /// HF/LF band ratio per frame, before normalization.
    pub raw_hf_ratio: Vec<f32>,
}

/// Extract frame features from a signal and its precomputed envelope.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn extract(y: &[f32], env: &[f32], sr: u32) -> FrameFeatures {
    let grid = FrameGrid::new(y.len(), sr);
    let padded;
    let y = if y.len() < grid.win {
        let mut p = y.to_vec();
        p.resize(grid.win, 0.);
        padded = p;
        &padded[..]
    } else {
        y
    };

    let window = hann_window(grid.win);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(grid.win);

    let mut flux = Vec::with_capacity(grid.frames);
    let mut hf_ratio = Vec::with_capacity(grid.frames);
    let mut prev_mags: Option<Vec<f32>> = None;
    for i in 0..grid.frames {
        let start = i * grid.hop;
        let mags = windowed_magnitudes(&y[start..start + grid.win], &window, fft.as_ref());

        let fl = match &prev_mags {
            Some(prev) => prev
                .iter()
                .zip(&mags)
                .map(|(&a, &b)| f64::from(b - a) * f64::from(b - a))
                .sum::<f64>()
                .sqrt(),
            None => 0.,
        };
        #[allow(clippy::cast_possible_truncation)]
        flux.push(fl as f32);

        let lo = band_power(&mags, sr, grid.win, LF_BAND.0, LF_BAND.1, false) + 1e-9;
        let hi = band_power(&mags, sr, grid.win, HF_BAND.0, HF_BAND.1, true) + 1e-9;
        #[allow(clippy::cast_possible_truncation)]
        hf_ratio.push((hi / lo) as f32);

        prev_mags = Some(mags);
    }

    // envelope at frame centers, first-difference derivative
    let raw_env: Vec<f32> = (0..grid.frames)
        .map(|i| {
            let center = (i * grid.hop + grid.win / 2).min(env.len().saturating_sub(1));
            env.get(center).copied().unwrap_or(0.)
        })
        .collect();
    let d_env: Vec<f32> = (0..grid.frames)
        .map(|i| if i == 0 { 0. } else { raw_env[i] - raw_env[i - 1] })
        .collect();

    let mut matrix = Array2::zeros((grid.frames, 4));
    for (col, series) in [&raw_env, &d_env, &flux, &hf_ratio].into_iter().enumerate() {
        let normalized = normalize_column(series);
        for (row, v) in normalized.into_iter().enumerate() {
            matrix[[row, col]] = v;
        }
    }

    FrameFeatures {
        grid,
        matrix,
        raw_env,
        raw_hf_ratio: hf_ratio,
    }
}

/// Z-score, clip to [-3, 3], remap affinely to [0, 1].
fn normalize_column(series: &[f32]) -> Vec<f32> {
    let mu = mean(series);
    let sd = population_std(series) + 1e-6;
    series
        .iter()
        .map(|&v| (((v - mu) / sd).clamp(-3., 3.) + 3.) / 6.)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_frame_count() {
        // 2 kHz: hop 40, win 80
        let grid = FrameGrid::new(4000, 2000);
        assert_eq!(grid.hop, 40);
        assert_eq!(grid.win, 80);
        assert_eq!(grid.frames, 1 + (4000 - 80) / 40);
    }

    #[test]
    fn test_grid_zero_pads_short_signals() {
        let grid = FrameGrid::new(10, 2000);
        assert_eq!(grid.frames, 1);
        let y = vec![0.5f32; 10];
        let env = vec![0.5f32; 10];
        let feats = extract(&y, &env, 2000);
        assert_eq!(feats.matrix.nrows(), 1);
    }

    #[test]
    fn test_features_are_unit_interval() {
        let sr = 2000u32;
        let y: Vec<f32> = (0..8000)
            .map(|i| f32::sin(2. * std::f32::consts::PI * 120. * i as f32 / sr as f32))
            .collect();
        let env = crate::envelope::smoothed_abs(&y, sr);
        let feats = extract(&y, &env, sr);
        assert_eq!(feats.matrix.ncols(), 4);
        assert!(feats.matrix.iter().all(|&v| (0. ..=1.).contains(&v)));
        assert_eq!(feats.raw_env.len(), feats.grid.frames);
        assert_eq!(feats.raw_hf_ratio.len(), feats.grid.frames);
    }

    #[test]
    fn test_flux_starts_at_minimum() {
        let sr = 2000u32;
        let y: Vec<f32> = (0..4000).map(|i| (i % 7) as f32 / 7. - 0.5).collect();
        let env = crate::envelope::smoothed_abs(&y, sr);
        let feats = extract(&y, &env, sr);
        // first frame has zero flux by construction; after normalization it
        // cannot exceed any later frame by more than the clip range
        let first = feats.matrix[[0, 2]];
        assert!((0. ..=1.).contains(&first));
    }

    #[test]
    fn test_hf_ratio_tracks_band() {
        let sr = 2000u32;
        let low: Vec<f32> = (0..4000)
            .map(|i| f32::sin(2. * std::f32::consts::PI * 60. * i as f32 / sr as f32))
            .collect();
        let high: Vec<f32> = (0..4000)
            .map(|i| f32::sin(2. * std::f32::consts::PI * 300. * i as f32 / sr as f32))
            .collect();
        let grid = FrameGrid::new(4000, sr);
        let window = hann_window(grid.win);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(grid.win);
        let ratio = |y: &[f32]| {
            let mags = windowed_magnitudes(&y[..grid.win], &window, fft.as_ref());
            let lo = band_power(&mags, sr, grid.win, LF_BAND.0, LF_BAND.1, false) + 1e-9;
            let hi = band_power(&mags, sr, grid.win, HF_BAND.0, HF_BAND.1, true) + 1e-9;
            hi / lo
        };
        assert!(ratio(&high) > 10. * ratio(&low));
    }
}
