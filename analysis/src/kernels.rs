//! Shared numeric kernels: windows, spectra, moving averages, restricted-lag
//! autocorrelation, Welch band power, and a small windowed-sinc band-pass.
//!
//! Everything here is deterministic: argmax scans keep the first (lowest
//! index) maximum, and accumulations that matter run in f64.

use ndarray::arr1;
use ndarray_stats::Quantile1dExt;
use ndarray_stats::interpolate::Midpoint;
use noisy_float::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;

/// Periodic Hann window (the DFT-even form).
#[must_use]
#[inline]
pub fn hann_window(len: usize) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    (0..len)
        .map(|n| 0.5f32.mul_add(-f32::cos(2. * n as f32 * PI / (len as f32)), 0.5))
        .collect()
}

/// Magnitude spectrum (bins `0..=nfft/2`) of `frame * window`, zero-padded to
/// the planned FFT length.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn windowed_magnitudes(frame: &[f32], window: &[f32], fft: &dyn Fft<f32>) -> Vec<f32> {
    let nfft = fft.len();
    let mut buf: Vec<Complex<f32>> = frame
        .iter()
        .zip(window)
        .map(|(&x, &w)| Complex::new(x * w, 0.))
        .collect();
    buf.resize(nfft, Complex::new(0., 0.));
    fft.process(&mut buf);
    buf[..=nfft / 2].iter().map(|c| c.norm()).collect()
}

/// Frequency of FFT bin `i` for an `nfft`-point transform at `sr` Hz.
#[must_use]
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn bin_freq(i: usize, sr: u32, nfft: usize) -> f32 {
    i as f32 * sr as f32 / nfft as f32
}

/// Sum of squared magnitudes over `lo <= f < hi` (or `lo <= f <= hi` when
/// `hi_inclusive`).
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn band_power(mags: &[f32], sr: u32, nfft: usize, lo: f32, hi: f32, hi_inclusive: bool) -> f64 {
    mags.iter()
        .enumerate()
        .filter(|&(i, _)| {
            let f = bin_freq(i, sr, nfft);
            f >= lo && if hi_inclusive { f <= hi } else { f < hi }
        })
        .map(|(_, &m)| f64::from(m) * f64::from(m))
        .sum()
}

/// Centered moving average with zero-padded edges (`same`-length output).
///
/// The running sum is kept in f64 so long windows do not drift.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn moving_average(x: &[f32], win: usize) -> Vec<f32> {
    let n = x.len();
    if win <= 1 || n == 0 {
        return x.to_vec();
    }
    let mut cumsum = Vec::with_capacity(n + 1);
    cumsum.push(0f64);
    for &v in x {
        cumsum.push(cumsum[cumsum.len() - 1] + f64::from(v));
    }
    let center = (win - 1) / 2;
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    (0..n)
        .map(|t| {
            let hi = (t + center + 1).min(n);
            let lo = (t + center + 1).saturating_sub(win);
            ((cumsum[hi] - cumsum[lo]) / win as f64) as f32
        })
        .collect()
}

/// Raw (biased, unnormalized) autocorrelation at a single lag.
#[must_use]
#[inline]
pub fn autocorr_at(x: &[f32], lag: usize) -> f64 {
    if lag >= x.len() {
        return 0.;
    }
    x[..x.len() - lag]
        .iter()
        .zip(&x[lag..])
        .map(|(&a, &b)| f64::from(a) * f64::from(b))
        .sum()
}

/// Autocorrelation restricted to a lag window, avoiding the full quadratic
/// transform when only a narrow search band is needed.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn autocorr_range(x: &[f32], lags: std::ops::Range<usize>) -> Vec<f64> {
    lags.map(|lag| autocorr_at(x, lag)).collect()
}

/// Welch-style mean band power over Hann-windowed frames.
///
/// The window clamps to the segment length (one frame minimum) so short
/// detection windows still produce a usable estimate; segments under 64
/// samples score zero.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn welch_band_power(x: &[f32], sr: u32, lo: f32, hi: f32) -> f64 {
    let n = x.len();
    if n < 64 {
        return 0.;
    }
    let base = if n >= 2048 {
        1024
    } else {
        128.max(1usize << (n.ilog2() - 1))
    };
    let win = base.min(n);
    let hop = 32.max(win / 2);
    let window = hann_window(win);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(win);

    let mut total = 0f64;
    let mut frames = 0usize;
    let span = (n - win).max(1);
    let mut k = 0;
    while k < span {
        let mags = windowed_magnitudes(&x[k..k + win], &window, fft.as_ref());
        total += band_power(&mags, sr, win, lo, hi, false);
        frames += 1;
        k += hop;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        total / (frames as f64 + 1e-9)
    }
}

/// Windowed-sinc FIR band-pass, convolved `same`-length with zero padding.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn band_pass_fir(x: &[f32], sr: u32, lo: f32, hi: f32, taps: usize) -> Vec<f32> {
    let m = taps | 1; // odd tap count keeps the filter symmetric
    #[allow(clippy::cast_possible_wrap)]
    let mid = (m / 2) as isize;
    #[allow(clippy::cast_precision_loss)]
    let (fl, fh) = (lo / sr as f32, hi / sr as f32);

    let sinc_lp = |fc: f32, k: isize| -> f32 {
        if k == 0 {
            2. * fc
        } else {
            #[allow(clippy::cast_precision_loss)]
            let kf = k as f32;
            f32::sin(2. * PI * fc * kf) / (PI * kf)
        }
    };
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    let kernel: Vec<f32> = (0..m)
        .map(|n| {
            let k = n as isize - mid;
            let w = 0.5f32.mul_add(-f32::cos(2. * PI * n as f32 / (m - 1) as f32), 0.5);
            (sinc_lp(fh, k) - sinc_lp(fl, k)) * w
        })
        .collect();

    let n = x.len();
    let mut out = vec![0f32; n];
    #[allow(clippy::cast_possible_truncation, clippy::needless_range_loop)]
    for t in 0..n {
        let mut acc = 0f64;
        for (j, &h) in kernel.iter().enumerate() {
            #[allow(clippy::cast_possible_wrap)]
            let src = t as isize + mid - j as isize;
            if src >= 0 && (src as usize) < n {
                acc += f64::from(x[src as usize]) * f64::from(h);
            }
        }
        out[t] = acc as f32;
    }
    out
}

/// Least-squares slope of `y` against x = linspace(0, 1, len).
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn linear_slope(y: &[f32]) -> f32 {
    let n = y.len();
    if n < 2 {
        return 0.;
    }
    #[allow(clippy::cast_precision_loss)]
    let xs: Vec<f32> = (0..n).map(|i| i as f32 / (n - 1) as f32).collect();
    let x_mean = mean(&xs);
    let y_mean = mean(y);
    let mut num = 0f64;
    let mut den = 0f64;
    for (&x, &v) in xs.iter().zip(y) {
        num += f64::from(x - x_mean) * f64::from(v - y_mean);
        den += f64::from(x - x_mean) * f64::from(x - x_mean);
    }
    if den <= 0. {
        return 0.;
    }
    #[allow(clippy::cast_possible_truncation)]
    {
        (num / den) as f32
    }
}

/// First (lowest-index) maximum of a slice; `None` when empty.
#[must_use]
#[inline]
pub fn argmax_f64(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// First (lowest-index) maximum of an f32 slice; `None` when empty.
#[must_use]
#[inline]
pub fn argmax_f32(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(input: &[f32]) -> f32 {
    if input.is_empty() {
        return 0.;
    }
    input.iter().map(|x| f64::from(*x)).sum::<f64>() as f32 / input.len() as f32
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn population_std(input: &[f32]) -> f32 {
    if input.is_empty() {
        return 0.;
    }
    let mu = f64::from(mean(input));
    let var = input
        .iter()
        .map(|&x| (f64::from(x) - mu) * (f64::from(x) - mu))
        .sum::<f64>()
        / input.len() as f64;
    var.sqrt() as f32
}

/// Median via midpoint quantile; non-finite values are ignored.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn median(values: &[f32]) -> f32 {
    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.;
    }
    arr1(&finite)
        .mapv(n32)
        .quantile_mut(n64(0.5), &Midpoint)
        .map_or(0., f32::from)
}

/// Median of f64 values via midpoint quantile; non-finite values are ignored.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn median_f64(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.;
    }
    arr1(&finite)
        .mapv(n64)
        .quantile_mut(n64(0.5), &Midpoint)
        .map_or(0., f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hann_window() {
        let w = hann_window(8);
        assert!(w[0].abs() < f32::EPSILON, "{} !~= 0", w[0]);
        // periodic form peaks at len/2
        assert!((w[4] - 1.).abs() < f32::EPSILON, "{} !~= 1", w[4]);
        assert!(w[7] > 0., "periodic window must not end at zero");
    }

    #[test]
    fn test_moving_average_matches_naive_same_convolution() {
        let x = [1., 2., 3., 4., 5., 6., 7.];
        let win = 3;
        let got = moving_average(&x, win);
        // zero-padded centered average
        let expected = [1., 2., 3., 4., 5., 6., 13. / 3.];
        for (g, e) in got.iter().zip(&expected) {
            assert!(1e-6 > (g - e).abs(), "{g} !~= {e}");
        }
        assert_eq!(got.len(), x.len());
    }

    #[test]
    fn test_moving_average_even_window() {
        let x = [2., 2., 2., 2.];
        let got = moving_average(&x, 2);
        // center (win-1)/2 = 0: first element averages x[0] with the zero pad? no:
        // hi = t+1, lo = t-1 -> pairs (x[t-1], x[t]); t=0 pairs pad with x[0]
        assert!((got[0] - 1.).abs() < 1e-6, "{} !~= 1", got[0]);
        assert!((got[1] - 2.).abs() < 1e-6, "{} !~= 2", got[1]);
    }

    #[test]
    fn test_autocorr_peaks_at_period() {
        let sr = 1000usize;
        let mut x = vec![0f32; 3 * sr];
        // one click every 500 samples
        for i in (0..x.len()).step_by(500) {
            x[i] = 1.;
        }
        let ac = autocorr_range(&x, 400..700);
        let pk = argmax_f64(&ac).unwrap();
        assert_eq!(400 + pk, 500);
    }

    #[test]
    fn test_welch_band_power_in_band_vs_out() {
        let sr = 2000u32;
        let x: Vec<f32> = (0..4000)
            .map(|i| f32::sin(2. * PI * 100. * i as f32 / sr as f32))
            .collect();
        let in_band = welch_band_power(&x, sr, 50., 150.);
        let out_band = welch_band_power(&x, sr, 400., 800.);
        assert!(
            in_band > 100. * out_band,
            "in-band {in_band} should dwarf out-of-band {out_band}"
        );
    }

    #[test]
    fn test_welch_band_power_short_segments() {
        assert!(welch_band_power(&[1.; 32], 2000, 20., 100.) == 0.);
        // a 120-sample window (the S4 detection width at 2 kHz) must score
        let x: Vec<f32> = (0..120)
            .map(|i| f32::sin(2. * PI * 60. * i as f32 / 2000.))
            .collect();
        assert!(welch_band_power(&x, 2000, 20., 100.) > 0.);
    }

    #[test]
    fn test_band_pass_fir_passes_and_rejects() {
        let sr = 2000u32;
        let pass: Vec<f32> = (0..4000)
            .map(|i| f32::sin(2. * PI * 100. * i as f32 / sr as f32))
            .collect();
        let stop: Vec<f32> = (0..4000)
            .map(|i| f32::sin(2. * PI * 5. * i as f32 / sr as f32))
            .collect();
        let rms = |v: &[f32]| (v.iter().map(|&s| f64::from(s) * f64::from(s)).sum::<f64>() / v.len() as f64).sqrt();
        let passed = band_pass_fir(&pass, sr, 25., 400., 101);
        let stopped = band_pass_fir(&stop, sr, 25., 400., 101);
        assert!(rms(&passed) > 0.5 * rms(&pass));
        assert!(rms(&stopped) < 0.2 * rms(&stop));
    }

    #[test]
    fn test_linear_slope() {
        let rising: Vec<f32> = (0..50).map(|i| i as f32 / 49.).collect();
        assert!((linear_slope(&rising) - 1.).abs() < 1e-4);
        let flat = vec![0.5f32; 50];
        assert!(linear_slope(&flat).abs() < 1e-6);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3., 1., 2.]), 2.);
        assert_eq!(median(&[4., 1., 2., 3.]), 2.5);
        assert_eq!(median(&[]), 0.);
        assert_eq!(median_f64(&[1., f64::NAN, 3.]), 2.);
    }

    #[test]
    fn test_argmax_keeps_first_maximum() {
        assert_eq!(argmax_f64(&[1., 3., 3., 2.]), Some(1));
        assert_eq!(argmax_f32(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax_f64(&[]), None);
    }
}
