//! Respiratory-rate estimation and respiration-linked S2 split typing.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::cycles::{S2Split, mean_f64, population_std_f64};
use crate::envelope::smoothed_rms;
use crate::kernels::{hann_window, median_f64};
use crate::tuning::Tuning;

/// Decimated respiration envelope plus the spectral estimate taken from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Respiration {
    /// Breaths per minute, when a band peak exists.
    pub rate: Option<f64>,
    /// Peak over band mean.
    pub dominance: f64,
    /// The ~20 Hz decimated envelope the estimate came from.
    pub series: Vec<f32>,
    /// Decimation step, in input samples.
    pub step: usize,
}

/// Estimate respiration from a 0.5 s RMS envelope decimated to ~20 Hz, as
/// the 0.08-0.8 Hz spectral peak of its Hann-windowed, zero-padded FFT.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn estimate(y: &[f32], sr: u32) -> Respiration {
    let envelope = smoothed_rms(y, sr, 0.5);
    let step = 1.max((sr as f32 / 20.).round() as usize);
    let series: Vec<f32> = envelope.iter().step_by(step).copied().collect();
    let fs = f64::from(sr) / step as f64;

    let n = series.len();
    let nfft = 64.max(n).next_power_of_two();
    let window = hann_window(n);
    let mut buf: Vec<Complex<f32>> = series
        .iter()
        .zip(&window)
        .map(|(&v, &w)| Complex::new(v * w, 0.))
        .collect();
    buf.resize(nfft, Complex::new(0., 0.));
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(nfft).process(&mut buf);

    let mut band = Vec::new();
    for (i, c) in buf[..=nfft / 2].iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let f = i as f64 * fs / nfft as f64;
        if (f64::from(Tuning::RESP_MIN_HZ)..=f64::from(Tuning::RESP_MAX_HZ)).contains(&f) {
            band.push((f, f64::from(c.norm())));
        }
    }
    if band.is_empty() {
        return Respiration {
            rate: None,
            dominance: 0.,
            series,
            step,
        };
    }

    let mut peak = 0usize;
    for i in 1..band.len() {
        if band[i].1 > band[peak].1 {
            peak = i;
        }
    }
    if band[peak].1 <= 0. {
        // a dead band has no breathing to report
        return Respiration {
            rate: None,
            dominance: 0.,
            series,
            step,
        };
    }
    let band_mean = band.iter().map(|&(_, m)| m).sum::<f64>() / band.len() as f64;
    Respiration {
        rate: Some(band[peak].0 * 60.),
        dominance: band[peak].1 / (band_mean + 1e-9),
        series,
        step,
    }
}

/// Pearson correlation between the split-width series and the respiration
/// envelope sampled (nearest index) at the matching S2 positions.
///
/// Returns 0 for fewer than three pairs or a degenerate series.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn split_correlation(resp: &Respiration, splits: &[S2Split]) -> f64 {
    if splits.len() < 3 || resp.series.is_empty() {
        return 0.;
    }
    let xs: Vec<f64> = splits.iter().map(|s| s.ms).collect();
    let ys: Vec<f64> = splits
        .iter()
        .map(|s| {
            let i = (s.at / resp.step).min(resp.series.len() - 1);
            f64::from(resp.series[i])
        })
        .collect();

    let (mx, my) = (mean_f64(&xs), mean_f64(&ys));
    let (sx, sy) = (population_std_f64(&xs), population_std_f64(&ys));
    if sx < 1e-6 || sy < 1e-6 {
        return 0.;
    }
    #[allow(clippy::cast_precision_loss)]
    let cov = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| (x - mx) * (y - my))
        .sum::<f64>()
        / xs.len() as f64;
    (cov / (sx * sy)).clamp(-1., 1.)
}

/// Respiration-linked S2 split classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Wide,
    Fixed,
    Physiologic,
    Paradoxical,
    Indeterminate,
}

/// Classify the split series; `None` without any accepted splits.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn classify_split(splits: &[S2Split], corr: f64) -> Option<SplitType> {
    if splits.is_empty() {
        return None;
    }
    let ms: Vec<f64> = splits.iter().map(|s| s.ms).collect();
    let median_ms = median_f64(&ms);
    let mean_ms = mean_f64(&ms);
    let std_ms = population_std_f64(&ms);

    Some(if median_ms > Tuning::SPLIT_WIDE_MS {
        SplitType::Wide
    } else if std_ms < Tuning::SPLIT_FIXED_STD_MS && mean_ms > Tuning::SPLIT_FIXED_MEAN_MS {
        SplitType::Fixed
    } else if corr > Tuning::SPLIT_CORR_THRESHOLD {
        SplitType::Physiologic
    } else if corr < -Tuning::SPLIT_CORR_THRESHOLD {
        SplitType::Paradoxical
    } else {
        SplitType::Indeterminate
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_estimate_recovers_slow_modulation() {
        let sr = 2000u32;
        let seconds = 30.;
        let resp_hz = 0.25f32; // 15 breaths per minute
        let n = (seconds * sr as f32) as usize;
        // a 100 Hz carrier whose amplitude breathes at 0.25 Hz
        let y: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / sr as f32;
                let depth = 0.6 + 0.4 * f32::sin(2. * std::f32::consts::PI * resp_hz * t);
                depth * f32::sin(2. * std::f32::consts::PI * 100. * t)
            })
            .collect();
        let resp = estimate(&y, sr);
        let rate = resp.rate.expect("modulation inside the band");
        assert!((rate - 15.).abs() <= 3., "{rate} !~= 15");
        assert!(resp.dominance > 1.);
    }

    #[test]
    fn test_split_correlation_tracks_series() {
        let series: Vec<f32> = (0..100).map(|i| i as f32 / 100.).collect();
        let resp = Respiration {
            rate: Some(15.),
            dominance: 2.,
            series,
            step: 100,
        };
        // splits widen exactly with the rising envelope
        let splits: Vec<S2Split> = (0..8)
            .map(|j| S2Split {
                at: j * 1000,
                ms: 20. + j as f64,
            })
            .collect();
        let corr = split_correlation(&resp, &splits);
        assert!(corr > 0.95, "corr {corr}");

        let inverted: Vec<S2Split> = (0..8)
            .map(|j| S2Split {
                at: j * 1000,
                ms: 40. - j as f64,
            })
            .collect();
        assert!(split_correlation(&resp, &inverted) < -0.95);
    }

    #[test]
    fn test_split_correlation_degenerate_cases() {
        let resp = Respiration {
            rate: None,
            dominance: 0.,
            series: vec![0.5; 10],
            step: 100,
        };
        let splits: Vec<S2Split> = (0..5)
            .map(|j| S2Split {
                at: j * 100,
                ms: 25. + j as f64,
            })
            .collect();
        // constant respiration series has no variance to correlate against
        assert_eq!(split_correlation(&resp, &splits), 0.);
        assert_eq!(split_correlation(&resp, &splits[..2]), 0.);
    }

    #[test]
    fn test_classify_split_rules() {
        let with_ms = |values: &[f64]| -> Vec<S2Split> {
            values
                .iter()
                .enumerate()
                .map(|(i, &ms)| S2Split { at: i * 1000, ms })
                .collect()
        };
        assert_eq!(classify_split(&[], 0.9), None);
        assert_eq!(
            classify_split(&with_ms(&[60., 62., 58.]), 0.),
            Some(SplitType::Wide)
        );
        assert_eq!(
            classify_split(&with_ms(&[35., 36., 34.]), 0.),
            Some(SplitType::Fixed)
        );
        assert_eq!(
            classify_split(&with_ms(&[20., 30., 14.]), 0.5),
            Some(SplitType::Physiologic)
        );
        assert_eq!(
            classify_split(&with_ms(&[20., 30., 14.]), -0.5),
            Some(SplitType::Paradoxical)
        );
        assert_eq!(
            classify_split(&with_ms(&[20., 30., 14.]), 0.),
            Some(SplitType::Indeterminate)
        );
    }
}
