//! Cycle-period estimation from the envelope autocorrelation.

use log::warn;

use crate::kernels::{argmax_f64, autocorr_range, median_f64};
use crate::tuning::Tuning;

/// Heart-rate estimate plus how salient the autocorrelation peak was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HrState {
    /// BPM of the strongest lag in the search window; `None` when the window
    /// is invalid or the peak degenerates to zero.
    pub bpm: Option<f32>,
    /// Peak salience in [0, 1].
    pub salience: f32,
    /// Lag-unbiased cycle prominence in [0, 1]: how far the best lag rises
    /// above the lag-window median, relative to the zero-lag power. Flat
    /// envelopes (tones, steady noise) stay near zero however long the
    /// recording runs.
    pub periodicity: f32,
}

impl HrState {
    /// The BPM used for duration priors: the estimate, or the default when
    /// nothing was found.
    #[must_use]
    #[inline]
    pub fn effective_bpm(&self) -> f32 {
        self.bpm.unwrap_or(Tuning::DEFAULT_HR_BPM)
    }
}

/// Estimate the heart rate from a peak-normalized envelope.
///
/// Searches autocorrelation lags between [`Tuning::HR_MIN_LAG_S`] and
/// [`Tuning::HR_MAX_LAG_S`] (~200 down to ~33 BPM); salience is the peak's
/// margin over the window median, scaled by the window maximum.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn estimate(env_norm: &[f32], sr: u32) -> HrState {
    const NOT_FOUND: HrState = HrState {
        bpm: None,
        salience: 0.,
        periodicity: 0.,
    };

    let n = env_norm.len();
    let min_lag = (Tuning::HR_MIN_LAG_S * sr as f32) as usize;
    let max_lag = (Tuning::HR_MAX_LAG_S * sr as f32) as usize;
    if max_lag <= min_lag + 5 {
        return NOT_FOUND;
    }

    let seg = autocorr_range(env_norm, min_lag..max_lag);
    let Some(pk) = argmax_f64(&seg) else {
        return NOT_FOUND;
    };
    let peak = seg[pk];
    if peak <= 0. {
        // an all-silent or aperiodic envelope has no cycle to report
        warn!("no usable autocorrelation peak; leaving the heart rate unset");
        return NOT_FOUND;
    }

    let base = median_f64(&seg);
    let seg_max = seg.iter().copied().fold(f64::MIN, f64::max);
    let salience = (((peak - base) / (seg_max + 1e-9)).clamp(0., 1.)) as f32;
    let lag = min_lag + pk;
    let bpm = 60. * sr as f32 / lag as f32;

    // lag-unbiased prominence: divide out the (n - lag) overlap taper so a
    // flat envelope cannot masquerade as periodic
    let unbiased: Vec<f64> = seg
        .iter()
        .enumerate()
        .map(|(i, &ac)| {
            let lag = min_lag + i;
            if lag < n { ac / (n - lag) as f64 } else { 0. }
        })
        .collect();
    let peak_u = unbiased.iter().copied().fold(f64::MIN, f64::max);
    let base_u = median_f64(&unbiased);
    let power = crate::kernels::autocorr_at(env_norm, 0) / n as f64;
    let periodicity = (((peak_u - base_u) / (power + 1e-9)).clamp(0., 1.)) as f32;

    HrState {
        bpm: Some(bpm),
        salience,
        periodicity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{normalize_peak, smoothed_abs};
    use rstest::rstest;

    fn click_train_env(bpm: f32, seconds: f32, sr: u32) -> Vec<f32> {
        let n = (seconds * sr as f32) as usize;
        let period = (60. / bpm * sr as f32) as usize;
        let mut y = vec![0f32; n];
        for start in (0..n).step_by(period) {
            for i in start..(start + 20).min(n) {
                y[i] = 1.;
            }
        }
        normalize_peak(&smoothed_abs(&y, sr))
    }

    #[rstest]
    #[case(45.)]
    #[case(60.)]
    #[case(90.)]
    #[case(120.)]
    fn test_estimate_recovers_rate(#[case] bpm: f32) {
        let env = click_train_env(bpm, 10., 2000);
        let hr = estimate(&env, 2000);
        let got = hr.bpm.expect("click train must have a period");
        assert!(
            (got - bpm).abs() / bpm <= 0.08,
            "{got} too far from {bpm}"
        );
        assert!(hr.salience > 0.);
        assert!(
            hr.periodicity > 0.3,
            "a click train should be prominently periodic, got {}",
            hr.periodicity
        );
    }

    #[test]
    fn test_constant_envelope_has_no_prominence() {
        // a steady tone's envelope is flat: a rate may exist numerically,
        // but the cycle prominence must stay negligible
        let hr = estimate(&[0.8; 8000], 2000);
        assert!(
            hr.periodicity < 0.05,
            "flat envelope scored {}",
            hr.periodicity
        );
    }

    #[test]
    fn test_estimate_on_silence_falls_back() {
        let hr = estimate(&vec![0f32; 8000], 2000);
        assert_eq!(hr.bpm, None);
        assert_eq!(hr.salience, 0.);
        assert!((hr.effective_bpm() - Tuning::DEFAULT_HR_BPM).abs() < f32::EPSILON);
    }

    #[test]
    fn test_estimate_rejects_invalid_window() {
        // at 2 Hz the whole search range collapses
        let hr = estimate(&[0.5; 16], 2);
        assert_eq!(hr.bpm, None);
    }
}
