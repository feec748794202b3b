//! Recording-quality gate: is this a usable heart-sound recording at all?

use serde::{Deserialize, Serialize};

use crate::envelope::{normalize_peak, smoothed_abs};
use crate::kernels::{median, population_std, welch_band_power};
use crate::tuning::Tuning;

/// Machine-readable quality findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    TooShort,
    EnergyNotInHeartBand,
    WeakPeriodicity,
    UnstableCycles,
}

/// The measurements behind the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub duration_sec: f64,
    pub snr_db: f64,
    pub low_band_prop: f64,
    pub periodicity: f64,
    #[serde(rename = "cycleCV")]
    pub cycle_cv: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_bpm_est: Option<f64>,
    pub sr: u32,
}

/// Quality verdict over one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub is_heart: bool,
    pub quality_ok: bool,
    pub score: f64,
    pub issues: Vec<QualityIssue>,
    pub metrics: QualityMetrics,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0., 1.)
}

/// Assess a resampled, non-empty buffer.
///
/// The verdict passes on periodicity + band energy + duration, on the
/// composite score, or through a segmentation fallback: when the HSMM still
/// finds a plausible rate and enough events, the recording is heart-like
/// even if the coarse screens disagree.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
#[allow(clippy::too_many_lines)]
pub fn assess(y: &[f32], sr: u32) -> QualityReport {
    let n = y.len();
    let duration = n as f64 / f64::from(sr);
    let mut issues = Vec::new();
    if duration < Tuning::MIN_DURATION_S {
        issues.push(QualityIssue::TooShort);
    }

    // where does the energy live?
    let p_lo = welch_band_power(y, sr, 20., 150.);
    let p_mid = welch_band_power(y, sr, 150., 400.);
    let p_hf = welch_band_power(y, sr, 600., 1000.);
    let p_vlf = welch_band_power(y, sr, 0., 20.);
    let snr_db = 10. * ((p_lo + p_mid + 1e-9) / (p_vlf + 1e-9)).log10();
    let low_band_prop = (p_lo + p_mid) / (p_lo + p_mid + p_hf + 1e-9);
    if low_band_prop < Tuning::LOW_BAND_FLOOR {
        issues.push(QualityIssue::EnergyNotInHeartBand);
    }

    // envelope periodicity: the rate estimator's lag-unbiased cycle
    // prominence. A flat envelope (tones, steady noise) has no prominent
    // cycle lag and scores ~0.
    let env_raw = smoothed_abs(y, sr);
    let env = normalize_peak(&env_raw);
    let hr = crate::heart_rate::estimate(&env, sr);
    let periodicity = f64::from(hr.periodicity);
    let hr_bpm_est = hr.bpm.map(f64::from);
    if periodicity < Tuning::PERIODICITY_FLOOR {
        issues.push(QualityIssue::WeakPeriodicity);
    }

    // cycle consistency from plain envelope peaks
    let threshold = Tuning::QUALITY_PEAK_FLOOR
        .max(Tuning::PEAK_STD_GAIN.mul_add(population_std(&env), median(&env)));
    let distance = 1.max((Tuning::PEAK_MIN_GAP_S * sr as f32) as usize);
    let peaks = quality_peaks(&env, distance, threshold);
    let rr: Vec<f64> = peaks
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / f64::from(sr))
        .collect();
    let cycle_cv = if rr.is_empty() {
        1.
    } else {
        let mean = rr.iter().sum::<f64>() / rr.len() as f64;
        let var = rr.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / rr.len() as f64;
        var.sqrt() / (mean + 1e-9)
    };
    if rr.is_empty() || cycle_cv > Tuning::CYCLE_CV_MAX {
        issues.push(QualityIssue::UnstableCycles);
    }

    let [w_per, w_snr, w_band, w_cv] = Tuning::SCORE_WEIGHTS;
    let score = w_per * periodicity
        + w_snr * clamp01((snr_db + 5.) / 15.)
        + w_band * clamp01((low_band_prop - 0.4) / 0.6)
        + w_cv * clamp01(1. - cycle_cv.min(1.));

    let mut is_heart = (periodicity >= Tuning::PERIODICITY_FLOOR
        && low_band_prop >= Tuning::LOW_BAND_FLOOR
        && duration >= Tuning::MIN_DURATION_S)
        || score >= Tuning::SCORE_PASS;

    if !is_heart && periodicity >= Tuning::FALLBACK_MIN_PERIODICITY {
        // last word goes to the segmenter; the residual-periodicity floor
        // matters because the decoder produces a cyclic path for anything
        let outcome = crate::segmenter::segment_with_hr(y, &env_raw, sr, hr);
        if let Some(bpm) = outcome.hr.bpm {
            if (Tuning::FALLBACK_HR_MIN..=Tuning::FALLBACK_HR_MAX).contains(&bpm)
                && outcome.events.cycles() >= Tuning::FALLBACK_MIN_EVENTS
            {
                is_heart = true;
            }
        }
    }

    let quality_ok = is_heart && snr_db >= 0. && cycle_cv <= Tuning::CYCLE_CV_MAX;

    QualityReport {
        is_heart,
        quality_ok,
        score,
        issues,
        metrics: QualityMetrics {
            duration_sec: duration,
            snr_db,
            low_band_prop,
            periodicity,
            cycle_cv,
            hr_bpm_est,
            sr,
        },
    }
}

/// Same windowed peak picker the heuristic segmenter uses, with the quality
/// gate's own threshold floor plus a prominence requirement: a peak on a
/// near-flat envelope (a steady tone) does not count as a cycle.
fn quality_peaks(env: &[f32], distance: usize, threshold: f32) -> Vec<usize> {
    let n = env.len();
    let mut peaks = Vec::new();
    if n <= 2 * distance {
        return peaks;
    }
    let mut i = distance;
    while i < n - distance {
        let seg = &env[i - distance..=i + distance];
        let seg_max = seg.iter().fold(f32::MIN, |a, &b| a.max(b));
        let seg_min = seg.iter().fold(f32::MAX, |a, &b| a.min(b));
        if env[i] == seg_max
            && env[i] >= threshold
            && seg_max - seg_min >= Tuning::PEAK_PROMINENCE
        {
            peaks.push(i);
            i += distance;
        }
        i += 1;
    }
    peaks
}
