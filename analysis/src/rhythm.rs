//! Rhythm-variability statistics over the RR series, with heuristic
//! screening flags for AF-like irregularity and ectopy.

use statrs::statistics::Statistics;

use crate::tuning::Tuning;

/// Summary statistics of the RR series. Every metric is `None` when the
/// series is too short to support it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RhythmStats {
    pub rr_cv: Option<f64>,
    pub pnn50: Option<f64>,
    pub sample_entropy: Option<f64>,
    pub poincare_sd1: Option<f64>,
    pub poincare_sd2: Option<f64>,
    pub af_suspected: bool,
    pub ectopy_suspected: bool,
}

/// Compute the rhythm statistics from an RR series in seconds.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn from_rr(rr: &[f64]) -> RhythmStats {
    if rr.is_empty() {
        return RhythmStats::default();
    }

    let rr_mean = rr.iter().copied().mean();
    let rr_std = rr.iter().copied().population_std_dev();
    let rr_cv = Some(rr_std / (rr_mean + 1e-9));

    let diffs: Vec<f64> = rr.windows(2).map(|w| w[1] - w[0]).collect();
    let (pnn50, poincare_sd1) = if diffs.is_empty() {
        (None, None)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let frac = diffs.iter().filter(|d| d.abs() > 0.05).count() as f64 / diffs.len() as f64;
        let diff_var = diffs.iter().copied().population_variance();
        (Some(frac), Some((0.5 * diff_var).sqrt()))
    };

    let poincare_sd2 = if rr.len() > 1 {
        let rr_var = rr.iter().copied().population_variance();
        let diff_var = diffs.iter().copied().population_variance();
        let v = 0.5f64.mul_add(-diff_var, 2. * rr_var);
        if v >= 0. { Some(v.sqrt()) } else { None }
    } else {
        None
    };

    let sample_entropy = Some(approximate_sample_entropy(rr, 2, 0.2 * rr_std + 1e-9));

    let af_suspected = matches!(
        (rr_cv, pnn50, sample_entropy),
        (Some(cv), Some(p), Some(e))
            if cv > Tuning::AF_RR_CV && p > Tuning::AF_PNN50 && e > Tuning::AF_SAMPLE_ENTROPY
    );
    let ectopy_suspected = !af_suspected
        && matches!(
            (rr_cv, pnn50),
            (Some(cv), Some(p))
                if p > Tuning::ECTOPY_PNN50_LO && p < Tuning::ECTOPY_PNN50_HI
                    && cv > Tuning::ECTOPY_RR_CV
        );

    RhythmStats {
        rr_cv,
        pnn50,
        sample_entropy,
        poincare_sd1,
        poincare_sd2,
        af_suspected,
        ectopy_suspected,
    }
}

/// Approximate sample entropy: `-ln((B + eps) / (A + eps))` where A and B
/// count Chebyshev-close embedding pairs at lengths `m` and `m + 1`.
///
/// Quadratic in the series length; RR series stay well under a hundred
/// entries so the cost is negligible.
fn approximate_sample_entropy(series: &[f64], m: usize, r: f64) -> f64 {
    let phi = |m: usize| -> f64 {
        let n = series.len();
        if n <= m + 1 {
            return 0.;
        }
        let mut count = 0usize;
        let mut total = 0usize;
        for i in 0..n - m {
            for j in i + 1..n - m {
                let close = (0..m).all(|k| (series[i + k] - series[j + k]).abs() < r);
                if close {
                    count += 1;
                }
            }
            total += n - m - 1 - i;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            count as f64 / (total as f64 + 1e-9)
        }
    };
    let a = phi(m);
    let b = phi(m + 1);
    -(((b + 1e-12) / (a + 1e-12)).ln())
}
