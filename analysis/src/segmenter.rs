//! Cardiac-cycle segmentation.
//!
//! Two interchangeable front ends produce S1/S2 event indices: a four-state
//! explicit-duration (semi-Markov) Viterbi decoder over the frame features,
//! and a lighter alternating peak picker on the envelope. Both feed the same
//! downstream extractors.

use ndarray::Array2;
use strum::{EnumCount, EnumIter, FromRepr};

use crate::features::{FrameFeatures, FrameGrid};
use crate::heart_rate::HrState;
use crate::kernels::{argmax_f32, median, population_std};
use crate::tuning::Tuning;

/// The four cyclically-connected states of a cardiac cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumCount, EnumIter, FromRepr)]
#[repr(usize)]
pub enum CycleState {
    S1 = 0,
    Systole = 1,
    S2 = 2,
    Diastole = 3,
}

impl CycleState {
    /// Successor along the fixed S1 -> Systole -> S2 -> Diastole cycle.
    #[must_use]
    #[inline]
    pub const fn next(self) -> Self {
        match self {
            Self::S1 => Self::Systole,
            Self::Systole => Self::S2,
            Self::S2 => Self::Diastole,
            Self::Diastole => Self::S1,
        }
    }

    /// Predecessor along the cycle.
    #[must_use]
    #[inline]
    pub const fn prev(self) -> Self {
        match self {
            Self::S1 => Self::Diastole,
            Self::Systole => Self::S1,
            Self::S2 => Self::Systole,
            Self::Diastole => Self::S2,
        }
    }
}

/// Emission weights per state over (env, d_env, flux, hf_ratio).
///
/// S1 wants a tall rising envelope, systole wants flux and mid-high
/// frequency content, S2 looks like S1 with more HF, diastole penalizes
/// everything.
const EMISSION_WEIGHTS: [[f32; 4]; CycleState::COUNT] = [
    [1.4, 1.0, -0.2, 0.2],
    [0.6, -0.2, 0.9, 0.5],
    [1.2, 1.0, 0.2, 0.8],
    [-1.0, -0.6, -0.8, -0.5],
];

/// Gaussian duration prior over a bounded frame count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationPrior {
    pub mu: f32,
    pub sigma: f32,
    pub d_min: usize,
    pub d_max: usize,
}

impl DurationPrior {
    fn log_prob(&self, d: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let z = (d as f32 - self.mu) / (self.sigma + 1e-6);
        -0.5 * f64::from(z) * f64::from(z)
    }
}

/// Duration priors for the four states, derived from the expected frames per
/// cycle at the (clamped) heart rate.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn duration_priors(frame_rate: f32, hr_bpm: f32, frames: usize) -> [DurationPrior; CycleState::COUNT] {
    let c = frame_rate * 60. / hr_bpm.clamp(30., 200.);

    let s1_mu = (0.06 * c).clamp(2., 8.);
    let s2_mu = (0.05 * c).clamp(2., 8.);
    let sys_mu = (0.32 * c).clamp(0.15 * c, 0.45 * c);
    let dia_mu = (0.62 * c).clamp(0.20 * c, 0.80 * c);

    let sys_min = 2.max((0.10 * c) as usize);
    let dia_min = 2.max((0.20 * c) as usize);
    let sys_max = (frames.min((0.60 * c) as usize)).max(sys_min + 2);
    let dia_max = (frames.min(c as usize)).max(dia_min + 2);

    [
        DurationPrior {
            mu: s1_mu,
            sigma: (0.25 * s1_mu).max(1.5),
            d_min: 2,
            d_max: 8,
        },
        DurationPrior {
            mu: sys_mu,
            sigma: 0.25 * sys_mu,
            d_min: sys_min,
            d_max: sys_max,
        },
        DurationPrior {
            mu: s2_mu,
            sigma: (0.25 * s2_mu).max(1.5),
            d_min: 2,
            d_max: 8,
        },
        DurationPrior {
            mu: dia_mu,
            sigma: 0.25 * dia_mu,
            d_min: dia_min,
            d_max: dia_max,
        },
    ]
}

/// Per-frame, per-state emission log-scores from the normalized features.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn emission_scores(features: &Array2<f32>) -> Array2<f32> {
    let frames = features.nrows();
    let mut scores = Array2::zeros((frames, CycleState::COUNT));
    for t in 0..frames {
        for (s, weights) in EMISSION_WEIGHTS.iter().enumerate() {
            let mut acc = 0f32;
            for (k, w) in weights.iter().enumerate() {
                acc = features[[t, k]].mul_add(*w, acc);
            }
            scores[[t, s]] = acc;
        }
    }
    scores
}

/// Explicit-duration Viterbi over the cyclic four-state chain.
///
/// `dp[t][s]` is the best score of any segmentation of frames `[0, t)`
/// ending a segment of state `s` exactly at `t`; segment emissions are O(1)
/// via per-state cumulative sums. Ties keep the lower state index and the
/// smaller duration (strict improvement, ascending iteration).
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::too_many_lines)]
pub fn viterbi_path(
    emissions: &Array2<f32>,
    priors: &[DurationPrior; CycleState::COUNT],
) -> Vec<CycleState> {
    let frames = emissions.nrows();
    if frames == 0 {
        return Vec::new();
    }

    // cumulative emission per state: cum[[t, s]] = sum of E[0..t, s]
    let mut cum = Array2::<f64>::zeros((frames + 1, CycleState::COUNT));
    for t in 0..frames {
        for s in 0..CycleState::COUNT {
            cum[[t + 1, s]] = cum[[t, s]] + f64::from(emissions[[t, s]]);
        }
    }
    let segment_emission =
        |s: usize, from: usize, to: usize| -> f64 { cum[[to, s]] - cum[[from, s]] };

    let max_d = priors.iter().map(|p| p.d_max).max().unwrap_or(0);
    let mut dur_logp = vec![[f64::NEG_INFINITY; CycleState::COUNT]; max_d + 1];
    for (s, prior) in priors.iter().enumerate() {
        for (d, row) in dur_logp
            .iter_mut()
            .enumerate()
            .take(prior.d_max + 1)
            .skip(prior.d_min)
        {
            row[s] = prior.log_prob(d);
        }
    }

    let mut dp = Array2::<f64>::from_elem((frames + 1, CycleState::COUNT), f64::NEG_INFINITY);
    let mut ptr_state = Array2::<i8>::from_elem((frames + 1, CycleState::COUNT), -1);
    let mut ptr_dur = Array2::<usize>::zeros((frames + 1, CycleState::COUNT));

    // any state may open the sequence once its minimum duration fits
    for (s, prior) in priors.iter().enumerate() {
        for d in prior.d_min..=prior.d_max.min(frames) {
            let score = dur_logp[d][s] + segment_emission(s, 0, d);
            if score > dp[[d, s]] {
                dp[[d, s]] = score;
                ptr_state[[d, s]] = -1;
                ptr_dur[[d, s]] = d;
            }
        }
    }

    for t in 1..=frames {
        for s in 0..CycleState::COUNT {
            let prior = &priors[s];
            let ps = CycleState::from_repr(s).expect("state index in range").prev() as usize;
            let d_hi = prior.d_max.min(t);
            if d_hi < prior.d_min {
                continue;
            }
            let mut best = dp[[t, s]];
            let mut best_d = ptr_dur[[t, s]];
            for d in prior.d_min..=d_hi {
                let base = dp[[t - d, ps]];
                if base == f64::NEG_INFINITY {
                    continue;
                }
                let score = base + dur_logp[d][s] + segment_emission(s, t - d, t);
                if score > best {
                    best = score;
                    best_d = d;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    {
                        ptr_state[[t, s]] = ps as i8;
                    }
                }
            }
            dp[[t, s]] = best;
            ptr_dur[[t, s]] = best_d;
        }
    }

    let mut end_state = 0usize;
    for s in 1..CycleState::COUNT {
        if dp[[frames, s]] > dp[[frames, end_state]] {
            end_state = s;
        }
    }

    let mut path = vec![CycleState::S1; frames];
    let mut t = frames;
    let mut s = end_state;
    while t > 0 {
        let d = ptr_dur[[t, s]].clamp(1, t);
        let state = CycleState::from_repr(s).expect("state index in range");
        for slot in &mut path[t - d..t] {
            *slot = state;
        }
        let ps = ptr_state[[t, s]];
        t -= d;
        if ps < 0 {
            break;
        }
        #[allow(clippy::cast_sign_loss)]
        {
            s = ps as usize;
        }
    }
    if t > 0 {
        // uncovered prefix: strongest mean emission wins
        let mut best = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for s in 0..CycleState::COUNT {
            let score = segment_emission(s, 0, t);
            if score > best_score {
                best_score = score;
                best = s;
            }
        }
        let state = CycleState::from_repr(best).expect("state index in range");
        for slot in &mut path[..t] {
            *slot = state;
        }
    }
    path
}

/// S1 and S2 event positions, in resampled-domain sample indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Events {
    pub s1: Vec<usize>,
    pub s2: Vec<usize>,
}

impl Events {
    /// Number of complete cycles both event kinds support.
    #[must_use]
    #[inline]
    pub fn cycles(&self) -> usize {
        self.s1.len().min(self.s2.len())
    }
}

/// Map contiguous S1/S2 frame regions of a decoded path to sample indices by
/// taking the envelope argmax inside each region.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn events_from_path(path: &[CycleState], env: &[f32], grid: &FrameGrid) -> Events {
    let collect = |target: CycleState| -> Vec<usize> {
        let mut peaks = Vec::new();
        let mut region: Option<(usize, usize)> = None;
        let flush = |region: &mut Option<(usize, usize)>, peaks: &mut Vec<usize>| {
            if let Some((first, last)) = region.take() {
                let a = first * grid.hop;
                let b = (last * grid.hop + grid.win).min(env.len().saturating_sub(1));
                if b > a {
                    if let Some(pk) = argmax_f32(&env[a..b]) {
                        peaks.push(a + pk);
                    }
                }
            }
        };
        for (frame, &state) in path.iter().enumerate() {
            if state == target {
                region = match region {
                    Some((first, last)) if frame == last + 1 => Some((first, frame)),
                    Some(_) => {
                        flush(&mut region, &mut peaks);
                        Some((frame, frame))
                    }
                    None => Some((frame, frame)),
                };
            }
        }
        flush(&mut region, &mut peaks);
        peaks.sort_unstable();
        peaks.dedup();
        peaks
    };

    Events {
        s1: collect(CycleState::S1),
        s2: collect(CycleState::S2),
    }
}

/// Windowed local-maximum peak picker with a minimum peak distance.
fn find_peaks(x: &[f32], distance: usize, threshold: f32) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n <= 2 * distance {
        return peaks;
    }
    let mut i = distance;
    while i < n - distance {
        let seg = &x[i - distance..=i + distance];
        let seg_max = seg.iter().fold(f32::MIN, |a, &b| a.max(b));
        if x[i] == seg_max && x[i] >= threshold {
            peaks.push(i);
            i += distance;
        }
        i += 1;
    }
    peaks
}

/// The alternating heuristic: envelope peaks assigned S1/S2 by expected
/// cycle length. A candidate within [`Tuning::SAME_CYCLE_FRACTION`] of a
/// cycle alternates; anything later opens a new cycle as S1.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn heuristic_events(env_norm: &[f32], sr: u32, hr: &HrState) -> Events {
    let threshold = Tuning::PEAK_FLOOR
        .max(Tuning::PEAK_STD_GAIN.mul_add(population_std(env_norm), median(env_norm)));
    let distance = (Tuning::PEAK_MIN_GAP_S * sr as f32) as usize;
    let candidates = find_peaks(env_norm, distance.max(1), threshold);

    let cycle = hr
        .bpm
        .map_or(sr as f32 * 0.8, |bpm| sr as f32 * 60. / bpm);

    let mut s1 = Vec::new();
    let mut s2 = Vec::new();
    let mut last_was_s1 = true;
    for &cand in &candidates {
        let Some(&last) = (if last_was_s1 { s1.last() } else { s2.last() }) else {
            s1.push(cand);
            last_was_s1 = true;
            continue;
        };
        let dt = cand.saturating_sub(last) as f32;
        if dt < Tuning::SAME_CYCLE_FRACTION * cycle {
            if last_was_s1 {
                s2.push(cand);
                last_was_s1 = false;
            } else {
                s1.push(cand);
                last_was_s1 = true;
            }
        } else {
            s1.push(cand);
            last_was_s1 = true;
        }
    }

    s1.sort_unstable();
    s1.dedup();
    s2.sort_unstable();
    s2.dedup();
    Events { s1, s2 }
}

/// Decoded segmentation of one buffer: the per-frame path plus the derived
/// event indices.
#[derive(Debug, Clone)]
pub struct HsmmOutcome {
    pub features: FrameFeatures,
    pub hr: HrState,
    pub path: Vec<CycleState>,
    pub events: Events,
}

/// Run the full HSMM front end over a resampled signal and its envelope.
#[must_use]
#[inline]
pub fn segment(y: &[f32], env: &[f32], sr: u32) -> HsmmOutcome {
    let env_norm = crate::envelope::normalize_peak(env);
    let hr = crate::heart_rate::estimate(&env_norm, sr);
    segment_with_hr(y, env, sr, hr)
}

/// [`segment`] with a rate estimate the caller already has.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn segment_with_hr(y: &[f32], env: &[f32], sr: u32, hr: HrState) -> HsmmOutcome {
    let features = crate::features::extract(y, env, sr);
    let emissions = emission_scores(&features.matrix);
    let priors = duration_priors(
        features.grid.frame_rate(sr),
        hr.effective_bpm(),
        features.grid.frames,
    );
    let path = viterbi_path(&emissions, &priors);
    let events = events_from_path(&path, env, &features.grid);

    HsmmOutcome {
        features,
        hr,
        path,
        events,
    }
}
