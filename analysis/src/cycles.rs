//! Per-cycle interval statistics and the event-anchored detectors: S2
//! splits, A2-OS, S3/S4, clicks, event intensities and widths.

use crate::envelope;
use crate::kernels::{
    argmax_f32, band_power, hann_window, linear_slope, mean, median, median_f64, population_std,
    welch_band_power, windowed_magnitudes,
};
use crate::segmenter::Events;
use crate::tuning::Tuning;
use rustfft::FftPlanner;

/// RR, systole and diastole interval series, in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleIntervals {
    pub rr: Vec<f64>,
    pub systole: Vec<f64>,
    pub diastole: Vec<f64>,
}

impl CycleIntervals {
    /// Mean diastole over mean systole, when both exist.
    #[must_use]
    #[inline]
    pub fn ds_ratio(&self) -> Option<f64> {
        if self.systole.is_empty() || self.diastole.is_empty() {
            return None;
        }
        Some(mean_f64(&self.diastole) / mean_f64(&self.systole))
    }
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn population_std_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let mu = mean_f64(values);
    #[allow(clippy::cast_precision_loss)]
    let var = values.iter().map(|&v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// RR from consecutive S1s; systole = S1 to the nearest later S2 within
/// (0, [`Tuning::SYSTOLE_MAX_S`]]; diastole = S2 to the nearest later S1.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn intervals(events: &Events, sr: u32) -> CycleIntervals {
    let to_sec = |samples: usize| samples as f64 / f64::from(sr);

    let rr = events
        .s1
        .windows(2)
        .map(|w| to_sec(w[1] - w[0]))
        .collect();

    let mut systole = Vec::new();
    for &s1 in &events.s1 {
        let Some(&s2) = events.s2.iter().find(|&&p| p > s1) else {
            continue;
        };
        let d = to_sec(s2 - s1);
        if d > 0. && d <= Tuning::SYSTOLE_MAX_S {
            systole.push(d);
        }
    }

    let mut diastole = Vec::new();
    for &s2 in &events.s2 {
        let Some(&s1) = events.s1.iter().find(|&&p| p > s2) else {
            continue;
        };
        let d = to_sec(s1 - s2);
        if d > 0. {
            diastole.push(d);
        }
    }

    CycleIntervals {
        rr,
        systole,
        diastole,
    }
}

/// One accepted A2-P2 split: where it was seen and how wide it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct S2Split {
    /// Sample index of the S2 event the split belongs to.
    pub at: usize,
    /// Peak-to-peak distance, in milliseconds.
    pub ms: f64,
}

/// Double-peak search on an HF-emphasized differential around each S2.
///
/// The two largest local maxima inside [S2+12 ms, S2+80 ms] are accepted
/// when the secondary reaches [`Tuning::SPLIT_SECOND_PEAK_RATIO`] of the
/// primary and their distance lands in the accepted range.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn s2_splits(y: &[f32], s2: &[usize], sr: u32) -> Vec<S2Split> {
    let n = y.len();
    let sr_f = sr as f32;
    let mut out = Vec::new();
    for &idx in s2 {
        let seg_start = idx.saturating_sub((0.02 * sr_f) as usize);
        let seg_end = (idx + (0.12 * sr_f) as usize).min(n);
        if seg_end <= seg_start {
            continue;
        }
        let seg = &y[seg_start..seg_end];

        // first difference, rectified and lightly smoothed, emphasizes the
        // high-frequency component carrying A2/P2
        let diff: Vec<f32> = seg
            .iter()
            .enumerate()
            .map(|(i, &v)| if i == 0 { 0. } else { (v - seg[i - 1]).abs() })
            .collect();
        let hf = crate::kernels::moving_average(&diff, 1.max((0.004 * sr_f) as usize));

        let w_start = (idx + (0.012 * sr_f) as usize).saturating_sub(seg_start);
        let w_end = ((idx + (0.08 * sr_f) as usize).saturating_sub(seg_start)).min(hf.len());
        if w_end <= w_start || w_end - w_start < 3 {
            continue;
        }
        let sub = &hf[w_start..w_end];

        // two tallest local maxima; plateaus count once at their left edge
        let mut top: Option<(usize, f32)> = None;
        let mut second: Option<(usize, f32)> = None;
        for i in 1..sub.len() - 1 {
            if sub[i] > sub[i - 1] && sub[i] >= sub[i + 1] {
                if top.is_none_or(|(_, v)| sub[i] > v) {
                    second = top;
                    top = Some((i, sub[i]));
                } else if second.is_none_or(|(_, v)| sub[i] > v) {
                    second = Some((i, sub[i]));
                }
            }
        }
        let (Some((p1, v1)), Some((p2, v2))) = (top, second) else {
            continue;
        };
        if v2 < Tuning::SPLIT_SECOND_PEAK_RATIO * v1 {
            continue;
        }
        let ms = p1.abs_diff(p2) as f64 * 1000. / f64::from(sr);
        if (Tuning::SPLIT_MIN_MS..=Tuning::SPLIT_MAX_MS).contains(&ms) {
            out.push(S2Split { at: idx, ms });
        }
    }
    out
}

/// Opening-snap transients: the |y| peak inside [S2+40 ms, S2+120 ms] must
/// clear the window median by [`Tuning::A2_OS_Z`] standard deviations.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn a2_os(y: &[f32], s2: &[usize], sr: u32) -> Vec<f64> {
    let n = y.len();
    let sr_f = sr as f32;
    let mut out = Vec::new();
    for &idx in s2 {
        let start = idx + (Tuning::A2_OS_MIN_S * sr_f) as usize;
        let end = (idx + (Tuning::A2_OS_MAX_S * sr_f) as usize).min(n);
        if start >= n || end <= start {
            continue;
        }
        let seg: Vec<f32> = y[start..end].iter().map(|v| v.abs()).collect();
        if seg.len() < 5 {
            continue;
        }
        let Some(pk) = argmax_f32(&seg) else { continue };
        if seg[pk] > Tuning::A2_OS_Z.mul_add(population_std(&seg), median(&seg)) {
            // latency from S2 to the snap, not from the window edge
            out.push((start - idx + pk) as f64 * 1000. / f64::from(sr));
        }
    }
    out
}

/// Hit counts for the additional-sound detectors, per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraSounds {
    pub s3_hits: usize,
    pub s4_hits: usize,
    pub ejection_hits: usize,
    pub mid_systolic_hits: usize,
    pub cycles: usize,
}

impl ExtraSounds {
    #[allow(clippy::cast_precision_loss)]
    fn prob(hits: usize, cycles: usize) -> f64 {
        (hits as f64 / cycles.max(1) as f64).clamp(0., 1.)
    }

    #[must_use]
    #[inline]
    pub fn s3_prob(&self) -> f64 {
        Self::prob(self.s3_hits, self.cycles)
    }

    #[must_use]
    #[inline]
    pub fn s4_prob(&self) -> f64 {
        Self::prob(self.s4_hits, self.cycles)
    }

    #[must_use]
    #[inline]
    pub fn ejection_click_prob(&self) -> f64 {
        Self::prob(self.ejection_hits, self.cycles)
    }

    #[must_use]
    #[inline]
    pub fn mid_systolic_click_prob(&self) -> f64 {
        Self::prob(self.mid_systolic_hits, self.cycles)
    }
}

fn low_band_ratio_hit(y: &[f32], sr: u32, start: usize, end: usize) -> bool {
    let window = &y[start..end];
    let base_start = start.saturating_sub((0.2 * sr as f32) as usize);
    let baseline = &y[base_start..start];
    let e_low = welch_band_power(window, sr, 20., 100.);
    let base = welch_band_power(baseline, sr, 20., 100.);
    e_low / (base + 1e-9) > Tuning::S3_S4_SCORE
}

fn tkeo_z_hit(tkeo: &[f32], start: usize, end: usize) -> bool {
    if end <= start {
        return false;
    }
    let seg = &tkeo[start..end];
    if seg.is_empty() {
        return false;
    }
    let med = median(seg);
    let sd = population_std(seg) + 1e-9;
    let z_max = seg.iter().fold(f32::MIN, |a, &v| a.max((v - med) / sd));
    z_max > Tuning::CLICK_Z
}

/// Run the S3/S4 and click detectors over paired cycles.
///
/// S3 looks for low-band energy in [S2+80 ms, S2+200 ms] and S4,
/// symmetrically, in [S1-120 ms, S1-60 ms]; both score against the 200 ms of
/// signal immediately preceding the window. Clicks are TKEO z-score
/// transients after S1 and at mid-systole.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn extra_sounds(y: &[f32], events: &Events, sr: u32) -> ExtraSounds {
    let n = y.len();
    let sr_f = sr as f32;
    let tkeo = envelope::tkeo(y);

    let mut sounds = ExtraSounds {
        cycles: events.cycles().max(1),
        ..ExtraSounds::default()
    };

    for j in 0..events.cycles() {
        let s1 = events.s1[j];
        let s2 = events.s2[j];

        // S3: 80-200 ms after S2
        let w3a = s2 + (0.08 * sr_f) as usize;
        let w3b = (s2 + (0.20 * sr_f) as usize).min(n);
        if w3b > w3a && w3b - w3a > (0.03 * sr_f) as usize && low_band_ratio_hit(y, sr, w3a, w3b) {
            sounds.s3_hits += 1;
        }

        // S4: 60-120 ms before S1
        let w4a = s1.saturating_sub((0.12 * sr_f) as usize);
        let w4b = s1.saturating_sub((0.06 * sr_f) as usize);
        if w4b > w4a && w4b - w4a > (0.03 * sr_f) as usize && low_band_ratio_hit(y, sr, w4a, w4b) {
            sounds.s4_hits += 1;
        }

        // ejection click: 20-60 ms after S1
        let eca = s1 + (0.02 * sr_f) as usize;
        let ecb = (s1 + (0.06 * sr_f) as usize).min(n);
        if ecb > eca && ecb - eca > (0.01 * sr_f) as usize && tkeo_z_hit(&tkeo, eca, ecb) {
            sounds.ejection_hits += 1;
        }

        // mid-systolic click: midpoint of (S1, S2), +/- 10 ms
        if s2 > s1 {
            let mid = s1 + (s2 - s1) / 2;
            let msa = mid.saturating_sub((0.01 * sr_f) as usize);
            let msb = (mid + (0.01 * sr_f) as usize).min(n);
            if msb > msa && tkeo_z_hit(&tkeo, msa, msb) {
                sounds.mid_systolic_hits += 1;
            }
        }
    }
    sounds
}

/// Mean normalized-envelope value at the event indices.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn intensity(env_norm: &[f32], events: &[usize]) -> Option<f64> {
    if events.is_empty() {
        return None;
    }
    let vals: Vec<f32> = events
        .iter()
        .filter_map(|&i| env_norm.get(i).copied())
        .collect();
    if vals.is_empty() {
        return None;
    }
    Some(f64::from(mean(&vals)))
}

/// Median event width: the contiguous region around each event where the
/// envelope stays above 25% of its local (+/- 50 ms) peak, in milliseconds.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn event_width_ms(env: &[f32], events: &[usize], sr: u32) -> Option<f64> {
    let n = env.len();
    let half = (0.05 * sr as f32) as usize;
    let mut widths = Vec::new();
    for &i in events {
        if i >= n {
            continue;
        }
        let a = i.saturating_sub(half);
        let b = (i + half).min(n);
        let seg = &env[a..b];
        if seg.len() < 3 {
            continue;
        }
        let peak = seg.iter().fold(f32::MIN, |acc, &v| acc.max(v));
        let th = 0.25 * peak;
        let mut left = i;
        while left > a && env[left] >= th {
            left -= 1;
        }
        let mut right = i;
        while right < b && env[right] >= th {
            right += 1;
        }
        widths.push((right - left) as f64 / f64::from(sr) * 1000.);
    }
    if widths.is_empty() {
        None
    } else {
        Some(median_f64(&widths))
    }
}

/// Mean framed band power (150-600 Hz, 10 ms hop / 20 ms win) over systolic
/// and diastolic windows.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn high_freq_energies(y: &[f32], events: &Events, sr: u32) -> (Option<f64>, Option<f64>) {
    let sr_f = sr as f32;
    let hop = 16.max((0.01 * sr_f) as usize);
    let win = 32.max((0.02 * sr_f) as usize);
    let window = hann_window(win);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(win);

    let band_energy = |start: usize, end: usize| -> f64 {
        if end <= start {
            return 0.;
        }
        let seg = &y[start..end];
        if seg.len() <= 16 || seg.len() <= win {
            return 0.;
        }
        let mut total = 0f64;
        let mut frames = 0usize;
        let mut k = 0;
        while k + win < seg.len() {
            let mags = windowed_magnitudes(&seg[k..k + win], &window, fft.as_ref());
            total += band_power(&mags, sr, win, 150., 600., true);
            frames += 1;
            k += hop;
        }
        total / (frames as f64 + 1e-9)
    };

    let mut sys = Vec::new();
    let mut dia = Vec::new();
    for j in 0..events.cycles() {
        let s1 = events.s1[j];
        let s2 = events.s2[j];
        if s2 > s1 {
            sys.push(band_energy(s1, s2));
            if let Some(&next_s1) = events.s1.get(j + 1) {
                if next_s1 > s2 {
                    dia.push(band_energy(s2, next_s1));
                }
            }
        }
    }
    let summarize = |v: &[f64]| if v.is_empty() { None } else { Some(mean_f64(v)) };
    (summarize(&sys), summarize(&dia))
}

/// Mean envelope slope over the systoles, mapped to a coarse shape.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn systolic_envelope_slope(env: &[f32], events: &Events) -> Option<f32> {
    let mut slopes = Vec::new();
    for j in 0..events.cycles() {
        let s1 = events.s1[j];
        let s2 = events.s2[j];
        if s2 > s1 {
            let seg = &env[s1..s2.min(env.len())];
            if seg.len() > 5 {
                slopes.push(linear_slope(seg));
            }
        }
    }
    if slopes.is_empty() {
        None
    } else {
        Some(mean(&slopes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intervals_pairs_nearest_later_events() {
        let events = Events {
            s1: vec![0, 2000, 4000],
            s2: vec![600, 2600, 4600],
        };
        let iv = intervals(&events, 2000);
        assert_eq!(iv.rr, vec![1.0, 1.0]);
        assert_eq!(iv.systole, vec![0.3, 0.3, 0.3]);
        assert_eq!(iv.diastole, vec![0.7, 0.7]);
        let ds = iv.ds_ratio().unwrap();
        assert!((ds - 0.7 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_intervals_rejects_overlong_systole() {
        let events = Events {
            s1: vec![0],
            s2: vec![2000], // a full second later
        };
        let iv = intervals(&events, 2000);
        assert!(iv.systole.is_empty());
        assert_eq!(iv.ds_ratio(), None);
    }

    #[test]
    fn test_s2_split_detects_double_click() {
        let sr = 2000u32;
        let mut y = vec![0f32; 2000];
        let s2 = 500usize;
        // A2 at +20 ms, P2 at +60 ms: 40 ms apart
        for (at, amp) in [(s2 + 40, 1.0f32), (s2 + 120, 0.8)] {
            for i in at..at + 6 {
                y[i] = amp * if i % 2 == 0 { 1. } else { -1. };
            }
        }
        let splits = s2_splits(&y, &[s2], sr);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].at, s2);
        assert!(
            (splits[0].ms - 40.).abs() <= 6.,
            "{} !~= 40",
            splits[0].ms
        );
    }

    #[test]
    fn test_s2_split_rejects_single_click() {
        let sr = 2000u32;
        let mut y = vec![0f32; 2000];
        let s2 = 500usize;
        for i in s2 + 40..s2 + 46 {
            y[i] = if i % 2 == 0 { 1. } else { -1. };
        }
        assert!(s2_splits(&y, &[s2], sr).is_empty());
    }

    #[test]
    fn test_a2_os_finds_isolated_transient() {
        let sr = 2000u32;
        let mut y = vec![0f32; 2000];
        let s2 = 500usize;
        // transient 90 ms after S2, inside the 40-120 ms gate
        let snap = s2 + 180;
        for i in snap..snap + 4 {
            y[i] = 1.;
        }
        let hits = a2_os(&y, &[s2], sr);
        assert_eq!(hits.len(), 1);
        assert!((hits[0] - 90.).abs() <= 5., "{} !~= 90", hits[0]);
        // quiet window yields nothing
        assert!(a2_os(&y, &[1500], sr).is_empty());
    }

    #[test]
    fn test_extra_sounds_click_detector() {
        let sr = 2000u32;
        let n = 4000;
        let mut y = vec![0f32; n];
        // noise floor so the z-score has a spread to clear
        for (i, v) in y.iter_mut().enumerate() {
            *v = 0.01 * f32::sin(i as f32 * 0.7);
        }
        let s1 = 1000usize;
        let s2 = 1600usize;
        // ejection click 40 ms after S1
        let click = s1 + 80;
        for i in click..click + 3 {
            y[i] = 1.;
        }
        let events = Events {
            s1: vec![s1],
            s2: vec![s2],
        };
        let sounds = extra_sounds(&y, &events, sr);
        assert_eq!(sounds.cycles, 1);
        assert_eq!(sounds.ejection_hits, 1);
        assert!((sounds.ejection_click_prob() - 1.).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extra_sounds_empty_events() {
        let sounds = extra_sounds(&vec![0f32; 1000], &Events::default(), 2000);
        assert_eq!(sounds.cycles, 1);
        assert_eq!(sounds.s3_prob(), 0.);
    }

    #[test]
    fn test_intensity_and_width() {
        let mut env = vec![0f32; 1000];
        for i in 480..520 {
            env[i] = 1.;
        }
        assert_eq!(intensity(&env, &[500]), Some(1.));
        assert_eq!(intensity(&env, &[]), None);
        let width = event_width_ms(&env, &[500], 2000).unwrap();
        // 40 samples above threshold at 2 kHz = 20 ms
        assert!((width - 20.).abs() <= 2., "{width} !~= 20");
    }

    #[test]
    fn test_high_freq_energies_prefer_noisy_systole() {
        let sr = 2000u32;
        let n = 4000;
        let mut y = vec![0f32; n];
        let events = Events {
            s1: vec![500, 2500],
            s2: vec![1500, 3500],
        };
        // 300 Hz buzz only during the first systole
        for i in 500..1500 {
            y[i] = 0.5 * f32::sin(2. * std::f32::consts::PI * 300. * i as f32 / sr as f32);
        }
        let (sys, dia) = high_freq_energies(&y, &events, sr);
        let sys = sys.unwrap();
        let dia = dia.unwrap();
        assert!(sys > 10. * dia, "sys {sys} should dwarf dia {dia}");
    }

    #[test]
    fn test_systolic_envelope_slope_detects_crescendo() {
        let mut env = vec![0f32; 4000];
        for i in 500..1500 {
            env[i] = (i - 500) as f32 / 1000.;
        }
        let events = Events {
            s1: vec![500],
            s2: vec![1500],
        };
        let slope = systolic_envelope_slope(&env, &events).unwrap();
        assert!(slope > Tuning::SYS_SHAPE_SLOPE, "slope {slope}");
    }
}
