//! Phonocardiogram (PCG) analysis core.
//!
//! Takes a single-channel heart-sound recording and produces a structured,
//! non-diagnostic report: heart rate, S1/S2 event positions, interval
//! statistics, murmur characterization, additional-sound probabilities,
//! respiration-linked S2 split typing, rhythm variability, and a
//! recording-quality verdict.
//!
//! Everything operates on a buffer resampled to [`SAMPLE_RATE`]; each
//! analysis is a pure function of its input, so identical buffers produce
//! identical reports.

#![deny(clippy::missing_inline_in_public_items)]

pub mod cycles;
pub mod envelope;
pub mod errors;
pub mod features;
pub mod heart_rate;
pub mod kernels;
pub mod murmur;
pub mod quality;
pub mod report;
pub mod resample;
pub mod respiration;
pub mod rhythm;
pub mod segmenter;
pub mod tuning;

use errors::{AnalysisError, AnalysisResult};
use kernels::{median, moving_average, population_std, welch_band_power};
use report::{
    AdditionalSounds, EventIndices, Extras, MurmurBlock, Qc, Report, RespirationBlock,
    RhythmBlock, Segmentation, Sqi,
};
use segmenter::Events;

pub use quality::QualityReport;
pub use resample::{content_hash, resample_to_target};

/// The sampling rate used for the analysis.
pub const SAMPLE_RATE: u32 = 2000;

/// Event lists are capped at this many entries for transport.
pub const MAX_REPORTED_EVENTS: usize = 200;

/// A single-channel audio buffer with its sampling rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PcgSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcgSignal {
    #[must_use]
    #[inline]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Seconds of audio in the buffer.
    #[must_use]
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    fn validated(&self) -> AnalysisResult<()> {
        if self.samples.is_empty() || self.sample_rate == 0 {
            return Err(AnalysisError::Empty);
        }
        if self.samples.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::NonFinite);
        }
        Ok(())
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0., 1.)
}

/// Analyze a buffer into the full report.
///
/// `use_hsmm` selects the semi-Markov segmenter; otherwise the alternating
/// envelope-peak heuristic assigns the events. Both feed the same
/// downstream extractors.
///
/// # Errors
///
/// [`AnalysisError::Empty`] for an empty buffer or zero sample rate,
/// [`AnalysisError::NonFinite`] when the input contains NaN or infinity.
#[allow(clippy::missing_inline_in_public_items)]
#[allow(clippy::too_many_lines)]
pub fn analyze(signal: &PcgSignal, use_hsmm: bool) -> AnalysisResult<Report> {
    signal.validated()?;
    let resampled = resample_to_target(&signal.samples, signal.sample_rate);
    let y = &resampled.samples[..];
    let sr = resampled.sample_rate;
    let duration = resampled.duration_sec();

    let env = envelope::smoothed_abs(y, sr);
    let env_norm = envelope::normalize_peak(&env);
    let hr = heart_rate::estimate(&env_norm, sr);

    let events = if use_hsmm {
        segmenter::segment_with_hr(y, &env, sr, hr).events
    } else {
        // the picker works best on a band-limited envelope; murmur and QC
        // features still see the raw buffer
        let filtered = kernels::band_pass_fir(y, sr, 25., 400., 101);
        let picker_env = envelope::normalize_peak(&envelope::smoothed_abs(&filtered, sr));
        segmenter::heuristic_events(&picker_env, sr, &hr)
    };

    if events.cycles() < 2 {
        log::warn!(
            "segmentation found {} S1 / {} S2 events; cycle metrics will be sparse",
            events.s1.len(),
            events.s2.len()
        );
    }

    let intervals = cycles::intervals(&events, sr);
    let splits = cycles::s2_splits(y, &events.s2, sr);
    let snaps = cycles::a2_os(y, &events.s2, sr);

    let (murmur_summary, (event_features, (resp_block, qc))) = rayon::join(
        || {
            let hi = welch_band_power(y, sr, 150., 400.);
            let lo = welch_band_power(y, sr, 20., 150.);
            let band_ratio = if lo > 0. { Some(hi / lo) } else { None };
            murmur::characterize(y, &events, sr, band_ratio)
        },
        || {
            rayon::join(
                || extract_event_features(y, &env, &env_norm, &events, sr),
                || {
                    rayon::join(
                        || respiration_block(y, sr, &splits),
                        || qc_block(y, &env_norm, sr),
                    )
                },
            )
        },
    );

    let sounds = cycles::extra_sounds(y, &events, sr);
    let mut rhythm_stats = rhythm::from_rr(&intervals.rr);
    if f64::from(hr.periodicity) < tuning::Tuning::FALLBACK_MIN_PERIODICITY {
        // an arrhythmia call needs believable cycles to begin with; event
        // streams decoded out of aperiodic input produce AF-like RR spreads
        rhythm_stats.af_suspected = false;
        rhythm_stats.ectopy_suspected = false;
    }

    let confidence = clamp01((qc.snr_db + 5.) / 15.) * clamp01(qc.usable_pct);
    let murmur_block = MurmurBlock {
        present: murmur_summary.present(),
        phase: murmur_summary.phase(),
        systolic: murmur_summary.systolic.clone().into(),
        diastolic: murmur_summary.diastolic.clone().into(),
        grade_proxy: murmur_summary.grade_proxy,
        confidence,
    };

    #[allow(clippy::cast_precision_loss)]
    let opening_snap_prob = clamp01(snaps.len() as f64 / events.s2.len().max(1) as f64);
    let additional_sounds = AdditionalSounds {
        s3_prob: sounds.s3_prob(),
        s4_prob: sounds.s4_prob(),
        s3_cycles: sounds.s3_hits,
        s4_cycles: sounds.s4_hits,
        ejection_click_prob: sounds.ejection_click_prob(),
        mid_systolic_click_prob: sounds.mid_systolic_click_prob(),
        opening_snap_prob,
    };

    let split_ms: Vec<f64> = splits.iter().map(|s| s.ms).collect();
    let snap_ms = if snaps.is_empty() {
        None
    } else {
        Some(kernels::median_f64(&snaps))
    };

    Ok(Report {
        duration_sec: duration,
        hr_bpm: hr.bpm.map(f64::from),
        rr_mean_sec: series_mean(&intervals.rr),
        rr_std_sec: series_std(&intervals.rr),
        systole_ms: series_mean(&intervals.systole).map(|v| v * 1000.),
        diastole_ms: series_mean(&intervals.diastole).map(|v| v * 1000.),
        ds_ratio: intervals.ds_ratio(),
        s1_dur_ms: event_features.s1_dur_ms,
        s2_dur_ms: event_features.s2_dur_ms,
        s2_split_ms: if split_ms.is_empty() {
            None
        } else {
            Some(kernels::median_f64(&split_ms))
        },
        a2_os_ms: snap_ms,
        s1_intensity: event_features.s1_intensity,
        s2_intensity: event_features.s2_intensity,
        sys_high_freq_energy: event_features.sys_energy,
        dia_high_freq_energy: event_features.dia_energy,
        sys_shape: event_features.sys_shape,
        qc,
        events: EventIndices {
            s1: report::truncate_events(events.s1.clone()),
            s2: report::truncate_events(events.s2.clone()),
        },
        extras: Extras {
            respiration: resp_block,
            additional_sounds,
            murmur: murmur_block,
            rhythm: RhythmBlock::from(rhythm_stats),
        },
    })
}

/// Segment a buffer without assembling the full report.
///
/// # Errors
///
/// Same input validation as [`analyze`].
#[allow(clippy::missing_inline_in_public_items)]
pub fn segment(signal: &PcgSignal) -> AnalysisResult<Segmentation> {
    signal.validated()?;
    let resampled = resample_to_target(&signal.samples, signal.sample_rate);
    let y = &resampled.samples[..];
    let sr = resampled.sample_rate;

    let env = envelope::smoothed_abs(y, sr);
    let outcome = segmenter::segment(y, &env, sr);
    let intervals = cycles::intervals(&outcome.events, sr);

    let cycle_cv = if intervals.rr.is_empty() {
        None
    } else {
        let mean = cycles::mean_f64(&intervals.rr);
        Some(cycles::population_std_f64(&intervals.rr) / (mean + 1e-9))
    };
    let cv_eff = cycle_cv.unwrap_or(1.);
    let salience = f64::from(outcome.hr.salience);
    let seg_quality = clamp01(0.6f64.mul_add(salience, 0.4 * (1. - cv_eff.min(1.))));

    // frame-level proxy: band tilt over envelope spread
    let hf_mean = f64::from(kernels::mean(&outcome.features.raw_hf_ratio));
    let env_sd = f64::from(population_std(&outcome.features.raw_env));
    let snr_db_approx = 10. * ((hf_mean + 1e-9) / (env_sd * env_sd + 1e-9)).log10();

    Ok(Segmentation {
        sample_rate: sr,
        frame_rate: f64::from(outcome.features.grid.frame_rate(sr)),
        hr_bpm: outcome.hr.bpm.map(f64::from),
        hr_salience: salience,
        events: EventIndices {
            s1: report::truncate_events(outcome.events.s1),
            s2: report::truncate_events(outcome.events.s2),
        },
        rr_mean_sec: series_mean(&intervals.rr),
        rr_std_sec: series_std(&intervals.rr),
        systole_ms: series_mean(&intervals.systole).map(|v| v * 1000.),
        diastole_ms: series_mean(&intervals.diastole).map(|v| v * 1000.),
        ds_ratio: intervals.ds_ratio(),
        sqi: Sqi {
            hr_salience: salience,
            cycle_cv,
            seg_quality,
            snr_db_approx,
        },
    })
}

/// Run the quality gate on a buffer.
///
/// # Errors
///
/// Same input validation as [`analyze`].
#[allow(clippy::missing_inline_in_public_items)]
pub fn assess_quality(signal: &PcgSignal) -> AnalysisResult<QualityReport> {
    signal.validated()?;
    let resampled = resample_to_target(&signal.samples, signal.sample_rate);
    Ok(quality::assess(&resampled.samples, resampled.sample_rate))
}

struct EventFeatures {
    s1_intensity: Option<f64>,
    s2_intensity: Option<f64>,
    s1_dur_ms: Option<f64>,
    s2_dur_ms: Option<f64>,
    sys_energy: Option<f64>,
    dia_energy: Option<f64>,
    sys_shape: Option<murmur::Shape>,
}

fn extract_event_features(
    y: &[f32],
    env: &[f32],
    env_norm: &[f32],
    events: &Events,
    sr: u32,
) -> EventFeatures {
    // the Shannon envelope sharpens event edges for the width measurement
    let shannon_env = envelope::shannon(y, sr);
    let (sys_energy, dia_energy) = cycles::high_freq_energies(y, events, sr);
    let sys_shape = cycles::systolic_envelope_slope(env, events).map(|slope| {
        if slope > tuning::Tuning::SYS_SHAPE_SLOPE {
            murmur::Shape::Crescendo
        } else if slope < -tuning::Tuning::SYS_SHAPE_SLOPE {
            murmur::Shape::Decrescendo
        } else {
            murmur::Shape::Plateau
        }
    });
    EventFeatures {
        s1_intensity: cycles::intensity(env_norm, &events.s1),
        s2_intensity: cycles::intensity(env_norm, &events.s2),
        s1_dur_ms: cycles::event_width_ms(&shannon_env, &events.s1, sr),
        s2_dur_ms: cycles::event_width_ms(&shannon_env, &events.s2, sr),
        sys_energy,
        dia_energy,
        sys_shape,
    }
}

fn respiration_block(y: &[f32], sr: u32, splits: &[cycles::S2Split]) -> RespirationBlock {
    let resp = respiration::estimate(y, sr);
    if splits.is_empty() {
        return RespirationBlock {
            resp_rate: resp.rate,
            resp_dominance: resp.rate.map(|_| resp.dominance),
            s2_split_type: None,
            s2_split_corr: None,
        };
    }
    let corr = respiration::split_correlation(&resp, splits);
    RespirationBlock {
        resp_rate: resp.rate,
        resp_dominance: resp.rate.map(|_| resp.dominance),
        s2_split_type: respiration::classify_split(splits, corr),
        s2_split_corr: Some(corr),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn qc_block(y: &[f32], env_norm: &[f32], sr: u32) -> Qc {
    // signal band over rumble; the asymmetric floors keep an all-zero
    // buffer at a finite negative SNR instead of a spurious 0 dB
    let sig = welch_band_power(y, sr, 25., 400.);
    let noise = welch_band_power(y, sr, 0., 25.);
    let snr_db = 10. * ((sig + 1e-12) / (noise + 1e-9)).log10();

    let env_lf = moving_average(env_norm, 1.max((0.3 * sr as f32) as usize));
    let spread = |series: &[f32]| -> f64 {
        let med = median(series);
        series
            .iter()
            .map(|&v| f64::from(v - med) * f64::from(v - med))
            .sum::<f64>()
            / series.len().max(1) as f64
    };
    let motion_pct = clamp01(spread(&env_lf) / (spread(env_norm) + 1e-9));

    let usable_threshold =
        tuning::Tuning::USABLE_STD_GAIN.mul_add(population_std(env_norm), median(env_norm));
    let usable_pct = env_norm
        .iter()
        .filter(|&&v| v > usable_threshold)
        .count() as f64
        / env_norm.len().max(1) as f64;

    Qc {
        snr_db,
        motion_pct,
        usable_pct,
        contact_noise_suspected: snr_db < tuning::Tuning::CONTACT_SNR_DB
            || motion_pct > tuning::Tuning::CONTACT_MOTION,
    }
}

fn series_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(cycles::mean_f64(values))
    }
}

fn series_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(cycles::population_std_f64(values))
    }
}

#[cfg(test)]
pub(crate) mod test_signals {
    //! Synthetic buffers shared across the module tests.

    use std::f32::consts::PI;

    /// Deterministic uniform values in [-1, 1] (64-bit LCG).
    pub(crate) fn noise_units(n: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).max(1);
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                #[allow(clippy::cast_precision_loss)]
                let unit = ((state >> 33) as f32) / ((1u64 << 31) as f32);
                unit.mul_add(2., -1.)
            })
            .collect()
    }

    /// White noise at a modest amplitude.
    pub(crate) fn white_noise(n: usize, seed: u64) -> Vec<f32> {
        noise_units(n, seed).into_iter().map(|v| 0.3 * v).collect()
    }

    /// Pure sine.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn sine(freq: f32, seconds: f32, sr: u32) -> Vec<f32> {
        let n = (seconds * sr as f32) as usize;
        (0..n)
            .map(|i| f32::sin(2. * PI * freq * i as f32 / sr as f32))
            .collect()
    }

    /// Band-limited (150-400 Hz) noise for murmur overlays.
    pub(crate) fn band_noise(n: usize, sr: u32, seed: u64) -> Vec<f32> {
        crate::kernels::band_pass_fir(&white_noise(n, seed), sr, 150., 400., 101)
    }

    /// An S1/S2 click train: a 60 Hz burst opens each cycle and a softer
    /// 80 Hz burst lands a third of a cycle later. With `murmur`, a
    /// constant-power frequency-wobbled tone inside the murmur band fills
    /// each systole.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn heart_train(bpm: f32, seconds: f32, sr: u32, murmur: bool) -> Vec<f32> {
        let n = (seconds * sr as f32) as usize;
        let cycle = (60. / bpm * sr as f32) as usize;
        let sys = cycle / 3;
        let mut y = vec![0f32; n];

        let mut burst = |at: usize, freq: f32, width: usize, amp: f32, y: &mut Vec<f32>| {
            for i in at..(at + width).min(n) {
                let t = (i - at) as f32 / sr as f32;
                // raised-cosine fade keeps the burst band-limited
                let fade = 0.5 - 0.5 * f32::cos(2. * PI * (i - at) as f32 / width as f32);
                y[i] += amp * fade * f32::sin(2. * PI * freq * t);
            }
        };

        let s1_width = (0.04 * sr as f32) as usize;
        let s2_width = (0.03 * sr as f32) as usize;

        let mut at = 0usize;
        while at + cycle <= n {
            burst(at, 60., s1_width, 1.0, &mut y);
            burst(at + sys, 80., s2_width, 0.5, &mut y);
            if murmur {
                // 250 Hz center wobbling +/- ~40 Hz: murmur-band energy with
                // a flat power profile across the systole
                for i in at..(at + sys + s2_width).min(n) {
                    let t = i as f32 / sr as f32;
                    let phase = 2. * PI * 250. * t + 30. * f32::sin(2. * PI * 1.3 * t);
                    y[i] += 0.35 * f32::sin(phase);
                }
            }
            at += cycle;
        }
        y
    }
}
