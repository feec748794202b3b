//! Every heuristic threshold used by the extractors, in one place.
//!
//! The values are design constants, not fitted parameters; tests reference
//! the same names so a retuned constant cannot silently diverge from the
//! behavior the tests pin down.

/// Named threshold table.
pub struct Tuning;

impl Tuning {
    // ------------------------------------------------------------- envelopes
    /// Smoothing window for the absolute/Shannon envelopes, in seconds.
    pub const ENVELOPE_SMOOTH_S: f32 = 0.05;

    // ------------------------------------------------- heart-rate estimation
    /// Autocorrelation search window, in seconds (200 down to ~33 BPM).
    pub const HR_MIN_LAG_S: f32 = 0.3;
    pub const HR_MAX_LAG_S: f32 = 1.8;
    /// Substituted into the duration priors when no peak was found.
    pub const DEFAULT_HR_BPM: f32 = 75.0;

    // --------------------------------------------------- heuristic event picker
    /// Peak threshold floor on the normalized envelope.
    pub const PEAK_FLOOR: f32 = 0.2;
    /// Peak threshold is `median + PEAK_STD_GAIN * std`.
    pub const PEAK_STD_GAIN: f32 = 0.5;
    /// Minimum gap between picked peaks, in seconds.
    pub const PEAK_MIN_GAP_S: f32 = 0.2;
    /// A candidate closer than this fraction of the expected cycle to the
    /// previous event alternates S1/S2 instead of opening a new cycle.
    pub const SAME_CYCLE_FRACTION: f32 = 0.7;

    // -------------------------------------------------------- cycle intervals
    /// Longest accepted systole, in seconds.
    pub const SYSTOLE_MAX_S: f64 = 0.8;

    // ------------------------------------------------------------ S2 split
    /// Accepted A2-P2 distance range, in milliseconds.
    pub const SPLIT_MIN_MS: f64 = 12.0;
    pub const SPLIT_MAX_MS: f64 = 80.0;
    /// The secondary peak must reach this fraction of the primary.
    pub const SPLIT_SECOND_PEAK_RATIO: f32 = 0.3;

    // ------------------------------------------------------------- A2-OS
    /// Opening-snap search window after S2, in seconds.
    pub const A2_OS_MIN_S: f32 = 0.04;
    pub const A2_OS_MAX_S: f32 = 0.12;
    /// Transient acceptance: peak above `median + A2_OS_Z * std`.
    pub const A2_OS_Z: f32 = 3.0;

    // --------------------------------------------------------- extra sounds
    /// Low-band power ratio above which an S3/S4 window counts as a hit.
    pub const S3_S4_SCORE: f64 = 2.5;
    /// TKEO z-score above which a click window counts as a hit.
    pub const CLICK_Z: f32 = 3.0;

    // ---------------------------------------------------------------- murmur
    /// Frame activity threshold is `median + MURMUR_ACTIVE_STD_GAIN * std`.
    pub const MURMUR_ACTIVE_STD_GAIN: f32 = 0.3;
    /// A cycle with more than this active fraction carries a murmur.
    pub const MURMUR_PRESENT_FRACTION: f32 = 0.3;
    /// Linear-fit slope beyond which the per-cycle shape leaves `plateau`.
    pub const MURMUR_SHAPE_SLOPE: f32 = 0.05;
    /// Whole-systole envelope shape uses a gentler slope cut.
    pub const SYS_SHAPE_SLOPE: f32 = 0.02;
    /// Coverage cut points for extent classification.
    pub const EXTENT_HOLO: f64 = 0.8;
    pub const EXTENT_EARLY: f64 = 0.4;
    pub const EXTENT_MID: f64 = 0.6;
    /// Grade-proxy cut points over `coverage * band_ratio`.
    pub const GRADE_CUTS: [f64; 3] = [0.1, 0.3, 0.6];

    // ----------------------------------------------- respiration / S2 split type
    /// Respiratory band, in Hz.
    pub const RESP_MIN_HZ: f32 = 0.08;
    pub const RESP_MAX_HZ: f32 = 0.8;
    /// Median split width above which the split is `wide`, in ms.
    pub const SPLIT_WIDE_MS: f64 = 50.0;
    /// `fixed` requires std below / mean above these, in ms.
    pub const SPLIT_FIXED_STD_MS: f64 = 10.0;
    pub const SPLIT_FIXED_MEAN_MS: f64 = 30.0;
    /// |correlation| above which the split follows (or opposes) respiration.
    pub const SPLIT_CORR_THRESHOLD: f64 = 0.2;

    // ---------------------------------------------------------------- rhythm
    pub const AF_RR_CV: f64 = 0.2;
    pub const AF_PNN50: f64 = 0.2;
    pub const AF_SAMPLE_ENTROPY: f64 = 0.5;
    pub const ECTOPY_PNN50_LO: f64 = 0.1;
    pub const ECTOPY_PNN50_HI: f64 = 0.3;
    pub const ECTOPY_RR_CV: f64 = 0.12;

    // --------------------------------------------------------------- quality
    /// Minimum usable recording length, in seconds.
    pub const MIN_DURATION_S: f64 = 3.0;
    /// Heart-band proportion below which energy is off-band.
    pub const LOW_BAND_FLOOR: f64 = 0.50;
    /// Normalized autocorrelation peak below which periodicity is weak.
    pub const PERIODICITY_FLOOR: f64 = 0.12;
    /// Cycle CV above which cycles are unstable.
    pub const CYCLE_CV_MAX: f64 = 0.8;
    /// Composite score weights: periodicity, SNR, band proportion, cycle CV.
    pub const SCORE_WEIGHTS: [f64; 4] = [0.4, 0.25, 0.2, 0.15];
    /// Composite score above which the recording passes outright.
    pub const SCORE_PASS: f64 = 0.5;
    /// Segmentation fallback: plausible HR range, minimum event count, and
    /// a residual-periodicity floor (a flat envelope decodes to a cyclic
    /// path too, but shows no prominent cycle lag at all).
    pub const FALLBACK_HR_MIN: f32 = 40.0;
    pub const FALLBACK_HR_MAX: f32 = 200.0;
    pub const FALLBACK_MIN_EVENTS: usize = 3;
    pub const FALLBACK_MIN_PERIODICITY: f64 = 0.05;
    /// Quality-gate peak picking threshold floor.
    pub const QUALITY_PEAK_FLOOR: f32 = 0.15;
    /// A quality-gate peak must rise this far above its window minimum.
    pub const PEAK_PROMINENCE: f32 = 0.05;

    // -------------------------------------------------------------------- QC
    /// `contactNoiseSuspected` when SNR (dB) is below this...
    pub const CONTACT_SNR_DB: f64 = 3.0;
    /// ...or the motion proportion exceeds this.
    pub const CONTACT_MOTION: f64 = 0.5;
    /// `usablePct` counts envelope samples above `median + gain * std`.
    pub const USABLE_STD_GAIN: f32 = 0.1;
}
