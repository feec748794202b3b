//! JSON-shaped result types. Field names follow the wire casing exactly;
//! every optional metric drops out of the payload when it is undefined.

use serde::{Deserialize, Serialize};

use crate::murmur::{Extent, Phase, Shape};
use crate::respiration::SplitType;

/// Top-level analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub duration_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_mean_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_std_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systole_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastole_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ds_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s1_dur_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2_dur_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2_split_ms: Option<f64>,
    #[serde(rename = "a2OsMs", skip_serializing_if = "Option::is_none")]
    pub a2_os_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s1_intensity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2_intensity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_high_freq_energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dia_high_freq_energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_shape: Option<Shape>,
    pub qc: Qc,
    pub events: EventIndices,
    pub extras: Extras,
}

/// Recording-condition block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qc {
    pub snr_db: f64,
    pub motion_pct: f64,
    pub usable_pct: f64,
    pub contact_noise_suspected: bool,
}

/// S1/S2 sample indices, truncated for transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIndices {
    pub s1: Vec<usize>,
    pub s2: Vec<usize>,
}

/// Derived-feature blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extras {
    pub respiration: RespirationBlock,
    #[serde(rename = "additionalSounds")]
    pub additional_sounds: AdditionalSounds,
    pub murmur: MurmurBlock,
    pub rhythm: RhythmBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespirationBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_dominance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2_split_type: Option<SplitType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2_split_corr: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalSounds {
    pub s3_prob: f64,
    pub s4_prob: f64,
    pub s3_cycles: usize,
    pub s4_cycles: usize,
    pub ejection_click_prob: f64,
    pub mid_systolic_click_prob: f64,
    pub opening_snap_prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MurmurBlock {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub systolic: MurmurSideBlock,
    pub diastolic: MurmurSideBlock,
    pub grade_proxy: u8,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MurmurSideBlock {
    pub present: bool,
    pub extent: Extent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(rename = "pitchHz", skip_serializing_if = "Option::is_none")]
    pub pitch_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band_ratio: Option<f64>,
    pub coverage: f64,
}

impl From<crate::murmur::SideSummary> for MurmurSideBlock {
    #[inline]
    fn from(side: crate::murmur::SideSummary) -> Self {
        Self {
            present: side.present,
            extent: side.extent,
            shape: side.shape,
            pitch_hz: side.pitch_hz,
            band_ratio: side.band_ratio,
            coverage: side.coverage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmBlock {
    #[serde(rename = "rrCV", skip_serializing_if = "Option::is_none")]
    pub rr_cv: Option<f64>,
    #[serde(rename = "pNN50", skip_serializing_if = "Option::is_none")]
    pub pnn50: Option<f64>,
    #[serde(rename = "sampleEntropy", skip_serializing_if = "Option::is_none")]
    pub sample_entropy: Option<f64>,
    #[serde(rename = "poincareSD1", skip_serializing_if = "Option::is_none")]
    pub poincare_sd1: Option<f64>,
    #[serde(rename = "poincareSD2", skip_serializing_if = "Option::is_none")]
    pub poincare_sd2: Option<f64>,
    #[serde(rename = "afSuspected")]
    pub af_suspected: bool,
    #[serde(rename = "ectopySuspected")]
    pub ectopy_suspected: bool,
}

impl From<crate::rhythm::RhythmStats> for RhythmBlock {
    #[inline]
    fn from(stats: crate::rhythm::RhythmStats) -> Self {
        Self {
            rr_cv: stats.rr_cv,
            pnn50: stats.pnn50,
            sample_entropy: stats.sample_entropy,
            poincare_sd1: stats.poincare_sd1,
            poincare_sd2: stats.poincare_sd2,
            af_suspected: stats.af_suspected,
            ectopy_suspected: stats.ectopy_suspected,
        }
    }
}

/// Standalone segmentation result (the `segment` operation's payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segmentation {
    pub sample_rate: u32,
    pub frame_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_bpm: Option<f64>,
    pub hr_salience: f64,
    pub events: EventIndices,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_mean_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr_std_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systole_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastole_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ds_ratio: Option<f64>,
    pub sqi: Sqi,
}

/// Segmentation quality indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sqi {
    pub hr_salience: f64,
    #[serde(rename = "cycleCV", skip_serializing_if = "Option::is_none")]
    pub cycle_cv: Option<f64>,
    pub seg_quality: f64,
    pub snr_db_approx: f64,
}

/// Cap an event list for transport.
pub(crate) fn truncate_events(mut events: Vec<usize>) -> Vec<usize> {
    events.truncate(crate::MAX_REPORTED_EVENTS);
    events
}
