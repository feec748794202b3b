//! The analyzer surface: the four operations, with the cache consulted
//! before compute and written after, and per-request timings.

use std::time::Instant;

use auscult_analysis as analysis;
use auscult_analysis::PcgSignal;
use auscult_analysis::report::{Report, Segmentation};
use log::debug;
use serde::Serialize;

use crate::cache::CacheClient;
use crate::config::Settings;
use crate::errors::{ServiceError, ServiceResult};
use crate::media::MediaClient;
use crate::wav::decode_wav;

/// A report plus how it was produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analyzed {
    pub report: Report,
    /// Content hash the report is cached under.
    pub hash: String,
    pub cache_hit: bool,
    pub timings: Timings,
}

/// Wall-clock stage breakdown for the `X-Compute-Time`-style counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub total_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_ms: Option<f64>,
    pub compute_ms: f64,
}

fn ms_since(at: Instant) -> f64 {
    at.elapsed().as_secs_f64() * 1000.
}

fn is_content_hash(h: &str) -> bool {
    h.len() == 32 && h.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// The service facade over the analysis core and its two collaborators.
pub struct Api {
    media: MediaClient,
    cache: CacheClient,
}

impl Api {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            media: MediaClient::new(settings),
            cache: CacheClient::new(settings),
        }
    }

    /// Analyze raw PCM.
    ///
    /// The cache is read once (keyed by the provided hash when it is a
    /// well-formed content hash, else by the buffer's own); the store after
    /// compute is best-effort.
    ///
    /// # Errors
    ///
    /// `empty` for an empty buffer or zero rate; `error: ...` for
    /// non-finite samples.
    pub fn analyze_pcm(
        &self,
        sample_rate: u32,
        samples: &[f32],
        use_hsmm: bool,
        hash: Option<&str>,
        auth: Option<&str>,
    ) -> ServiceResult<Analyzed> {
        let started = Instant::now();
        validate(sample_rate, samples)?;
        self.run_analysis(sample_rate, samples, use_hsmm, hash, auth, started, None)
    }

    /// Fetch a WAV blob from the media store, decode it, and analyze it.
    ///
    /// # Errors
    ///
    /// `media_error` when the store cannot serve the blob, the WAV error
    /// kinds from [`decode_wav`], and everything [`Self::analyze_pcm`]
    /// returns.
    pub fn analyze_media(
        &self,
        media_id: &str,
        use_hsmm: bool,
        hash: Option<&str>,
        auth: Option<&str>,
    ) -> ServiceResult<Analyzed> {
        let started = Instant::now();
        let bytes = self.media.fetch(media_id, auth)?;
        let decode_started = Instant::now();
        let (sample_rate, samples) = decode_wav(bytes)?;
        let decode_ms = ms_since(decode_started);
        validate(sample_rate, &samples)?;
        self.run_analysis(
            sample_rate,
            &samples,
            use_hsmm,
            hash,
            auth,
            started,
            Some(decode_ms),
        )
    }

    /// Segment raw PCM with the semi-Markov decoder.
    ///
    /// # Errors
    ///
    /// Input validation errors only.
    pub fn segment_hsmm(&self, sample_rate: u32, samples: &[f32]) -> ServiceResult<Segmentation> {
        validate(sample_rate, samples)?;
        let signal = PcgSignal::new(samples.to_vec(), sample_rate);
        Ok(analysis::segment(&signal)?)
    }

    /// Quality-gate raw PCM.
    ///
    /// # Errors
    ///
    /// Input validation errors only.
    pub fn quality_pcm(
        &self,
        sample_rate: u32,
        samples: &[f32],
    ) -> ServiceResult<analysis::QualityReport> {
        validate(sample_rate, samples)?;
        let signal = PcgSignal::new(samples.to_vec(), sample_rate);
        Ok(analysis::assess_quality(&signal)?)
    }

    /// Quality-gate a media blob.
    ///
    /// # Errors
    ///
    /// `media_error` / WAV errors / input validation errors.
    pub fn quality_media(
        &self,
        media_id: &str,
        auth: Option<&str>,
    ) -> ServiceResult<analysis::QualityReport> {
        let bytes = self.media.fetch(media_id, auth)?;
        let (sample_rate, samples) = decode_wav(bytes)?;
        self.quality_pcm(sample_rate, &samples)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_analysis(
        &self,
        sample_rate: u32,
        samples: &[f32],
        use_hsmm: bool,
        hash: Option<&str>,
        auth: Option<&str>,
        started: Instant,
        decode_ms: Option<f64>,
    ) -> ServiceResult<Analyzed> {
        let resampled = analysis::resample_to_target(samples, sample_rate);
        let hash = hash
            .filter(|h| is_content_hash(h))
            .map_or_else(|| analysis::content_hash(&resampled), str::to_string);

        if let Some(report) = self.cache.get(&hash, auth) {
            debug!("cache hit for {hash}");
            return Ok(Analyzed {
                report,
                hash,
                cache_hit: true,
                timings: Timings {
                    total_ms: ms_since(started),
                    decode_ms,
                    compute_ms: 0.,
                },
            });
        }

        let compute_started = Instant::now();
        let report = analysis::analyze(&resampled, use_hsmm)?;
        let compute_ms = ms_since(compute_started);
        self.cache.put(&hash, &report, auth);
        debug!("analyzed {hash} in {compute_ms:.2} ms");

        Ok(Analyzed {
            report,
            hash,
            cache_hit: false,
            timings: Timings {
                total_ms: ms_since(started),
                decode_ms,
                compute_ms,
            },
        })
    }
}

fn validate(sample_rate: u32, samples: &[f32]) -> ServiceResult<()> {
    if samples.is_empty() || sample_rate == 0 {
        return Err(ServiceError::Empty);
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(ServiceError::NonFinite);
    }
    Ok(())
}
