//! Rational polyphase resampling to the 2 kHz analysis rate, plus the
//! content hash used as the cross-request cache key.

use sha2::{Digest, Sha256};

use crate::{PcgSignal, SAMPLE_RATE};

/// Domain-separation tag mixed into the content hash.
const HASH_TAG: &[u8] = b"pcg-2k\0";

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Resample to exactly [`SAMPLE_RATE`] with a reduced up/down ratio and an
/// anti-aliasing box filter; pass-through when already at the target rate.
///
/// The filter is a centered box of `max(up, down)` taps evaluated over the
/// zero-stuffed input (edges zero-padded), which reduces to a plain
/// box-average decimator for integer ratios and to sample-hold for integer
/// upsampling. Output length is `ceil(n * up / down)`.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn resample_to_target(samples: &[f32], sr: u32) -> PcgSignal {
    if sr == SAMPLE_RATE || sr == 0 || samples.is_empty() {
        return PcgSignal {
            samples: samples.to_vec(),
            sample_rate: if sr == 0 { 0 } else { SAMPLE_RATE },
        };
    }

    let g = gcd(SAMPLE_RATE, sr);
    let up = (SAMPLE_RATE / g) as usize;
    let down = (sr / g) as usize;
    let n = samples.len();

    let taps = up.max(down);
    let center = (taps - 1) / 2;
    #[allow(clippy::cast_precision_loss)]
    let gain = up as f64 / taps as f64;

    let out_len = (n * up).div_ceil(down);
    let mut out = Vec::with_capacity(out_len);
    for m in 0..out_len {
        // inclusive window [t - taps + 1 + center, t + center] in the
        // zero-stuffed domain, mirroring a `same` box convolution
        let t = m * down;
        let win_hi = t + center;
        let win_lo = (t + center + 1).saturating_sub(taps);
        // input indices i with i * up inside the window
        let i_lo = win_lo.div_ceil(up);
        let i_hi = (win_hi / up).min(n.saturating_sub(1));
        let mut acc = 0f64;
        let mut i = i_lo;
        while i <= i_hi {
            acc += f64::from(samples[i]);
            i += 1;
        }
        #[allow(clippy::cast_possible_truncation)]
        out.push((acc * gain) as f32);
    }

    PcgSignal {
        samples: out,
        sample_rate: SAMPLE_RATE,
    }
}

/// Content hash of a resampled buffer: SHA-256 over the tag, the
/// little-endian sample rate, and the raw little-endian f32 samples,
/// truncated to 32 lowercase hex digits.
#[must_use]
#[allow(clippy::missing_inline_in_public_items)]
pub fn content_hash(signal: &PcgSignal) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_TAG);
    hasher.update(signal.sample_rate.to_le_bytes());
    let mut bytes = Vec::with_capacity(signal.samples.len() * 4);
    for &s in &signal.samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_pass_through_at_target_rate() {
        let samples = vec![0.1f32, -0.2, 0.3];
        let out = resample_to_target(&samples, SAMPLE_RATE);
        assert_eq!(out.sample_rate, SAMPLE_RATE);
        assert_eq!(out.samples, samples);
        // applying it twice is the identity
        let again = resample_to_target(&out.samples, out.sample_rate);
        assert_eq!(again.samples, out.samples);
    }

    #[rstest]
    #[case::cd_quality(44_100, 44_100)]
    #[case::dvd(48_000, 12_000)]
    #[case::double(4_000, 10_000)]
    #[case::upsample(1_000, 5_000)]
    #[case::odd(22_050, 7_321)]
    fn test_output_length_within_one(#[case] sr: u32, #[case] n: usize) {
        let samples = vec![0.5f32; n];
        let out = resample_to_target(&samples, sr);
        assert_eq!(out.sample_rate, SAMPLE_RATE);
        let expected = (n as f64 * f64::from(SAMPLE_RATE) / f64::from(sr)).round();
        let got = out.samples.len() as f64;
        assert!(
            (got - expected).abs() <= 1.,
            "length {got} not within 1 of {expected} (sr={sr})"
        );
    }

    #[test]
    fn test_decimation_preserves_dc() {
        let samples = vec![0.25f32; 8_000];
        let out = resample_to_target(&samples, 4_000);
        // interior of a constant signal stays constant through a box filter
        let mid = out.samples[out.samples.len() / 2];
        assert!((mid - 0.25).abs() < 1e-3, "{mid} !~= 0.25");
    }

    #[test]
    fn test_hash_is_stable_and_input_sensitive() {
        let a = PcgSignal {
            samples: vec![0.1, 0.2, 0.3],
            sample_rate: SAMPLE_RATE,
        };
        let h1 = content_hash(&a);
        let h2 = content_hash(&a);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let mut b = a.clone();
        b.samples[1] = 0.2000001;
        assert_ne!(content_hash(&b), h1);

        let mut c = a.clone();
        c.sample_rate = 4_000;
        assert_ne!(content_hash(&c), h1);
    }
}
