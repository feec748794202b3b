//! WAV decoding: u8 / s16 / s32 / f32 PCM to mono f32, mean over channels.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_U8,
    DecoderOptions,
};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::{ServiceError, ServiceResult};

/// Decode WAV bytes to `(sample_rate, mono_samples)`.
///
/// Only u8 (bias 128), s16, s32, and f32 sample formats are accepted;
/// anything else is an `unsupported wav dtype`. Multi-channel audio is
/// reduced to the per-frame mean over channels.
///
/// # Errors
///
/// [`ServiceError::WavDecode`] for malformed containers,
/// [`ServiceError::UnsupportedWavDtype`] for off-whitelist sample formats,
/// [`ServiceError::Empty`] when no samples decode.
pub fn decode_wav(bytes: Vec<u8>) -> ServiceResult<(u32, Vec<f32>)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ServiceError::WavDecode(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| ServiceError::WavDecode("no audio track found".into()))?;

    let codec = track.codec_params.codec;
    if codec != CODEC_TYPE_PCM_U8
        && codec != CODEC_TYPE_PCM_S16LE
        && codec != CODEC_TYPE_PCM_S32LE
        && codec != CODEC_TYPE_PCM_F32LE
    {
        return Err(ServiceError::UnsupportedWavDtype);
    }

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(0);
    let channels = codec_params.channels.map_or(1, |c| c.count()).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ServiceError::WavDecode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };
        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        #[allow(clippy::cast_precision_loss)]
        for frame in buf.samples().chunks(channels) {
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(ServiceError::Empty);
    }
    Ok((sample_rate, samples))
}
