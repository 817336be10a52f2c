//! Clip encoders
//!
//! Each aligned word is written as its own file. [`Mp3Encoder`] is the
//! default; [`WavEncoder`] writes uncompressed 16-bit PCM.

use crate::audio::AudioBuffer;
use crate::config::ExportFormat;
use crate::{Error, Result};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use std::fmt::Debug;
use std::fs;
use std::path::Path;

/// Sample rates LAME accepts
const MP3_SAMPLE_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// Rate clips are resampled to when LAME does not accept theirs
const MP3_FALLBACK_RATE: u32 = 44100;

/// Space LAME may need when flushing its last frames
const MP3_FLUSH_RESERVE: usize = 7200;

/// Writes one clip to disk
pub trait ClipEncoder {
    /// File extension, without the dot
    fn extension(&self) -> &'static str;

    /// Encode `clip` into a new file at `path`, replacing any existing file
    fn encode(&self, clip: &AudioBuffer, path: &Path) -> Result<()>;
}

/// Encoder for `format`
pub fn encoder_for(format: ExportFormat) -> Box<dyn ClipEncoder> {
    match format {
        ExportFormat::Mp3 => Box::new(Mp3Encoder),
        ExportFormat::Wav => Box::new(WavEncoder),
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).max(-32768.0).min(32767.0) as i16
}

fn lame_error<E: Debug>(e: E) -> Error {
    Error::Encode(format!("LAME: {:?}", e))
}

/// MP3 clips through LAME, 128 kbps
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp3Encoder;

impl Mp3Encoder {
    /// Bring `clip` into a layout LAME accepts: one or two channels at a
    /// supported rate
    fn prepare(clip: &AudioBuffer) -> Result<AudioBuffer> {
        let clip = if clip.channels() > 2 {
            clip.to_mono()
        } else {
            clip.clone()
        };
        if MP3_SAMPLE_RATES.contains(&clip.sample_rate()) {
            Ok(clip)
        } else {
            clip.resample(MP3_FALLBACK_RATE)
        }
    }
}

impl ClipEncoder for Mp3Encoder {
    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn encode(&self, clip: &AudioBuffer, path: &Path) -> Result<()> {
        let clip = Self::prepare(clip)?;

        let mut builder = Builder::new().ok_or_else(|| Error::Encode("Cannot create LAME encoder".into()))?;
        builder.set_num_channels(clip.channels() as u8).map_err(lame_error)?;
        builder.set_sample_rate(clip.sample_rate()).map_err(lame_error)?;
        builder.set_brate(Bitrate::Kbps128).map_err(lame_error)?;
        builder.set_quality(Quality::Best).map_err(lame_error)?;
        let mut encoder = builder.build().map_err(lame_error)?;

        let pcm: Vec<i16> = clip.samples().iter().map(|&s| to_i16(s)).collect();
        let mut mp3 = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(clip.frames()));
        if clip.channels() == 1 {
            encoder.encode_to_vec(MonoPcm(&pcm), &mut mp3)
        } else {
            encoder.encode_to_vec(InterleavedPcm(&pcm), &mut mp3)
        }
        .map_err(lame_error)?;

        mp3.reserve(MP3_FLUSH_RESERVE);
        encoder.flush_to_vec::<FlushNoGap>(&mut mp3).map_err(lame_error)?;

        fs::write(path, mp3)?;
        Ok(())
    }
}

/// 16-bit PCM WAV clips through hound
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl ClipEncoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, clip: &AudioBuffer, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: clip.channels(),
            sample_rate: clip.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer =
            hound::WavWriter::create(path, spec).map_err(|e| Error::AudioProcessing(e.to_string()))?;

        for &sample in clip.samples() {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| Error::AudioProcessing(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::AudioProcessing(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wav_clip_round_trips_through_hound() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a01_word.wav");
        let clip = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0], 8000, 2).unwrap();

        WavEncoder.encode(&clip, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16384, -16384, 32767]);
    }

    #[test]
    fn mp3_preparation_fits_lame_constraints() {
        let surround = AudioBuffer::new(vec![0.0; 6 * 100], 44100, 6).unwrap();
        let prepared = Mp3Encoder::prepare(&surround).unwrap();
        assert_eq!(prepared.channels(), 1);
        assert_eq!(prepared.sample_rate(), 44100);

        let odd_rate = AudioBuffer::new(vec![0.0; 9600], 9600, 1).unwrap();
        assert_eq!(Mp3Encoder::prepare(&odd_rate).unwrap().sample_rate(), MP3_FALLBACK_RATE);
    }

    #[test]
    fn encoder_matches_format() {
        assert_eq!(encoder_for(ExportFormat::Mp3).extension(), "mp3");
        assert_eq!(encoder_for(ExportFormat::Wav).extension(), "wav");
    }

    #[test]
    fn mp3_clip_decodes_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a01_word.mp3");
        let tone: Vec<f32> = (0..8000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin())
            .collect();
        let clip = AudioBuffer::new(tone, 16000, 1).unwrap();

        Mp3Encoder.encode(&clip, &path).unwrap();

        assert!(fs::metadata(&path).unwrap().len() > 0);
        let decoded = crate::audio::decode_file(&path).unwrap();
        assert_eq!(decoded.sample_rate(), 16000);
        assert_eq!(decoded.channels(), 1);
        assert!(decoded.frames() > 0);
    }
}
