//! Audio utilities
//!
//! This module provides the decoded audio buffer the splitter works on, file
//! decoding via symphonia, and the conversions the VAD model needs (down-mix
//! to mono, resampling).

use crate::{Error, Result};
use log::{debug, warn};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio held in memory
///
/// Samples are interleaved f32 in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Wrap interleaved samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate or channel count is zero, or the sample
    /// count is not a whole number of frames.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::InvalidInput(format!(
                "Invalid audio format: {} Hz, {} channels",
                sample_rate, channels
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::InvalidInput(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index at a millisecond offset, clamped to `[0, frames]`
    fn frame_at_ms(&self, ms: i64) -> usize {
        if ms <= 0 {
            return 0;
        }
        let frame = (ms as u128 * self.sample_rate as u128 / 1000) as usize;
        frame.min(self.frames())
    }

    /// Copy out the millisecond range `[start_ms, end_ms)`.
    ///
    /// The range is clamped to the buffer: a negative start begins at zero and
    /// an end past the last frame stops there. An empty or inverted range
    /// yields an empty buffer.
    pub fn slice_ms(&self, start_ms: i64, end_ms: i64) -> AudioBuffer {
        let start = self.frame_at_ms(start_ms);
        let end = self.frame_at_ms(end_ms).max(start);
        let ch = self.channels as usize;

        AudioBuffer {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> AudioBuffer {
        if self.channels == 1 {
            return self.clone();
        }
        let ch = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect();

        AudioBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Resample to `target_rate`, keeping the channel layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the resampler cannot be built or fails.
    pub fn resample(&self, target_rate: u32) -> Result<AudioBuffer> {
        if self.sample_rate == target_rate || self.is_empty() {
            return Ok(AudioBuffer {
                samples: self.samples.clone(),
                sample_rate: target_rate,
                channels: self.channels,
            });
        }

        debug!(
            "Resampling {} frames from {}Hz to {}Hz",
            self.frames(),
            self.sample_rate,
            target_rate
        );

        let ch = self.channels as usize;
        let planar: Vec<Vec<f32>> = (0..ch)
            .map(|c| self.samples.iter().skip(c).step_by(ch).copied().collect())
            .collect();

        let mut resampler = FastFixedIn::<f32>::new(
            target_rate as f64 / self.sample_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            self.frames(),
            ch,
        )
        .map_err(|e| Error::AudioProcessing(format!("Failed to create resampler: {}", e)))?;

        let output = resampler
            .process(&planar, None)
            .map_err(|e| Error::AudioProcessing(format!("Resampling failed: {}", e)))?;

        let frames = output.first().map_or(0, Vec::len);
        let mut samples = Vec::with_capacity(frames * ch);
        for i in 0..frames {
            for channel in &output {
                samples.push(channel[i]);
            }
        }

        Ok(AudioBuffer {
            samples,
            sample_rate: target_rate,
            channels: self.channels,
        })
    }
}

/// Decode an audio file into memory
///
/// The container is probed from the file contents with the extension as a
/// hint. Packets that fail to decode are skipped with a warning.
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be opened
/// * The format is not recognized or has no audio track
/// * The track has no sample rate
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    debug!("Decoding audio file {:?}", path);

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::AudioProcessing(format!("Cannot probe {:?}: {}", path, e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::AudioProcessing(format!("No audio track in {:?}", path)))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::AudioProcessing(format!("No decoder for {:?}: {}", path, e)))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::AudioProcessing(format!("Error reading {:?}: {}", path, e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(Error::AudioProcessing(format!("Error decoding {:?}: {}", path, e))),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * spec.channels.count() {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::AudioProcessing(format!("Unknown sample rate in {:?}", path)))?;
    let audio = AudioBuffer::new(samples, sample_rate, channels.unwrap_or(1))?;

    debug!(
        "Decoded {:?}: {} frames, {}Hz, {} channels ({:.2}s)",
        path,
        audio.frames(),
        audio.sample_rate(),
        audio.channels(),
        audio.duration_secs()
    );
    Ok(audio)
}
