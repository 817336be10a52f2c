//! Voice Activity Detection
//!
//! This module turns per-window speech probabilities into speech segments.
//! [`SpeechDetector`] is the pure state machine; [`VADIterator`] feeds it from
//! the Silero model.

use crate::config::VadParams;
use crate::model::{self, SileroVAD};
use crate::{Error, Result};
use log::debug;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Probability margin below the threshold before speech is considered over
const NEG_THRESHOLD_OFFSET: f32 = 0.15;

/// One detected speech segment
///
/// Times are in seconds from the start of the audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Speech segmentation over a stream of window probabilities
///
/// A segment opens on the first window at or above the threshold and closes
/// once the probability has stayed below `threshold - 0.15` for at least the
/// minimum silence duration. The segment ends where that silence began.
///
/// Padding is applied once the following segment is known: when the silence
/// between two segments is shorter than twice the padding, it is split at its
/// midpoint. A segment is therefore reported one segment late, and the last
/// one comes out of [`SpeechDetector::finish`].
#[derive(Debug, Clone)]
pub struct SpeechDetector {
    params: VadParams,
    sampling_rate: u32,
    window_size: usize,
    current_sample: usize,
    speech_start: Option<usize>,
    temp_end: Option<usize>,
    /// Accepted segment waiting for its end padding: padded start, raw end
    pending: Option<(usize, usize)>,
}

impl SpeechDetector {
    pub fn new(params: VadParams, sampling_rate: u32, window_size: usize) -> Self {
        Self {
            params,
            sampling_rate,
            window_size,
            current_sample: 0,
            speech_start: None,
            temp_end: None,
            pending: None,
        }
    }

    /// Forget all state; the next window starts at time zero
    pub fn reset(&mut self) {
        self.current_sample = 0;
        self.speech_start = None;
        self.temp_end = None;
        self.pending = None;
    }

    fn ms_to_samples(&self, ms: u32) -> usize {
        (ms as u64 * self.sampling_rate as u64 / 1000) as usize
    }

    /// Feed the probability of the next window
    ///
    /// Returns the previous segment once this window closes the next one.
    pub fn push(&mut self, prob: f32) -> Option<Segment> {
        let window_start = self.current_sample;
        self.current_sample += self.window_size;

        if prob >= self.params.threshold {
            self.temp_end = None;
            if self.speech_start.is_none() {
                debug!("Speech starts at sample {}", window_start);
                self.speech_start = Some(window_start);
            }
            return None;
        }

        let start = self.speech_start?;
        if prob >= self.params.threshold - NEG_THRESHOLD_OFFSET {
            return None;
        }

        let end = *self.temp_end.get_or_insert(window_start);
        if self.current_sample - end < self.ms_to_samples(self.params.min_silence_duration_ms) {
            return None;
        }

        self.speech_start = None;
        self.temp_end = None;
        self.accept(start, end)
    }

    /// Close the stream and return every segment still held back
    ///
    /// The last segment's padding stops at the end of the stream.
    pub fn finish(&mut self) -> Vec<Segment> {
        let limit = self.current_sample;
        let mut segments = Vec::with_capacity(2);

        if let Some(start) = self.speech_start.take() {
            let end = self.temp_end.take().unwrap_or(limit);
            segments.extend(self.accept(start, end));
        }
        if let Some((start, end)) = self.pending.take() {
            let pad = self.ms_to_samples(self.params.speech_pad_ms);
            segments.push(self.segment(start, (end + pad).min(limit)));
        }

        segments
    }

    /// Filter a raw segment by duration and hold it back for padding.
    /// Returns the segment it displaces, now fully padded.
    fn accept(&mut self, start: usize, end: usize) -> Option<Segment> {
        let length = end - start;
        if length < self.ms_to_samples(self.params.min_speech_duration_ms) {
            debug!("Dropping short speech {}..{}", start, end);
            return None;
        }
        if length as f32 / self.sampling_rate as f32 > self.params.max_speech_duration_s {
            debug!("Dropping long speech {}..{}", start, end);
            return None;
        }

        let pad = self.ms_to_samples(self.params.speech_pad_ms);
        let (previous, padded_start) = match self.pending.take() {
            Some((prev_start, prev_end)) => {
                let silence = start.saturating_sub(prev_end);
                let share = if silence < 2 * pad { silence / 2 } else { pad };
                (Some(self.segment(prev_start, prev_end + share)), start - share)
            }
            None => (None, start.saturating_sub(pad)),
        };

        self.pending = Some((padded_start, end));
        previous
    }

    fn segment(&self, start: usize, end: usize) -> Segment {
        let rate = self.sampling_rate as f64;
        Segment {
            start: start as f64 / rate,
            end: end as f64 / rate,
        }
    }
}

/// Iterator for processing audio in windows
///
/// Feeds each window through the Silero model and the speech detector.
///
/// # Example
///
/// ```no_run
/// use word_splitter::{SileroVAD, VADIterator, VadParams};
/// use ndarray::Array1;
/// use std::path::Path;
///
/// let model = SileroVAD::new(Path::new("models/silero_vad.onnx"))?;
/// let mut vad = VADIterator::new(model, VadParams::default(), 16000)?;
///
/// let audio = Array1::zeros(16000);
/// for ts in vad.get_speech_timestamps(&audio.view())? {
///     println!("Speech detected from {:.2}s to {:.2}s", ts.start, ts.end);
/// }
/// # Ok::<(), word_splitter::Error>(())
/// ```
pub struct VADIterator {
    model: SileroVAD,
    detector: SpeechDetector,
    sampling_rate: u32,
    window_size: usize,
}

impl VADIterator {
    /// Create a new VAD iterator
    ///
    /// # Errors
    ///
    /// Returns an error if the model does not support `sampling_rate`.
    pub fn new(model: SileroVAD, params: VadParams, sampling_rate: u32) -> Result<Self> {
        let window_size = model::window_size(sampling_rate).ok_or_else(|| {
            Error::InvalidInput(format!("Sampling rate must be 8kHz or 16kHz, got {}", sampling_rate))
        })?;
        Ok(Self {
            model,
            detector: SpeechDetector::new(params, sampling_rate, window_size),
            sampling_rate,
            window_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Reset the iterator state
    ///
    /// This should be called when processing a new audio stream.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.model.reset_states();
    }

    /// Process a single window and return a segment if one became final
    pub fn process_chunk(&mut self, x: &ArrayView1<f32>) -> Result<Option<Segment>> {
        let prob = self.model.process_chunk(x, self.sampling_rate)?;
        Ok(self.detector.push(prob))
    }

    /// Get speech segments for an entire mono recording
    ///
    /// The last partial window is zero-padded.
    pub fn get_speech_timestamps(&mut self, audio: &ArrayView1<f32>) -> Result<Vec<Segment>> {
        self.reset();
        let mut segments = Vec::new();

        for (i, window) in audio.exact_chunks(self.window_size).into_iter().enumerate() {
            debug!("Processing window at sample {}", i * self.window_size);
            segments.extend(self.process_chunk(&window)?);
        }

        let tail = audio.len() % self.window_size;
        if tail > 0 {
            let mut last = Array1::<f32>::zeros(self.window_size);
            last.slice_mut(ndarray::s![..tail])
                .assign(&audio.slice(ndarray::s![audio.len() - tail..]));
            segments.extend(self.process_chunk(&last.view())?);
        }

        segments.extend(self.detector.finish());
        Ok(segments)
    }
}
