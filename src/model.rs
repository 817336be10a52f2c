//! Silero VAD model implementation
//!
//! This module wraps the Silero VAD ONNX model (v5 interface) using the ONNX
//! runtime. The model scores one fixed-size window of audio at a time and
//! carries a recurrent state between windows.

use crate::{Error, Result};
use log::{debug, info};
use ndarray::{arr0, Array1, Array2, Array3, ArrayView1, Axis, Ix3};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::path::Path;

const MODEL_URL: &str = "https://github.com/snakers4/silero-vad/raw/master/src/silero_vad/data/silero_vad.onnx";

/// Samples of the previous window prepended to each input at 16kHz
const CONTEXT_SIZE_16K: usize = 64;
/// Samples of the previous window prepended to each input at 8kHz
const CONTEXT_SIZE_8K: usize = 32;
/// Recurrent state width
const STATE_SIZE: usize = 128;

/// Window size in samples the model expects at `sampling_rate`
///
/// Returns `None` for rates the model does not support.
pub fn window_size(sampling_rate: u32) -> Option<usize> {
    match sampling_rate {
        16000 => Some(512),
        8000 => Some(256),
        _ => None,
    }
}

fn context_size(sampling_rate: u32) -> usize {
    if sampling_rate == 8000 {
        CONTEXT_SIZE_8K
    } else {
        CONTEXT_SIZE_16K
    }
}

/// Main Silero VAD model wrapper
///
/// # Example
///
/// ```no_run
/// use word_splitter::SileroVAD;
/// use ndarray::Array1;
/// use std::path::Path;
///
/// let mut model = SileroVAD::new(Path::new("models/silero_vad.onnx"))?;
/// let window = Array1::zeros(512); // 512 samples for 16kHz
/// let speech_prob = model.process_chunk(&window.view(), 16000)?;
/// # Ok::<(), word_splitter::Error>(())
/// ```
pub struct SileroVAD {
    session: Session,
    state: Array3<f32>,
    context: Array1<f32>,
    last_sr: u32,
}

impl SileroVAD {
    /// Create a new Silero VAD model from an ONNX file
    ///
    /// # Arguments
    ///
    /// * `model_path` - Path to the ONNX model file. If the file doesn't exist,
    ///                  the model is fetched from the Silero repository instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file cannot be loaded or downloaded, or the
    /// model is invalid.
    pub fn new(model_path: &Path) -> Result<Self> {
        let builder = Session::builder()
            .map_err(|e| Error::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::ModelLoad(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| Error::ModelLoad(e.to_string()))?;

        let committed = if model_path.exists() {
            info!("Loading model from local file: {:?}", model_path);
            builder.commit_from_file(model_path)
        } else {
            info!("Model not found locally. Downloading from {}", MODEL_URL);
            builder.commit_from_url(MODEL_URL)
        };
        let session = committed.map_err(|e| Error::ModelLoad(e.to_string()))?;

        info!("Model loaded successfully");

        Ok(Self {
            session,
            state: Array3::zeros((2, 1, STATE_SIZE)),
            context: Array1::zeros(CONTEXT_SIZE_16K),
            last_sr: 0,
        })
    }

    /// Reset the model's recurrent state
    ///
    /// This should be called before processing a new audio stream.
    pub fn reset_states(&mut self) {
        self.state = Array3::zeros((2, 1, STATE_SIZE));
        self.context = Array1::zeros(context_size(self.last_sr));
    }

    fn validate_input(&self, x: &ArrayView1<f32>, sr: u32) -> Result<()> {
        let expected = window_size(sr)
            .ok_or_else(|| Error::InvalidInput(format!("Unsupported sampling rate {}", sr)))?;
        if x.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Input chunk must be {} samples at {}Hz, got {}",
                expected,
                sr,
                x.len()
            )));
        }
        Ok(())
    }

    /// Process a single audio window
    ///
    /// # Arguments
    ///
    /// * `x` - Audio window (512 samples at 16kHz, 256 at 8kHz)
    /// * `sr` - Sampling rate of the audio
    ///
    /// # Returns
    ///
    /// Speech probability for the window
    ///
    /// # Errors
    ///
    /// Returns an error if the window size or sampling rate is invalid, or
    /// inference fails.
    pub fn process_chunk(&mut self, x: &ArrayView1<f32>, sr: u32) -> Result<f32> {
        self.validate_input(x, sr)?;

        if self.last_sr != sr {
            self.last_sr = sr;
            self.reset_states();
        }

        let ctx = self.context.len();
        let mut input = Array2::<f32>::zeros((1, ctx + x.len()));
        {
            let mut row = input.index_axis_mut(Axis(0), 0);
            row.slice_mut(ndarray::s![..ctx]).assign(&self.context);
            row.slice_mut(ndarray::s![ctx..]).assign(x);
        }

        debug!("Processing input tensor of shape {:?}", input.shape());

        let next_context = input.row(0).slice(ndarray::s![-(ctx as isize)..]).to_owned();

        let inputs = ort::inputs![
            "input" => Tensor::from_array(input)?,
            "state" => Tensor::from_array(self.state.clone())?,
            "sr" => Tensor::from_array(arr0(sr as i64))?,
        ];
        let outputs = self.session.run(inputs)?;

        let prob = outputs["output"]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::InvalidInput("Model returned an empty output".into()))?;

        self.state = outputs["stateN"]
            .try_extract_array::<f32>()?
            .to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        self.context = next_context;

        Ok(prob)
    }
}
