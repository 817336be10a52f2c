//! Run configuration

use crate::aligner::BOUNDARY_MARGIN_SECS;
use std::path::PathBuf;

/// Default location of the Silero VAD model
pub const DEFAULT_MODEL_PATH: &str = "models/silero_vad.onnx";

/// Clip container written for each word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Mp3,
    Wav,
}

/// Speech detector settings
#[derive(Debug, Clone, PartialEq)]
pub struct VadParams {
    /// Speech probability at or above which a window counts as speech (0.0 to 1.0)
    pub threshold: f32,
    /// Silence needed after speech before a segment is closed
    pub min_silence_duration_ms: u32,
    /// Segments shorter than this are dropped
    pub min_speech_duration_ms: u32,
    /// Segments longer than this are dropped
    pub max_speech_duration_s: f32,
    /// Padding added to both ends of each segment
    pub speech_pad_ms: u32,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_silence_duration_ms: 300,
            min_speech_duration_ms: 150,
            max_speech_duration_s: f32::INFINITY,
            speech_pad_ms: 30,
        }
    }
}

/// Everything a split run needs besides its inputs
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Directory receiving `desc.json` and the clips
    pub output_dir: PathBuf,
    /// Seconds added before and after each detected segment
    pub margin_secs: f64,
    pub format: ExportFormat,
    pub vad: VadParams,
    pub vad_model: PathBuf,
    /// Read `<stem>.json` boundaries from here instead of running the VAD
    pub segments_dir: Option<PathBuf>,
    /// Write detected boundaries next to the clips as `<stem>.segments.json`
    pub save_segments: bool,
}

impl SplitConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            margin_secs: BOUNDARY_MARGIN_SECS,
            format: ExportFormat::default(),
            vad: VadParams::default(),
            vad_model: PathBuf::from(DEFAULT_MODEL_PATH),
            segments_dir: None,
            save_segments: false,
        }
    }
}
