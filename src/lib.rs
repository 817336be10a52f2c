//! Split a recording of spoken words into one named clip per word.
//!
//! The word list comes from a spreadsheet, the index range of a recording is
//! encoded in its file name, and word boundaries come from a voice activity
//! detector. See [`pipeline::Splitter`] for the per-file flow.

pub mod aligner;
pub mod audio;
pub mod config;
pub mod descriptor;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod segments;
pub mod spreadsheet;
pub mod vad;
pub mod word_spec;

pub use aligner::{align, ClipPlan, ExportRange, BOUNDARY_MARGIN_SECS};
pub use audio::AudioBuffer;
pub use config::{ExportFormat, SplitConfig, VadParams};
pub use descriptor::SourceDescriptor;
pub use model::SileroVAD;
pub use pipeline::{FileReport, RunReport, Splitter};
pub use segments::{Segmenter, SidecarSegmenter, VadSegmenter};
pub use vad::{Segment, SpeechDetector, VADIterator};
pub use word_spec::{Cell, WordEntry, WordSpecification};

/// Error types for the word splitter
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File name '{0}' does not match '<label> <first>-<last>'")]
    Format(String),
    #[error("Incomplete data in row {row}: {cells}")]
    DataIntegrity { row: usize, cells: String },
    #[error("No word entry for index {0}")]
    Lookup(u32),
    #[error("Model loading error: {0}")]
    ModelLoad(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
}

/// Result type for the word splitter
pub type Result<T> = std::result::Result<T, Error>;
