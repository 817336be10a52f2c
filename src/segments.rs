//! Sources of word boundaries
//!
//! A [`Segmenter`] turns one decoded recording into its ordered list of
//! segments. The first segment is the leading boundary that precedes the
//! first word.

use crate::audio::AudioBuffer;
use crate::config::VadParams;
use crate::model::SileroVAD;
use crate::vad::{Segment, VADIterator};
use crate::{Error, Result};
use log::{debug, info};
use ndarray::ArrayView1;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sampling rate the VAD model runs at
pub const VAD_SAMPLE_RATE: u32 = 16000;

/// Produces the ordered segments of one recording
pub trait Segmenter {
    /// Segment `audio`, decoded from `source`
    fn segment(&mut self, source: &Path, audio: &AudioBuffer) -> Result<Vec<Segment>>;
}

/// Segments recordings with the Silero VAD model
pub struct VadSegmenter {
    vad: VADIterator,
}

impl VadSegmenter {
    /// Load the model at `model_path` (downloaded when missing)
    pub fn new(model_path: &Path, params: VadParams) -> Result<Self> {
        let model = SileroVAD::new(model_path)?;
        Ok(Self {
            vad: VADIterator::new(model, params, VAD_SAMPLE_RATE)?,
        })
    }
}

impl Segmenter for VadSegmenter {
    fn segment(&mut self, source: &Path, audio: &AudioBuffer) -> Result<Vec<Segment>> {
        info!("Detecting speech in {:?}", source);
        let mono = audio.to_mono().resample(VAD_SAMPLE_RATE)?;
        let segments = self.vad.get_speech_timestamps(&ArrayView1::from(mono.samples()))?;
        debug!("Detected {} segments in {:?}", segments.len(), source);
        Ok(segments)
    }
}

/// Reads precomputed segments from `<dir>/<stem>.json`
pub struct SidecarSegmenter {
    dir: PathBuf,
}

impl SidecarSegmenter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Side-car path for `source`
    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        self.dir.join(format!("{}.json", stem))
    }
}

impl Segmenter for SidecarSegmenter {
    fn segment(&mut self, source: &Path, _audio: &AudioBuffer) -> Result<Vec<Segment>> {
        let path = self.sidecar_path(source);
        info!("Reading segments for {:?} from {:?}", source, path);
        read_segments(path)
    }
}

/// Read a JSON array of `{start, end}` objects
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a segment does
/// not end after it starts.
pub fn read_segments<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let reader = BufReader::new(File::open(path)?);
    let segments: Vec<Segment> = serde_json::from_reader(reader)?;

    if let Some(bad) = segments.iter().find(|s| !(s.start < s.end)) {
        return Err(Error::InvalidInput(format!(
            "Segment must end after it starts: {:.3}s - {:.3}s",
            bad.start, bad.end
        )));
    }
    Ok(segments)
}

/// Write segments as a JSON array of `{start, end}` objects
pub fn write_segments<P: AsRef<Path>>(path: P, segments: &[Segment]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, segments)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sidecar_reads_segments_by_stem() {
        let dir = TempDir::new().unwrap();
        let segments = vec![
            Segment { start: 0.2, end: 0.9 },
            Segment { start: 1.5, end: 2.1 },
        ];
        write_segments(dir.path().join("he 1-1.json"), &segments).unwrap();

        let mut segmenter = SidecarSegmenter::new(dir.path());
        let audio = AudioBuffer::new(vec![], 8000, 1).unwrap();
        let loaded = segmenter.segment(Path::new("/in/he 1-1.wav"), &audio).unwrap();
        assert_eq!(loaded, segments);
    }

    #[test]
    fn rejects_inverted_segments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"start": 2.0, "end": 1.0}]"#).unwrap();
        assert!(matches!(read_segments(&path), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn missing_sidecar_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut segmenter = SidecarSegmenter::new(dir.path());
        let audio = AudioBuffer::new(vec![], 8000, 1).unwrap();
        assert!(matches!(
            segmenter.segment(Path::new("vav 1-2.wav"), &audio),
            Err(Error::Io(_))
        ));
    }
}
