//! Per-run control flow
//!
//! Load the word specification once, write its snapshot, then for each
//! recording: parse the descriptor, decode, segment, align and export.

use crate::aligner::{align, export_clips};
use crate::audio::decode_file;
use crate::config::SplitConfig;
use crate::descriptor::SourceDescriptor;
use crate::export::{encoder_for, ClipEncoder};
use crate::segments::{write_segments, Segmenter, SidecarSegmenter, VadSegmenter};
use crate::spreadsheet::load_word_spec;
use crate::word_spec::{WordSpecification, SNAPSHOT_FILE};
use crate::Result;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of one recording
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source: PathBuf,
    pub descriptor: SourceDescriptor,
    /// Segments reported by the segmenter, leading one included
    pub segment_count: usize,
    /// Clips written, in word order
    pub clips: Vec<PathBuf>,
}

impl FileReport {
    pub fn count_matched(&self) -> bool {
        self.segment_count == self.descriptor.expected_segment_count()
    }

    /// Whether every word in the range got a clip
    pub fn is_complete(&self) -> bool {
        self.clips.len() == self.descriptor.word_count()
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn clip_count(&self) -> usize {
        self.files.iter().map(|f| f.clips.len()).sum()
    }
}

/// Splits recordings into word clips
pub struct Splitter {
    config: SplitConfig,
    segmenter: Box<dyn Segmenter>,
    encoder: Box<dyn ClipEncoder>,
}

impl Splitter {
    /// Splitter writing clips in the configured format
    pub fn new(config: SplitConfig, segmenter: Box<dyn Segmenter>) -> Self {
        let encoder = encoder_for(config.format);
        Self::with_encoder(config, segmenter, encoder)
    }

    pub fn with_encoder(
        config: SplitConfig,
        segmenter: Box<dyn Segmenter>,
        encoder: Box<dyn ClipEncoder>,
    ) -> Self {
        Self {
            config,
            segmenter,
            encoder,
        }
    }

    /// Segmenter the configuration asks for: side-car files when a segments
    /// directory is set, the VAD model otherwise
    pub fn from_config(config: SplitConfig) -> Result<Self> {
        let segmenter: Box<dyn Segmenter> = match &config.segments_dir {
            Some(dir) => Box::new(SidecarSegmenter::new(dir)),
            None => Box::new(VadSegmenter::new(&config.vad_model, config.vad.clone())?),
        };
        Ok(Self::new(config, segmenter))
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Split every recording in `audio_files`.
    ///
    /// All file names are checked before anything is written. The snapshot
    /// is written next, then the recordings are processed in order. The
    /// first fatal error stops the run; clips written before it stay on disk.
    pub fn run<P: AsRef<Path>>(&mut self, spec: &WordSpecification, audio_files: &[P]) -> Result<RunReport> {
        let descriptors = parse_descriptors(audio_files)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let snapshot = self.config.output_dir.join(SNAPSHOT_FILE);
        spec.write_snapshot(&snapshot)?;
        info!("Wrote word specification snapshot {:?}", snapshot);

        let mut report = RunReport::default();
        for (path, descriptor) in audio_files.iter().zip(descriptors) {
            report.files.push(self.process_file(spec, path.as_ref(), descriptor)?);
        }

        info!(
            "Exported {} clips from {} recordings",
            report.clip_count(),
            report.files.len()
        );
        Ok(report)
    }

    fn process_file(
        &mut self,
        spec: &WordSpecification,
        path: &Path,
        descriptor: SourceDescriptor,
    ) -> Result<FileReport> {
        info!(
            "Extracting audio for {} words {}-{} from {:?}",
            descriptor.label, descriptor.first_index, descriptor.last_index, path
        );

        let audio = decode_file(path)?;
        let segments = self.segmenter.segment(path, &audio)?;

        if self.config.save_segments {
            let stem = path.file_stem().unwrap_or_default().to_string_lossy();
            write_segments(
                self.config.output_dir.join(format!("{}.segments.json", stem)),
                &segments,
            )?;
        }

        let plans = align(&descriptor, spec, &segments, self.config.margin_secs)?;
        let clips = export_clips(&plans, &audio, self.encoder.as_ref(), &self.config.output_dir)?;

        let report = FileReport {
            source: path.to_path_buf(),
            descriptor,
            segment_count: segments.len(),
            clips,
        };
        if !report.is_complete() {
            warn!(
                "{:?}: exported {} of {} words",
                path,
                report.clips.len(),
                report.descriptor.word_count()
            );
        }
        Ok(report)
    }
}

/// Descriptor of every recording, in order; the first bad name fails
pub fn parse_descriptors<P: AsRef<Path>>(audio_files: &[P]) -> Result<Vec<SourceDescriptor>> {
    audio_files.iter().map(SourceDescriptor::from_path).collect()
}

/// Load the specification at `spec_path` and split `audio_files` with the
/// segmenter and encoder `config` selects.
///
/// File names are checked before the segmenter is built, so a malformed name
/// fails without loading the VAD model.
pub fn split<P: AsRef<Path>>(config: SplitConfig, spec_path: &Path, audio_files: &[P]) -> Result<RunReport> {
    parse_descriptors(audio_files)?;
    let spec = load_word_spec(spec_path)?;
    let mut splitter = Splitter::from_config(config)?;
    splitter.run(&spec, audio_files)
}
