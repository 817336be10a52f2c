//! Segment alignment and clip export
//!
//! The detector's first segment precedes the first word and is dropped; the
//! rest pair up in order with the word indices named by the recording's
//! descriptor. Each pair is widened by a margin and written as its own clip.

use crate::audio::AudioBuffer;
use crate::descriptor::SourceDescriptor;
use crate::export::ClipEncoder;
use crate::vad::Segment;
use crate::word_spec::{WordEntry, WordSpecification};
use crate::{Error, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Padding added to both ends of a segment so word onsets and tails survive
pub const BOUNDARY_MARGIN_SECS: f64 = 0.3;

/// Millisecond range `[start_ms, end_ms)` cut for one clip
///
/// The range is not clamped here; it can start before zero or end past the
/// recording. [`AudioBuffer::slice_ms`] clamps on extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ExportRange {
    /// Widen `segment` by `margin_secs` on both sides, truncating to whole ms
    pub fn from_segment(segment: &Segment, margin_secs: f64) -> Self {
        let start = segment.start - margin_secs;
        let end = segment.end + margin_secs;
        Self {
            start_ms: (start * 1000.0) as i64,
            end_ms: (end * 1000.0) as i64,
        }
    }
}

/// One word paired with its segment, ready to export
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlan<'a> {
    pub word_index: u32,
    pub entry: &'a WordEntry,
    pub segment: Segment,
    pub range: ExportRange,
}

impl ClipPlan<'_> {
    /// `{code}_{primary_form}.{extension}`
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.entry.clip_stem(), extension)
    }
}

/// Compare the segment count with what the descriptor's range implies.
///
/// A mismatch is logged together with the raw segments and alignment goes on
/// regardless. Returns whether the count matched.
pub fn check_segment_count(descriptor: &SourceDescriptor, segments: &[Segment]) -> bool {
    let expected = descriptor.expected_segment_count();
    if segments.len() == expected {
        return true;
    }
    warn!(
        "{} {}-{}: has {} segments, expected {} (one leading + {} words)",
        descriptor.label,
        descriptor.first_index,
        descriptor.last_index,
        segments.len(),
        expected,
        descriptor.word_count()
    );
    warn!("Segments: {:?}", segments);
    false
}

/// Pair segments with word entries.
///
/// `segments[0]` is discarded; `segments[1 + k]` pairs with index
/// `first_index + k`. Pairing stops at whichever runs out first, the segments
/// or the descriptor's range, so a surplus segment never borrows a word from a
/// neighbouring recording.
///
/// # Errors
///
/// Returns [`Error::Lookup`] if an index inside the range has no entry. No
/// partial plan is returned in that case.
pub fn align<'a>(
    descriptor: &SourceDescriptor,
    spec: &'a WordSpecification,
    segments: &[Segment],
    margin_secs: f64,
) -> Result<Vec<ClipPlan<'a>>> {
    check_segment_count(descriptor, segments);

    segments
        .iter()
        .skip(1)
        .zip(descriptor.first_index..=descriptor.last_index)
        .map(|(segment, word_index)| {
            let entry = spec.get(word_index).ok_or(Error::Lookup(word_index))?;
            Ok(ClipPlan {
                word_index,
                entry,
                segment: *segment,
                range: ExportRange::from_segment(segment, margin_secs),
            })
        })
        .collect()
}

/// Cut every planned clip out of `audio` and write it to `output_dir`.
///
/// Clips are written in plan order. Returns the written paths.
pub fn export_clips(
    plans: &[ClipPlan<'_>],
    audio: &AudioBuffer,
    encoder: &dyn ClipEncoder,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(plans.len());

    for plan in plans {
        let path = output_dir.join(plan.file_name(encoder.extension()));
        let clip = audio.slice_ms(plan.range.start_ms, plan.range.end_ms);
        info!(
            "Word {} -> {:?} ({}ms - {}ms)",
            plan.word_index, path, plan.range.start_ms, plan.range.end_ms
        );
        if clip.frames() == 0 {
            warn!(
                "Word {}: range {}ms - {}ms lies outside the {:.3}s recording, clip is empty",
                plan.word_index,
                plan.range.start_ms,
                plan.range.end_ms,
                audio.duration_secs()
            );
        }
        encoder.encode(&clip, &path)?;
        written.push(path);
    }

    Ok(written)
}
