//! File name descriptors
//!
//! A recording's file stem names the section it belongs to and the inclusive
//! range of word indices it covers, e.g. `aleph 12-19.m4a`.

use crate::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DESCRIPTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+([0-9]+)\s*-\s*([0-9]+)").expect("valid descriptor pattern"));

/// Label and word index range parsed from a recording's file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Opaque section tag, e.g. a letter name
    pub label: String,
    /// First covered `sequence_index`
    pub first_index: u32,
    /// Last covered `sequence_index`, inclusive
    pub last_index: u32,
}

impl SourceDescriptor {
    /// Parse a file stem such as `"bet 5-9"`.
    ///
    /// Only a match at the start of the stem counts; anything after the range
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the stem does not match, if either index is
    /// zero or does not fit in a `u32`, or if the range is reversed.
    pub fn parse(stem: &str) -> Result<Self> {
        let caps = DESCRIPTOR_RE
            .captures(stem)
            .ok_or_else(|| Error::Format(stem.to_string()))?;

        let index = |i: usize| -> Result<u32> {
            caps[i]
                .parse::<u32>()
                .ok()
                .filter(|&v| v > 0)
                .ok_or_else(|| Error::Format(stem.to_string()))
        };
        let first_index = index(2)?;
        let last_index = index(3)?;

        if first_index > last_index {
            return Err(Error::Format(stem.to_string()));
        }

        Ok(Self {
            label: caps[1].to_string(),
            first_index,
            last_index,
        })
    }

    /// Parse the stem of `path` (file name without directory or extension).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Format(path.display().to_string()))?;
        Self::parse(stem)
    }

    /// Number of words the recording should contain
    pub fn word_count(&self) -> usize {
        (self.last_index - self.first_index) as usize + 1
    }

    /// Segments the detector should report: one per word plus the leading one
    pub fn expected_segment_count(&self) -> usize {
        self.word_count() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_and_range() {
        let d = SourceDescriptor::parse("bet 5-9").unwrap();
        assert_eq!(d.label, "bet");
        assert_eq!((d.first_index, d.last_index), (5, 9));
        assert_eq!(d.word_count(), 5);
        assert_eq!(d.expected_segment_count(), 6);
    }

    #[test]
    fn allows_spaces_around_hyphen_and_trailing_text() {
        let d = SourceDescriptor::parse("aleph  12 - 19 take2").unwrap();
        assert_eq!(d.label, "aleph");
        assert_eq!((d.first_index, d.last_index), (12, 19));
    }

    #[test]
    fn rejects_malformed_stems() {
        for stem in ["bet5-9", "bet 5to9", " bet 5-9", "bet", "bet 0-3", "bet 9-5"] {
            assert!(
                matches!(SourceDescriptor::parse(stem), Err(Error::Format(_))),
                "{stem:?} should not parse"
            );
        }
    }

    #[test]
    fn single_word_range() {
        let d = SourceDescriptor::parse("gimel 7-7").unwrap();
        assert_eq!(d.word_count(), 1);
    }

    #[test]
    fn from_path_uses_stem() {
        let d = SourceDescriptor::from_path("/recordings/dalet 20-31.m4a").unwrap();
        assert_eq!(d.label, "dalet");
        assert_eq!((d.first_index, d.last_index), (20, 31));
    }
}
