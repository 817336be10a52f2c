//! Word specification
//!
//! The authoritative list of words, one row per word, loaded from a
//! spreadsheet once per run and shared read-only by every recording.

use crate::{Error, Result};
use log::{debug, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Number of columns a specification row carries
pub const COLUMNS: usize = 4;

/// Name of the snapshot written to the output directory
pub const SNAPSHOT_FILE: &str = "desc.json";

/// One spreadsheet cell, reduced to what the loader cares about
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
        }
    }

    fn as_index(&self) -> Option<u32> {
        match self {
            Cell::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= u32::MAX as f64 => {
                Some(*n as u32)
            }
            Cell::Text(s) => s.trim().parse::<u32>().ok().filter(|&v| v > 0),
            _ => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => f.write_str("None"),
            Cell::Number(_) => f.write_str(&self.as_text()),
            Cell::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// One word of the specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    /// 1-based position across the whole specification
    #[serde(rename = "idx")]
    pub sequence_index: u32,
    /// Stable identifier, used as the mapping key and in clip names
    pub code: String,
    /// Plain spelling, used in clip names
    #[serde(rename = "ktiv_male")]
    pub primary_form: String,
    /// Fully marked spelling
    #[serde(rename = "menukkad")]
    pub annotated_form: String,
}

impl WordEntry {
    /// Clip file stem, `{code}_{primary_form}`
    pub fn clip_stem(&self) -> String {
        format!("{}_{}", self.code, self.primary_form)
    }
}

/// All word entries, by code (in insertion order) and by sequence index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordSpecification {
    entries: Vec<WordEntry>,
    by_code: HashMap<String, usize>,
    by_index: HashMap<u32, usize>,
}

impl WordSpecification {
    /// Build a specification from spreadsheet rows.
    ///
    /// The first row is the header and is skipped. Blank rows are skipped,
    /// complete rows become entries, and anything in between aborts the load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] naming the 1-based sheet row when a row
    /// is partially populated or its index is not a positive integer.
    pub fn from_rows<I, R>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[Cell]>,
    {
        let mut spec = Self::default();

        for (i, row) in rows.into_iter().enumerate().skip(1) {
            let row_number = i + 1;
            let mut cells: Vec<Cell> = row.as_ref().iter().take(COLUMNS).cloned().collect();
            cells.resize(COLUMNS, Cell::Empty);

            let blank = cells.iter().filter(|c| c.is_blank()).count();
            if blank == COLUMNS {
                debug!("Skipping blank row {}", row_number);
                continue;
            }

            let integrity_error = || Error::DataIntegrity {
                row: row_number,
                cells: format!(
                    "({})",
                    cells.iter().map(Cell::to_string).collect::<Vec<_>>().join(", ")
                ),
            };
            if blank > 0 {
                return Err(integrity_error());
            }
            let sequence_index = cells[0].as_index().ok_or_else(integrity_error)?;

            spec.insert(WordEntry {
                sequence_index,
                code: cells[1].as_text(),
                primary_form: cells[2].as_text(),
                annotated_form: cells[3].as_text(),
            });
        }

        Ok(spec)
    }

    /// Insert an entry. A repeated code or index replaces the earlier entry.
    pub fn insert(&mut self, entry: WordEntry) {
        if let Some(&pos) = self.by_code.get(&entry.code) {
            warn!(
                "Duplicate code '{}': row with index {} replaces index {}",
                entry.code, entry.sequence_index, self.entries[pos].sequence_index
            );
            let old_index = self.entries[pos].sequence_index;
            if self.by_index.get(&old_index) == Some(&pos) {
                self.by_index.remove(&old_index);
            }
            self.index_position(entry.sequence_index, pos, &entry.code);
            self.entries[pos] = entry;
        } else {
            let pos = self.entries.len();
            self.by_code.insert(entry.code.clone(), pos);
            self.index_position(entry.sequence_index, pos, &entry.code);
            self.entries.push(entry);
        }
    }

    fn index_position(&mut self, index: u32, pos: usize, code: &str) {
        if let Some(prev) = self.by_index.insert(index, pos) {
            if prev != pos {
                warn!(
                    "Duplicate index {}: code '{}' replaces '{}'",
                    index, code, self.entries[prev].code
                );
            }
        }
    }

    /// Entry at `sequence_index`
    pub fn get(&self, sequence_index: u32) -> Option<&WordEntry> {
        self.by_index.get(&sequence_index).map(|&pos| &self.entries[pos])
    }

    /// Entry with `code`
    pub fn get_by_code(&self, code: &str) -> Option<&WordEntry> {
        self.by_code.get(code).map(|&pos| &self.entries[pos])
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &WordEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the `code -> entry` snapshot to `path`, replacing any existing file.
    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a snapshot written by [`write_snapshot`](Self::write_snapshot).
    pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Serialize for WordSpecification {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.code, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WordSpecification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = WordSpecification;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of code to word entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut spec = WordSpecification::default();
                while let Some((_code, entry)) = access.next_entry::<String, WordEntry>()? {
                    spec.insert(entry);
                }
                Ok(spec)
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn header() -> Vec<Cell> {
        vec![text("idx"), text("code"), text("ktiv_male"), text("menukkad")]
    }

    fn row(idx: f64, code: &str, plain: &str, marked: &str) -> Vec<Cell> {
        vec![Cell::Number(idx), text(code), text(plain), text(marked)]
    }

    #[test]
    fn loads_complete_rows_keyed_by_code() {
        let rows = vec![
            header(),
            row(1.0, "a01", "אב", "אָב"),
            row(2.0, "a02", "אבא", "אַבָּא"),
            row(3.0, "a03", "אבן", "אֶבֶן"),
        ];
        let spec = WordSpecification::from_rows(rows).unwrap();

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.get_by_code("a02").unwrap().sequence_index, 2);
        assert_eq!(spec.get(3).unwrap().code, "a03");
        let codes: Vec<_> = spec.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["a01", "a02", "a03"]);
    }

    #[test]
    fn skips_blank_rows() {
        let rows = vec![
            header(),
            row(1.0, "a01", "x", "y"),
            vec![Cell::Empty, text(""), Cell::Empty, Cell::Empty],
            vec![],
        ];
        let spec = WordSpecification::from_rows(rows).unwrap();
        assert_eq!(spec.len(), 1);
    }

    #[test]
    fn partial_row_is_an_integrity_error() {
        let rows = vec![
            header(),
            row(1.0, "a01", "x", "y"),
            vec![Cell::Number(2.0), text("a02"), Cell::Empty, text("z")],
        ];
        match WordSpecification::from_rows(rows) {
            Err(Error::DataIntegrity { row, cells }) => {
                assert_eq!(row, 3);
                assert!(cells.contains("a02"));
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn non_integer_index_is_an_integrity_error() {
        for idx in [Cell::Number(2.5), text("two"), Cell::Number(0.0)] {
            let rows = vec![header(), vec![idx, text("a"), text("b"), text("c")]];
            assert!(matches!(
                WordSpecification::from_rows(rows),
                Err(Error::DataIntegrity { row: 2, .. })
            ));
        }
    }

    #[test]
    fn numeric_cells_are_coerced() {
        let rows = vec![
            header(),
            vec![text(" 7 "), Cell::Number(101.0), text("p"), text("q")],
        ];
        let spec = WordSpecification::from_rows(rows).unwrap();
        let entry = spec.get(7).unwrap();
        assert_eq!(entry.code, "101");
        assert_eq!(entry.clip_stem(), "101_p");
    }

    #[test]
    fn duplicates_keep_the_later_row() {
        let rows = vec![
            header(),
            row(1.0, "a01", "first", "x"),
            row(2.0, "a02", "second", "x"),
            row(3.0, "a01", "third", "x"),
            row(2.0, "a04", "fourth", "x"),
        ];
        let spec = WordSpecification::from_rows(rows).unwrap();

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.get_by_code("a01").unwrap().primary_form, "third");
        assert!(spec.get(1).is_none());
        assert_eq!(spec.get(3).unwrap().code, "a01");
        assert_eq!(spec.get(2).unwrap().code, "a04");
        let codes: Vec<_> = spec.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, ["a01", "a02", "a04"]);
    }

    #[test]
    fn snapshot_uses_fixed_field_names() {
        let spec = WordSpecification::from_rows(vec![header(), row(1.0, "a01", "x", "y")]).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(
            json,
            r#"{"a01":{"idx":1,"code":"a01","ktiv_male":"x","menukkad":"y"}}"#
        );
    }

    #[test]
    fn snapshot_reads_back_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        let spec = WordSpecification::from_rows(vec![
            header(),
            row(2.0, "b", "x", "y"),
            row(1.0, "a", "x", "y"),
        ])
        .unwrap();

        spec.write_snapshot(&path).unwrap();
        let loaded = WordSpecification::read_snapshot(&path).unwrap();

        assert_eq!(loaded, spec);
        assert_eq!(loaded.iter().next().unwrap().code, "b");
    }
}
