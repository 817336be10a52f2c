//! Spreadsheet input for the word specification

use crate::word_spec::{Cell, WordSpecification};
use crate::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::info;
use std::path::Path;

/// Load a word specification from `path`.
///
/// `.json` files are read as a snapshot written by an earlier run; anything
/// else is opened as a workbook and its first worksheet is used.
pub fn load_word_spec<P: AsRef<Path>>(path: P) -> Result<WordSpecification> {
    let path = path.as_ref();
    let is_snapshot = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let spec = if is_snapshot {
        info!("Loading word specification snapshot {:?}", path);
        WordSpecification::read_snapshot(path)?
    } else {
        info!("Loading word specification workbook {:?}", path);
        WordSpecification::from_rows(read_rows(path)?)?
    };

    info!("Loaded {} word entries", spec.len());
    Ok(spec)
}

/// Read the first worksheet of a workbook as rows of cells.
///
/// Rows and columns are positioned absolutely: row 0 is the sheet's first
/// row even when the used range starts further down.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::InvalidInput("Workbook has no worksheets".into()))??;

    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let mut rows = vec![Vec::new(); first_row as usize];

    for row in range.rows() {
        let mut cells = vec![Cell::Empty; first_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }

    Ok(rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_spec::WordEntry;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn converts_calamine_cells() {
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Int(4)), Cell::Number(4.0));
        assert_eq!(cell_from_data(&Data::Float(4.5)), Cell::Number(4.5));
        assert_eq!(
            cell_from_data(&Data::String("בית".into())),
            Cell::Text("בית".into())
        );
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Text("true".into()));
    }

    #[test]
    fn json_path_loads_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desc.json");
        let mut spec = WordSpecification::default();
        spec.insert(WordEntry {
            sequence_index: 1,
            code: "b01".into(),
            primary_form: "בית".into(),
            annotated_form: "בַּיִת".into(),
        });
        spec.write_snapshot(&path).unwrap();

        let loaded = load_word_spec(&path).unwrap();
        assert_eq!(loaded, spec);
    }

    #[test]
    fn missing_workbook_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_word_spec(dir.path().join("missing.xlsx")).is_err());
    }

    #[test]
    fn workbook_rows_skip_header_and_blank_rows() {
        let spec = load_word_spec(fixture("words.xlsx")).unwrap();

        assert_eq!(spec.len(), 2);
        let first = spec.get(1).unwrap();
        assert_eq!(first.code, "b01");
        assert_eq!(first.primary_form, "בית");
        assert_eq!(first.annotated_form, "בַּיִת");
        assert_eq!(spec.get_by_code("g01").unwrap().sequence_index, 2);
    }

    #[test]
    fn rows_keep_absolute_positions() {
        // Only B3, C3 and B4 are filled.
        let rows = read_rows(fixture("offset.xlsx")).unwrap();

        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty());
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec![Cell::Empty, Cell::Text("x".into()), Cell::Number(5.0)]);
        assert_eq!(rows[3], vec![Cell::Empty, Cell::Text("y".into()), Cell::Empty]);
    }
}
