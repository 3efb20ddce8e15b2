//! Tabular dataset: which overlay goes on which photo slide.
//!
//! A dataset is one or more independent sheets. Every sheet has the same
//! layout:
//!
//! ```text
//! product | overlay 0 | position 0 | overlay 1 | position 1 | ...
//! P1      | badgeA    | 5          |           |            |
//! P2      | sale      | 1          | new       | 3          |
//! ```
//!
//! Column 0 is the product id (the name of the product's photo folder). The
//! remaining cells come in `(overlay name, position id)` pairs, one pair per
//! photo slide in sorted file order. Blank cells mean "no overlay for this
//! slide".
//!
//! ## Sources
//!
//! | Path | Sheets |
//! |---|---|
//! | `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods` | every worksheet, in workbook order (via `calamine`) |
//! | `.csv` | one sheet named after the file stem |
//! | directory | every `.csv` inside, sorted by file name |
//!
//! ## Validation
//!
//! Trailing blank cells are ignored. A row whose remaining cells after the
//! product id do not form whole pairs is rejected as
//! [`DatasetError::MalformedRow`]; the rest of the sheet still loads.

use calamine::{Data, Reader, open_workbook_auto};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Dataset has no sheets: {0}")]
    NoSheets(PathBuf),
    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error(
        "Sheet '{sheet}' row {row}: {cells} cells after the product id do not form (overlay, position) pairs"
    )]
    MalformedRow {
        sheet: String,
        row: usize,
        cells: usize,
    },
}

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// One `(overlay name, position id)` cell pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidePair {
    pub overlay: String,
    pub position: String,
}

/// What a slide pair asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slide<'a> {
    /// Both cells blank.
    Empty,
    /// Overlay and position both present.
    Assigned { overlay: &'a str, position: &'a str },
    /// Exactly one of the two cells is filled.
    Incomplete { overlay: &'a str, position: &'a str },
}

impl SlidePair {
    pub fn slide(&self) -> Slide<'_> {
        let overlay = self.overlay.as_str();
        let position = self.position.as_str();
        match (overlay.is_empty(), position.is_empty()) {
            (true, true) => Slide::Empty,
            (false, false) => Slide::Assigned { overlay, position },
            _ => Slide::Incomplete { overlay, position },
        }
    }
}

/// A validated product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub product: String,
    /// 1-based row number in the source sheet.
    pub row: usize,
    pub slides: Vec<SlidePair>,
}

impl ProductRow {
    /// The pair for the photo at `index` (0-based) in sorted order, if the
    /// row reaches that far.
    pub fn slide(&self, index: usize) -> Option<&SlidePair> {
        self.slides.get(index)
    }
}

/// One independent pass over the photo set.
#[derive(Debug)]
pub struct Sheet {
    pub name: String,
    rows: BTreeMap<String, ProductRow>,
    /// Rows that failed validation, as `DatasetError::MalformedRow`.
    pub rejected: Vec<DatasetError>,
}

impl Sheet {
    /// Build a sheet from raw rows of cell text.
    ///
    /// `header_row` drops the first row. Rows with a blank product id are
    /// ignored. A later row for the same product replaces an earlier one.
    pub fn from_rows<I>(name: impl Into<String>, rows: I, header_row: bool) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        Self::from_rows_at(name, rows, header_row, 1)
    }

    /// Like [`Sheet::from_rows`], for rows that start at 1-based sheet row
    /// `first_row` rather than at the top of the sheet.
    pub fn from_rows_at<I>(
        name: impl Into<String>,
        rows: I,
        header_row: bool,
        first_row: usize,
    ) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let name = name.into();
        let mut sheet = Sheet {
            name,
            rows: BTreeMap::new(),
            rejected: Vec::new(),
        };
        let skip = usize::from(header_row);
        for (idx, cells) in rows.into_iter().enumerate().skip(skip) {
            match parse_row(&sheet.name, first_row + idx, cells) {
                Ok(Some(row)) => {
                    if let Some(prev) = sheet.rows.insert(row.product.clone(), row) {
                        warn!(
                            sheet = %sheet.name,
                            product = %prev.product,
                            row = prev.row,
                            "duplicate product row, later row wins"
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "rejecting dataset row");
                    sheet.rejected.push(e);
                }
            }
        }
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "sheet loaded");
        sheet
    }

    pub fn row(&self, product: &str) -> Option<&ProductRow> {
        self.rows.get(product)
    }

    /// Valid rows, ordered by product id.
    pub fn rows(&self) -> impl Iterator<Item = &ProductRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Validate one raw row. `Ok(None)` for rows without a product id.
fn parse_row(
    sheet: &str,
    row: usize,
    mut cells: Vec<String>,
) -> Result<Option<ProductRow>, DatasetError> {
    for cell in cells.iter_mut() {
        let trimmed = cell.trim();
        if trimmed.len() != cell.len() {
            *cell = trimmed.to_string();
        }
    }
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    let Some(product) = cells.first().cloned() else {
        return Ok(None);
    };
    if product.is_empty() {
        return Ok(None);
    }
    let data = &cells[1..];
    if data.len() % 2 != 0 {
        return Err(DatasetError::MalformedRow {
            sheet: sheet.to_string(),
            row,
            cells: data.len(),
        });
    }
    let slides = data
        .chunks_exact(2)
        .map(|pair| SlidePair {
            overlay: pair[0].clone(),
            position: pair[1].clone(),
        })
        .collect();
    Ok(Some(ProductRow {
        product,
        row,
        slides,
    }))
}

/// All sheets of a dataset, in source order.
#[derive(Debug)]
pub struct Dataset {
    pub sheets: Vec<Sheet>,
}

impl Dataset {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Every rejected row across all sheets.
    pub fn rejected(&self) -> impl Iterator<Item = &DatasetError> {
        self.sheets.iter().flat_map(|s| s.rejected.iter())
    }

    /// Slide pairs for one photo across all sheets, in sheet order.
    pub fn slides_for<'a>(
        &'a self,
        product: &'a str,
        index: usize,
    ) -> impl Iterator<Item = (&'a str, &'a SlidePair)> + 'a {
        self.sheets.iter().filter_map(move |sheet| {
            sheet
                .row(product)
                .and_then(|row| row.slide(index))
                .map(|pair| (sheet.name.as_str(), pair))
        })
    }
}

/// Load every sheet of the dataset at `path`.
pub fn load_dataset(path: &Path, header_row: bool) -> Result<Dataset, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let sheets = if path.is_dir() {
        load_csv_dir(path, header_row)?
    } else {
        match extension(path).as_deref() {
            Some("csv") => vec![load_csv_file(path, header_row)?],
            Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext) => load_workbook(path, header_row)?,
            _ => return Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
        }
    };
    if sheets.is_empty() {
        return Err(DatasetError::NoSheets(path.to_path_buf()));
    }
    debug!(
        path = %path.display(),
        sheets = sheets.len(),
        "dataset loaded"
    );
    Ok(Dataset { sheets })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn load_workbook(path: &Path, header_row: bool) -> Result<Vec<Sheet>, DatasetError> {
    let mut workbook = open_workbook_auto(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        // The range begins at the first non-empty cell, not at A1
        let first_row = range.start().map_or(1, |(row, _)| row as usize + 1);
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        sheets.push(Sheet::from_rows_at(name, rows, header_row, first_row));
    }
    Ok(sheets)
}

/// Spreadsheet cell as the text a user typed: whole floats lose their `.0`
/// so a position cell holding `5` reads as `"5"`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn load_csv_file(path: &Path, header_row: bool) -> Result<Sheet, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(Sheet::from_rows(name, rows, header_row))
}

fn load_csv_dir(dir: &Path, header_row: bool) -> Result<Vec<Sheet>, DatasetError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden && extension(&path).as_deref() == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    files
        .iter()
        .map(|path| load_csv_file(path, header_row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    // =========================================================================
    // Row validation
    // =========================================================================

    #[test]
    fn header_row_is_skipped() {
        let sheet = Sheet::from_rows(
            "s",
            vec![
                row(&["product", "img1", "pos1"]),
                row(&["P1", "badgeA", "5"]),
            ],
            true,
        );
        assert_eq!(sheet.len(), 1);
        assert!(sheet.row("product").is_none());
        assert_eq!(sheet.row("P1").unwrap().row, 2);
    }

    #[test]
    fn no_header_keeps_first_row() {
        let sheet = Sheet::from_rows("s", vec![row(&["P1", "badgeA", "5"])], false);
        assert_eq!(sheet.row("P1").unwrap().row, 1);
    }

    #[test]
    fn trailing_blanks_are_ignored() {
        let sheet = Sheet::from_rows("s", vec![row(&["P1", "badgeA", "5", "", ""])], false);
        let p1 = sheet.row("P1").unwrap();
        assert_eq!(p1.slides.len(), 1);
        assert_eq!(
            p1.slide(0).unwrap().slide(),
            Slide::Assigned {
                overlay: "badgeA",
                position: "5"
            }
        );
        assert!(p1.slide(1).is_none());
    }

    #[test]
    fn blank_pair_in_middle_is_empty_slide() {
        let sheet = Sheet::from_rows("s", vec![row(&["P1", "", "", "new", "3"])], false);
        let p1 = sheet.row("P1").unwrap();
        assert_eq!(p1.slide(0).unwrap().slide(), Slide::Empty);
        assert!(matches!(
            p1.slide(1).unwrap().slide(),
            Slide::Assigned { overlay: "new", .. }
        ));
    }

    #[test]
    fn half_filled_pair_is_incomplete() {
        let sheet = Sheet::from_rows("s", vec![row(&["P1", "badgeA", "", "x", "1"])], false);
        assert_eq!(
            sheet.row("P1").unwrap().slide(0).unwrap().slide(),
            Slide::Incomplete {
                overlay: "badgeA",
                position: ""
            }
        );
    }

    #[test]
    fn odd_cell_count_is_rejected() {
        let sheet = Sheet::from_rows(
            "Лист1",
            vec![
                row(&["P1", "badgeA", "5", "badgeB"]),
                row(&["P2", "sale", "1"]),
            ],
            false,
        );
        assert!(sheet.row("P1").is_none());
        assert!(sheet.row("P2").is_some());
        assert_eq!(sheet.rejected.len(), 1);
        assert!(matches!(
            &sheet.rejected[0],
            DatasetError::MalformedRow { sheet, row: 1, cells: 3 } if sheet == "Лист1"
        ));
    }

    #[test]
    fn blank_product_rows_are_ignored() {
        let sheet = Sheet::from_rows(
            "s",
            vec![row(&["", "badgeA", "5"]), row(&[]), row(&["  ", "", ""])],
            false,
        );
        assert!(sheet.is_empty());
        assert!(sheet.rejected.is_empty());
    }

    #[test]
    fn cells_are_trimmed() {
        let sheet = Sheet::from_rows("s", vec![row(&[" P1 ", " badgeA", "5 "])], false);
        let pair = sheet.row("P1").unwrap().slide(0).unwrap();
        assert_eq!(pair.overlay, "badgeA");
        assert_eq!(pair.position, "5");
    }

    #[test]
    fn later_duplicate_row_wins() {
        let sheet = Sheet::from_rows(
            "s",
            vec![row(&["P1", "old", "1"]), row(&["P1", "new", "2"])],
            false,
        );
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.row("P1").unwrap().slide(0).unwrap().overlay, "new");
    }

    #[test]
    fn product_with_no_pairs_is_valid() {
        let sheet = Sheet::from_rows("s", vec![row(&["P1"])], false);
        assert!(sheet.row("P1").unwrap().slides.is_empty());
    }

    // =========================================================================
    // Cell formatting
    // =========================================================================

    #[test]
    fn whole_floats_print_as_integers() {
        assert_eq!(cell_text(&Data::Float(5.0)), "5");
        assert_eq!(cell_text(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("badge".into())), "badge");
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_single_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cards.csv");
        fs::write(&path, "product,img,pos\nP1,badgeA,5,,\nP2,,\n").unwrap();

        let dataset = load_dataset(&path, true).unwrap();
        assert_eq!(dataset.sheet_names(), vec!["cards"]);
        let sheet = &dataset.sheets[0];
        assert_eq!(sheet.len(), 2);
        assert!(sheet.row("P2").unwrap().slides.is_empty());
    }

    #[test]
    fn load_csv_directory_as_sheets_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b_sale.csv"), "h\nP1,sale,2\n").unwrap();
        fs::write(tmp.path().join("a_main.csv"), "h\nP1,badgeA,1\n").unwrap();
        fs::write(tmp.path().join(".hidden.csv"), "h\nP1,x,1\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let dataset = load_dataset(tmp.path(), true).unwrap();
        assert_eq!(dataset.sheet_names(), vec!["a_main", "b_sale"]);

        let overlays: Vec<(&str, &str)> = dataset
            .slides_for("P1", 0)
            .map(|(sheet, pair)| (sheet, pair.overlay.as_str()))
            .collect();
        assert_eq!(overlays, vec![("a_main", "badgeA"), ("b_sale", "sale")]);
    }

    #[test]
    fn slides_for_skips_sheets_without_product_or_slide() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("1.csv"), "h\nP1,a,1,b,2\n").unwrap();
        fs::write(tmp.path().join("2.csv"), "h\nP2,c,1\n").unwrap();

        let dataset = load_dataset(tmp.path(), true).unwrap();
        assert_eq!(dataset.slides_for("P1", 1).count(), 1);
        assert_eq!(dataset.slides_for("P1", 2).count(), 0);
        assert_eq!(dataset.slides_for("P3", 0).count(), 0);
    }

    #[test]
    fn rejected_rows_are_collected_across_sheets() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("1.csv"), "h\nP1,a\n").unwrap();
        fs::write(tmp.path().join("2.csv"), "h\nP2,c,1,d\n").unwrap();

        let dataset = load_dataset(tmp.path(), true).unwrap();
        assert_eq!(dataset.rejected().count(), 2);
    }

    #[test]
    fn missing_dataset_is_not_found() {
        let err = load_dataset(Path::new("/nonexistent/data.xlsx"), true).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[test]
    fn empty_directory_has_no_sheets() {
        let tmp = TempDir::new().unwrap();
        let err = load_dataset(tmp.path(), true).unwrap_err();
        assert!(matches!(err, DatasetError::NoSheets(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        fs::write(&path, "{}").unwrap();
        let err = load_dataset(&path, true).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_workbook_is_spreadsheet_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();
        let err = load_dataset(&path, true).unwrap_err();
        assert!(matches!(err, DatasetError::Spreadsheet(_)));
    }

    /// Two-sheet workbook: `main` with a header and numeric cells, `second`
    /// starting two rows down with one malformed row.
    fn write_workbook(path: &Path) {
        let mut workbook = rust_xlsxwriter::Workbook::new();

        let main = workbook.add_worksheet();
        main.set_name("main").unwrap();
        main.write_string(0, 0, "product").unwrap();
        main.write_string(0, 1, "overlay 0").unwrap();
        main.write_string(0, 2, "position 0").unwrap();
        main.write_string(1, 0, "P1").unwrap();
        main.write_string(1, 1, "badgeA").unwrap();
        main.write_number(1, 2, 5.0).unwrap();
        main.write_number(2, 0, 12345.0).unwrap();
        main.write_string(2, 1, "sale").unwrap();
        main.write_number(2, 2, 1.0).unwrap();

        let second = workbook.add_worksheet();
        second.set_name("second").unwrap();
        second.write_string(2, 0, "product").unwrap();
        second.write_string(3, 0, "P1").unwrap();
        second.write_string(3, 1, "new").unwrap();
        second.write_string(3, 2, "br").unwrap();
        second.write_string(4, 0, "P2").unwrap();
        second.write_string(4, 1, "orphan").unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn load_workbook_sheets_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.xlsx");
        write_workbook(&path);

        let dataset = load_dataset(&path, true).unwrap();
        assert_eq!(dataset.sheet_names(), vec!["main", "second"]);

        let main = &dataset.sheets[0];
        assert!(main.row("product").is_none());
        let p1 = main.row("P1").unwrap().slide(0).unwrap();
        assert_eq!(p1.overlay, "badgeA");
        assert_eq!(p1.position, "5");
        assert_eq!(main.row("12345").unwrap().slide(0).unwrap().position, "1");

        let overlays: Vec<(&str, &str)> = dataset
            .slides_for("P1", 0)
            .map(|(sheet, pair)| (sheet, pair.overlay.as_str()))
            .collect();
        assert_eq!(overlays, vec![("main", "badgeA"), ("second", "new")]);
    }

    #[test]
    fn workbook_row_numbers_count_leading_blank_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.xlsx");
        write_workbook(&path);

        let dataset = load_dataset(&path, true).unwrap();
        let second = &dataset.sheets[1];
        assert_eq!(second.row("P1").unwrap().row, 4);
        assert!(matches!(
            &second.rejected[..],
            [DatasetError::MalformedRow { row: 5, cells: 1, .. }]
        ));
    }

    #[test]
    fn rows_can_start_below_the_top() {
        let sheet = Sheet::from_rows_at(
            "s",
            vec![row(&["product"]), row(&["P1", "a", "1"]), row(&["P2", "b"])],
            true,
            3,
        );
        assert_eq!(sheet.row("P1").unwrap().row, 4);
        assert!(matches!(
            &sheet.rejected[..],
            [DatasetError::MalformedRow { row: 5, .. }]
        ));
    }
}
