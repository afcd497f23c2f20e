//! Addressable cell grids built from a decoded spreadsheet document.
//!
//! A [`Workbook`] keeps every sheet of the source document in its original order. Each
//! [`Grid`] is sparse: only non-empty cells are stored, and reads outside the populated area
//! return [`CellValue::Empty`] instead of failing.

use crate::error::{Result, SoaLedgerError};
use crate::utils::parse_address;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed textual rendering. Numbers print the way the raw value reads
    /// (`12` rather than `12.0`).
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Text(s) => s.trim().to_string(),
        }
    }

    /// Numeric view of the cell. Text is accepted when it parses once thousands
    /// separators are removed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) if s.trim().is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// One sheet of cells, keyed by absolute zero-based (row, col).
#[derive(Debug, Clone, Default)]
pub struct Grid {
    name: String,
    cells: BTreeMap<(usize, usize), CellValue>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Builds a grid from dense rows anchored at A1.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut grid = Self::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                grid.insert(r, c, value);
            }
        }
        grid
    }

    fn from_range(name: &str, range: &Range<Data>) -> Self {
        let mut grid = Self::new(name);
        // calamine reports positions relative to the first used cell.
        let (row0, col0) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        for (r, c, data) in range.used_cells() {
            grid.insert(row0 + r, col0 + c, CellValue::from(data));
        }
        grid
    }

    fn insert(&mut self, row: usize, col: usize, value: CellValue) {
        if !value.is_empty() {
            self.cells.insert((row, col), value);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed text of a cell, empty when absent.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).as_text()
    }

    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col).as_number()
    }

    /// Looks a cell up by A1 address. `None` when the address is malformed or the
    /// cell holds nothing.
    pub fn cell_by_address(&self, address: &str) -> Option<&CellValue> {
        let (row, col) = parse_address(address)?;
        self.cells.get(&(row, col))
    }

    /// Number of rows up to and including the last populated one.
    pub fn height(&self) -> usize {
        self.cells.keys().next_back().map(|(r, _)| r + 1).unwrap_or(0)
    }

    /// All populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &CellValue)> {
        self.cells.iter().map(|((r, c), v)| (*r, *c, v))
    }
}

/// Named grids in source sheet order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Grid>,
}

impl Workbook {
    pub fn from_sheets(sheets: Vec<Grid>) -> Self {
        Self { sheets }
    }

    /// Decodes a spreadsheet container (xlsx, xlsm, xlsb, xls, ods).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| SoaLedgerError::Parse(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in reader.sheet_names() {
            match reader.worksheet_range(&name) {
                Ok(range) => sheets.push(Grid::from_range(&name, &range)),
                Err(e) => warn!("Skipping sheet '{}': {}", name, e),
            }
        }

        debug!("Decoded workbook with {} sheets", sheets.len());
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Grid] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Grid::name).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Grid> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// First sheet whose name contains `fragment`.
    pub fn find_sheet(&self, fragment: &str) -> Option<&Grid> {
        self.sheets.iter().find(|s| s.name.contains(fragment))
    }

    pub fn first_sheet(&self) -> Option<&Grid> {
        self.sheets.first()
    }

    pub fn cell(&self, sheet: &str, row: usize, col: usize) -> &CellValue {
        self.sheet(sheet)
            .map(|g| g.cell(row, col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn cell_by_address(&self, sheet: &str, address: &str) -> Option<&CellValue> {
        self.sheet(sheet)?.cell_by_address(address)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid {
        Grid::from_rows(
            "01 SOA 01",
            vec![
                vec![CellValue::from("Header"), CellValue::Empty],
                vec![CellValue::from("   "), CellValue::Number(1250.5)],
            ],
        )
    }

    #[test]
    fn test_out_of_bounds_reads_are_empty() {
        let grid = sample();
        assert_eq!(grid.cell(500, 500), &CellValue::Empty);
        assert_eq!(grid.text(1, 0), "");
        assert_eq!(grid.height(), 2);
    }

    #[test]
    fn test_cell_by_address() {
        let grid = sample();
        assert_eq!(grid.cell_by_address("B2"), Some(&CellValue::Number(1250.5)));
        assert_eq!(grid.cell_by_address("A2"), None);
        assert_eq!(grid.cell_by_address("Z99"), None);
        assert_eq!(grid.cell_by_address("not-an-address"), None);
    }

    #[test]
    fn test_cell_value_rendering() {
        assert_eq!(CellValue::Number(12.0).as_text(), "12");
        assert_eq!(CellValue::Number(0.5).as_text(), "0.5");
        assert_eq!(CellValue::Text("  x ".into()).as_text(), "x");
        assert_eq!(CellValue::Text("1,234.5".into()).as_number(), Some(1234.5));
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
    }

    #[test]
    fn test_workbook_lookup_by_fragment() {
        let wb = Workbook::from_sheets(vec![Grid::new("00 ACC DETAILS 01"), sample()]);
        assert_eq!(wb.sheet_names(), vec!["00 ACC DETAILS 01", "01 SOA 01"]);
        assert_eq!(wb.find_sheet("01 SOA").map(Grid::name), Some("01 SOA 01"));
        assert!(wb.find_sheet("02 LEDGER").is_none());
        assert_eq!(wb.cell("01 SOA 01", 1, 1), &CellValue::Number(1250.5));
        assert_eq!(wb.cell("missing", 1, 1), &CellValue::Empty);
    }

    #[test]
    fn test_garbage_bytes_are_a_parse_error() {
        let result = Workbook::from_bytes(b"definitely not a spreadsheet");
        assert!(matches!(result, Err(SoaLedgerError::Parse(_))));
    }
}
