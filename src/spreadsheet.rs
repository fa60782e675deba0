use crate::cell::CellValue;
use crate::store::{RowStore, StoreError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest addressable row of a sheet.
pub const MAX_ROWS: usize = 100_000;
/// Largest addressable column of a sheet (`ZZZ`).
pub const MAX_COLS: usize = 18_278;

static EMPTY_CELL: CellValue = CellValue::Empty;

lazy_static! {
    static ref CELL_NAME_REGEX: Regex = Regex::new(r"^([A-Za-z]+)([0-9]+)$").unwrap();
    static ref RANGE_REGEX: Regex =
        Regex::new(r"^([A-Za-z]+[0-9]+)\s*:\s*([A-Za-z]+[0-9]+)$").unwrap();
}

/// A rectangular block of cells, 1-based and inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl CellRange {
    pub fn rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> usize {
        self.end_col - self.start_col + 1
    }
}

/// A single named sheet: a sparse grid of cells.
///
/// Rows are stored densely up to the highest written row and each row only
/// as wide as its rightmost written cell; everything past that reads as
/// `CellValue::Empty`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn col_to_letter(col: usize) -> String {
        let mut col = col;
        let mut result = String::new();
        while col > 0 {
            col -= 1;
            result.push(((col % 26) as u8 + b'A') as char);
            col /= 26;
        }
        result.chars().rev().collect()
    }

    /// Column number for letters such as `AA`. `None` for anything that is
    /// not a non-empty run of ASCII letters.
    pub fn letter_to_col(letters: &str) -> Option<usize> {
        if letters.is_empty() {
            return None;
        }
        letters.chars().try_fold(0usize, |acc, c| {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })
    }

    pub fn get_cell_name(row: usize, col: usize) -> String {
        format!("{}{}", Self::col_to_letter(col), row)
    }

    /// Parses an A1-style cell name into `(row, col)`.
    pub fn parse_cell_name(cell_name: &str) -> Option<(usize, usize)> {
        let captures = CELL_NAME_REGEX.captures(cell_name.trim())?;
        let letters = captures.get(1)?.as_str();
        if letters.len() > 3 {
            return None;
        }
        let col = Self::letter_to_col(letters)?;
        let row = captures.get(2)?.as_str().parse::<usize>().ok()?;

        if col == 0 || col > MAX_COLS || row == 0 || row > MAX_ROWS {
            return None;
        }
        Some((row, col))
    }

    /// Parses an `A1:B2` range. The corners must be ordered top-left first.
    pub fn parse_range(range: &str) -> Option<CellRange> {
        let captures = RANGE_REGEX.captures(range.trim())?;
        let (start_row, start_col) = Self::parse_cell_name(captures.get(1)?.as_str())?;
        let (end_row, end_col) = Self::parse_cell_name(captures.get(2)?.as_str())?;
        if start_row > end_row || start_col > end_col {
            return None;
        }
        Some(CellRange {
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    fn check_bounds(row: usize, col: usize) -> Result<(), StoreError> {
        if row == 0 || col == 0 || row > MAX_ROWS || col > MAX_COLS {
            return Err(StoreError::OutOfBounds { row, column: col });
        }
        Ok(())
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Result<&CellValue, StoreError> {
        Self::check_bounds(row, col)?;
        Ok(self
            .rows
            .get(row - 1)
            .and_then(|cells| cells.get(col - 1))
            .unwrap_or(&EMPTY_CELL))
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<(), StoreError> {
        Self::check_bounds(row, col)?;
        if value == CellValue::Empty && self.rows.get(row - 1).is_none_or(|r| r.len() < col) {
            // Nothing stored there yet
            return Ok(());
        }
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < col {
            cells.resize(col, CellValue::Empty);
        }
        cells[col - 1] = value;
        Ok(())
    }

    /// Reads a rectangular block as rows of cells, padded with blanks.
    pub fn get_range(&self, range: &CellRange) -> Result<Vec<Vec<CellValue>>, StoreError> {
        Self::check_bounds(range.end_row, range.end_col)?;
        let mut values = Vec::with_capacity(range.rows());
        for r in range.start_row..=range.end_row {
            values.push(self.read_row(r, range.start_col, range.cols())?);
        }
        Ok(values)
    }

    /// Number of rows currently backed by storage, occupied or not.
    pub fn allocated_rows(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest stored row.
    pub fn allocated_cols(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    // Drop trailing blank cells and rows so the sheet never grows from clears
    fn compact(&mut self, row: usize) {
        if let Some(cells) = self.rows.get_mut(row - 1) {
            while cells.last().is_some_and(|c| *c == CellValue::Empty) {
                cells.pop();
            }
        }
        while self.rows.last().is_some_and(Vec::is_empty) {
            self.rows.pop();
        }
    }
}

impl RowStore for Sheet {
    fn last_occupied_row(&self) -> Result<usize, StoreError> {
        Ok(self
            .rows
            .iter()
            .rposition(|cells| cells.iter().any(|c| !c.is_blank()))
            .map_or(0, |idx| idx + 1))
    }

    fn read_column(
        &self,
        column: usize,
        from_row: usize,
        to_row: usize,
    ) -> Result<Vec<CellValue>, StoreError> {
        Self::check_bounds(from_row, column)?;
        Self::check_bounds(to_row, column)?;
        // Stops at the last allocated row; the caller pads the rest
        let end = to_row.min(self.rows.len());
        let mut values = Vec::with_capacity(end.saturating_sub(from_row) + 1);
        for r in from_row..=end {
            values.push(self.get_cell(r, column)?.clone());
        }
        Ok(values)
    }

    fn read_row(
        &self,
        row: usize,
        start_column: usize,
        column_count: usize,
    ) -> Result<Vec<CellValue>, StoreError> {
        Self::check_bounds(row, start_column + column_count.saturating_sub(1))?;
        Self::check_bounds(row, start_column)?;
        (start_column..start_column + column_count)
            .map(|c| self.get_cell(row, c).cloned())
            .collect()
    }

    fn write_row(
        &mut self,
        row: usize,
        start_column: usize,
        values: &[CellValue],
    ) -> Result<(), StoreError> {
        Self::check_bounds(row, start_column)?;
        Self::check_bounds(row, start_column + values.len().saturating_sub(1))?;
        for (offset, value) in values.iter().enumerate() {
            self.set_cell(row, start_column + offset, value.clone())?;
        }
        self.compact(row);
        Ok(())
    }

    fn clear_row(
        &mut self,
        row: usize,
        start_column: usize,
        column_count: usize,
    ) -> Result<(), StoreError> {
        let blanks = vec![CellValue::Empty; column_count];
        self.write_row(row, start_column, &blanks)
    }

    fn find_row_by_exact_value(
        &self,
        column: usize,
        from_row: usize,
        value: &CellValue,
    ) -> Result<Option<usize>, StoreError> {
        Self::check_bounds(from_row, column)?;
        let Some(key) = value.as_key() else {
            return Ok(None);
        };
        for (idx, cells) in self.rows.iter().enumerate().skip(from_row - 1) {
            let cell = cells.get(column - 1).unwrap_or(&EMPTY_CELL);
            if cell.as_key().as_deref() == Some(key.as_str()) {
                return Ok(Some(idx + 1));
            }
        }
        Ok(None)
    }
}

/// A set of named sheets persisted together.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Workbook {
    pub sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    /// Adds an empty sheet unless one with that name exists already.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        self.sheets
            .entry(name.to_string())
            .or_insert_with(|| Sheet::new(name))
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet, StoreError> {
        self.sheets
            .get(name)
            .ok_or_else(|| StoreError::Unavailable(format!("{} sheet not found", name)))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, StoreError> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| StoreError::Unavailable(format!("{} sheet not found", name)))
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }
}
