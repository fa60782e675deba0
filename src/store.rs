use thiserror::Error;

use crate::cell::CellValue;

/// Failure reported by a row store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The backing store (or the named sheet) could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A read or write addressed a cell outside the store's bounds.
    #[error("cell out of bounds: row {row}, column {column}")]
    OutOfBounds { row: usize, column: usize },

    /// The store was reached but the operation failed.
    #[error("store io error: {0}")]
    Io(String),
}

/// Row-oriented tabular storage used by the ledger engine.
///
/// Rows and columns are 1-based. Implementations must make a write to a row
/// visible to any later read of that row within the same process.
pub trait RowStore {
    /// Highest row that holds any non-blank cell, or 0 for an empty store.
    fn last_occupied_row(&self) -> Result<usize, StoreError>;

    /// Reads `column` for the inclusive row range in one round trip.
    ///
    /// The result may be shorter than the range when trailing cells were
    /// never written; callers treat missing cells as blank.
    fn read_column(
        &self,
        column: usize,
        from_row: usize,
        to_row: usize,
    ) -> Result<Vec<CellValue>, StoreError>;

    /// Reads `column_count` cells of `row` starting at `start_column`.
    fn read_row(
        &self,
        row: usize,
        start_column: usize,
        column_count: usize,
    ) -> Result<Vec<CellValue>, StoreError>;

    /// Overwrites the cells of `row` starting at `start_column`.
    fn write_row(
        &mut self,
        row: usize,
        start_column: usize,
        values: &[CellValue],
    ) -> Result<(), StoreError>;

    /// Blanks `column_count` cells of `row` starting at `start_column`.
    fn clear_row(
        &mut self,
        row: usize,
        start_column: usize,
        column_count: usize,
    ) -> Result<(), StoreError>;

    /// Point lookup: first row at or below `from_row` whose cell in `column`
    /// renders to the same key as `value`.
    fn find_row_by_exact_value(
        &self,
        column: usize,
        from_row: usize,
        value: &CellValue,
    ) -> Result<Option<usize>, StoreError>;
}
