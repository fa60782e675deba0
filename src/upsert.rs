//! Identifier-based batch upsert over a [`RowStore`].
//!
//! Each call scans the identifier column once, builds an [`IdentifierIndex`]
//! of occupied rows and blank "holes", and then places every record of the
//! batch in input order: records whose id is already stored overwrite their
//! row, new records fill the lowest hole first and only append past the last
//! occupied row once the holes are used up.
//!
//! Nothing survives the call. The store may be edited by other writers
//! between calls, so the index is never cached.

use crate::cell::CellValue;
use crate::layout::Layout;
use crate::record::{Record, generate_record_id};
use crate::store::{RowStore, StoreError};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Errors raised while persisting ledger records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// The store could not be read before any row was written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// A single record failed validation. The batch path never raises this:
    /// unpersistable records are dropped and counted instead.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Writing `row` failed after the rows counted in `completed` were
    /// written. Nothing is rolled back.
    #[error("write to row {row} failed after {} rows: {source}", .completed.written())]
    PartialWrite {
        row: usize,
        completed: UpsertResult,
        #[source]
        source: StoreError,
    },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// How a record was placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Overwrote the row already holding the record's id.
    Update,
    /// Filled a hole left by an earlier deletion.
    Reuse,
    /// Appended past the last occupied row.
    Append,
}

/// Where one record of the batch ended up.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowAssignment {
    pub id: String,
    pub row: usize,
    pub placement: Placement,
}

/// Counts reported by [`upsert`].
///
/// `updated + inserted + reused + dropped` always equals the batch length.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpsertResult {
    pub updated: usize,
    /// Records appended past the previous last row.
    pub inserted: usize,
    /// Records written into holes.
    pub reused: usize,
    /// Records skipped for a missing or non-positive amount.
    pub dropped: usize,
    pub assignments: Vec<RowAssignment>,
}

impl UpsertResult {
    /// Number of rows actually written.
    pub fn written(&self) -> usize {
        self.updated + self.inserted + self.reused
    }

    fn record(&mut self, assignment: RowAssignment) {
        match assignment.placement {
            Placement::Update => self.updated += 1,
            Placement::Reuse => self.reused += 1,
            Placement::Append => self.inserted += 1,
        }
        self.assignments.push(assignment);
    }
}

/// Map of stored identifiers to their rows, plus the free rows below the
/// append watermark.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentifierIndex {
    rows: HashMap<String, usize>,
    holes: VecDeque<usize>,
    watermark: usize,
}

impl IdentifierIndex {
    /// Builds the index from the identifier cells of rows
    /// `start_row..=last_row`.
    ///
    /// `cells` may be shorter than the range; missing cells are blank. At
    /// most `hole_cap` holes are kept since a batch can never fill more.
    pub fn build(cells: &[CellValue], start_row: usize, last_row: usize, hole_cap: usize) -> Self {
        let mut index = IdentifierIndex {
            rows: HashMap::with_capacity(cells.len()),
            holes: VecDeque::with_capacity(hole_cap.min(cells.len() + 1)),
            watermark: last_row.max(start_row),
        };
        for row in start_row..=index.watermark {
            let key = cells.get(row - start_row).and_then(CellValue::as_key);
            match key {
                Some(id) => {
                    if let Some(first) = index.rows.get(&id) {
                        log::warn!("id '{}' stored in rows {} and {}; using {}", id, first, row, first);
                    } else {
                        index.rows.insert(id, row);
                    }
                }
                None if index.holes.len() < hole_cap => index.holes.push_back(row),
                None => {}
            }
        }
        index
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.rows.get(id).copied()
    }

    pub fn holes(&self) -> impl Iterator<Item = usize> + '_ {
        self.holes.iter().copied()
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Chooses the row for `id`, registering it so later records of the
    /// same batch carrying the same id land on the same row.
    ///
    /// A `None` id is never looked up nor registered.
    pub fn assign(&mut self, id: Option<&str>) -> (usize, Placement) {
        if let Some(row) = id.and_then(|id| self.row_of(id)) {
            return (row, Placement::Update);
        }
        let (row, placement) = match self.holes.pop_front() {
            Some(row) => (row, Placement::Reuse),
            None => {
                self.watermark += 1;
                (self.watermark, Placement::Append)
            }
        };
        if let Some(id) = id {
            self.rows.insert(id.to_string(), row);
        }
        (row, placement)
    }
}

/// Reads the identifier column and indexes it.
pub fn build_index<S: RowStore + ?Sized>(
    store: &S,
    layout: &Layout,
    hole_cap: usize,
) -> Result<IdentifierIndex, StoreError> {
    let last_row = store.last_occupied_row()?.max(layout.start_row);
    let cells = store.read_column(layout.id_column(), layout.start_row, last_row)?;
    Ok(IdentifierIndex::build(&cells, layout.start_row, last_row, hole_cap))
}

/// Persists a batch of records, reusing holes before appending.
///
/// Records are placed in input order and each one overwrites its whole field
/// block. Records without an id get a generated one, so the rows they take
/// are occupied on the next call.
pub fn upsert<S: RowStore + ?Sized>(
    records: &[Record],
    store: &mut S,
    layout: &Layout,
) -> Result<UpsertResult, LedgerError> {
    let mut index = build_index(store, layout, records.len()).map_err(LedgerError::StoreUnavailable)?;
    let mut result = UpsertResult::default();

    for record in records {
        let Some(amount) = record.amount_value() else {
            result.dropped += 1;
            continue;
        };
        let (row, placement) = index.assign(record.key());
        let id = match record.key() {
            Some(id) => id.to_string(),
            None => generate_record_id(),
        };
        let values = record.to_row(layout, &id, amount);
        if let Err(source) = store.write_row(row, layout.start_column, &values) {
            log::error!("ledger write to {} failed: {}", layout.block_name(row), source);
            return Err(LedgerError::PartialWrite {
                row,
                completed: result,
                source,
            });
        }
        result.record(RowAssignment { id, row, placement });
    }

    log::debug!(
        "upsert: {} updated, {} appended, {} reused, {} dropped",
        result.updated,
        result.inserted,
        result.reused,
        result.dropped
    );
    Ok(result)
}

/// Blanks the field block of the row holding `id`, turning it into a hole.
///
/// Uses a point lookup on the identifier column rather than a full index.
pub fn delete<S: RowStore + ?Sized>(
    id: &str,
    store: &mut S,
    layout: &Layout,
) -> Result<usize, LedgerError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(LedgerError::InvalidRecord("id is required".to_string()));
    }
    let row = store
        .find_row_by_exact_value(layout.id_column(), layout.start_row, &CellValue::text(id))
        .map_err(LedgerError::StoreUnavailable)?
        .ok_or_else(|| LedgerError::NotFound(format!("no entry with id '{}'", id)))?;
    store
        .clear_row(row, layout.start_column, layout.column_count())
        .map_err(|source| LedgerError::PartialWrite {
            row,
            completed: UpsertResult::default(),
            source,
        })?;
    Ok(row)
}

/// Reads every occupied row of the ledger, in row order.
pub fn list<S: RowStore + ?Sized>(
    store: &S,
    layout: &Layout,
) -> Result<Vec<(usize, Vec<CellValue>)>, LedgerError> {
    let last_row = store.last_occupied_row().map_err(LedgerError::StoreUnavailable)?;
    if last_row < layout.start_row {
        return Ok(Vec::new());
    }
    let ids = store
        .read_column(layout.id_column(), layout.start_row, last_row)
        .map_err(LedgerError::StoreUnavailable)?;
    let mut rows = Vec::new();
    for (offset, cell) in ids.iter().enumerate() {
        if cell.is_blank() {
            continue;
        }
        let row = layout.start_row + offset;
        let cells = store
            .read_row(row, layout.start_column, layout.column_count())
            .map_err(LedgerError::StoreUnavailable)?;
        rows.push((row, cells));
    }
    Ok(rows)
}
