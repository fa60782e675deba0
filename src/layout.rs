use crate::cell::ColumnKind;
use crate::spreadsheet::Sheet;
use crate::upsert::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Version of the built-in ledger column tables. Bumped whenever a column
/// moves, so workbooks written by an older layout can be told apart.
pub const LAYOUT_VERSION: u32 = 1;

/// Field name of the identifier column.
pub const ID_FIELD: &str = "id";
/// Field name of the amount column.
pub const AMOUNT_FIELD: &str = "amount";

/// One column of a ledger's field block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Record field written to this column.
    pub field: String,
    /// Header text. Shown to humans only, never used to locate the column.
    pub label: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(field: &str, label: &str, kind: ColumnKind) -> Self {
        Column {
            field: field.to_string(),
            label: label.to_string(),
            kind,
        }
    }
}

/// Where a ledger's rows live inside a sheet and how record fields map onto
/// the columns of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub version: u32,
    /// First data row, after the header rows.
    pub start_row: usize,
    /// First column of the field block.
    pub start_column: usize,
    /// Offset of the identifier column within the field block.
    pub id_column_offset: usize,
    /// Offset of the amount column within the field block.
    pub amount_column_offset: usize,
    pub columns: Vec<Column>,
}

impl Layout {
    /// Builds a layout, checking that the column table is usable.
    pub fn new(
        start_row: usize,
        start_column: usize,
        columns: Vec<Column>,
    ) -> Result<Self, LedgerError> {
        if start_row == 0 || start_column == 0 {
            return Err(LedgerError::InvalidLayout(
                "rows and columns are 1-based".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.field.as_str()) {
                return Err(LedgerError::InvalidLayout(format!(
                    "duplicate field '{}'",
                    column.field
                )));
            }
        }
        let position = |field: &str| columns.iter().position(|c| c.field == field);
        let id_column_offset = position(ID_FIELD)
            .ok_or_else(|| LedgerError::InvalidLayout("layout has no id column".to_string()))?;
        let amount_column_offset = position(AMOUNT_FIELD).ok_or_else(|| {
            LedgerError::InvalidLayout("layout has no amount column".to_string())
        })?;

        Ok(Layout {
            version: LAYOUT_VERSION,
            start_row,
            start_column,
            id_column_offset,
            amount_column_offset,
            columns,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Absolute sheet column holding the identifier.
    pub fn id_column(&self) -> usize {
        self.start_column + self.id_column_offset
    }

    /// Absolute sheet column holding `field`, if the layout has it.
    pub fn column_of(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.field == field)
            .map(|offset| self.start_column + offset)
    }

    /// Row holding the header labels, directly above the data.
    pub fn header_row(&self) -> Option<usize> {
        self.start_row.checked_sub(1).filter(|row| *row > 0)
    }

    /// A1 range of the field block on `row`, e.g. `D7:K7`.
    pub fn block_name(&self, row: usize) -> String {
        format!(
            "{}:{}",
            Sheet::get_cell_name(row, self.start_column),
            Sheet::get_cell_name(row, self.start_column + self.column_count().saturating_sub(1))
        )
    }

    pub fn header_labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }
}

/// The ledgers kept in a budget workbook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Expense,
    Income,
    Recurring,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 3] = [LedgerKind::Expense, LedgerKind::Income, LedgerKind::Recurring];

    pub fn sheet_name(self) -> &'static str {
        match self {
            LedgerKind::Expense => "Expenses",
            LedgerKind::Income => "Income",
            LedgerKind::Recurring => "Recurring",
        }
    }

    /// Sign applied to an account balance when an entry of this ledger is
    /// recorded against it. Recurring entries are plans, not movements.
    pub fn balance_sign(self) -> f64 {
        match self {
            LedgerKind::Expense => -1.0,
            LedgerKind::Income => 1.0,
            LedgerKind::Recurring => 0.0,
        }
    }

    pub fn layout(self) -> Layout {
        use ColumnKind::{Date, Number, Text};
        let (start_column, columns) = match self {
            // D..K
            LedgerKind::Expense => (
                4,
                vec![
                    Column::new("date", "Date", Date),
                    Column::new(AMOUNT_FIELD, "Amount", Number),
                    Column::new("category", "Category", Text),
                    Column::new("name", "Name", Text),
                    Column::new("label", "Label", Text),
                    Column::new("notes", "Notes", Text),
                    Column::new("account", "Account", Text),
                    Column::new(ID_FIELD, "ID", Text),
                ],
            ),
            // D..J
            LedgerKind::Income => (
                4,
                vec![
                    Column::new("date", "Date", Date),
                    Column::new(AMOUNT_FIELD, "Amount", Number),
                    Column::new("source", "Source", Text),
                    Column::new("name", "Name", Text),
                    Column::new("notes", "Notes", Text),
                    Column::new("account", "Account", Text),
                    Column::new(ID_FIELD, "ID", Text),
                ],
            ),
            // B..I
            LedgerKind::Recurring => (
                2,
                vec![
                    Column::new("name", "Name", Text),
                    Column::new(AMOUNT_FIELD, "Amount", Number),
                    Column::new("category", "Category", Text),
                    Column::new("frequency", "Frequency", Text),
                    Column::new("next_date", "Next Date", Date),
                    Column::new("account", "Account", Text),
                    Column::new("notes", "Notes", Text),
                    Column::new(ID_FIELD, "ID", Text),
                ],
            ),
        };
        Layout {
            version: LAYOUT_VERSION,
            start_row: 4,
            start_column,
            id_column_offset: columns.len() - 1,
            amount_column_offset: 1,
            columns,
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerKind::Expense => "expense",
            LedgerKind::Income => "income",
            LedgerKind::Recurring => "recurring",
        };
        f.write_str(name)
    }
}

impl FromStr for LedgerKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expense" | "expenses" => Ok(LedgerKind::Expense),
            "income" => Ok(LedgerKind::Income),
            "recurring" => Ok(LedgerKind::Recurring),
            other => Err(LedgerError::NotFound(format!("unknown ledger '{}'", other))),
        }
    }
}
