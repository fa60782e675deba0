use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Date format used for date cells in JSON payloads and CSV files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value held by a single cell of a sheet.
///
/// Cells are loosely typed the way spreadsheet cells are: a column that
/// usually holds numbers can still hold text. `Empty` is the only value a
/// cleared cell ever has.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

/// How the values of a column are coerced before they are written.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
    Bool,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// A cell is blank when it is empty or holds whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the cell as an identifier key. Blank cells have no key.
    pub fn as_key(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            CellValue::Empty => return None,
        })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Truthiness of a checkbox-style cell: `TRUE` or the text "TRUE".
    pub fn is_true(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Converts a loosely typed JSON value into a cell.
    ///
    /// Arrays and objects have no cell representation and are stored as
    /// their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
            Value::String(s) if s.is_empty() => CellValue::Empty,
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Coerces the value to the kind of the column it is written to.
    ///
    /// Values that cannot be coerced are kept as they are so nothing the
    /// caller sent is silently lost.
    pub fn coerce(self, kind: ColumnKind) -> Self {
        if self.is_blank() {
            return CellValue::Empty;
        }
        match kind {
            ColumnKind::Text => self,
            ColumnKind::Number => match self.as_number() {
                Some(n) => CellValue::Number(n),
                None => self,
            },
            ColumnKind::Date => match self.as_date() {
                Some(d) => CellValue::Date(d),
                None => self,
            },
            ColumnKind::Bool => match &self {
                CellValue::Text(s) if s.trim().eq_ignore_ascii_case("true") => CellValue::Bool(true),
                CellValue::Text(s) if s.trim().eq_ignore_ascii_case("false") => {
                    CellValue::Bool(false)
                }
                _ => self,
            },
        }
    }

    /// Text shown for the cell in exports.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }

    /// Parses an exported cell back. Used by the CSV loader.
    ///
    /// A number or date is only recognised when it displays back as exactly
    /// the same text, so `007` or `1e3` stay text and keep their key.
    pub fn parse_display(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() && format_number(n) == trimmed {
                return CellValue::Number(n);
            }
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            if d.format(DATE_FORMAT).to_string() == trimmed {
                return CellValue::Date(d);
            }
        }
        match trimmed {
            "TRUE" => CellValue::Bool(true),
            "FALSE" => CellValue::Bool(false),
            _ => CellValue::Text(raw.to_string()),
        }
    }
}

// Integral numbers render without a trailing ".0" so numeric ids match their text form
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
