use crate::cell::CellValue;
use crate::layout::{AMOUNT_FIELD, ID_FIELD, Layout};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A caller-supplied ledger row.
///
/// Only `id` and `amount` mean anything to the upsert engine; every other
/// field is carried through to the column of the same name.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: &str, amount: f64) -> Self {
        Record {
            id: Some(id.to_string()),
            amount: Some(Value::from(amount)),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// The identifier, trimmed, or `None` when absent or blank.
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Parsed amount if the record may be persisted.
    ///
    /// Amounts arrive as JSON numbers or numeric strings. Missing, unparsable,
    /// non-finite, zero and negative amounts all mean "do not write this
    /// line"; a user removing a line item sends it with a zero amount.
    pub fn amount_value(&self) -> Option<f64> {
        let amount = match self.amount.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (amount.is_finite() && amount > 0.0).then_some(amount)
    }

    /// Looks up a descriptive field as a cell.
    pub fn field(&self, field: &str) -> CellValue {
        self.fields
            .get(field)
            .map(CellValue::from_json)
            .unwrap_or_default()
    }

    /// Maps the record onto the layout's columns.
    ///
    /// Every column gets a value: fields the record does not carry are
    /// written as blanks so nothing left in a reused row survives.
    pub fn to_row(&self, layout: &Layout, id: &str, amount: f64) -> Vec<CellValue> {
        layout
            .columns
            .iter()
            .map(|column| match column.field.as_str() {
                ID_FIELD => CellValue::text(id),
                AMOUNT_FIELD => CellValue::Number(amount),
                field => self.field(field).coerce(column.kind),
            })
            .collect()
    }

    /// Rebuilds a JSON object from a stored row.
    pub fn row_to_json(layout: &Layout, row: usize, cells: &[CellValue]) -> Value {
        let mut object = Map::new();
        for (column, cell) in layout.columns.iter().zip(cells) {
            object.insert(column.field.clone(), cell.to_json());
        }
        object.insert("row".to_string(), Value::from(row));
        Value::Object(object)
    }
}

// Ids generated by spreadsheets are often numeric; accept either form
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => CellValue::from_json(&other).as_key(),
    })
}

/// Generates an identifier for a record that arrived without one.
pub fn generate_record_id() -> String {
    Uuid::new_v4().to_string()
}
