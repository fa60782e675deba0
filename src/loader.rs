use crate::cell::CellValue;
use crate::spreadsheet::{MAX_COLS, MAX_ROWS, Sheet};
use std::error::Error;
use std::fs;
use std::path::Path;

/// Load a sheet from a CSV file
///
/// Every record becomes a row, starting at row 1, so header lines land where
/// a ledger layout expects its headers. Quoted fields may span lines. Cells
/// are typed back from their exported text: numbers, `YYYY-MM-DD` dates,
/// `TRUE`/`FALSE`, otherwise text.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
/// * `name` - Name given to the new sheet
///
/// # Returns
/// * `Result<Sheet, Box<dyn Error>>` - The loaded sheet or an error
///
/// # Examples
/// ```no_run
/// use sheet_ledger::loader::from_csv;
///
/// match from_csv("expenses.csv", "Expenses") {
///     Ok(sheet) => println!("Loaded sheet {}", sheet.name),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>, name: &str) -> Result<Sheet, Box<dyn Error>> {
    let content = fs::read_to_string(filepath)?;
    from_csv_str(&content, name)
}

/// Same as [`from_csv`] for CSV text already in memory.
pub fn from_csv_str(content: &str, name: &str) -> Result<Sheet, Box<dyn Error>> {
    let records = split_csv_records(content);
    if records.is_empty() {
        return Err("CSV file is empty".into());
    }
    if records.len() > MAX_ROWS {
        return Err(format!("CSV file has more than {} rows", MAX_ROWS).into());
    }

    let mut sheet = Sheet::new(name);
    for (r, fields) in records.iter().enumerate() {
        if fields.len() > MAX_COLS {
            return Err(format!("row {} has more than {} columns", r + 1, MAX_COLS).into());
        }
        for (c, value_str) in fields.iter().enumerate() {
            let value = CellValue::parse_display(value_str);
            if value != CellValue::Empty {
                sheet.set_cell(r + 1, c + 1, value)?;
            }
        }
    }

    Ok(sheet)
}

/// Splits CSV text into records of fields.
///
/// Commas and line breaks (`\n`, `\r\n` or `\r`) only separate outside
/// quotes; `""` inside quotes is a literal quote. A final line break does
/// not start an extra record.
fn split_csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut open = false;
    let mut rest = content.chars().peekable();

    while let Some(ch) = rest.next() {
        open = true;
        match (ch, quoted) {
            ('"', true) if rest.next_if_eq(&'"').is_some() => field.push('"'),
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            ('\r' | '\n', false) => {
                if ch == '\r' {
                    rest.next_if_eq(&'\n');
                }
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
                open = false;
            }
            (other, _) => field.push(other),
        }
    }
    if open {
        fields.push(field);
        records.push(fields);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RowStore;

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let records = split_csv_records(r#"a,"b, c","say ""hi""",,"#);
        assert_eq!(records, vec![vec!["a", "b, c", "say \"hi\"", "", ""]]);
    }

    #[test]
    fn quoted_line_breaks_stay_inside_the_field() {
        let records = split_csv_records("id,notes\r\ne-1,\"line1\nline2\"\n,\"a\r\nb\"\n");
        assert_eq!(
            records,
            vec![
                vec!["id", "notes"],
                vec!["e-1", "line1\nline2"],
                vec!["", "a\r\nb"],
            ]
        );
    }

    #[test]
    fn blank_lines_keep_their_rows() {
        let records = split_csv_records("a\n\nb");
        assert_eq!(records, vec![vec!["a"], vec![""], vec!["b"]]);
    }

    #[test]
    fn cells_are_typed_from_text() {
        let sheet = from_csv_str("Date,Amount\n2024-02-01,12.5\n,TRUE", "Expenses").unwrap();
        assert_eq!(sheet.get_cell(1, 1).unwrap(), &CellValue::text("Date"));
        assert_eq!(sheet.get_cell(2, 2).unwrap(), &CellValue::Number(12.5));
        assert!(matches!(sheet.get_cell(2, 1).unwrap(), CellValue::Date(_)));
        assert_eq!(sheet.get_cell(3, 2).unwrap(), &CellValue::Bool(true));
        assert_eq!(sheet.last_occupied_row().unwrap(), 3);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(from_csv_str("", "Income").is_err());
    }
}
