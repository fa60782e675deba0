use crate::spreadsheet::Sheet;
#[cfg(feature = "web")]
use crate::spreadsheet::Workbook;
use std::error::Error;

/// Convert a sheet to CSV format
///
/// Exports every stored row of the sheet, from row 1 down to the last
/// occupied row, as wide as the widest row. Blank cells become empty fields
/// and fields containing commas, quotes or line breaks are quoted.
///
/// # Arguments
/// * `sheet` - Reference to the sheet to convert
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use sheet_ledger::cell::CellValue;
/// use sheet_ledger::downloader::to_csv;
/// use sheet_ledger::spreadsheet::Sheet;
///
/// let mut sheet = Sheet::new("Expenses");
/// sheet.set_cell(1, 1, CellValue::text("Date")).unwrap();
/// sheet.set_cell(1, 2, CellValue::text("Amount, USD")).unwrap();
/// assert_eq!(to_csv(&sheet).unwrap(), "Date,\"Amount, USD\"\n");
/// ```
pub fn to_csv(sheet: &Sheet) -> Result<String, Box<dyn Error>> {
    use crate::store::RowStore;

    let mut csv_content = String::new();
    let rows = sheet.last_occupied_row()?;
    let cols = sheet.allocated_cols();

    for r in 1..=rows {
        let cells = sheet.read_row(r, 1, cols)?;
        for (c, cell) in cells.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            csv_content.push_str(&escape_csv(&cell.display()));
        }
        csv_content.push('\n');
    }

    Ok(csv_content)
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert a workbook to XLSX format
///
/// Every sheet of the workbook becomes a worksheet of the same name, in
/// name order. Numbers and booleans keep their type; dates are written as
/// `YYYY-MM-DD` text.
///
/// # Arguments
/// * `workbook` - Reference to the workbook to convert
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(workbook: &Workbook) -> Result<Vec<u8>, Box<dyn Error>> {
    use crate::cell::CellValue;
    use crate::store::RowStore;
    use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};

    let mut xlsx = XlsxWorkbook::new();

    for sheet in workbook.sheets.values() {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;

        let cols = sheet.allocated_cols();
        for r in 1..=sheet.last_occupied_row()? {
            for (c, cell) in sheet.read_row(r, 1, cols)?.iter().enumerate() {
                let (row, col) = ((r - 1) as u32, c as u16);
                match cell {
                    CellValue::Empty => {}
                    CellValue::Number(n) => {
                        worksheet.write_number(row, col, *n)?;
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                    other => {
                        worksheet.write_string(row, col, other.display())?;
                    }
                }
            }
        }

        xlsx.push_worksheet(worksheet);
    }

    let buffer = xlsx.save_to_buffer()?;

    Ok(buffer)
}
