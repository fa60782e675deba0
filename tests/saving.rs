use sheet_ledger::budget::{BudgetBook, template};
use sheet_ledger::cache::MemoryCache;
use sheet_ledger::cell::CellValue;
use sheet_ledger::layout::LedgerKind;
use sheet_ledger::record::Record;
use sheet_ledger::store::StoreError;
use sheet_ledger::{downloader, loader, saving};

#[test]
fn workbook_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("budget.bin.gz");

    let mut book = BudgetBook::new(template().unwrap(), MemoryCache::new());
    book.save_entries(
        LedgerKind::Expense,
        &[Record::new("e-1", 12.5).with_field("category", "Food")],
    )
    .unwrap();
    saving::save_workbook(book.workbook(), &path).unwrap();
    assert!(!path.with_extension("tmp").exists());

    let loaded = saving::load_workbook(&path).unwrap();
    assert_eq!(&loaded, book.workbook());
}

#[test]
fn load_or_create_only_builds_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.bin.gz");

    let created = saving::load_or_create(&path, template).unwrap();
    assert_eq!(created, template().unwrap());

    let mut marked = template().unwrap();
    marked.add_sheet("Marker");
    saving::save_workbook(&marked, &path).unwrap();
    let loaded = saving::load_or_create(&path, template).unwrap();
    assert!(loaded.sheet("Marker").is_ok());
}

#[test]
fn failed_template_surfaces_as_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.bin.gz");
    let err = saving::load_or_create(&path, || {
        Err(StoreError::OutOfBounds { row: 0, column: 1 })
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "cell out of bounds: row 0, column 1");
    assert!(!path.exists());
}

#[test]
fn corrupt_bytes_are_rejected() {
    assert!(saving::workbook_from_bytes(b"not a workbook").is_err());
}

#[test]
fn csv_export_reimports_to_the_same_ledger() {
    let mut book = BudgetBook::new(template().unwrap(), MemoryCache::new());
    let records = vec![
        Record::new("e-1", 12.5)
            .with_field("category", "Food")
            .with_field("date", "2026-10-05")
            .with_field("notes", "lunch, with \"friends\""),
        Record::new("1001", 40.0).with_field("category", "Rent"),
    ];
    book.save_entries(LedgerKind::Expense, &records).unwrap();
    let sheet = book.workbook().sheet("Expenses").unwrap();

    let csv = downloader::to_csv(sheet).unwrap();
    let imported = loader::from_csv_str(&csv, "Expenses").unwrap();
    assert_eq!(imported.get_cell(3, 4).unwrap(), &CellValue::text("Date"));
    assert_eq!(imported.get_cell(4, 11).unwrap(), &CellValue::text("e-1"));
    assert_eq!(
        imported.get_cell(4, 9).unwrap(),
        &CellValue::text("lunch, with \"friends\"")
    );
    assert_eq!(imported.get_cell(5, 5).unwrap(), &CellValue::Number(40.0));
    assert_eq!(imported.get_cell(5, 11).unwrap(), &CellValue::Number(1001.0));

    // Numeric-looking ids come back as numbers but still match
    let mut workbook = book.workbook().clone();
    workbook.sheets.insert("Expenses".to_string(), imported);
    book.replace_workbook(workbook).unwrap();
    let result = book.save_entries(LedgerKind::Expense, &records).unwrap();
    assert_eq!(result.updated, 2);
}

#[test]
fn csv_file_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("income.csv");
    std::fs::write(&path, ",,,Date,Amount\n,,,2026-10-01,100\n").unwrap();
    let sheet = loader::from_csv(&path, "Income").unwrap();
    assert_eq!(sheet.get_cell(2, 5).unwrap(), &CellValue::Number(100.0));
    assert!(matches!(sheet.get_cell(2, 4).unwrap(), CellValue::Date(_)));
}

fn reimport_expenses(book: &mut BudgetBook<MemoryCache>) {
    let csv = downloader::to_csv(book.workbook().sheet("Expenses").unwrap()).unwrap();
    let imported = loader::from_csv_str(&csv, "Expenses").unwrap();
    let mut workbook = book.workbook().clone();
    workbook.sheets.insert("Expenses".to_string(), imported);
    book.replace_workbook(workbook).unwrap();
}

#[test]
fn leading_zero_ids_still_match_after_csv_reimport() {
    let mut book = BudgetBook::new(template().unwrap(), MemoryCache::new());
    let records = vec![Record::new("007", 5.0).with_field("category", "Food")];
    book.save_entries(LedgerKind::Expense, &records).unwrap();

    reimport_expenses(&mut book);
    assert_eq!(
        book.workbook().sheet("Expenses").unwrap().get_cell(4, 11).unwrap(),
        &CellValue::text("007")
    );

    let result = book.save_entries(LedgerKind::Expense, &records).unwrap();
    assert_eq!((result.updated, result.inserted, result.reused), (1, 0, 0));
    assert_eq!(book.list_entries(LedgerKind::Expense).unwrap().len(), 1);
}

#[test]
fn multi_line_notes_survive_csv_reimport() {
    let mut book = BudgetBook::new(template().unwrap(), MemoryCache::new());
    let records = vec![
        Record::new("e-1", 12.5)
            .with_field("category", "Food")
            .with_field("notes", "line1\nline2"),
        Record::new("e-2", 3.0)
            .with_field("category", "Food")
            .with_field("notes", "windows\r\nbreak"),
        Record::new("e-3", 7.0).with_field("category", "Rent"),
    ];
    book.save_entries(LedgerKind::Expense, &records).unwrap();

    reimport_expenses(&mut book);
    let expenses = book.workbook().sheet("Expenses").unwrap();
    assert_eq!(expenses.get_cell(4, 9).unwrap(), &CellValue::text("line1\nline2"));
    assert_eq!(expenses.get_cell(5, 9).unwrap(), &CellValue::text("windows\r\nbreak"));
    assert_eq!(expenses.get_cell(6, 11).unwrap(), &CellValue::text("e-3"));

    let result = book.save_entries(LedgerKind::Expense, &records).unwrap();
    assert_eq!(result.updated, records.len());
    assert_eq!(result.reused + result.inserted, 0);
}
