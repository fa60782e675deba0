use chrono::NaiveDate;
use sheet_ledger::budget::{
    ACCOUNT_BALANCE_COLUMN, ACCOUNT_NAME_COLUMN, BUDGET_SUMMARY_KEY, BudgetBook, BudgetError,
    NET_WORTH_SHEET, template,
};
use sheet_ledger::cell::CellValue;
use sheet_ledger::cache::{CachePort, JsonFileCache, MemoryCache};
use sheet_ledger::layout::LedgerKind;
use sheet_ledger::record::Record;
use sheet_ledger::upsert::{LedgerError, Placement};

fn book() -> BudgetBook<MemoryCache> {
    let mut book = BudgetBook::new(template().unwrap(), MemoryCache::new());
    book.add_category("Food", 300.0).unwrap();
    book.add_category("Rent", 1200.0).unwrap();
    book.set_account("Checking", 100.0).unwrap();
    book
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn expense(id: &str, amount: f64, category: &str) -> Record {
    Record::new(id, amount)
        .with_field("category", category)
        .with_field("date", "2026-10-05")
        .with_field("account", "Checking")
}

#[test]
fn new_expense_moves_its_account_once() {
    let mut book = book();
    let result = book
        .save_entry(LedgerKind::Expense, &expense("e-1", 25.0, "Food"))
        .unwrap();
    assert_eq!(result.assignments[0].placement, Placement::Reuse);
    assert_eq!(result.assignments[0].row, 4);
    assert_eq!(book.accounts().unwrap()[0].balance, 75.0);

    // Editing the same entry does not charge the account again
    book.save_entry(LedgerKind::Expense, &expense("e-1", 30.0, "Food"))
        .unwrap();
    assert_eq!(book.accounts().unwrap()[0].balance, 75.0);
}

#[test]
fn income_raises_the_balance() {
    let mut book = book();
    let income = Record::new("i-1", 50.0)
        .with_field("source", "Salary")
        .with_field("account", "Checking");
    book.save_entry(LedgerKind::Income, &income).unwrap();
    assert_eq!(book.accounts().unwrap()[0].balance, 150.0);
}

#[test]
fn unknown_account_is_left_alone() {
    let mut book = book();
    let record = expense("e-1", 5.0, "Food").with_field("account", "Savings");
    book.save_entry(LedgerKind::Expense, &record).unwrap();
    assert_eq!(book.accounts().unwrap().len(), 1);
    assert_eq!(book.adjust_account_balance("Savings", 1.0).unwrap(), None);
}

#[test]
fn account_named_like_the_header_gets_its_own_row() {
    let mut book = book();
    let row = book.set_account("Account", 5.0).unwrap();
    assert_eq!(row, 3);
    assert_eq!(book.adjust_account_balance("Account", 1.0).unwrap(), Some(6.0));

    let sheet = book.workbook().sheet(NET_WORTH_SHEET).unwrap();
    assert_eq!(sheet.get_cell(1, ACCOUNT_NAME_COLUMN).unwrap(), &CellValue::text("Account"));
    assert_eq!(sheet.get_cell(1, ACCOUNT_BALANCE_COLUMN).unwrap(), &CellValue::text("Balance"));
    let names: Vec<String> = book.accounts().unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["Checking", "Account"]);
}

#[test]
fn single_entry_validation() {
    let mut book = book();
    let err = book
        .save_entry(LedgerKind::Expense, &expense("e-1", 0.0, "Food"))
        .unwrap_err();
    assert!(matches!(err, BudgetError::Ledger(LedgerError::InvalidRecord(_))));

    let no_category = Record::new("e-2", 10.0);
    let err = book.save_entry(LedgerKind::Expense, &no_category).unwrap_err();
    assert!(matches!(err, BudgetError::Ledger(LedgerError::InvalidRecord(_))));
    assert!(book.list_entries(LedgerKind::Expense).unwrap().is_empty());
}

#[test]
fn list_returns_entries_with_rows() {
    let mut book = book();
    book.save_entries(
        LedgerKind::Expense,
        &[expense("e-1", 10.0, "Food"), expense("e-2", 20.0, "Rent")],
    )
    .unwrap();
    book.delete_entry(LedgerKind::Expense, "e-1").unwrap();

    let entries = book.list_entries(LedgerKind::Expense).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "e-2");
    assert_eq!(entries[0]["row"], 5);
    assert_eq!(entries[0]["date"], "2026-10-05");
}

#[test]
fn categories_are_served_from_cache_until_changed() {
    let mut book = book();
    let fresh = book.categories(true).unwrap();
    assert!(!fresh.from_cache);
    assert_eq!(fresh.categories, vec!["Food", "Rent"]);
    assert_eq!(fresh.active_categories, vec!["Food", "Rent"]);

    assert!(book.categories(true).unwrap().from_cache);
    assert!(!book.categories(false).unwrap().from_cache);

    book.add_category("Travel", 50.0).unwrap();
    let after = book.categories(true).unwrap();
    assert!(!after.from_cache);
    assert_eq!(after.categories, vec!["Food", "Rent", "Travel"]);
}

#[test]
fn deactivating_a_category_updates_the_cached_list() {
    let mut book = book();
    book.categories(true).unwrap();
    let active = book.set_category_active("Rent", false).unwrap();
    assert_eq!(active, vec!["Food"]);

    let cached = book.categories(true).unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.active_categories, vec!["Food"]);
    assert_eq!(book.categories(false).unwrap().active_categories, vec!["Food"]);

    assert!(matches!(
        book.set_category_active("Nope", true),
        Err(BudgetError::Ledger(LedgerError::NotFound(_)))
    ));
}

#[test]
fn monthly_summary_totals_and_invalidation() {
    let mut book = book();
    let salary = Record::new("i-1", 1000.0)
        .with_field("date", "2026-10-01")
        .with_field("source", "Salary");
    book.save_entries(LedgerKind::Income, &[salary]).unwrap();
    let last_month = expense("e-0", 99.0, "Food").with_field("date", "2026-09-30");
    book.save_entries(
        LedgerKind::Expense,
        &[expense("e-1", 25.0, "Food"), last_month],
    )
    .unwrap();

    let summary = book.budget_summary(Some(day(15))).unwrap();
    assert!(!summary.from_cache);
    assert_eq!(summary.month_name, "October");
    assert_eq!(summary.income, 1000.0);
    assert_eq!(summary.spent, 25.0);
    assert_eq!(summary.left_to_spend, 975.0);
    let food = summary.categories.iter().find(|c| c.name == "Food").unwrap();
    assert_eq!(food.budgeted, 300.0);
    assert_eq!(food.remaining, 275.0);

    assert!(book.budget_summary(Some(day(20))).unwrap().from_cache);

    book.save_entries(LedgerKind::Expense, &[expense("e-2", 5.0, "Rent")])
        .unwrap();
    assert!(book.cache().get(BUDGET_SUMMARY_KEY).is_none());
    let refreshed = book.budget_summary(Some(day(20))).unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.spent, 30.0);
}

#[test]
fn summary_for_another_month_is_recomputed() {
    let mut book = book();
    book.budget_summary(Some(day(1))).unwrap();
    let september = book
        .budget_summary(Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()))
        .unwrap();
    assert!(!september.from_cache);
    assert_eq!(september.month, 9);
}

#[test]
fn file_cache_backs_a_book() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    {
        let mut book = BudgetBook::new(template().unwrap(), JsonFileCache::open(&path).unwrap());
        book.add_category("Food", 10.0).unwrap();
        book.categories(true).unwrap();
    }
    let cache = JsonFileCache::open(&path).unwrap();
    let cached: Vec<String> = cache.get_json("CACHED_CATEGORIES").unwrap();
    assert_eq!(cached, vec!["Food"]);
}
