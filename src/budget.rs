//! Budget workbook service.
//!
//! [`BudgetBook`] owns a [`Workbook`] laid out as a personal budget (one
//! sheet per ledger plus "Setup" and "Net Worth") and a [`CachePort`] for
//! derived data. Every method that writes cells invalidates the cache
//! entries computed from those cells before returning.

use crate::cache::{CacheError, CachePort};
use crate::cell::CellValue;
use crate::layout::LedgerKind;
use crate::record::Record;
use crate::spreadsheet::{Sheet, Workbook};
use crate::store::{RowStore, StoreError};
use crate::upsert::{self, LedgerError, Placement, UpsertResult};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub const SETUP_SHEET: &str = "Setup";
pub const NET_WORTH_SHEET: &str = "Net Worth";

/// Category names on the Setup sheet.
pub const CATEGORY_NAMES_RANGE: &str = "G15:G44";
/// Checkbox column marking a category active.
pub const CATEGORY_ACTIVE_RANGE: &str = "F15:F44";
/// Monthly budget per category.
pub const CATEGORY_BUDGET_RANGE: &str = "H15:H44";

/// Net Worth sheet: account name in column A, current balance in column D.
pub const ACCOUNT_NAME_COLUMN: usize = 1;
pub const ACCOUNT_BALANCE_COLUMN: usize = 4;
const ACCOUNT_FIRST_ROW: usize = 2;

pub const CACHED_CATEGORIES_KEY: &str = "CACHED_CATEGORIES";
pub const ACTIVE_CATEGORIES_KEY: &str = "ACTIVE_CATEGORIES";
pub const BUDGET_SUMMARY_KEY: &str = "BUDGET_SUMMARY";

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("setup range {0} is malformed")]
    BadRange(&'static str),
}

/// Category list as read from the Setup sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    pub categories: Vec<String>,
    pub active_categories: Vec<String>,
    pub from_cache: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub actual: f64,
    pub budgeted: f64,
    pub remaining: f64,
}

/// Income and spending totals of one month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub income: f64,
    pub spent: f64,
    pub left_to_spend: f64,
    pub categories: Vec<CategorySummary>,
    #[serde(default)]
    pub from_cache: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub balance: f64,
    pub row: usize,
}

/// Builds an empty budget workbook with header rows in place.
pub fn template() -> Result<Workbook, StoreError> {
    let mut workbook = Workbook::new();
    for kind in LedgerKind::ALL {
        let layout = kind.layout();
        let sheet = workbook.add_sheet(kind.sheet_name());
        if let Some(header_row) = layout.header_row() {
            let labels: Vec<CellValue> = layout.header_labels().into_iter().map(CellValue::Text).collect();
            sheet.write_row(header_row, layout.start_column, &labels)?;
        }
    }

    let setup = workbook.add_sheet(SETUP_SHEET);
    setup.write_row(
        14,
        6,
        &[CellValue::text("Active"), CellValue::text("Category"), CellValue::text("Budget")],
    )?;

    let net_worth = workbook.add_sheet(NET_WORTH_SHEET);
    net_worth.set_cell(1, ACCOUNT_NAME_COLUMN, CellValue::text("Account"))?;
    net_worth.set_cell(1, ACCOUNT_BALANCE_COLUMN, CellValue::text("Balance"))?;
    Ok(workbook)
}

pub struct BudgetBook<C: CachePort> {
    workbook: Workbook,
    cache: C,
}

impl<C: CachePort> BudgetBook<C> {
    pub fn new(workbook: Workbook, cache: C) -> Self {
        BudgetBook { workbook, cache }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Swaps in a whole new workbook and drops everything derived from the
    /// old one.
    pub fn replace_workbook(&mut self, workbook: Workbook) -> Result<(), BudgetError> {
        self.workbook = workbook;
        for key in [CACHED_CATEGORIES_KEY, ACTIVE_CATEGORIES_KEY, BUDGET_SUMMARY_KEY] {
            self.cache.invalidate(key)?;
        }
        Ok(())
    }

    fn ledger_sheet(&mut self, kind: LedgerKind) -> Result<&mut Sheet, LedgerError> {
        self.workbook
            .sheet_mut(kind.sheet_name())
            .map_err(LedgerError::StoreUnavailable)
    }

    /// Persists a batch of ledger entries.
    ///
    /// The budget summary is invalidated whenever at least one row may have
    /// been written, including when the batch failed part way.
    pub fn save_entries(
        &mut self,
        kind: LedgerKind,
        records: &[Record],
    ) -> Result<UpsertResult, BudgetError> {
        let layout = kind.layout();
        let outcome = upsert::upsert(records, self.ledger_sheet(kind)?, &layout);
        match &outcome {
            Ok(result) => log::info!(
                "saved {} {} entries ({} updated, {} appended, {} reused, {} dropped)",
                records.len(),
                kind,
                result.updated,
                result.inserted,
                result.reused,
                result.dropped
            ),
            Err(e) => log::error!("error saving {} entries: {}", kind, e),
        }
        if !matches!(outcome, Err(LedgerError::StoreUnavailable(_))) {
            self.cache.invalidate(BUDGET_SUMMARY_KEY)?;
        }
        Ok(outcome?)
    }

    /// Saves one entry entered by hand.
    ///
    /// Unlike the batch path this rejects unpersistable input, and a newly
    /// written income or expense moves the balance of its account.
    pub fn save_entry(
        &mut self,
        kind: LedgerKind,
        record: &Record,
    ) -> Result<UpsertResult, BudgetError> {
        let Some(amount) = record.amount_value() else {
            return Err(LedgerError::InvalidRecord("Invalid amount".to_string()).into());
        };
        if kind == LedgerKind::Expense && record.field("category").is_blank() {
            return Err(LedgerError::InvalidRecord("Category is required".to_string()).into());
        }

        let result = self.save_entries(kind, std::slice::from_ref(record))?;
        let fresh = result
            .assignments
            .first()
            .is_some_and(|a| a.placement != Placement::Update);
        let account = record.field("account");
        if fresh && kind.balance_sign() != 0.0 {
            if let Some(account) = account.as_key() {
                self.adjust_account_balance(&account, kind.balance_sign() * amount)?;
            }
        }
        Ok(result)
    }

    /// Clears the row holding `id`; the row is reused by later saves.
    pub fn delete_entry(&mut self, kind: LedgerKind, id: &str) -> Result<usize, BudgetError> {
        let layout = kind.layout();
        let row = upsert::delete(id, self.ledger_sheet(kind)?, &layout)?;
        self.cache.invalidate(BUDGET_SUMMARY_KEY)?;
        log::info!("deleted {} entry {} from {}", kind, id, layout.block_name(row));
        Ok(row)
    }

    /// Every stored entry of the ledger as a JSON object with its row.
    pub fn list_entries(&self, kind: LedgerKind) -> Result<Vec<Value>, BudgetError> {
        let layout = kind.layout();
        let sheet = self
            .workbook
            .sheet(kind.sheet_name())
            .map_err(LedgerError::StoreUnavailable)?;
        Ok(upsert::list(sheet, &layout)?
            .into_iter()
            .map(|(row, cells)| Record::row_to_json(&layout, row, &cells))
            .collect())
    }

    fn setup_column(&self, range: &'static str) -> Result<(usize, Vec<CellValue>), BudgetError> {
        let range_ref = Sheet::parse_range(range).ok_or(BudgetError::BadRange(range))?;
        let cells = self
            .workbook
            .sheet(SETUP_SHEET)?
            .get_range(&range_ref)?
            .into_iter()
            .map(|mut row| row.swap_remove(0))
            .collect();
        Ok((range_ref.start_row, cells))
    }

    /// Category names and the active subset, served from the cache when
    /// `use_cache` is set and both lists are cached.
    pub fn categories(&mut self, use_cache: bool) -> Result<Categories, BudgetError> {
        if use_cache {
            let cached: Option<Vec<String>> = self.cache.get_json(CACHED_CATEGORIES_KEY);
            let active: Option<Vec<String>> = self.cache.get_json(ACTIVE_CATEGORIES_KEY);
            if let (Some(categories), Some(active_categories)) = (cached, active) {
                log::debug!("using cached categories");
                return Ok(Categories {
                    categories,
                    active_categories,
                    from_cache: true,
                });
            }
        }

        let (_, names) = self.setup_column(CATEGORY_NAMES_RANGE)?;
        let (_, flags) = self.setup_column(CATEGORY_ACTIVE_RANGE)?;
        let mut categories = Vec::new();
        let mut active_categories = Vec::new();
        for (name, flag) in names.iter().zip(&flags) {
            let Some(name) = name.as_key() else { continue };
            if flag.is_true() {
                active_categories.push(name.clone());
            }
            categories.push(name);
        }

        self.cache.set_json(CACHED_CATEGORIES_KEY, &categories)?;
        self.cache.set_json(ACTIVE_CATEGORIES_KEY, &active_categories)?;
        Ok(Categories {
            categories,
            active_categories,
            from_cache: false,
        })
    }

    /// Adds a category to the Setup sheet, or updates its budget if it
    /// already exists. New categories start active.
    pub fn add_category(&mut self, name: &str, budget: f64) -> Result<usize, BudgetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidRecord("Category name is required".to_string()).into());
        }
        let (start_row, names) = self.setup_column(CATEGORY_NAMES_RANGE)?;
        let existing = names.iter().position(|n| n.as_key().as_deref() == Some(name));
        let offset = match existing.or_else(|| names.iter().position(CellValue::is_blank)) {
            Some(offset) => offset,
            None => {
                return Err(LedgerError::InvalidRecord(format!(
                    "no free category slot in {}",
                    CATEGORY_NAMES_RANGE
                ))
                .into());
            }
        };
        let row = start_row + offset;
        let setup = self.workbook.sheet_mut(SETUP_SHEET)?;
        if existing.is_none() {
            setup.write_row(row, 6, &[CellValue::Bool(true), CellValue::text(name)])?;
        }
        setup.set_cell(row, 8, CellValue::Number(budget))?;
        for key in [CACHED_CATEGORIES_KEY, ACTIVE_CATEGORIES_KEY, BUDGET_SUMMARY_KEY] {
            self.cache.invalidate(key)?;
        }
        Ok(row)
    }

    /// Flips a category's active checkbox and keeps the cached active list
    /// in step with it.
    pub fn set_category_active(
        &mut self,
        name: &str,
        active: bool,
    ) -> Result<Vec<String>, BudgetError> {
        let (start_row, names) = self.setup_column(CATEGORY_NAMES_RANGE)?;
        let offset = names
            .iter()
            .position(|n| n.as_key().as_deref() == Some(name))
            .ok_or_else(|| LedgerError::NotFound("Category not found in spreadsheet".to_string()))?;
        let active_column = Sheet::parse_range(CATEGORY_ACTIVE_RANGE)
            .ok_or(BudgetError::BadRange(CATEGORY_ACTIVE_RANGE))?
            .start_col;
        self.workbook
            .sheet_mut(SETUP_SHEET)?
            .set_cell(start_row + offset, active_column, CellValue::Bool(active))?;

        let mut active_categories: Vec<String> =
            self.cache.get_json(ACTIVE_CATEGORIES_KEY).unwrap_or_default();
        if active {
            if !active_categories.iter().any(|c| c == name) {
                active_categories.push(name.to_string());
            }
        } else {
            active_categories.retain(|c| c != name);
        }
        self.cache.set_json(ACTIVE_CATEGORIES_KEY, &active_categories)?;
        self.cache.invalidate(BUDGET_SUMMARY_KEY)?;
        Ok(active_categories)
    }

    /// Moves an account balance on the Net Worth sheet by `delta`.
    ///
    /// Returns the new balance, or `None` when the account is not listed.
    pub fn adjust_account_balance(
        &mut self,
        account: &str,
        delta: f64,
    ) -> Result<Option<f64>, BudgetError> {
        let sheet = self.workbook.sheet_mut(NET_WORTH_SHEET)?;
        let found =
            sheet.find_row_by_exact_value(ACCOUNT_NAME_COLUMN, ACCOUNT_FIRST_ROW, &CellValue::text(account))?;
        let Some(row) = found else {
            log::warn!("Account not found: {}", account);
            return Ok(None);
        };
        let current = sheet
            .get_cell(row, ACCOUNT_BALANCE_COLUMN)?
            .as_number()
            .unwrap_or(0.0);
        let balance = current + delta;
        sheet.set_cell(row, ACCOUNT_BALANCE_COLUMN, CellValue::Number(balance))?;
        Ok(Some(balance))
    }

    /// Adds an account row, or resets the balance of an existing one.
    pub fn set_account(&mut self, account: &str, balance: f64) -> Result<usize, BudgetError> {
        let sheet = self.workbook.sheet_mut(NET_WORTH_SHEET)?;
        let found =
            sheet.find_row_by_exact_value(ACCOUNT_NAME_COLUMN, ACCOUNT_FIRST_ROW, &CellValue::text(account))?;
        let row = match found {
            Some(row) => row,
            None => sheet.last_occupied_row()?.max(ACCOUNT_FIRST_ROW - 1) + 1,
        };
        sheet.set_cell(row, ACCOUNT_NAME_COLUMN, CellValue::text(account))?;
        sheet.set_cell(row, ACCOUNT_BALANCE_COLUMN, CellValue::Number(balance))?;
        Ok(row)
    }

    pub fn accounts(&self) -> Result<Vec<Account>, BudgetError> {
        let sheet = self.workbook.sheet(NET_WORTH_SHEET)?;
        let mut accounts = Vec::new();
        for row in ACCOUNT_FIRST_ROW..=sheet.last_occupied_row()? {
            let Some(name) = sheet.get_cell(row, ACCOUNT_NAME_COLUMN)?.as_key() else {
                continue;
            };
            let balance = sheet
                .get_cell(row, ACCOUNT_BALANCE_COLUMN)?
                .as_number()
                .unwrap_or(0.0);
            accounts.push(Account { name, balance, row });
        }
        Ok(accounts)
    }

    /// Totals for the month containing `day` (today when `None`).
    ///
    /// Entries whose date cell cannot be read as a date are left out.
    pub fn budget_summary(&mut self, day: Option<NaiveDate>) -> Result<BudgetSummary, BudgetError> {
        let day = day.unwrap_or_else(|| Local::now().date_naive());
        if let Some(mut cached) = self.cache.get_json::<BudgetSummary>(BUDGET_SUMMARY_KEY) {
            if cached.year == day.year() && cached.month == day.month() {
                cached.from_cache = true;
                return Ok(cached);
            }
        }

        let income = self.month_totals(LedgerKind::Income, "source", day)?;
        let spending = self.month_totals(LedgerKind::Expense, "category", day)?;

        let (_, names) = self.setup_column(CATEGORY_NAMES_RANGE)?;
        let (_, flags) = self.setup_column(CATEGORY_ACTIVE_RANGE)?;
        let (_, budgets) = self.setup_column(CATEGORY_BUDGET_RANGE)?;
        let mut categories = Vec::new();
        for ((name, flag), budget) in names.iter().zip(&flags).zip(&budgets) {
            let Some(name) = name.as_key() else { continue };
            if !flag.is_true() && !spending.by_group.contains_key(&name) {
                continue;
            }
            let actual = spending.by_group.get(&name).copied().unwrap_or(0.0);
            let budgeted = budget.as_number().unwrap_or(0.0);
            categories.push(CategorySummary {
                name,
                actual,
                budgeted,
                remaining: budgeted - actual,
            });
        }
        // Spending under categories the Setup sheet does not know about
        for (name, actual) in &spending.by_group {
            if !categories.iter().any(|c| &c.name == name) {
                categories.push(CategorySummary {
                    name: name.clone(),
                    actual: *actual,
                    budgeted: 0.0,
                    remaining: -actual,
                });
            }
        }

        let summary = BudgetSummary {
            year: day.year(),
            month: day.month(),
            month_name: day.format("%B").to_string(),
            income: income.total,
            spent: spending.total,
            left_to_spend: income.total - spending.total,
            categories,
            from_cache: false,
        };
        self.cache.set_json(BUDGET_SUMMARY_KEY, &summary)?;
        Ok(summary)
    }

    fn month_totals(
        &self,
        kind: LedgerKind,
        group_field: &str,
        day: NaiveDate,
    ) -> Result<MonthTotals, BudgetError> {
        let layout = kind.layout();
        let sheet = self
            .workbook
            .sheet(kind.sheet_name())
            .map_err(LedgerError::StoreUnavailable)?;
        let date_offset = layout.columns.iter().position(|c| c.field == "date");
        let group_offset = layout.columns.iter().position(|c| c.field == group_field);

        let mut totals = MonthTotals::default();
        for (row, cells) in upsert::list(sheet, &layout)? {
            let Some(date) = date_offset.and_then(|o| cells[o].as_date()) else {
                log::debug!("{} row {} has no readable date", kind, row);
                continue;
            };
            if date.year() != day.year() || date.month() != day.month() {
                continue;
            }
            let Some(amount) = cells[layout.amount_column_offset].as_number() else {
                continue;
            };
            totals.total += amount;
            if let Some(group) = group_offset.and_then(|o| cells[o].as_key()) {
                *totals.by_group.entry(group).or_insert(0.0) += amount;
            }
        }
        Ok(totals)
    }
}

#[derive(Default)]
struct MonthTotals {
    total: f64,
    by_group: BTreeMap<String, f64>,
}
