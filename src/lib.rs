/*!
# Sheet Ledger

A personal-budget ledger kept in spreadsheet-shaped storage, built in Rust.

## Overview

Expenses, income and recurring items live as rows of a workbook. Every row
carries a stable identifier in a fixed column, so a client can send a batch
of records and the ledger decides for each one whether it updates an
existing row, fills a cleared row left behind by a delete, or appends below
the last occupied row. Rows are always written whole: a reused row never
keeps cells from the entry that used to live there.

## Architecture

### Storage Layer
- **Technologies**: Rust, serde, bincode, flate2
- **Key Components**:
  - Cell values - typed cells (text, number, date, bool)
  - Sheets and workbooks - sparse row storage addressed A1-style
  - `RowStore` - the narrow row interface the ledger engine writes through
  - Persistence - gzip-compressed bincode (`.bin.gz`), CSV import/export

### Ledger Layer
- Layouts - where each ledger's table starts and what each column holds
- Upsert engine - identifier index, hole reuse and full-row overwrite
- Budget book - categories, account balances and the monthly summary,
  with derived values kept in a cache that writes invalidate

### Service Layer
- **Technologies**: axum, tokio, tower-http (feature `web`)
- JSON API over a single workbook, guarded by one lock per workbook
- Command-line tool for scripted imports and exports

## Modules

- **cell**: Typed cell values and column coercion
- **store**: The `RowStore` trait and storage errors
- **spreadsheet**: In-memory sheets and workbooks, A1 addressing
- **layout**: Ledger table layouts
- **record**: Incoming records and their mapping to rows
- **upsert**: Identifier index and the upsert/delete engine
- **cache**: Cache port with in-memory and JSON-file backends
- **budget**: Ledger-level operations over a workbook
- **config**: Runtime settings
- **saving**: Workbook persistence with compression
- **loader**: CSV import
- **downloader**: Export functionality (CSV, XLSX)
- **app**: Routing and handlers (feature `web`)

## REST API Endpoints

- `GET /api/health` - Liveness check
- `GET|POST /api/ledgers/{ledger}` - List entries / upsert a batch
- `POST /api/ledgers/{ledger}/entry` - Save one entry
- `DELETE /api/ledgers/{ledger}/{id}` - Clear an entry's row
- `GET|POST /api/categories` - Category lists / add a category
- `POST /api/categories/{name}` - Toggle a category active
- `GET /api/budget` - Monthly budget summary
- `GET /api/accounts` - Account balances
- `GET /api/export/{sheet}` - One sheet as CSV
- `GET /api/workbook.xlsx` - Whole workbook as XLSX
- `GET|POST /api/workbook` - Download / replace the `.bin.gz` workbook
*/

pub mod budget;
pub mod cache;
pub mod cell;
pub mod config;
pub mod downloader;
pub mod layout;
pub mod loader;
pub mod record;
pub mod saving;
pub mod spreadsheet;
pub mod store;
pub mod upsert;

#[cfg(feature = "web")]
pub mod app;

pub use budget::{BudgetBook, BudgetError};
pub use cache::{CachePort, JsonFileCache, MemoryCache};
pub use cell::{CellValue, ColumnKind};
pub use layout::{Layout, LedgerKind};
pub use record::Record;
pub use spreadsheet::{Sheet, Workbook};
pub use store::{RowStore, StoreError};
pub use upsert::{LedgerError, Placement, RowAssignment, UpsertResult, upsert};
