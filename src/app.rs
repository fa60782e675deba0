use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::budget::{BudgetBook, BudgetError, template};
use crate::cache::{CachePort, JsonFileCache, MemoryCache};
use crate::config::Settings;
use crate::downloader;
use crate::layout::LedgerKind;
use crate::record::Record;
use crate::saving;
use crate::upsert::LedgerError;

pub type SharedCache = Box<dyn CachePort + Send>;

/// Shared server state.
///
/// The mutex is held for the whole read-index-write span of every request,
/// so two saves against the same workbook never interleave.
pub struct AppState {
    book: Mutex<BudgetBook<SharedCache>>,
    workbook_path: PathBuf,
}

impl AppState {
    pub fn new(book: BudgetBook<SharedCache>, workbook_path: PathBuf) -> Self {
        AppState {
            book: Mutex::new(book),
            workbook_path,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BudgetBook<SharedCache>> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, book: &BudgetBook<SharedCache>) -> Result<(), Response> {
        saving::save_workbook(book.workbook(), &self.workbook_path).map_err(|e| {
            log::error!("Error saving workbook: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to save workbook: {}", e))
        })
    }
}

#[derive(Deserialize)]
struct CategoryQuery {
    use_cache: Option<bool>,
}

#[derive(Deserialize)]
struct CategoryStatus {
    active: bool,
}

#[derive(Deserialize)]
struct NewCategory {
    name: String,
    #[serde(default)]
    budget: f64,
}

#[derive(Deserialize)]
struct BudgetQuery {
    date: Option<NaiveDate>,
}

fn failure(status: StatusCode, error: String) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

fn success(mut body: Value) -> Response {
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
    }
    Json(body).into_response()
}

fn budget_failure(error: BudgetError) -> Response {
    let status = match &error {
        BudgetError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
        BudgetError::Ledger(LedgerError::InvalidRecord(_)) => StatusCode::BAD_REQUEST,
        BudgetError::Ledger(LedgerError::StoreUnavailable(_)) | BudgetError::Store(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    // Rows written before a failed write stay written; tell the caller which
    if let BudgetError::Ledger(LedgerError::PartialWrite { completed, .. }) = &error {
        return (
            status,
            Json(json!({
                "success": false,
                "error": error.to_string(),
                "completed": completed,
            })),
        )
            .into_response();
    }
    failure(status, error.to_string())
}

fn parse_ledger(ledger: &str) -> Result<LedgerKind, Response> {
    ledger
        .parse::<LedgerKind>()
        .map_err(|e| failure(StatusCode::NOT_FOUND, e.to_string()))
}

/// Builds the state from settings: loads (or creates) the workbook and
/// opens the configured cache.
pub fn load_state(settings: &Settings) -> Result<AppState, Box<dyn std::error::Error>> {
    let workbook = saving::load_or_create(&settings.workbook_path, template)?;
    let cache: SharedCache = match &settings.cache_path {
        Some(path) => Box::new(JsonFileCache::open(path)?),
        None => Box::new(MemoryCache::new()),
    };
    Ok(AppState::new(
        BudgetBook::new(workbook, cache),
        settings.workbook_path.clone(),
    ))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ledgers/:ledger", get(list_entries).post(save_entries))
        .route("/api/ledgers/:ledger/entry", post(save_entry))
        .route("/api/ledgers/:ledger/:id", axum::routing::delete(delete_entry))
        .route("/api/categories", get(get_categories).post(add_category))
        .route("/api/categories/:name", post(update_category_status))
        .route("/api/budget", get(get_budget))
        .route("/api/accounts", get(get_accounts))
        .route("/api/export/:sheet", get(export_sheet))
        .route("/api/workbook.xlsx", get(export_xlsx))
        .route("/api/workbook", get(download_workbook).post(upload_workbook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(load_state(&settings)?);
    let app = router(state);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    log::info!("Listening on http://{}", settings.bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Response {
    success(json!({
        "timestamp": Local::now().to_rfc3339(),
        "message": "Server connection successful",
    }))
}

async fn list_entries(
    Path(ledger): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let kind = match parse_ledger(&ledger) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let book = state.lock();
    match book.list_entries(kind) {
        Ok(entries) => success(json!({ "entries": entries })),
        Err(e) => {
            log::error!("Error listing {} entries: {}", kind, e);
            budget_failure(e)
        }
    }
}

async fn save_entries(
    Path(ledger): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<Record>>,
) -> Response {
    let kind = match parse_ledger(&ledger) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let mut book = state.lock();
    let outcome = book.save_entries(kind, &records);
    if !matches!(
        outcome,
        Err(BudgetError::Ledger(LedgerError::StoreUnavailable(_)))
    ) {
        if let Err(response) = state.persist(&book) {
            return response;
        }
    }
    match outcome {
        Ok(result) => success(json!({ "result": result })),
        Err(e) => budget_failure(e),
    }
}

async fn save_entry(
    Path(ledger): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(record): Json<Record>,
) -> Response {
    let kind = match parse_ledger(&ledger) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let mut book = state.lock();
    match book.save_entry(kind, &record) {
        Ok(result) => match state.persist(&book) {
            Ok(()) => success(json!({
                "result": result,
                "message": format!("{} saved successfully", kind),
            })),
            Err(response) => response,
        },
        Err(e) => budget_failure(e),
    }
}

async fn delete_entry(
    Path((ledger, id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let kind = match parse_ledger(&ledger) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let mut book = state.lock();
    match book.delete_entry(kind, &id) {
        Ok(row) => match state.persist(&book) {
            Ok(()) => success(json!({ "row": row })),
            Err(response) => response,
        },
        Err(e) => budget_failure(e),
    }
}

async fn get_categories(
    Query(params): Query<CategoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let mut book = state.lock();
    match book.categories(params.use_cache.unwrap_or(true)) {
        Ok(categories) => success(json!(categories)),
        Err(e) => {
            log::error!("Error in getCategories: {}", e);
            budget_failure(e)
        }
    }
}

async fn add_category(
    State(state): State<Arc<AppState>>,
    Json(category): Json<NewCategory>,
) -> Response {
    let mut book = state.lock();
    match book.add_category(&category.name, category.budget) {
        Ok(row) => match state.persist(&book) {
            Ok(()) => success(json!({ "row": row })),
            Err(response) => response,
        },
        Err(e) => budget_failure(e),
    }
}

async fn update_category_status(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(status): Json<CategoryStatus>,
) -> Response {
    let mut book = state.lock();
    match book.set_category_active(&name, status.active) {
        Ok(active_categories) => match state.persist(&book) {
            Ok(()) => success(json!({ "activeCategories": active_categories })),
            Err(response) => response,
        },
        Err(e) => {
            log::error!("Error in updateCategoryStatus: {}", e);
            budget_failure(e)
        }
    }
}

async fn get_budget(
    Query(params): Query<BudgetQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let mut book = state.lock();
    match book.budget_summary(params.date) {
        Ok(summary) => success(json!({ "budget": summary })),
        Err(e) => {
            log::error!("Error in getBudgetData: {}", e);
            budget_failure(e)
        }
    }
}

async fn get_accounts(State(state): State<Arc<AppState>>) -> Response {
    let book = state.lock();
    match book.accounts() {
        Ok(accounts) => {
            let total: f64 = accounts.iter().map(|a| a.balance).sum();
            success(json!({ "accounts": accounts, "netWorth": total }))
        }
        Err(e) => budget_failure(e),
    }
}

async fn export_sheet(
    Path(sheet): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let book = state.lock();
    let csv = book
        .workbook()
        .sheet(&sheet)
        .map_err(|e| failure(StatusCode::NOT_FOUND, e.to_string()))
        .and_then(|sheet| {
            downloader::to_csv(sheet)
                .map_err(|e| failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        });
    match csv {
        Ok(csv) => ([(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(response) => response,
    }
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Response {
    let book = state.lock();
    match downloader::to_xlsx(book.workbook()) {
        Ok(buffer) => (
            [(
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )],
            buffer,
        )
            .into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn download_workbook(State(state): State<Arc<AppState>>) -> Response {
    let book = state.lock();
    match saving::workbook_to_bytes(book.workbook()) {
        Ok(buffer) => ([(header::CONTENT_TYPE, "application/gzip")], buffer).into_response(),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn upload_workbook(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if body.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No file data received".to_string());
    }
    let workbook = match saving::workbook_from_bytes(&body) {
        Ok(workbook) => workbook,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("Failed to load workbook: {}", e),
            );
        }
    };
    let mut book = state.lock();
    if let Err(e) = book.replace_workbook(workbook) {
        return budget_failure(e);
    }
    match state.persist(&book) {
        Ok(()) => success(json!({ "sheets": book.workbook().sheet_names() })),
        Err(response) => response,
    }
}
