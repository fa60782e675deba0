#![cfg(not(tarpaulin_include))]

use sheet_ledger::app;
use sheet_ledger::config::Settings;

/// Main entry point for the ledger web server
///
/// Reads settings from `SHEET_LEDGER_CONFIG` and the `SHEET_LEDGER_*`
/// overrides, loads or creates the workbook and serves the JSON API.
/// Set `RUST_LOG=info` to see request-level logging.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = Settings::load()?;
    log::info!(
        "Using workbook {} (cache: {})",
        settings.workbook_path.display(),
        settings
            .cache_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".to_string())
    );

    app::run(settings).await
}
