use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a JSON settings file.
pub const CONFIG_ENV: &str = "SHEET_LEDGER_CONFIG";
pub const WORKBOOK_ENV: &str = "SHEET_LEDGER_WORKBOOK";
pub const BIND_ENV: &str = "SHEET_LEDGER_BIND";
pub const CACHE_ENV: &str = "SHEET_LEDGER_CACHE";

const DEFAULT_WORKBOOK: &str = "database/budget.bin.gz";
const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime settings shared by the CLI and the web server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Workbook file (`.bin.gz`).
    pub workbook_path: PathBuf,
    /// Address the web server listens on.
    pub bind_address: String,
    /// JSON file backing the derived-data cache. In-memory when unset.
    pub cache_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            workbook_path: PathBuf::from(DEFAULT_WORKBOOK),
            bind_address: DEFAULT_BIND.to_string(),
            cache_path: None,
        }
    }
}

impl Settings {
    /// Reads a settings file. Keys missing from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup`, normally `std::env::var`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(WORKBOOK_ENV).filter(|v| !v.is_empty()) {
            self.workbook_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.is_empty()) {
            self.bind_address = bind;
        }
        if let Some(cache) = lookup(CACHE_ENV).filter(|v| !v.is_empty()) {
            self.cache_path = Some(PathBuf::from(cache));
        }
        self
    }

    /// Defaults, then the file named by `SHEET_LEDGER_CONFIG` if set, then
    /// the individual environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let env = |key: &str| std::env::var(key).ok();
        let base = match env(CONFIG_ENV) {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Ok(base.with_overrides(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bind_address": "0.0.0.0:8080"}}"#).unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.workbook_path, PathBuf::from(DEFAULT_WORKBOOK));
        assert_eq!(settings.cache_path, None);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(WORKBOOK_ENV, "/tmp/b.bin.gz"), (BIND_ENV, "")]);
        let settings =
            Settings::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.workbook_path, PathBuf::from("/tmp/b.bin.gz"));
        assert_eq!(settings.bind_address, DEFAULT_BIND);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(SettingsError::Parse { .. })
        ));
    }
}
