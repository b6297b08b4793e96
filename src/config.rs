//! Process settings for the ingestion core.
//!
//! Built once by the caller and handed to [`ConnectionManager`](crate::ConnectionManager)
//! and [`EodProvider`](crate::EodProvider). Nothing in the library reads the
//! environment on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the store file.
pub const DATABASE_PATH_VAR: &str = "EOD_DATABASE_PATH";
/// Environment variable naming the raw EOD file directory.
pub const DATA_DIR_VAR: &str = "EOD_DATA_DIR";

const DEFAULT_DATABASE_PATH: &str = "ngx_eod.db";
const DEFAULT_DATA_DIR: &str = "data/raw/ngx_eod";

/// Store location and raw-data source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the local store file
    pub store_path: PathBuf,
    /// Directory where raw daily price files are dropped
    pub eod_data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            eod_data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Settings {
    /// Creates settings from explicit values.
    pub fn new(store_path: impl Into<PathBuf>, eod_data_dir: impl Into<PathBuf>) -> Self {
        Settings {
            store_path: store_path.into(),
            eod_data_dir: eod_data_dir.into(),
        }
    }

    /// Resolves settings from the process environment.
    ///
    /// A `.env` file in the working directory (or any parent) is loaded first
    /// if present; variables already set in the environment win over it.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Settings {
            store_path: read(DATABASE_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            eod_data_dir: read(DATA_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.eod_data_dir),
        }
    }

    /// Returns a copy with the store path replaced.
    pub fn with_store_path(mut self, store_path: impl AsRef<Path>) -> Self {
        self.store_path = store_path.as_ref().to_path_buf();
        self
    }

    /// Returns a copy with the data directory replaced.
    pub fn with_data_dir(mut self, eod_data_dir: impl AsRef<Path>) -> Self {
        self.eod_data_dir = eod_data_dir.as_ref().to_path_buf();
        self
    }
}
