//! Configuration management

use deedsync_common::{DeedsyncError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::storage::config::StorageConfig;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/land_records";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 64;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Upload Configuration Constants
// ============================================================================

pub const DEFAULT_UPLOAD_SOURCE_ROOT: &str = ".";

/// Default key prefix in the destination bucket.
pub const DEFAULT_UPLOAD_DEST_PREFIX: &str = "Washington/";

/// Subfolder of every source folder that holds the images.
pub const DEFAULT_NESTED_FOLDER: &str = "BLU";

pub const DEFAULT_UPLOAD_EXCLUDED_FOLDER: &str = "bluwc001";

pub const DEFAULT_UPLOAD_EXCLUDED_EXTENSION: &str = "txt";

/// Default number of concurrent upload workers per folder.
pub const DEFAULT_UPLOAD_WORKERS: usize = 256;

/// Default number of source folders uploaded at the same time.
pub const DEFAULT_UPLOAD_FOLDER_CONCURRENCY: usize = 1;

// ============================================================================
// Ingest Configuration Constants
// ============================================================================

pub const DEFAULT_INGEST_SOURCE_ROOT: &str = ".";

/// Source folders are the directories whose name starts with this.
pub const DEFAULT_INGEST_FOLDER_PREFIX: &str = "WASTP";

/// Header extract, one record per document.
pub const DEFAULT_INGEST_HEADER_FILE: &str = "WASTP_prime.txt";

/// Detail extract, one record per grantor/grantee pair.
pub const DEFAULT_INGEST_DETAIL_FILE: &str = "WASTP_multi.txt";

/// Default number of source files loaded at the same time.
pub const DEFAULT_INGEST_OUTER_WORKERS: usize = 2;

/// Default number of record workers per source file.
pub const DEFAULT_INGEST_INNER_WORKERS: usize = 32;

/// Full runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub ingest: IngestConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Upload job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub source_root: PathBuf,
    pub dest_prefix: String,
    pub nested_folder: String,
    /// Subfolder name pruned from the walk, `None` to keep everything
    pub excluded_folder: Option<String>,
    pub excluded_extension: Option<String>,
    pub workers: usize,
    pub folder_concurrency: usize,
}

/// Ingest job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub source_root: PathBuf,
    pub folder_prefix: String,
    pub nested_folder: String,
    pub header_file: String,
    pub detail_file: String,
    pub outer_workers: usize,
    pub inner_workers: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from(DEFAULT_UPLOAD_SOURCE_ROOT),
            dest_prefix: DEFAULT_UPLOAD_DEST_PREFIX.to_string(),
            nested_folder: DEFAULT_NESTED_FOLDER.to_string(),
            excluded_folder: Some(DEFAULT_UPLOAD_EXCLUDED_FOLDER.to_string()),
            excluded_extension: Some(DEFAULT_UPLOAD_EXCLUDED_EXTENSION.to_string()),
            workers: DEFAULT_UPLOAD_WORKERS,
            folder_concurrency: DEFAULT_UPLOAD_FOLDER_CONCURRENCY,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from(DEFAULT_INGEST_SOURCE_ROOT),
            folder_prefix: DEFAULT_INGEST_FOLDER_PREFIX.to_string(),
            nested_folder: DEFAULT_NESTED_FOLDER.to_string(),
            header_file: DEFAULT_INGEST_HEADER_FILE.to_string(),
            detail_file: DEFAULT_INGEST_DETAIL_FILE.to_string(),
            outer_workers: DEFAULT_INGEST_OUTER_WORKERS,
            inner_workers: DEFAULT_INGEST_INNER_WORKERS,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// A value that is set but does not parse is a configuration error rather
/// than a silent fallback.
fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DeedsyncError::Config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Empty string disables an optional filter.
fn env_optional(name: &str, default: &str) -> Option<String> {
    let value = env_or(name, default);
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults.
    ///
    /// Sections are checked by the job that uses them, so a bad upload
    /// setting does not stop an ingest run.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            storage: StorageConfig::from_env(),
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_parse(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                connect_timeout_secs: env_parse(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
            },
            upload: UploadConfig {
                source_root: PathBuf::from(env_or("UPLOAD_SOURCE_ROOT", DEFAULT_UPLOAD_SOURCE_ROOT)),
                dest_prefix: env_or("UPLOAD_DEST_PREFIX", DEFAULT_UPLOAD_DEST_PREFIX),
                nested_folder: env_or("UPLOAD_NESTED_FOLDER", DEFAULT_NESTED_FOLDER),
                excluded_folder: env_optional(
                    "UPLOAD_EXCLUDED_FOLDER",
                    DEFAULT_UPLOAD_EXCLUDED_FOLDER,
                ),
                excluded_extension: env_optional(
                    "UPLOAD_EXCLUDED_EXTENSION",
                    DEFAULT_UPLOAD_EXCLUDED_EXTENSION,
                )
                .map(|ext| ext.trim_start_matches('.').to_string()),
                workers: env_parse("UPLOAD_WORKERS", DEFAULT_UPLOAD_WORKERS)?,
                folder_concurrency: env_parse(
                    "UPLOAD_FOLDER_CONCURRENCY",
                    DEFAULT_UPLOAD_FOLDER_CONCURRENCY,
                )?,
            },
            ingest: IngestConfig {
                source_root: PathBuf::from(env_or("INGEST_SOURCE_ROOT", DEFAULT_INGEST_SOURCE_ROOT)),
                folder_prefix: env_or("INGEST_FOLDER_PREFIX", DEFAULT_INGEST_FOLDER_PREFIX),
                nested_folder: env_or("INGEST_NESTED_FOLDER", DEFAULT_NESTED_FOLDER),
                header_file: env_or("INGEST_HEADER_FILE", DEFAULT_INGEST_HEADER_FILE),
                detail_file: env_or("INGEST_DETAIL_FILE", DEFAULT_INGEST_DETAIL_FILE),
                outer_workers: env_parse("INGEST_OUTER_WORKERS", DEFAULT_INGEST_OUTER_WORKERS)?,
                inner_workers: env_parse("INGEST_INNER_WORKERS", DEFAULT_INGEST_INNER_WORKERS)?,
            },
        };

        Ok(config)
    }

    /// Check what the upload job reads: the upload section and a bucket
    pub fn validate_upload(&self) -> Result<()> {
        self.upload.validate()?;
        if self.storage.bucket.is_empty() {
            return Err(DeedsyncError::Config("S3_BUCKET is not set".to_string()));
        }
        Ok(())
    }

    /// Check what the ingest job reads: the database and ingest sections
    pub fn validate_ingest(&self) -> Result<()> {
        self.database.validate()?;
        self.ingest.validate()
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(DeedsyncError::Config("Database URL cannot be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(DeedsyncError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DeedsyncError::Config("Upload workers must be greater than 0".to_string()));
        }
        if self.folder_concurrency == 0 {
            return Err(DeedsyncError::Config(
                "Upload folder concurrency must be greater than 0".to_string(),
            ));
        }
        if self.nested_folder.is_empty() {
            return Err(DeedsyncError::Config("Upload nested folder cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.outer_workers == 0 || self.inner_workers == 0 {
            return Err(DeedsyncError::Config(format!(
                "Ingest workers must be greater than 0 (outer {}, inner {})",
                self.outer_workers, self.inner_workers
            )));
        }
        if self.header_file == self.detail_file {
            return Err(DeedsyncError::Config(format!(
                "Header and detail extracts must differ, both are '{}'",
                self.header_file
            )));
        }
        Ok(())
    }

    /// Connections needed so every record worker can hold one at once
    pub fn required_connections(&self) -> u32 {
        let needed = self.outer_workers.saturating_mul(self.inner_workers);
        u32::try_from(needed).unwrap_or(u32::MAX)
    }
}
