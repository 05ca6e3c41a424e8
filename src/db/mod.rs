/// Database layer for the Campus Report portal
///
/// Manages the shared SQLite pool and creates the schema and seed rows
/// idempotently at startup.

use crate::error::{PortalError, PortalResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Tables, indexes and default rows
const SCHEMA: &str = include_str!("schema.sql");

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> PortalResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// In-memory pool for tests and throwaway instances.
///
/// Every connection to `sqlite::memory:` gets its own database, so the pool
/// is pinned to a single connection that never expires.
pub async fn memory_pool() -> PortalResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    Ok(pool)
}

/// Create tables and seed default categories, prefixes and settings
pub async fn ensure_schema(pool: &SqlitePool) -> PortalResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::debug!("database schema ensured");
    Ok(())
}

/// Fixed-width UTC timestamp, so stored values sort lexically
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp column
pub fn parse_timestamp(value: &str) -> PortalResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PortalError::Internal(format!("Invalid timestamp: {}", e)))
}

/// Parse a nullable timestamp column, ignoring malformed values
pub fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> PortalResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
