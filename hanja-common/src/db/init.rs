//! Database initialization
//!
//! Opens (creating if missing) the SQLite dictionary database and applies the
//! idempotent schema. The returned pool is owned by the caller; nothing here
//! keeps process-wide state.
//!
//! Enum-valued columns carry CHECK constraints mirroring the canonical
//! vocabulary so that the store rejects out-of-domain values even when written
//! by other tools.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL allows concurrent readers with one writer; foreign keys and busy
    // timeout are per-connection settings so they go on the connect options.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_dictionary_entries_table(pool).await?;
    create_reading_entries_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dictionary_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dictionary_entries (
            character TEXT PRIMARY KEY,
            meaning TEXT,
            strokes INTEGER CHECK (strokes IS NULL OR strokes BETWEEN 1 AND 50),
            element TEXT CHECK (element IS NULL OR element IN ('wood', 'fire', 'earth', 'metal', 'water')),
            yin_yang TEXT CHECK (yin_yang IS NULL OR yin_yang IN ('yin', 'yang')),
            confidence REAL CHECK (confidence IS NULL OR confidence BETWEEN 0.0 AND 1.0),
            review_status TEXT NOT NULL CHECK (review_status IN ('ok', 'needs_review')),
            evidence_score INTEGER NOT NULL CHECK (evidence_score BETWEEN 0 AND 100),
            decided_by TEXT NOT NULL CHECK (decided_by IN ('auto', 'base', 'manual')),
            ruleset TEXT NOT NULL,
            evidence_json TEXT NOT NULL DEFAULT '[]',
            evidence_fingerprint TEXT NOT NULL,
            sources TEXT NOT NULL DEFAULT '[]',
            is_valid INTEGER NOT NULL DEFAULT 1,
            failed_rules TEXT NOT NULL DEFAULT '[]',
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dictionary_entries_element ON dictionary_entries(element)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dictionary_entries_review ON dictionary_entries(review_status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_reading_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reading_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            character TEXT NOT NULL REFERENCES dictionary_entries(character) ON DELETE CASCADE,
            reading TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            sound_element TEXT CHECK (sound_element IS NULL OR sound_element IN ('wood', 'fire', 'earth', 'metal', 'water')),
            UNIQUE (character, reading)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reading_entries_reading ON reading_entries(reading)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
