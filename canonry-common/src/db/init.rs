//! Database initialization
//!
//! Opens (creating if needed) the SQLite file backing the Work Store and
//! brings the schema up to date. Safe to call on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas on the connect options apply to every pooled connection
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

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
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table and trigger (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_works_table(pool).await?;
    create_work_edges_table(pool).await?;
    create_promotion_events_table(pool).await?;
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

/// Create the works table
///
/// Lock columns are populated iff tier is CANON. Triggers make a CANON row
/// immutable and undeletable and reject any tier regression.
pub async fn create_works_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS works (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            tier TEXT NOT NULL DEFAULT 'JAM' CHECK (tier IN ('JAM', 'PLATE', 'CANON')),
            locked_at TEXT,
            locked_by TEXT,
            created_at TEXT NOT NULL,
            CHECK ((tier = 'CANON') = (locked_at IS NOT NULL AND locked_by IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS works_canon_immutable
        BEFORE UPDATE ON works
        WHEN OLD.tier = 'CANON'
        BEGIN
            SELECT RAISE(ABORT, 'canon work is immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS works_tier_monotonic
        BEFORE UPDATE OF tier ON works
        WHEN (CASE NEW.tier WHEN 'JAM' THEN 0 WHEN 'PLATE' THEN 1 ELSE 2 END)
           < (CASE OLD.tier WHEN 'JAM' THEN 0 WHEN 'PLATE' THEN 1 ELSE 2 END)
        BEGIN
            SELECT RAISE(ABORT, 'tier cannot decrease');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS works_canon_undeletable
        BEFORE DELETE ON works
        WHEN OLD.tier = 'CANON'
        BEGIN
            SELECT RAISE(ABORT, 'canon work cannot be deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the work_edges table (append-only)
pub async fn create_work_edges_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_edges (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL REFERENCES works(id),
            target_id TEXT NOT NULL REFERENCES works(id),
            edge_type TEXT NOT NULL CHECK (edge_type IN ('FORK', 'MERGE', 'DERIVED')),
            created_at TEXT NOT NULL,
            UNIQUE (source_id, target_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS work_edges_target_not_canon
        BEFORE INSERT ON work_edges
        WHEN (SELECT tier FROM works WHERE id = NEW.target_id) = 'CANON'
        BEGIN
            SELECT RAISE(ABORT, 'edge target is canon');
        END
        "#,
    )
    .execute(pool)
    .await?;

    append_only_triggers(pool, "work_edges").await
}

/// Create the promotion_events table (append-only audit log)
pub async fn create_promotion_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS promotion_events (
            id TEXT PRIMARY KEY,
            work_id TEXT NOT NULL REFERENCES works(id),
            from_tier TEXT NOT NULL,
            to_tier TEXT NOT NULL,
            justification TEXT NOT NULL CHECK (length(trim(justification)) >= 10),
            curator_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            CHECK ((from_tier = 'JAM' AND to_tier = 'PLATE')
                OR (from_tier = 'PLATE' AND to_tier = 'CANON'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    append_only_triggers(pool, "promotion_events").await
}

async fn append_only_triggers(pool: &SqlitePool, table: &str) -> Result<()> {
    for op in ["UPDATE", "DELETE"] {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS {table}_no_{lower} \
             BEFORE {op} ON {table} \
             BEGIN SELECT RAISE(ABORT, '{table} is append-only'); END",
            table = table,
            op = op,
            lower = op.to_ascii_lowercase(),
        );
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}
