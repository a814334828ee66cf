//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for reports, tallies and option lists.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::models::OptionCategory;

/// Initialize the database connection pool, run migrations and seed option lists.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    seed_options(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repair_reports (
            id TEXT PRIMARY KEY,
            author TEXT NOT NULL,
            equipment_id TEXT NOT NULL,
            issue TEXT NOT NULL,
            parts TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // `count` has no declared type so rows imported from older data keep
    // whatever shape they had; the repository coerces on read.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_counts (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            camp TEXT NOT NULL,
            device TEXT NOT NULL,
            issue TEXT NOT NULL,
            author TEXT NOT NULL,
            count
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS options (
            category TEXT PRIMARY KEY,
            items TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reports_author_created ON repair_reports(author, created_at);
        CREATE INDEX IF NOT EXISTS idx_reports_created ON repair_reports(created_at);
        CREATE INDEX IF NOT EXISTS idx_counts_scope ON issue_counts(date, camp, author);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert default lists for categories that have no record yet.
async fn seed_options(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for category in OptionCategory::ALL {
        let items = serde_json::to_string(category.defaults()).unwrap_or_else(|_| "[]".into());
        let result = sqlx::query("INSERT OR IGNORE INTO options (category, items) VALUES (?, ?)")
            .bind(category.as_str())
            .bind(&items)
            .execute(pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!("Seeded default {} list", category.as_str());
        }
    }
    Ok(())
}
