//! Database schema management for `kwh-rollup`.
//!
//! Ensures required tables exist before the aggregation cycles start or any
//! request is served. Applied once on startup via `Store::connect`.

use sqlx::SqlitePool;

use crate::error::StoreError;

// ---

/// Create the database schema (idempotent).
///
/// Creates the `readings` table for raw readings and one bucket table per
/// granularity. All timestamps are integer microseconds since the Unix epoch.
/// Safe to call on every startup; no-op if the tables already exist.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    // ---
    let mut tx = pool.begin().await.map_err(StoreError::Schema)?;

    // Raw readings, one row per timestamp (re-import overwrites)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            ts_us      INTEGER PRIMARY KEY,
            kwh_value  REAL    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(StoreError::Schema)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_buckets (
            window_start_us  INTEGER PRIMARY KEY,
            kwh_value        REAL    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(StoreError::Schema)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_buckets (
            window_start_us  INTEGER PRIMARY KEY,
            kwh_value        REAL    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(StoreError::Schema)?;

    tx.commit().await.map_err(StoreError::Schema)?;
    Ok(())
}
