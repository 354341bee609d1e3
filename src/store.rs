//! SQLite-backed storage for raw readings and aggregated buckets.
//!
//! Every write is an upsert keyed by timestamp (readings) or window start
//! (buckets), so replaying the same data never double counts. The store does
//! not serialize writers itself; callers hold the scheduler's write lock.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::StoreError;
use crate::models::{Bucket, Reading};
use crate::schema;
use crate::window::{Granularity, Window};
use crate::Config;

// ---

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

fn bucket_table(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Hourly => "hourly_buckets",
        Granularity::Daily => "daily_buckets",
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or(StoreError::TimestampOutOfRange { micros })
}

async fn sum_in_window(conn: &mut SqliteConnection, window: Window) -> Result<f64, StoreError> {
    // ---
    let sum = sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(kwh_value), 0.0)
        FROM readings
        WHERE ts_us >= ?1 AND ts_us < ?2
        "#,
    )
    .bind(window.start.timestamp_micros())
    .bind(window.end.timestamp_micros())
    .fetch_one(&mut *conn)
    .await?;

    Ok(sum)
}

async fn write_bucket(
    conn: &mut SqliteConnection,
    granularity: Granularity,
    bucket: &Bucket,
) -> Result<(), StoreError> {
    // ---
    let sql = format!(
        r#"
        INSERT INTO {table} (window_start_us, kwh_value)
        VALUES (?1, ?2)
        ON CONFLICT (window_start_us) DO UPDATE SET
            kwh_value = excluded.kwh_value
        "#,
        table = bucket_table(granularity)
    );

    sqlx::query(&sql)
        .bind(bucket.window_start.timestamp_micros())
        .bind(bucket.kwh_value)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn write_reading(conn: &mut SqliteConnection, reading: &Reading) -> Result<(), StoreError> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO readings (ts_us, kwh_value)
        VALUES (?1, ?2)
        ON CONFLICT (ts_us) DO UPDATE SET
            kwh_value = excluded.kwh_value
        "#,
    )
    .bind(reading.timestamp.timestamp_micros())
    .bind(reading.value)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl Store {
    // ---
    /// Open (creating if missing) the database and ensure the schema exists.
    ///
    /// Writers wait at most `cfg.db_busy_timeout` on a locked database before
    /// the write fails.
    pub async fn connect(cfg: &Config) -> Result<Self, StoreError> {
        // ---
        let options = SqliteConnectOptions::from_str(&cfg.db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(cfg.db_busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.db_pool_max)
            .connect_with(options)
            .await?;

        schema::create_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Close every pooled connection. Later calls fail with a store error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert or overwrite the reading keyed by its timestamp.
    pub async fn upsert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        write_reading(&mut conn, reading).await
    }

    /// Upsert a batch of readings in one transaction. Later entries with a
    /// duplicate timestamp win.
    pub async fn upsert_readings(&self, readings: &[Reading]) -> Result<usize, StoreError> {
        // ---
        let mut tx = self.pool.begin().await?;
        for reading in readings {
            write_reading(&mut *tx, reading).await?;
        }
        tx.commit().await?;

        Ok(readings.len())
    }

    /// Sum of reading values in `[window.start, window.end)`; 0.0 when empty.
    pub async fn sum_readings_in_window(&self, window: Window) -> Result<f64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        sum_in_window(&mut conn, window).await
    }

    /// Insert or overwrite the bucket keyed by its window start.
    pub async fn upsert_bucket(
        &self,
        granularity: Granularity,
        bucket: &Bucket,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        write_bucket(&mut conn, granularity, bucket).await
    }

    /// All buckets of one granularity, ordered by window start.
    pub async fn list_buckets(&self, granularity: Granularity) -> Result<Vec<Bucket>, StoreError> {
        // ---
        let sql = format!(
            "SELECT window_start_us, kwh_value FROM {} ORDER BY window_start_us ASC",
            bucket_table(granularity)
        );

        let rows: Vec<(i64, f64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(start_us, kwh_value)| {
                Ok(Bucket {
                    window_start: from_micros(start_us)?,
                    kwh_value,
                })
            })
            .collect()
    }

    /// Recompute one bucket from raw readings: sum the window and upsert the
    /// result inside a single transaction.
    pub async fn refresh_bucket(
        &self,
        granularity: Granularity,
        window: Window,
    ) -> Result<Bucket, StoreError> {
        // ---
        let mut tx = self.pool.begin().await?;

        let kwh_value = sum_in_window(&mut *tx, window).await?;
        let bucket = Bucket {
            window_start: window.start,
            kwh_value,
        };
        write_bucket(&mut *tx, granularity, &bucket).await?;

        tx.commit().await?;
        Ok(bucket)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, Store) {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = Store::connect(&Config::with_db_url(url)).await.unwrap();
        (dir, store)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn reading(h: u32, m: u32, value: f64) -> Reading {
        Reading {
            timestamp: at(h, m),
            value,
        }
    }

    async fn seed(store: &Store) {
        store
            .upsert_readings(&[reading(5, 0, 10.0), reading(5, 30, 5.0), reading(23, 0, 2.0)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        // ---
        let (dir, store) = open_store().await;
        seed(&store).await;
        store.close().await;

        // Reopening runs create_schema again and keeps the data
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let reopened = Store::connect(&Config::with_db_url(url)).await.unwrap();
        let day = Granularity::Daily.window_containing(at(0, 0));
        assert_eq!(reopened.sum_readings_in_window(day).await.unwrap(), 17.0);
    }

    #[tokio::test]
    async fn test_sum_in_window() {
        // ---
        let (_dir, store) = open_store().await;
        seed(&store).await;

        let five = Granularity::Hourly.window_containing(at(5, 10));
        assert_eq!(store.sum_readings_in_window(five).await.unwrap(), 15.0);

        let day = Granularity::Daily.window_containing(at(12, 0));
        assert_eq!(store.sum_readings_in_window(day).await.unwrap(), 17.0);
    }

    #[tokio::test]
    async fn test_empty_window_sums_to_zero() {
        // ---
        let (_dir, store) = open_store().await;
        seed(&store).await;

        let empty = Granularity::Hourly.window_containing(at(7, 0));
        assert_eq!(store.sum_readings_in_window(empty).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_window_end_is_exclusive() {
        // ---
        let (_dir, store) = open_store().await;
        store.upsert_reading(&reading(6, 0, 3.0)).await.unwrap();

        let five = Granularity::Hourly.window_containing(at(5, 0));
        assert_eq!(store.sum_readings_in_window(five).await.unwrap(), 0.0);
        let six = Granularity::Hourly.window_containing(at(6, 0));
        assert_eq!(store.sum_readings_in_window(six).await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_reimport_last_write_wins() {
        // ---
        let (_dir, store) = open_store().await;
        store.upsert_reading(&reading(5, 0, 1.0)).await.unwrap();
        store.upsert_reading(&reading(5, 0, 4.0)).await.unwrap();

        let five = Granularity::Hourly.window_containing(at(5, 0));
        assert_eq!(store.sum_readings_in_window(five).await.unwrap(), 4.0);

        // Same rule inside one batch
        store
            .upsert_readings(&[reading(5, 0, 7.0), reading(5, 0, 8.0)])
            .await
            .unwrap();
        assert_eq!(store.sum_readings_in_window(five).await.unwrap(), 8.0);
    }

    #[tokio::test]
    async fn test_refresh_bucket_overwrites() {
        // ---
        let (_dir, store) = open_store().await;
        seed(&store).await;
        let five = Granularity::Hourly.window_containing(at(5, 0));

        let first = store.refresh_bucket(Granularity::Hourly, five).await.unwrap();
        let second = store.refresh_bucket(Granularity::Hourly, five).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.kwh_value, 15.0);

        let hourly = store.list_buckets(Granularity::Hourly).await.unwrap();
        assert_eq!(hourly, vec![second]);
        assert!(store.list_buckets(Granularity::Daily).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_buckets_ordered_by_key() {
        // ---
        let (_dir, store) = open_store().await;
        for (h, v) in [(9, 1.0), (2, 2.0), (5, 3.0)] {
            let bucket = Bucket {
                window_start: at(h, 0),
                kwh_value: v,
            };
            store.upsert_bucket(Granularity::Hourly, &bucket).await.unwrap();
        }

        let starts: Vec<_> = store
            .list_buckets(Granularity::Hourly)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.window_start)
            .collect();
        assert_eq!(starts, vec![at(2, 0), at(5, 0), at(9, 0)]);
    }

    #[tokio::test]
    async fn test_busy_timeout_bounds_write_wait() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("busy.db").display());
        let mut cfg = Config::with_db_url(url);
        cfg.db_busy_timeout = Duration::from_millis(200);

        let holder = Store::connect(&cfg).await.unwrap();
        let waiter = Store::connect(&cfg).await.unwrap();

        // Hold the database write lock from the first store
        let mut tx = holder.pool.begin().await.unwrap();
        write_reading(&mut *tx, &reading(1, 0, 1.0)).await.unwrap();

        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            waiter.upsert_reading(&reading(2, 0, 2.0)),
        )
        .await
        .expect("write should fail on its own before the outer timeout");
        let waited = started.elapsed();

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert!(waited >= Duration::from_millis(150), "gave up after {:?}", waited);
        assert!(waited < Duration::from_secs(3), "waited {:?}", waited);

        tx.rollback().await.unwrap();
        waiter.upsert_reading(&reading(2, 0, 2.0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_store_reports_error() {
        // ---
        let (_dir, store) = open_store().await;
        store.close().await;

        let day = Granularity::Daily.window_containing(at(0, 0));
        assert!(matches!(
            store.refresh_bucket(Granularity::Daily, day).await,
            Err(StoreError::Database(_))
        ));
    }
}
