//! Error types for the rollup library.
//!
//! Parse failures are recovered per record by the callers; store failures
//! inside a periodic cycle are recovered per tick. Everything else bubbles up
//! to `main` as an `anyhow::Error`.

use thiserror::Error;

/// A reading whose timestamp could not be understood.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid timestamp {input:?}: {source}")]
    Timestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid timestamp {input:?}: expected YYYY-MM-DDTHH:MM:SS with Z or ±HH:MM")]
    Layout { input: String },
}

/// Failures raised by the SQLite-backed store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to create schema: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("stored timestamp {micros}us is out of range")]
    TimestampOutOfRange { micros: i64 },
}
