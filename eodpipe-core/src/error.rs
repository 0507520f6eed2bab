//! Structured error types for the ingestion pipeline.
//!
//! All variants are fatal to a run: there is no automatic retry and no
//! skip-and-continue within a write call. The only partial outcome is the
//! per-ticker commit boundary: tickers committed before a failure stay
//! committed.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The bundle cannot produce bars for a requested ticker
    /// (missing partition or unreadable/corrupt data).
    #[error("source unavailable for '{ticker}': {reason}")]
    SourceUnavailable { ticker: String, reason: String },

    /// Rejected before any processing begins.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// The sink rejected a bulk write.
    #[error("bulk write of {rows} row(s) to '{table}' failed: {reason}")]
    WriteFailed {
        table: String,
        rows: usize,
        reason: String,
    },

    /// Cooperative cancellation observed between tickers.
    #[error("run cancelled before ticker '{next_ticker}'")]
    Cancelled { next_ticker: String },

    /// Bundle-side failure outside a specific ticker read
    /// (universe scan, partition write).
    #[error("bundle error: {0}")]
    Bundle(String),

    /// Sink connection or schema failure outside a bulk write.
    #[error("sink error: {0}")]
    Sink(String),

    /// Job file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}
