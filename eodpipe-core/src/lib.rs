//! eodpipe core — loads end-of-day bars from a local Parquet bundle into a
//! relational daily price table.
//!
//! Pipeline stages:
//! - Bundle store: per-ticker Parquet partitions, read-only from the pipeline
//! - Transform: packed-date decode, close-price projection, inclusive range filter
//! - Sink: bulk commits of normalized `(ticker, data_date, price, source)` rows
//! - Driver: universe resolution and commit-mode selection (one combined commit
//!   vs. one commit per ticker)

pub mod bundle;
pub mod config;
pub mod dates;
pub mod error;
pub mod ingest;
pub mod sink;
pub mod transform;

pub use bundle::{BundleStore, RawBar};
pub use config::JobConfig;
pub use error::IngestError;
pub use ingest::{
    run_ingest, CommitMode, IngestProgress, IngestRequest, IngestSummary, NoProgress,
    StdoutProgress,
};
pub use sink::{PriceSink, SqliteSink};
pub use transform::{transform, PriceRecord, PRICE_SOURCE};
