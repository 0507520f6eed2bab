//! Bundled per-ticker bar storage.
//!
//! Layout: `{bundle_dir}/ticker={TICKER}/daily.parquet`
//!
//! Each partition holds one ticker's full daily history, ascending by date,
//! with the date column in the store's packed integer form. The ingestion
//! pipeline only reads from the bundle; `write_bars` exists for the CSV
//! import path and test fixtures.

mod store;

pub use store::{BundleStatus, BundleStore, RawBar};
