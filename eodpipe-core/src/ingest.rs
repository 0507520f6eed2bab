//! Ingestion driver — universe resolution, per-ticker transform, and
//! commit-mode selection.
//!
//! Tickers are processed strictly sequentially, in the same order for both
//! commit modes, so a partial failure in per-ticker mode is reproducible:
//! a failure at ticker k leaves tickers before k committed and everything
//! from k on uncommitted.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bundle::BundleStore;
use crate::error::IngestError;
use crate::sink::PriceSink;
use crate::transform::{transform, PriceRecord};

/// When records are committed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Accumulate every ticker's records and commit the whole run at once.
    /// Memory scales with the total record count; a write failure discards
    /// the entire run's output.
    Single,
    /// Commit each ticker's records immediately after its transform.
    /// Memory is bounded by one ticker; a failure keeps prior tickers'
    /// commits.
    PerTicker,
}

/// Parameters for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Inclusive range start.
    pub start: NaiveDate,
    /// Inclusive range end.
    pub end: NaiveDate,
    /// Explicit tickers to process, in order, not deduplicated.
    /// Empty means the full bundle universe.
    pub tickers: Vec<String>,
    pub mode: CommitMode,
}

/// Progress callbacks for a run.
pub trait IngestProgress {
    /// Called before a ticker is fetched (and before its write in
    /// per-ticker mode).
    fn on_ticker(&self, index: usize, total: usize, ticker: &str);

    /// Called once after the run's final commit.
    fn on_run_complete(&self, summary: &IngestSummary);
}

/// Prints per-ticker progress to stdout.
pub struct StdoutProgress;

impl IngestProgress for StdoutProgress {
    fn on_ticker(&self, index: usize, total: usize, ticker: &str) {
        println!("[{}/{}] {ticker}", index + 1, total);
    }

    fn on_run_complete(&self, summary: &IngestSummary) {
        println!(
            "{} row(s) written across {} commit(s)",
            summary.rows_written, summary.commits
        );
    }
}

/// Silent progress, for library callers and tests.
pub struct NoProgress;

impl IngestProgress for NoProgress {
    fn on_ticker(&self, _index: usize, _total: usize, _ticker: &str) {}
    fn on_run_complete(&self, _summary: &IngestSummary) {}
}

/// Terminal status of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub tickers: usize,
    pub rows_written: usize,
    pub commits: usize,
}

/// Run one ingestion pass: resolve the universe, then fetch, transform, and
/// commit per the requested mode.
///
/// `cancel` is checked between tickers only, never mid-ticker, so a
/// cancelled run still ends on a commit boundary.
pub fn run_ingest(
    store: &BundleStore,
    sink: &mut dyn PriceSink,
    request: &IngestRequest,
    progress: &dyn IngestProgress,
    cancel: Option<&AtomicBool>,
) -> Result<IngestSummary, IngestError> {
    if request.start > request.end {
        return Err(IngestError::InvalidDateRange {
            start: request.start,
            end: request.end,
        });
    }

    let tickers = if request.tickers.is_empty() {
        store.list_tickers()?
    } else {
        request.tickers.clone()
    };
    let total = tickers.len();

    let mut combined: Vec<PriceRecord> = Vec::new();
    let mut rows_written = 0;
    let mut commits = 0;

    for (index, ticker) in tickers.iter().enumerate() {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(IngestError::Cancelled {
                    next_ticker: ticker.clone(),
                });
            }
        }

        progress.on_ticker(index, total, ticker);

        let bars = store.all_bars(ticker)?;
        let records = transform(ticker, &bars, request.start, request.end)?;

        match request.mode {
            CommitMode::Single => combined.extend(records),
            CommitMode::PerTicker => {
                let count = records.len();
                sink.write_batch(&records)?;
                rows_written += count;
                commits += 1;
            }
        }
    }

    // Single mode: one commit for the whole run, skipped only when the
    // resolved universe itself was empty.
    if request.mode == CommitMode::Single && total > 0 {
        info!(
            rows = combined.len(),
            table = sink.table(),
            "committing combined batch"
        );
        sink.write_batch(&combined)?;
        rows_written = combined.len();
        commits = 1;
    }

    let summary = IngestSummary {
        tickers: total,
        rows_written,
        commits,
    };
    progress.on_run_complete(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU64;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_bundle_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("eodpipe_ingest_test_{}_{id}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Records every write call without touching a database.
    struct RecordingSink {
        batches: Vec<Vec<PriceRecord>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                batches: Vec::new(),
            }
        }
    }

    impl PriceSink for RecordingSink {
        fn table(&self) -> &str {
            "recording"
        }

        fn write_batch(&mut self, records: &[PriceRecord]) -> Result<(), IngestError> {
            self.batches.push(records.to_vec());
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(mode: CommitMode) -> IngestRequest {
        IngestRequest {
            start: date(2020, 1, 1),
            end: date(2020, 12, 31),
            tickers: Vec::new(),
            mode,
        }
    }

    #[test]
    fn invalid_range_is_rejected_before_any_bundle_access() {
        // Point the store at a directory that does not exist: if the range
        // check ran after universe resolution this would still succeed with
        // an empty universe, so assert on the error kind.
        let store = BundleStore::new("/nonexistent/bundle");
        let mut sink = RecordingSink::new();

        let req = IngestRequest {
            start: date(2020, 6, 1),
            end: date(2020, 1, 1),
            tickers: vec!["A".into()],
            mode: CommitMode::Single,
        };

        match run_ingest(&store, &mut sink, &req, &NoProgress, None) {
            Err(IngestError::InvalidDateRange { start, end }) => {
                assert_eq!(start, date(2020, 6, 1));
                assert_eq!(end, date(2020, 1, 1));
            }
            other => panic!("expected InvalidDateRange, got: {other:?}"),
        }
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn empty_universe_is_success_with_zero_writes() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        for mode in [CommitMode::Single, CommitMode::PerTicker] {
            let mut sink = RecordingSink::new();
            let summary =
                run_ingest(&store, &mut sink, &request(mode), &NoProgress, None).unwrap();
            assert_eq!(summary.tickers, 0);
            assert_eq!(summary.commits, 0);
            assert_eq!(summary.rows_written, 0);
            assert!(sink.batches.is_empty());
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cancellation_before_first_ticker_writes_nothing() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);
        store
            .write_bars(
                "A",
                &[crate::bundle::RawBar {
                    date: 20200102_000000,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1,
                }],
            )
            .unwrap();

        let mut sink = RecordingSink::new();
        let flag = AtomicBool::new(true);

        match run_ingest(
            &store,
            &mut sink,
            &request(CommitMode::PerTicker),
            &NoProgress,
            Some(&flag),
        ) {
            Err(IngestError::Cancelled { next_ticker }) => assert_eq!(next_ticker, "A"),
            other => panic!("expected Cancelled, got: {other:?}"),
        }
        assert!(sink.batches.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_ticker_list_order_is_preserved() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);
        for ticker in ["A", "B", "C"] {
            store
                .write_bars(
                    ticker,
                    &[crate::bundle::RawBar {
                        date: 20200102_000000,
                        open: 1.0,
                        high: 1.0,
                        low: 1.0,
                        close: 1.0,
                        volume: 1,
                    }],
                )
                .unwrap();
        }

        let mut sink = RecordingSink::new();
        let req = IngestRequest {
            start: date(2020, 1, 1),
            end: date(2020, 12, 31),
            tickers: vec!["C".into(), "A".into(), "B".into()],
            mode: CommitMode::PerTicker,
        };

        run_ingest(&store, &mut sink, &req, &NoProgress, None).unwrap();

        let order: Vec<&str> = sink
            .batches
            .iter()
            .map(|b| b[0].ticker.as_str())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
