use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dates::decode_packed_date;
use crate::error::IngestError;

/// One daily OHLCV observation as stored in the bundle.
///
/// `date` is the store's packed integer encoding (`YYYYMMDD * 1_000_000`);
/// decoding happens downstream in the transform step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Read access to a Hive-partitioned Parquet bundle of daily bars.
pub struct BundleStore {
    bundle_dir: PathBuf,
}

impl BundleStore {
    pub fn new(bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Root directory of the bundle.
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Directory for one ticker: `{bundle_dir}/ticker={TICKER}/`
    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.bundle_dir.join(format!("ticker={ticker}"))
    }

    /// Path to a ticker's bar file.
    fn bars_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join("daily.parquet")
    }

    /// All tickers known to the bundle, sorted lexicographically.
    ///
    /// Directory scan order is OS-dependent; sorting makes runs over the
    /// full universe reproducible. A missing bundle directory is an empty
    /// universe, not an error.
    pub fn list_tickers(&self) -> Result<Vec<String>, IngestError> {
        if !self.bundle_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.bundle_dir)
            .map_err(|e| IngestError::Bundle(format!("scan bundle dir: {e}")))?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IngestError::Bundle(format!("bundle dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(ticker) = name.strip_prefix("ticker=") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    /// Load all bars for a ticker, in stored order (ascending by date).
    pub fn all_bars(&self, ticker: &str) -> Result<Vec<RawBar>, IngestError> {
        let path = self.bars_path(ticker);
        if !path.exists() {
            return Err(IngestError::SourceUnavailable {
                ticker: ticker.to_string(),
                reason: "no bundle partition".to_string(),
            });
        }

        let bars = load_and_validate_parquet(&path).map_err(|reason| {
            IngestError::SourceUnavailable {
                ticker: ticker.to_string(),
                reason,
            }
        })?;

        debug!(ticker, bars = bars.len(), "loaded bundle partition");
        Ok(bars)
    }

    /// Write a ticker's bars as one partition, sorted ascending by date.
    ///
    /// Writes are atomic: the Parquet file lands under a .tmp name and is
    /// renamed into place. This is the bundle's build path (CSV import,
    /// fixtures); the ingestion pipeline never calls it.
    pub fn write_bars(&self, ticker: &str, bars: &[RawBar]) -> Result<(), IngestError> {
        if bars.is_empty() {
            return Err(IngestError::Bundle(format!(
                "no bars to write for '{ticker}'"
            )));
        }

        let dir = self.ticker_dir(ticker);
        fs::create_dir_all(&dir)
            .map_err(|e| IngestError::Bundle(format!("create partition dir: {e}")))?;

        let mut sorted: Vec<&RawBar> = bars.iter().collect();
        sorted.sort_by_key(|b| b.date);

        let df = bars_to_dataframe(&sorted)?;
        let path = self.bars_path(ticker);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            IngestError::Bundle(format!("atomic rename failed: {e}"))
        })?;

        debug!(ticker, bars = bars.len(), "wrote bundle partition");
        Ok(())
    }

    /// Per-ticker bar counts and date ranges, for inspection commands.
    pub fn status(&self) -> Result<Vec<BundleStatus>, IngestError> {
        let mut statuses = Vec::new();
        for ticker in self.list_tickers()? {
            let bars = self.all_bars(&ticker)?;
            statuses.push(BundleStatus {
                first_date: bars.first().and_then(|b| decode_packed_date(b.date)),
                last_date: bars.last().and_then(|b| decode_packed_date(b.date)),
                bar_count: bars.len(),
                ticker,
            });
        }
        Ok(statuses)
    }
}

/// Summary of one ticker's partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStatus {
    pub ticker: String,
    pub bar_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[&RawBar]) -> Result<DataFrame, IngestError> {
    let dates: Vec<i64> = bars.iter().map(|b| b.date).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| IngestError::Bundle(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), IngestError> {
    let file =
        fs::File::create(path).map_err(|e| IngestError::Bundle(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| IngestError::Bundle(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load one partition and check it against the bundle schema.
///
/// Errors are returned as plain reasons; the caller attaches the ticker.
fn load_and_validate_parquet(path: &Path) -> Result<Vec<RawBar>, String> {
    let file = fs::File::open(path).map_err(|e| format!("open: {e}"))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| format!("read parquet: {e}"))?;

    if df.height() == 0 {
        return Err("empty partition".to_string());
    }

    let expected_cols = ["date", "open", "high", "low", "close", "volume"];
    for col_name in &expected_cols {
        if df.column(col_name).is_err() {
            return Err(format!("missing column '{col_name}'"));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<RawBar>, String> {
    let column = |name: &str| df.column(name).map_err(|e| format!("column read: {e}"));

    let date_ca = column("date")?
        .i64()
        .map_err(|e| format!("date column type: {e}"))?;
    let open_ca = column("open")?
        .f64()
        .map_err(|e| format!("open column type: {e}"))?;
    let high_ca = column("high")?
        .f64()
        .map_err(|e| format!("high column type: {e}"))?;
    let low_ca = column("low")?
        .f64()
        .map_err(|e| format!("low column type: {e}"))?;
    let close_ca = column("close")?
        .f64()
        .map_err(|e| format!("close column type: {e}"))?;
    let vol_ca = column("volume")?
        .u64()
        .map_err(|e| format!("volume column type: {e}"))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date = date_ca
            .get(i)
            .ok_or_else(|| format!("null date at row {i}"))?;

        bars.push(RawBar {
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_bundle_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("eodpipe_store_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_bars() -> Vec<RawBar> {
        vec![
            RawBar {
                date: 20200102_000000,
                open: 10.0,
                high: 10.4,
                low: 9.9,
                close: 10.2,
                volume: 1000,
            },
            RawBar {
                date: 20200103_000000,
                open: 10.2,
                high: 10.3,
                low: 10.0,
                close: 10.1,
                volume: 1100,
            },
        ]
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        store.write_bars("600275.XSHG", &sample_bars()).unwrap();
        let loaded = store.all_bars("600275.XSHG").unwrap();

        assert_eq!(loaded, sample_bars());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bars_come_back_sorted_even_if_written_unsorted() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        let mut bars = sample_bars();
        bars.reverse();
        store.write_bars("A", &bars).unwrap();

        let loaded = store.all_bars("A").unwrap();
        assert!(loaded.windows(2).all(|w| w[0].date < w[1].date));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_ticker_is_source_unavailable() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        match store.all_bars("NONEXISTENT") {
            Err(IngestError::SourceUnavailable { ticker, .. }) => {
                assert_eq!(ticker, "NONEXISTENT");
            }
            other => panic!("expected SourceUnavailable, got: {other:?}"),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_tickers_is_sorted() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        store.write_bars("ZZZ", &sample_bars()).unwrap();
        store.write_bars("AAA", &sample_bars()).unwrap();
        store.write_bars("MMM", &sample_bars()).unwrap();

        assert_eq!(store.list_tickers().unwrap(), vec!["AAA", "MMM", "ZZZ"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_bundle_dir_is_empty_universe() {
        let dir = temp_bundle_dir();
        let _ = fs::remove_dir_all(&dir);

        let store = BundleStore::new(&dir);
        assert!(store.list_tickers().unwrap().is_empty());
    }

    #[test]
    fn empty_write_is_rejected() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        assert!(store.write_bars("A", &[]).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_reports_counts_and_ranges() {
        let dir = temp_bundle_dir();
        let store = BundleStore::new(&dir);

        store.write_bars("A", &sample_bars()).unwrap();
        let statuses = store.status().unwrap();

        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].ticker, "A");
        assert_eq!(statuses[0].bar_count, 2);
        assert_eq!(
            statuses[0].first_date,
            NaiveDate::from_ymd_opt(2020, 1, 2)
        );
        assert_eq!(statuses[0].last_date, NaiveDate::from_ymd_opt(2020, 1, 3));

        let _ = fs::remove_dir_all(&dir);
    }
}
