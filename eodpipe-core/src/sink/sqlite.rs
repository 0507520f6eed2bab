//! SQLite price sink.
//!
//! Holds one connection for the lifetime of a run; every `write_batch` runs
//! a prepared insert inside a single transaction.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::PriceSink;
use crate::error::IngestError;
use crate::transform::PriceRecord;

/// Table name in the reference deployment.
pub const DEFAULT_TABLE: &str = "daily_price";

pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    /// Open (or create) a database file.
    pub fn open(path: &Path, table: impl Into<String>) -> Result<Self, IngestError> {
        let conn = Connection::open(path)
            .map_err(|e| IngestError::Sink(format!("open '{}': {e}", path.display())))?;
        Ok(Self {
            conn,
            table: table.into(),
        })
    }

    /// In-memory database, for tests and dry runs.
    pub fn open_in_memory(table: impl Into<String>) -> Result<Self, IngestError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IngestError::Sink(format!("open in-memory: {e}")))?;
        Ok(Self {
            conn,
            table: table.into(),
        })
    }

    /// Create the price table and its lookup index if absent.
    pub fn init_schema(&self) -> Result<(), IngestError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                ticker TEXT NOT NULL,
                data_date TEXT NOT NULL,
                price REAL NOT NULL,
                source TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_ticker_date
                ON {table} (ticker, data_date);
            "#,
            table = self.table
        );

        self.conn
            .execute_batch(&ddl)
            .map_err(|e| IngestError::Sink(format!("schema init for '{}': {e}", self.table)))?;

        info!(table = %self.table, "price table ready");
        Ok(())
    }

    /// Number of rows currently in the table.
    pub fn row_count(&self) -> Result<usize, IngestError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| IngestError::Sink(format!("count rows in '{}': {e}", self.table)))?;
        Ok(count as usize)
    }
}

impl PriceSink for SqliteSink {
    fn table(&self) -> &str {
        &self.table
    }

    fn write_batch(&mut self, records: &[PriceRecord]) -> Result<(), IngestError> {
        let rows = records.len();

        let tx = self
            .conn
            .transaction()
            .map_err(|e| write_failed(&self.table, rows, e))?;
        {
            let sql = format!(
                "INSERT INTO {} (ticker, data_date, price, source) VALUES (?1, ?2, ?3, ?4)",
                self.table
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| write_failed(&self.table, rows, e))?;
            for rec in records {
                stmt.execute(params![rec.ticker, rec.data_date, rec.price, rec.source])
                    .map_err(|e| write_failed(&self.table, rows, e))?;
            }
        }
        tx.commit().map_err(|e| write_failed(&self.table, rows, e))?;

        debug!(table = %self.table, rows, "bulk write committed");
        Ok(())
    }
}

fn write_failed(table: &str, rows: usize, e: rusqlite::Error) -> IngestError {
    IngestError::WriteFailed {
        table: table.to_string(),
        rows,
        reason: e.to_string(),
    }
}
