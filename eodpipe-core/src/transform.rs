//! Bar-to-price-record transformation.
//!
//! Decodes the bundle's packed dates, keeps only the close price, applies
//! the inclusive date-range filter, and tags provenance. Output order
//! matches input order; an empty result is success, not an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bundle::RawBar;
use crate::dates::decode_packed_date;
use crate::error::IngestError;

/// Provenance literal recorded with every price row.
pub const PRICE_SOURCE: &str = "ricequant";

/// One normalized daily price row, the pipeline's output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker: String,
    pub data_date: NaiveDate,
    pub price: f64,
    pub source: String,
}

/// Transform one ticker's raw bars into normalized price records.
///
/// Every bar's date is decoded before filtering, so a corrupt date aborts
/// the ticker even when the bar would fall outside the requested range.
pub fn transform(
    ticker: &str,
    bars: &[RawBar],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PriceRecord>, IngestError> {
    let mut records = Vec::with_capacity(bars.len());

    for bar in bars {
        let data_date =
            decode_packed_date(bar.date).ok_or_else(|| IngestError::SourceUnavailable {
                ticker: ticker.to_string(),
                reason: format!("undecodable packed date {}", bar.date),
            })?;

        if data_date < start || data_date > end {
            continue;
        }

        records.push(PriceRecord {
            ticker: ticker.to_string(),
            data_date,
            price: bar.close,
            source: PRICE_SOURCE.to_string(),
        });
    }

    Ok(records)
}
