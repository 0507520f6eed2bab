//! Packed-date codec for the bundle's on-disk date encoding.
//!
//! The bundle stores a bar's date as a single integer, `YYYYMMDD * 1_000_000`
//! (the trailing six digits are a time-of-day field, always zero for daily
//! bars). The division-based decode is a quirk of that store, not a stable
//! contract, so it lives here as a named function with its own tests instead
//! of inline arithmetic at the use sites.

use chrono::{Datelike, NaiveDate};

/// Multiplier between a `YYYYMMDD` integer and its packed on-disk form.
pub const PACKED_DATE_FACTOR: i64 = 1_000_000;

/// Decode a packed bundle date into a calendar date.
///
/// Returns `None` for values whose `YYYYMMDD` quotient is not a real
/// calendar date (including non-positive inputs).
pub fn decode_packed_date(raw: i64) -> Option<NaiveDate> {
    if raw <= 0 {
        return None;
    }
    let ymd = raw / PACKED_DATE_FACTOR;
    let year = ymd / 10_000;
    let month = (ymd / 100) % 100;
    let day = ymd % 100;
    if year > i64::from(i32::MAX) {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
}

/// Encode a calendar date into the bundle's packed form.
pub fn encode_packed_date(date: NaiveDate) -> i64 {
    let ymd =
        i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day());
    ymd * PACKED_DATE_FACTOR
}
