//! Device time formats
//!
//! Stored records pack the timestamp into a `u32` with 31-day months;
//! realtime events carry six bytes (years since 2000, month, day, hour,
//! minute, second).

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Decode the packed `u32` used by stored attendance records
pub fn decode_packed(mut value: u32) -> Result<NaiveDateTime> {
    let second = value % 60;
    value /= 60;
    let minute = value % 60;
    value /= 60;
    let hour = value % 24;
    value /= 24;
    let day = value % 31 + 1;
    value /= 31;
    let month = value % 12 + 1;
    value /= 12;
    let year = value as i32 + 2000;

    build(year, month, day, hour, minute, second)
}

/// Encode a timestamp into the packed `u32` form
pub fn encode_packed(time: &NaiveDateTime) -> u32 {
    let years = (time.year() - 2000).max(0) as u32;
    ((years * 12 * 31 + (time.month() - 1) * 31 + time.day() - 1) * 24 * 60 * 60)
        + (time.hour() * 60 + time.minute()) * 60
        + time.second()
}

/// Decode the 6-byte realtime event timestamp
pub fn decode_compact(bytes: &[u8; 6]) -> Result<NaiveDateTime> {
    let [year, month, day, hour, minute, second] = *bytes;
    build(
        year as i32 + 2000,
        month as u32,
        day as u32,
        hour as u32,
        minute as u32,
        second as u32,
    )
}

fn build(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            Error::InvalidTime(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        })
}
