//! Encoding between domain timestamps and the integer column.
//!
//! Timestamps are stored as whole Unix seconds. Sub-second precision is
//! dropped on write, so reads compare at second resolution.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> i64 { dt.timestamp() }

pub fn decode_dt(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0).ok_or(Error::Timestamp(secs))
}
