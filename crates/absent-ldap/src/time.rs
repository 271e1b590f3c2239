//! LDAP GeneralizedTime (RFC 4517 §3.3.13) parsing.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone as _, Utc};

/// Parse a GeneralizedTime value such as `20240601120000Z`.
///
/// Minutes and seconds may be omitted, a fractional part is accepted and
/// discarded, and the zone is either `Z` or a `+HHMM`/`-HHMM` offset. A value
/// with no zone is taken to be UTC.
pub fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
  let value = value.trim();

  let (rest, offset) = if let Some(rest) = value.strip_suffix(['Z', 'z']) {
    (rest, FixedOffset::east_opt(0)?)
  } else {
    split_offset(value)?
  };

  let digits = match rest.find(['.', ',']) {
    Some(idx) => &rest[..idx],
    None => rest,
  };
  if !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }

  let padded = match digits.len() {
    10 => format!("{digits}0000"),
    12 => format!("{digits}00"),
    14 => digits.to_owned(),
    _ => return None,
  };

  let naive = NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S").ok()?;
  offset
    .from_local_datetime(&naive)
    .single()
    .map(|dt| dt.with_timezone(&Utc))
}

fn split_offset(value: &str) -> Option<(&str, FixedOffset)> {
  let Some(idx) = value.rfind(['+', '-']) else {
    return Some((value, FixedOffset::east_opt(0)?));
  };

  let (rest, zone) = value.split_at(idx);
  let sign = if zone.starts_with('-') { -1 } else { 1 };
  let zone = &zone[1..];
  if !zone.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }

  let (hours, minutes) = match zone.len() {
    2 => (zone.parse::<i32>().ok()?, 0),
    4 => (zone[..2].parse::<i32>().ok()?, zone[2..].parse::<i32>().ok()?),
    _ => return None,
  };

  Some((rest, FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
  }

  #[test]
  fn zulu() {
    assert_eq!(parse_generalized_time("20240601120000Z"), Some(utc(2024, 6, 1, 12, 0, 0)));
  }

  #[test]
  fn fractional_seconds_are_dropped() {
    assert_eq!(parse_generalized_time("20240601120000.5Z"), Some(utc(2024, 6, 1, 12, 0, 0)));
  }

  #[test]
  fn short_forms() {
    assert_eq!(parse_generalized_time("2024060112Z"), Some(utc(2024, 6, 1, 12, 0, 0)));
    assert_eq!(parse_generalized_time("202406011230Z"), Some(utc(2024, 6, 1, 12, 30, 0)));
  }

  #[test]
  fn offsets() {
    assert_eq!(
      parse_generalized_time("20240601120000-0500"),
      Some(utc(2024, 6, 1, 17, 0, 0)),
    );
    assert_eq!(
      parse_generalized_time("20240601120000+0130"),
      Some(utc(2024, 6, 1, 10, 30, 0)),
    );
  }

  #[test]
  fn no_zone_is_utc() {
    assert_eq!(parse_generalized_time("20240601120000"), Some(utc(2024, 6, 1, 12, 0, 0)));
  }

  #[test]
  fn garbage() {
    assert_eq!(parse_generalized_time(""), None);
    assert_eq!(parse_generalized_time("yesterday"), None);
    assert_eq!(parse_generalized_time("20241301120000Z"), None);
    assert_eq!(parse_generalized_time("2024Z"), None);
  }
}
