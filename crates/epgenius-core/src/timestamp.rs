//! Timestamp normalization.
//!
//! Upstream services emit timestamps in whatever layout their storage
//! happened to produce. [`parse`] runs an ordered list of parsers and keeps
//! the first success; everything is converted to UTC, and naive values are
//! taken to be UTC already.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::debug;

use crate::sentinel::is_sentinel;

/// Display string used when a timestamp is absent or unparseable.
pub const NOT_AVAILABLE: &str = "N/A";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

type Parser = fn(&str) -> Option<DateTime<Utc>>;

/// Parsers in priority order.
const PARSERS: &[(&str, Parser)] = &[
    ("rfc2822", parse_rfc2822),
    ("http-date", parse_http_date),
    ("weekday-month", parse_weekday_month),
    ("dd/mm/yyyy", parse_day_month_year),
    ("rfc3339", parse_rfc3339),
    ("iso8601-naive", parse_iso_naive),
    ("sql-datetime", parse_sql_datetime),
];

fn parse_rfc2822(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_weekday_month(raw: &str) -> Option<DateTime<Utc>> {
    ["%a %b %d %Y %H:%M:%S", "%a %b %d %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}

fn parse_day_month_year(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_iso_naive(raw: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}

fn parse_sql_datetime(raw: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Parse a raw timestamp string into a UTC instant.
///
/// Returns `None` for empty strings, the `"NULL"` marker, and anything no
/// known layout accepts. Never panics.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if is_sentinel(raw) {
        return None;
    }
    let raw = raw.trim();
    for (name, parser) in PARSERS {
        if let Some(dt) = parser(raw) {
            debug!(layout = name, raw, "Parsed timestamp");
            return Some(dt);
        }
    }
    debug!(raw, "Unrecognized timestamp layout");
    None
}

/// Parse an optional raw value; absent input stays absent.
pub fn parse_opt(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse)
}

/// Render an instant for display, or `"N/A"` when absent.
pub fn format(instant: Option<DateTime<Utc>>) -> String {
    instant.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |dt| dt.format(DISPLAY_FORMAT).to_string(),
    )
}

/// Parse then format.
pub fn format_raw(raw: Option<&str>) -> String {
    format(parse_opt(raw))
}

/// Hours elapsed between `raw` and `now`, fractional. Negative if `raw` is
/// in the future.
#[allow(clippy::cast_precision_loss)]
pub fn age_hours(raw: &str, now: DateTime<Utc>) -> Option<f64> {
    let instant = parse(raw)?;
    Some((now - instant).num_milliseconds() as f64 / 3_600_000.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn sentinels_are_not_parsed() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("NULL"), None);
        assert_eq!(parse("  "), None);
    }

    #[test]
    fn garbage_returns_none() {
        assert_eq!(parse("yesterday-ish"), None);
        assert_eq!(parse("32/13/2025"), None);
    }

    #[test]
    fn parses_http_date() {
        assert_eq!(
            parse("Tue, 07 Oct 2025 14:03:00 GMT"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
    }

    #[test]
    fn parses_rfc2822_with_offset() {
        assert_eq!(
            parse("Tue, 07 Oct 2025 16:03:00 +0200"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
    }

    #[test]
    fn parses_weekday_month_layout() {
        assert_eq!(
            parse("Tue Oct 07 2025 14:03:00"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
    }

    #[test]
    fn parses_day_month_year_as_midnight() {
        assert_eq!(parse("07/10/2025"), Some(utc(2025, 10, 7, 0, 0, 0)));
    }

    #[test]
    fn parses_iso_with_and_without_fraction() {
        assert_eq!(
            parse("2025-10-07T14:03:00Z"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
        let frac = parse("2025-10-07T14:03:00.250+00:00").unwrap();
        assert_eq!(frac.timestamp_subsec_millis(), 250);
        assert_eq!(
            parse("2025-10-07T14:03:00"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
    }

    #[test]
    fn parses_sql_layout_as_utc() {
        assert_eq!(
            parse("2025-10-07 14:03:00"),
            Some(utc(2025, 10, 7, 14, 3, 0))
        );
    }

    #[test]
    fn format_absent_is_na() {
        assert_eq!(format(None), "N/A");
        assert_eq!(format_raw(Some("NULL")), "N/A");
        assert_eq!(format_raw(None), "N/A");
    }

    #[test]
    fn format_is_fixed_layout() {
        assert_eq!(
            format(Some(utc(2025, 1, 2, 3, 4, 5))),
            "2025-01-02 03:04 UTC"
        );
    }

    #[test]
    fn age_hours_is_fractional() {
        let now = utc(2025, 10, 7, 16, 33, 0);
        assert_eq!(age_hours("2025-10-07 14:03:00", now), Some(2.5));
        assert_eq!(age_hours("NULL", now), None);
    }
}
