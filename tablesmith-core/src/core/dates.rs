//! Date parsing and formatting with user-facing format patterns.
//!
//! Patterns use the familiar `yyyy-MM-dd HH:mm:ss` token style and are
//! translated to chrono strftime specifiers before use.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Pattern used when a temporal result has no explicit output format.
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";

/// Built-in formats, tried in order after any explicit format.
const BUILTIN_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%H:%M:%S",
    "%H:%M",
];

/// Loose human formats tried last.
const FALLBACK_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%d %B %Y", "%d %b %Y"];

/// Translates a `yyyy-MM-dd`-style pattern into a chrono format string.
///
/// Text inside single quotes is copied literally.
pub fn to_chrono_format(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        match (c, run) {
            ('y', 2) => out.push_str("%y"),
            ('y', _) => out.push_str("%Y"),
            ('M', 1 | 2) => out.push_str("%m"),
            ('M', 3) => out.push_str("%b"),
            ('M', _) => out.push_str("%B"),
            ('d', _) => out.push_str("%d"),
            ('H', _) => out.push_str("%H"),
            ('h', _) => out.push_str("%I"),
            ('m', _) => out.push_str("%M"),
            ('s', _) => out.push_str("%S"),
            ('S', _) => out.push_str("%3f"),
            ('a', _) => out.push_str("%p"),
            ('E', 1..=3) => out.push_str("%a"),
            ('E', _) => out.push_str("%A"),
            _ => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parses `value` under a chrono format, accepting date-only and time-only
/// formats. Date-only values land at midnight; time-only values on 1970-01-01.
fn parse_with_chrono_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, format) {
        return date.and_hms_opt(0, 0, 0);
    }
    let time = NaiveTime::parse_from_str(value, format).ok()?;
    Some(NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(time))
}

/// Parses a cell value as a date.
///
/// Tries `format` first when given, then ISO 8601 with offset, then the
/// built-in formats, then loose fallbacks. Returns `None` when nothing matches.
pub fn parse_date(value: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(pattern) = format.filter(|p| !p.trim().is_empty()) {
        if let Some(dt) = parse_with_chrono_format(value, &to_chrono_format(pattern)) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = BUILTIN_FORMATS
        .iter()
        .find_map(|f| parse_with_chrono_format(value, f))
    {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|f| parse_with_chrono_format(value, f))
}

/// Formats `dt` with a `yyyy-MM-dd`-style pattern.
///
/// A pattern that does not translate to valid chrono items falls back to
/// [`DEFAULT_DATE_FORMAT`].
pub fn format_date(dt: &NaiveDateTime, pattern: &str) -> String {
    let translated = to_chrono_format(pattern);
    let items: Vec<Item> = StrftimeItems::new(&translated).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        log::warn!("Unusable date format '{pattern}', using {DEFAULT_DATE_FORMAT}");
        return dt.format("%Y-%m-%d").to_string();
    }
    dt.format_with_items(items.iter()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_to_chrono_format() {
        assert_eq!(to_chrono_format("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(to_chrono_format("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(to_chrono_format("dd MMM yy"), "%d %b %y");
        assert_eq!(to_chrono_format("yyyy-MM-dd'T'HH:mm"), "%Y-%m-%dT%H:%M");
        assert_eq!(to_chrono_format("100%"), "100%%");
    }

    #[test]
    fn test_parse_builtin_formats() {
        assert_eq!(parse_date("2024-01-10", None), Some(ymd(2024, 1, 10)));
        assert_eq!(parse_date("2024/01/10", None), Some(ymd(2024, 1, 10)));
        assert_eq!(
            parse_date("2024-01-10 08:30", None),
            Some(ymd(2024, 1, 10).date().and_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-01-10T10:00:00+02:00", None),
            Some(ymd(2024, 1, 10).date().and_hms_opt(8, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("12:15", None),
            Some(ymd(1970, 1, 1).date().and_hms_opt(12, 15, 0).unwrap())
        );
        assert_eq!(parse_date("January 5, 2024", None), Some(ymd(2024, 1, 5)));
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(parse_date("10.01.2024", Some("dd.MM.yyyy")), Some(ymd(2024, 1, 10)));
        // 03/04/2024 is April 3rd under an explicit day-first format,
        // March 4th under the built-in month-first fallback.
        assert_eq!(parse_date("03/04/2024", Some("dd/MM/yyyy")), Some(ymd(2024, 4, 3)));
        assert_eq!(parse_date("03/04/2024", None), Some(ymd(2024, 3, 4)));
    }

    #[test]
    fn test_unparseable_values() {
        assert_eq!(parse_date("", None), None);
        assert_eq!(parse_date("apple", None), None);
        assert_eq!(parse_date("2024-13-45", None), None);
    }

    #[test]
    fn test_format_date() {
        let dt = ymd(2024, 1, 5);
        assert_eq!(format_date(&dt, DEFAULT_DATE_FORMAT), "2024-01-05");
        assert_eq!(format_date(&dt, "dd/MM/yyyy"), "05/01/2024");
        assert_eq!(format_date(&dt, "MMMM d, yyyy"), "January 05, 2024");
    }
}
