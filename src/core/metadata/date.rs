//! Parsing of the date strings metadata tools emit.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse an EXIF-style date/time.
///
/// Accepts `YYYY:MM:DD HH:MM:SS` with optional sub-seconds and timezone
/// suffix, ISO-8601 (`2024-01-15T14:30:00`), and bare dates. The timezone is
/// dropped: the wall-clock time the camera recorded is what gets used.
/// All-zero placeholder dates are treated as missing.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() || s.starts_with("0000") {
        return None;
    }

    let (date_part, time_part) = match s.find(|c: char| c == ' ' || c == 'T') {
        Some(idx) => (&s[..idx], s[idx + 1..].trim_start()),
        None => (s, ""),
    };

    let date = parse_date(date_part)?;
    let time = parse_time(time_part).unwrap_or(NaiveTime::MIN);

    Some(date.and_time(time))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let normalized = s.replace(':', "-");
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(date);
    }

    // Some tools pad oddly ("2024-1-5"); fall back to splitting by hand
    let mut parts = normalized.split('-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    // Cut at sub-seconds or a timezone suffix
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == ':'))
        .unwrap_or(s.len());
    let clock = &s[..end];

    NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M"))
        .ok()
}
