//! Temporal literal parsing, formatting, and storage conversions.
//!
//! Dates are stored as days since the Unix epoch, times of day as
//! milliseconds since midnight, and datetimes as UTC milliseconds since the
//! Unix epoch. Every datetime leaving this module is normalized to UTC.

use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::well_known::Rfc3339,
};

/// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i64 = 2_440_588;

const MILLIS_PER_DAY: i64 = 86_400_000;

///
/// PARSING
///

/// Parse `YYYY-MM-DD` or `YYYY/MM/DD`.
#[must_use]
pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    let sep = if text.contains('-') { '-' } else { '/' };
    let mut parts = text.splitn(3, sep);

    let year = parse_number::<i32>(parts.next()?)?;
    let month = parse_number::<u8>(parts.next()?)?;
    let day = parse_number::<u8>(parts.next()?)?;

    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Parse `HH:MM[:SS[.fff]]`. Sub-millisecond digits are truncated.
#[must_use]
pub fn parse_time(text: &str) -> Option<Time> {
    let text = text.trim();
    let mut parts = text.splitn(3, ':');

    let hour = parse_number::<u8>(parts.next()?)?;
    let minute = parse_number::<u8>(parts.next()?)?;
    let (second, milli) = match parts.next() {
        None => (0, 0),
        Some(seconds) => parse_seconds(seconds)?,
    };

    Time::from_hms_milli(hour, minute, second, milli).ok()
}

/// Parse an ISO-8601 or OGR-style datetime and normalize it to UTC.
///
/// Accepted shapes: a date, optionally followed by `T` or a space and a
/// time of day, optionally followed by `Z`, `±HH`, `±HHMM`, or `±HH:MM`.
/// A datetime without an offset is taken as UTC.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed.to_offset(UtcOffset::UTC));
    }

    let split = text.find(['T', 't', ' ']);
    let (date_text, rest) = match split {
        Some(at) => (&text[..at], text[at + 1..].trim()),
        None => (text, ""),
    };
    let date = parse_date(date_text)?;

    if rest.is_empty() {
        return Some(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc());
    }

    let (time_text, offset) = split_offset(rest)?;
    let time = parse_time(time_text)?;

    Some(
        PrimitiveDateTime::new(date, time)
            .assume_offset(offset)
            .to_offset(UtcOffset::UTC),
    )
}

fn split_offset(text: &str) -> Option<(&str, UtcOffset)> {
    if let Some(stripped) = text.strip_suffix(['Z', 'z']) {
        return Some((stripped, UtcOffset::UTC));
    }

    let Some(at) = text.rfind(['+', '-']) else {
        return Some((text, UtcOffset::UTC));
    };

    let negative = text[at..].starts_with('-');
    let digits: String = text[at + 1..].chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        1 | 2 => (parse_number::<i8>(&digits)?, 0),
        4 => (
            parse_number::<i8>(&digits[..2])?,
            parse_number::<i8>(&digits[2..])?,
        ),
        _ => return None,
    };

    let offset = if negative {
        UtcOffset::from_hms(-hours, -minutes, 0)
    } else {
        UtcOffset::from_hms(hours, minutes, 0)
    }
    .ok()?;

    Some((text[..at].trim_end(), offset))
}

fn parse_seconds(text: &str) -> Option<(u8, u16)> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let second = parse_number::<u8>(whole)?;

    if fraction.is_empty() {
        return Some((second, 0));
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let milli = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));

    Some((second, milli))
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Option<T> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    text.parse().ok()
}

///
/// FORMATTING
///

pub(super) fn format_date(date: Date) -> String {
    format!(
        "{:04}/{:02}/{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub(super) fn format_time(time: Time) -> String {
    let base = format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    );

    match time.millisecond() {
        0 => base,
        ms => format!("{base}.{ms:03}"),
    }
}

pub(super) fn format_datetime(value: OffsetDateTime) -> String {
    let utc = value.to_offset(UtcOffset::UTC);

    format!(
        "{} {}+00",
        format_date(utc.date()),
        format_time(utc.time())
    )
}

///
/// STORAGE CONVERSIONS
///

#[must_use]
pub fn date_to_epoch_days(date: Date) -> i64 {
    i64::from(date.to_julian_day()) - UNIX_EPOCH_JULIAN_DAY
}

#[must_use]
pub fn date_from_epoch_days(days: i64) -> Option<Date> {
    let julian = i32::try_from(days.checked_add(UNIX_EPOCH_JULIAN_DAY)?).ok()?;

    Date::from_julian_day(julian).ok()
}

#[must_use]
pub fn time_to_millis(time: Time) -> i64 {
    let (hour, minute, second, milli) = time.as_hms_milli();

    ((i64::from(hour) * 60 + i64::from(minute)) * 60 + i64::from(second)) * 1_000
        + i64::from(milli)
}

#[must_use]
pub fn time_from_millis(millis: i64) -> Option<Time> {
    if !(0..MILLIS_PER_DAY).contains(&millis) {
        return None;
    }

    let milli = u16::try_from(millis % 1_000).ok()?;
    let total_seconds = millis / 1_000;
    let second = u8::try_from(total_seconds % 60).ok()?;
    let minute = u8::try_from((total_seconds / 60) % 60).ok()?;
    let hour = u8::try_from(total_seconds / 3_600).ok()?;

    Time::from_hms_milli(hour, minute, second, milli).ok()
}

#[must_use]
pub fn datetime_to_epoch_millis(value: OffsetDateTime) -> i64 {
    value.unix_timestamp() * 1_000 + i64::from(value.millisecond())
}

#[must_use]
pub fn datetime_from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}
