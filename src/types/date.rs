//! Parsing and printing the time types' character payloads (X.690 §§11.7–11.8,
//! X.680 §38).
//!
//! Printing always produces the canonical (DER) forms: UTC, seconds present,
//! no trailing fraction zeros. Parsing additionally accepts the relaxed BER
//! forms: missing seconds, local-time offsets, and comma fraction separators.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};

pub(crate) fn format_utc_time(time: &DateTime<FixedOffset>) -> String {
    time.with_timezone(&Utc).format("%y%m%d%H%M%SZ").to_string()
}

pub(crate) fn parse_utc_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let (body, offset) = split_zone(text)?;
    let offset = offset?;
    let naive = match body.len() {
        10 => NaiveDateTime::parse_from_str(body, "%y%m%d%H%M").ok()?,
        12 => NaiveDateTime::parse_from_str(body, "%y%m%d%H%M%S").ok()?,
        _ => return None,
    };
    offset.from_local_datetime(&naive).single()
}

pub(crate) fn format_generalized_time(time: &DateTime<FixedOffset>) -> String {
    let utc = time.with_timezone(&Utc);
    let mut out = utc.format("%Y%m%d%H%M%S").to_string();
    let nanos = utc.nanosecond();
    if nanos != 0 && nanos < 1_000_000_000 {
        let mut fraction = format!("{nanos:09}");
        while fraction.ends_with('0') {
            fraction.pop();
        }
        out.push('.');
        out.push_str(&fraction);
    }
    out.push('Z');
    out
}

pub(crate) fn parse_generalized_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let (rest, offset) = split_zone(text)?;
    // a missing zone is a local-time form; it is taken as UTC
    let offset = offset.unwrap_or(FixedOffset::east_opt(0)?);

    let (body, nanos) = match rest.find(['.', ',']) {
        Some(at) => {
            let digits = &rest[at + 1..];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let scale = 10u64.checked_pow(digits.len() as u32)?;
            let value: u64 = digits.parse().ok()?;
            (&rest[..at], (value * 1_000_000_000 / scale) as u32)
        }
        None => (rest, 0),
    };

    let naive = match body.len() {
        10 => NaiveDateTime::parse_from_str(body, "%Y%m%d%H").ok()?,
        12 => NaiveDateTime::parse_from_str(body, "%Y%m%d%H%M").ok()?,
        14 => NaiveDateTime::parse_from_str(body, "%Y%m%d%H%M%S").ok()?,
        _ => return None,
    };
    // fractions are only accepted on the seconds form
    if nanos != 0 && body.len() != 14 {
        return None;
    }
    let naive = naive.with_nanosecond(nanos)?;
    offset.from_local_datetime(&naive).single()
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y%m%d").ok()
}

pub(crate) fn format_time_of_day(time: &NaiveTime) -> String {
    format!("{:02}{:02}{:02}", time.hour(), time.minute(), time.second())
}

pub(crate) fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    if text.len() != 6 {
        return None;
    }
    NaiveTime::parse_from_str(text, "%H%M%S").ok()
}

pub(crate) fn format_date_time(time: &NaiveDateTime) -> String {
    time.format("%Y%m%d%H%M%S").to_string()
}

pub(crate) fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if text.len() != 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S").ok()
}

/// Splits a trailing zone designator off a time body. `Ok(None)` offset means
/// the local-time form (no designator).
#[allow(clippy::type_complexity)]
fn split_zone(text: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Some((body, Some(FixedOffset::east_opt(0)?)));
    }
    for zone_len in [5usize, 3] {
        if text.len() > zone_len {
            let (body, zone) = text.split_at(text.len() - zone_len);
            let sign = zone.as_bytes()[0];
            if sign == b'+' || sign == b'-' {
                if !zone[1..].bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let hours: i32 = zone[1..3].parse().ok()?;
                let minutes: i32 = if zone_len == 5 {
                    zone[3..5].parse().ok()?
                } else {
                    0
                };
                let seconds = (hours * 60 + minutes) * 60;
                let offset = if sign == b'+' {
                    FixedOffset::east_opt(seconds)?
                } else {
                    FixedOffset::west_opt(seconds)?
                };
                return Some((body, Some(offset)));
            }
        }
    }
    Some((text, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_time_round_trip() {
        let parsed = parse_utc_time("230506121314Z").unwrap();
        assert_eq!(format_utc_time(&parsed), "230506121314Z");

        let offset = parse_utc_time("2305061213+0200").unwrap();
        assert_eq!(format_utc_time(&offset), "230506101300Z");

        assert!(parse_utc_time("2305061213").is_none());
    }

    #[test]
    fn generalized_time_forms() {
        let full = parse_generalized_time("20230506121314.25Z").unwrap();
        assert_eq!(format_generalized_time(&full), "20230506121314.25Z");

        let hours_only = parse_generalized_time("2023050612").unwrap();
        assert_eq!(format_generalized_time(&hours_only), "20230506120000Z");

        let offset = parse_generalized_time("20230506121314-0130").unwrap();
        assert_eq!(format_generalized_time(&offset), "20230506134314Z");

        assert!(parse_generalized_time("20230506121314.Z").is_none());
    }

    #[test]
    fn date_and_time_of_day() {
        let date = parse_date("20230506").unwrap();
        assert_eq!(format_date(&date), "20230506");
        let time = parse_time_of_day("121314").unwrap();
        assert_eq!(format_time_of_day(&time), "121314");
        let both = parse_date_time("20230506121314").unwrap();
        assert_eq!(format_date_time(&both), "20230506121314");
    }
}
