use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;

/// Office start used when a policy leaves `office_start_time` unset.
pub static DEFAULT_OFFICE_START: Lazy<NaiveTime> =
    Lazy::new(|| NaiveTime::from_hms_opt(10, 0, 0).expect("10:00 is a valid time"));

/// Office end used when a policy leaves `office_end_time` unset.
pub static DEFAULT_OFFICE_END: Lazy<NaiveTime> =
    Lazy::new(|| NaiveTime::from_hms_opt(18, 30, 0).expect("18:30 is a valid time"));

/// Parse a policy time-of-day field ("HH:MM", optionally "HH:MM:SS").
///
/// Seconds are accepted but dropped. Anything that does not name a real
/// wall-clock minute returns `None`, which callers treat as "not configured".
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');

    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;

    if let Some(seconds) = parts.next() {
        seconds.parse::<u32>().ok().filter(|s| *s < 60)?;
    }
    if parts.next().is_some() {
        return None;
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Project an optional time-of-day field onto `date`.
pub fn on_date(date: NaiveDate, field: Option<&str>) -> Option<NaiveDateTime> {
    field
        .and_then(parse_time_of_day)
        .map(|time| date.and_time(time))
}

/// Same as [`on_date`] but falls back to `default` when the field is unusable.
pub fn on_date_or(date: NaiveDate, field: Option<&str>, default: NaiveTime) -> NaiveDateTime {
    on_date(date, field).unwrap_or_else(|| date.and_time(default))
}
