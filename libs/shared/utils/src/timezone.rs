//! Wall-clock conversion between a doctor's local weekly schedule and the UTC
//! form it is stored in.
//!
//! Every conversion is best effort: bad input (unknown zone, malformed time,
//! unknown weekday) yields the input back unchanged and never an error. DST
//! transitions are approximated: a local time inside a spring-forward gap is
//! moved one hour later, and an ambiguous fall-back time resolves to the
//! earlier instant.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("time pattern is valid")
});

/// One weekly availability window, e.g. `monday 09:00-17:00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
}

impl AvailabilitySlot {
    pub fn new(day: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            day: day.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }
}

pub fn parse_time(time: &str) -> Option<NaiveTime> {
    if !TIME_PATTERN.is_match(time) {
        return None;
    }
    NaiveTime::parse_from_str(time, "%H:%M").ok()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn parse_weekday(day: &str) -> Option<Weekday> {
    match day.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn is_valid_timezone(timezone: &str) -> bool {
    !timezone.trim().is_empty() && timezone.parse::<Tz>().is_ok()
}

/// First date on or after `from` that falls on `day`.
pub fn next_weekday(from: NaiveDate, day: Weekday) -> NaiveDate {
    let offset = (7 + day.num_days_from_monday() as i64 - from.weekday().num_days_from_monday() as i64) % 7;
    from + Duration::days(offset)
}

fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            debug!("Local time {} does not exist in {}, shifting one hour", local, tz);
            tz.from_local_datetime(&(local + Duration::hours(1))).earliest()
        }
    }
}

/// Local wall-clock `date`/`time` in `timezone` as a UTC date-time.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, timezone: &str) -> Option<NaiveDateTime> {
    let tz: Tz = timezone.parse().ok()?;
    resolve_local(&tz, date.and_time(time)).map(|dt| dt.with_timezone(&Utc).naive_utc())
}

/// UTC `date`/`time` as wall-clock time in `timezone`.
pub fn utc_to_local(date: NaiveDate, time: NaiveTime, timezone: &str) -> Option<NaiveDateTime> {
    let tz: Tz = timezone.parse().ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)).with_timezone(&tz).naive_local())
}

/// `"HH:MM"` local time in `timezone` to `"HH:MM"` UTC, using the offset in
/// force on `date` (today when absent). Returns `time` unchanged on failure.
pub fn convert_local_time_to_utc(time: &str, timezone: &str, date: Option<NaiveDate>) -> String {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    parse_time(time)
        .and_then(|t| local_to_utc(date, t, timezone))
        .map(|dt| format_time(dt.time()))
        .unwrap_or_else(|| time.to_string())
}

/// `"HH:MM"` UTC to `"HH:MM"` in `timezone`. Returns `time` unchanged on failure.
pub fn convert_utc_to_local_time(time: &str, timezone: &str, date: Option<NaiveDate>) -> String {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    parse_time(time)
        .and_then(|t| utc_to_local(date, t, timezone))
        .map(|dt| format_time(dt.time()))
        .unwrap_or_else(|| time.to_string())
}

type Shift = fn(NaiveDate, NaiveTime, &str) -> Option<NaiveDateTime>;

fn convert_slot(slot: &AvailabilitySlot, timezone: &str, reference: NaiveDate, shift: Shift) -> Option<AvailabilitySlot> {
    let day = parse_weekday(&slot.day)?;
    let start = parse_time(&slot.start_time)?;
    let end = parse_time(&slot.end_time)?;

    let start_date = next_weekday(reference, day);
    // A window whose end is not after its start runs past midnight.
    let end_date = if end <= start { start_date + Duration::days(1) } else { start_date };

    let converted_start = shift(start_date, start, timezone)?;
    let converted_end = shift(end_date, end, timezone)?;

    Some(AvailabilitySlot {
        day: weekday_name(converted_start.weekday()).to_string(),
        start_time: format_time(converted_start.time()),
        end_time: format_time(converted_end.time()),
    })
}

fn convert_slots(slots: &[AvailabilitySlot], timezone: &str, reference: NaiveDate, shift: Shift) -> Vec<AvailabilitySlot> {
    slots
        .iter()
        .map(|slot| convert_slot(slot, timezone, reference, shift).unwrap_or_else(|| slot.clone()))
        .collect()
}

/// Local weekly slots to UTC; `day` follows the start time across midnight.
pub fn convert_availability_to_utc(slots: &[AvailabilitySlot], timezone: &str) -> Vec<AvailabilitySlot> {
    convert_availability_to_utc_on(slots, timezone, Utc::now().date_naive())
}

/// As [`convert_availability_to_utc`], taking offsets from the week starting at `reference`.
pub fn convert_availability_to_utc_on(
    slots: &[AvailabilitySlot],
    timezone: &str,
    reference: NaiveDate,
) -> Vec<AvailabilitySlot> {
    convert_slots(slots, timezone, reference, local_to_utc)
}

pub fn convert_availability_to_local(slots: &[AvailabilitySlot], timezone: &str) -> Vec<AvailabilitySlot> {
    convert_availability_to_local_on(slots, timezone, Utc::now().date_naive())
}

pub fn convert_availability_to_local_on(
    slots: &[AvailabilitySlot],
    timezone: &str,
    reference: NaiveDate,
) -> Vec<AvailabilitySlot> {
    convert_slots(slots, timezone, reference, utc_to_local)
}
