use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient};
use shared_utils::timezone::{
    convert_availability_to_local, convert_availability_to_utc, format_time, is_valid_timezone, local_to_utc,
    parse_time, parse_weekday, utc_to_local, weekday_name, AvailabilitySlot,
};

use crate::models::{AvailableTimeSlot, BookedAppointment, Doctor, DoctorError, SetAvailabilityRequest};
use crate::services::doctor::DoctorService;

/// Length of one consultation and the step between offered start times.
pub const CONSULTATION_MINUTES: i64 = 30;

const MAX_WEEKLY_SLOTS: usize = 50;

pub struct AvailabilityService {
    db: DatabaseClient,
    doctors: DoctorService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    /// Validate the doctor's local weekly schedule and store it in UTC.
    pub async fn set_availability(&self, user_id: &str, request: SetAvailabilityRequest) -> Result<Doctor, DoctorError> {
        let slots = validate_availability(&request)?;
        let utc = convert_availability_to_utc(&slots, &request.timezone);
        debug!("Availability for {} converted from {}: {:?}", user_id, request.timezone, utc);

        let doctor = self.doctors.store_availability(user_id, &request.timezone, utc).await?;
        info!("Doctor {} availability updated with {} slots", user_id, doctor.availability.len());
        Ok(doctor)
    }

    /// Stored schedule converted to `timezone`, or to the doctor's own zone.
    pub async fn get_availability(
        &self,
        user_id: &str,
        timezone: Option<&str>,
    ) -> Result<(String, Vec<AvailabilitySlot>), DoctorError> {
        let doctor = self.doctors.get_by_user(user_id).await?;
        let timezone = timezone.unwrap_or(&doctor.timezone).to_string();
        if !is_valid_timezone(&timezone) {
            return Err(DoctorError::InvalidTimezone(timezone));
        }

        let local = convert_availability_to_local(&doctor.availability, &timezone);
        Ok((timezone, local))
    }

    /// Open consultation slots of a verified doctor on the viewer's local `date`.
    pub async fn available_slots(
        &self,
        user_id: &str,
        date: NaiveDate,
        timezone: &str,
    ) -> Result<Vec<AvailableTimeSlot>, DoctorError> {
        if !is_valid_timezone(timezone) {
            return Err(DoctorError::InvalidTimezone(timezone.to_string()));
        }

        let doctor = self.doctors.get_public(user_id).await?;
        let booked = self.booked_intervals(user_id, date).await?;
        let slots = generate_slots(&doctor.availability, &booked, date, timezone, Utc::now().naive_utc());

        debug!("Doctor {} has {} open slots on {} ({})", user_id, slots.len(), date, timezone);
        Ok(slots)
    }

    /// Non-cancelled appointments on the UTC dates a local day can touch.
    async fn booked_intervals(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>, DoctorError> {
        if !self.db.is_configured() {
            return Ok(Vec::new());
        }

        let dates = [date - Duration::days(1), date, date + Duration::days(1)]
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect::<Vec<_>>()
            .join(",");
        let query = format!(
            "doctor_id={}&status=neq.cancelled&date=in.({})&select=date,start_time,end_time",
            eq(user_id),
            dates
        );

        let booked: Vec<BookedAppointment> = self.db.select("appointments", &query).await?;
        Ok(booked.iter().filter_map(booked_interval).collect())
    }
}

/// Normalised copy of the request's slots, or the first validation failure.
pub fn validate_availability(request: &SetAvailabilityRequest) -> Result<Vec<AvailabilitySlot>, DoctorError> {
    if !is_valid_timezone(&request.timezone) {
        return Err(DoctorError::InvalidTimezone(request.timezone.clone()));
    }
    if request.slots.len() > MAX_WEEKLY_SLOTS {
        return Err(DoctorError::ValidationError(format!(
            "At most {} availability slots are allowed",
            MAX_WEEKLY_SLOTS
        )));
    }

    request
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let day = parse_weekday(&slot.day)
                .ok_or_else(|| DoctorError::ValidationError(format!("Slot {}: unknown day '{}'", i + 1, slot.day)))?;
            let start = parse_time(&slot.start_time).ok_or_else(|| {
                DoctorError::ValidationError(format!("Slot {}: start_time must be HH:MM", i + 1))
            })?;
            let end = parse_time(&slot.end_time)
                .ok_or_else(|| DoctorError::ValidationError(format!("Slot {}: end_time must be HH:MM", i + 1)))?;
            if start == end {
                return Err(DoctorError::ValidationError(format!(
                    "Slot {}: start_time and end_time must differ",
                    i + 1
                )));
            }
            Ok(AvailabilitySlot::new(weekday_name(day), &format_time(start), &format_time(end)))
        })
        .collect()
}

/// UTC windows of `availability` that open on `date`; a window ending at or
/// before its start closes on the following day.
fn windows_opening_on(availability: &[AvailabilitySlot], date: NaiveDate) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    availability
        .iter()
        .filter(|slot| parse_weekday(&slot.day) == Some(date.weekday()))
        .filter_map(|slot| {
            let start = parse_time(&slot.start_time)?;
            let end = parse_time(&slot.end_time)?;
            let end_date = if end <= start { date + Duration::days(1) } else { date };
            Some((date.and_time(start), end_date.and_time(end)))
        })
        .collect()
}

fn booked_interval(appointment: &BookedAppointment) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let date = NaiveDate::parse_from_str(&appointment.date, "%Y-%m-%d").ok()?;
    let start = parse_time(&appointment.start_time)?;
    let end = parse_time(&appointment.end_time)?;
    let end_date = if end <= start { date + Duration::days(1) } else { date };
    Some((date.and_time(start), end_date.and_time(end)))
}

/// Whether a consultation starting at `start` (UTC) fits entirely inside one
/// availability window, including windows that opened the previous day.
pub fn covers_consultation(availability: &[AvailabilitySlot], start: NaiveDateTime) -> bool {
    let end = start + Duration::minutes(CONSULTATION_MINUTES);
    [start.date() - Duration::days(1), start.date()]
        .into_iter()
        .flat_map(|day| windows_opening_on(availability, day))
        .any(|(open, close)| open <= start && end <= close)
}

/// Consultation slots on the viewer's local `date` in `timezone`, stepping
/// [`CONSULTATION_MINUTES`] through each UTC window. Slots overlapping
/// `booked` or starting at or before `now` are dropped.
pub fn generate_slots(
    availability: &[AvailabilitySlot],
    booked: &[(NaiveDateTime, NaiveDateTime)],
    date: NaiveDate,
    timezone: &str,
    now: NaiveDateTime,
) -> Vec<AvailableTimeSlot> {
    let (Some(day_start), Some(day_end)) = (
        local_to_utc(date, NaiveTime::MIN, timezone),
        local_to_utc(date + Duration::days(1), NaiveTime::MIN, timezone),
    ) else {
        return Vec::new();
    };

    let step = Duration::minutes(CONSULTATION_MINUTES);
    let mut starts = BTreeMap::new();

    let mut day = day_start.date() - Duration::days(1);
    while day <= day_end.date() {
        for (open, close) in windows_opening_on(availability, day) {
            let mut start = open;
            while start + step <= close {
                let end = start + step;
                let free = !booked.iter().any(|(b_start, b_end)| start < *b_end && end > *b_start);
                if start >= day_start && start < day_end && start > now && free {
                    starts.insert(start, end);
                }
                start = end;
            }
        }
        day += Duration::days(1);
    }

    starts
        .into_iter()
        .map(|(start, end)| {
            let local_start = utc_to_local(start.date(), start.time(), timezone).unwrap_or(start);
            let local_end = utc_to_local(end.date(), end.time(), timezone).unwrap_or(end);
            AvailableTimeSlot {
                start_utc: start.and_utc(),
                end_utc: end.and_utc(),
                date: start.format("%Y-%m-%d").to_string(),
                start_time: format_time(start.time()),
                end_time: format_time(end.time()),
                local_date: local_start.format("%Y-%m-%d").to_string(),
                local_start_time: format_time(local_start.time()),
                local_end_time: format_time(local_end.time()),
                timezone: timezone.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, time: &str) -> NaiveDateTime {
        d.and_time(parse_time(time).unwrap())
    }

    fn long_ago() -> NaiveDateTime {
        at(date(2000, 1, 1), "00:00")
    }

    #[test]
    fn validation_normalises_days_and_rejects_bad_input() {
        let request = SetAvailabilityRequest {
            timezone: "Europe/London".to_string(),
            slots: vec![AvailabilitySlot::new("Mon", "09:00", "12:00")],
        };
        assert_eq!(validate_availability(&request).unwrap()[0].day, "monday");

        let bad_time = SetAvailabilityRequest {
            timezone: "UTC".to_string(),
            slots: vec![AvailabilitySlot::new("monday", "9am", "12:00")],
        };
        assert_matches!(validate_availability(&bad_time), Err(DoctorError::ValidationError(_)));

        let empty_window = SetAvailabilityRequest {
            timezone: "UTC".to_string(),
            slots: vec![AvailabilitySlot::new("monday", "09:00", "09:00")],
        };
        assert_matches!(validate_availability(&empty_window), Err(DoctorError::ValidationError(_)));

        let bad_zone = SetAvailabilityRequest {
            timezone: "Nowhere/City".to_string(),
            slots: vec![],
        };
        assert_matches!(validate_availability(&bad_zone), Err(DoctorError::InvalidTimezone(_)));
    }

    #[test]
    fn generates_half_hour_slots_minus_bookings() {
        // 2030-01-07 is a Monday.
        let monday = date(2030, 1, 7);
        let availability = vec![AvailabilitySlot::new("monday", "09:00", "11:00")];
        let booked = vec![(at(monday, "09:30"), at(monday, "10:00"))];

        let slots = generate_slots(&availability, &booked, monday, "UTC", long_ago());
        let starts: Vec<_> = slots.iter().map(|s| s.start_time.as_str()).collect();
        assert_eq!(starts, vec!["09:00", "10:00", "10:30"]);
        assert_eq!(slots[0].end_time, "09:30");
        assert_eq!(slots[0].local_date, "2030-01-07");
    }

    #[test]
    fn past_slots_are_dropped() {
        let monday = date(2030, 1, 7);
        let availability = vec![AvailabilitySlot::new("monday", "09:00", "11:00")];

        let slots = generate_slots(&availability, &[], monday, "UTC", at(monday, "10:00"));
        let starts: Vec<_> = slots.iter().map(|s| s.start_time.as_str()).collect();
        assert_eq!(starts, vec!["10:30"]);
    }

    #[test]
    fn midnight_wrapping_window_continues_next_day() {
        let monday = date(2030, 1, 7);
        let tuesday = date(2030, 1, 8);
        let availability = vec![AvailabilitySlot::new("monday", "23:00", "01:00")];

        let monday_slots = generate_slots(&availability, &[], monday, "UTC", long_ago());
        assert_eq!(monday_slots.len(), 2);

        let tuesday_slots = generate_slots(&availability, &[], tuesday, "UTC", long_ago());
        let starts: Vec<_> = tuesday_slots.iter().map(|s| s.start_time.as_str()).collect();
        assert_eq!(starts, vec!["00:00", "00:30"]);
        assert_eq!(tuesday_slots[0].date, "2030-01-08");
    }

    #[test]
    fn slots_are_reported_in_viewer_zone() {
        // Monday 14:00-15:00 UTC is 09:00-10:00 in New York during winter.
        let monday = date(2030, 1, 7);
        let availability = vec![AvailabilitySlot::new("monday", "14:00", "15:00")];

        let slots = generate_slots(&availability, &[], monday, "America/New_York", long_ago());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].local_start_time, "09:00");
        assert_eq!(slots[0].start_time, "14:00");
        assert_eq!(slots[0].local_date, "2030-01-07");
    }

    #[test]
    fn viewer_day_can_span_two_utc_dates() {
        // Kolkata's Tuesday starts at 18:30 UTC on Monday.
        let availability = vec![AvailabilitySlot::new("monday", "19:00", "20:00")];
        let slots = generate_slots(&availability, &[], date(2030, 1, 8), "Asia/Kolkata", long_ago());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].date, "2030-01-07");
        assert_eq!(slots[0].local_date, "2030-01-08");
        assert_eq!(slots[0].local_start_time, "00:30");
    }

    #[test]
    fn coverage_respects_window_bounds_and_wraps() {
        let monday = date(2030, 1, 7);
        let availability = vec![
            AvailabilitySlot::new("monday", "09:00", "10:00"),
            AvailabilitySlot::new("monday", "23:30", "00:30"),
        ];
        assert!(covers_consultation(&availability, at(monday, "09:30")));
        assert!(!covers_consultation(&availability, at(monday, "09:45")));
        assert!(!covers_consultation(&availability, at(monday, "12:00")));
        assert!(covers_consultation(&availability, at(date(2030, 1, 8), "00:00")));
        assert!(!covers_consultation(&availability, at(date(2030, 1, 9), "00:00")));
    }
}
