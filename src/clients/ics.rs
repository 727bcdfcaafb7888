use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime};

use crate::error::ParseError;
use crate::models::event::Event;

/// Decodes VEVENTs from iCalendar text. Events without DTSTART are skipped.
/// Floating and date-only values are read in `default_tz`.
pub fn parse_events(text: &str, default_tz: Tz) -> Result<Vec<Event>, ParseError> {
    if !text.contains("BEGIN:VCALENDAR") {
        return Err(ParseError::NotICalendar);
    }
    let calendar = text
        .parse::<Calendar>()
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    let mut events = Vec::new();
    for component in &calendar.components {
        let CalendarComponent::Event(vevent) = component else {
            continue;
        };
        let Some(start) = vevent.get_start().and_then(|s| to_utc(s, default_tz)) else {
            tracing::debug!(uid = ?vevent.get_uid(), "skipping event without usable DTSTART");
            continue;
        };
        let end = vevent.get_end().and_then(|e| to_utc(e, default_tz));
        events.push(Event::new(
            start,
            end,
            vevent.get_summary().map(str::to_string),
            vevent.get_description().map(str::to_string),
        ));
    }
    Ok(events)
}

fn to_utc(value: DatePerhapsTime, default_tz: Tz) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => local_to_utc(naive, default_tz),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let tz = tzid.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(tzid = %tzid, "unknown TZID, falling back to configured zone");
                default_tz
            });
            local_to_utc(date_time, tz)
        }
        DatePerhapsTime::Date(date) => local_to_utc(date.and_time(NaiveTime::MIN), default_tz),
    }
}

// DST gaps resolve to the earliest valid instant
fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_only_values_anchor_at_local_midnight() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:1\r\nDTSTART;VALUE=DATE:20240301\r\nSUMMARY:Holiday\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_events(ics, chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].start(),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn text_without_calendar_is_rejected() {
        assert_eq!(
            parse_events("<html>login required</html>", Tz::UTC),
            Err(ParseError::NotICalendar)
        );
    }
}
