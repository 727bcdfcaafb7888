use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use icalBinding::error::ParseError;
use icalBinding::models::event::Event;
use icalBinding::models::timeline::EventTimeline;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap()
}

fn event(summary: &str, start_h: i64, end_h: i64) -> Event {
    Event::new(
        base() + Duration::hours(start_h),
        Some(base() + Duration::hours(end_h)),
        Some(summary.to_string()),
        None,
    )
}

#[test]
fn current_and_next_follow_the_clock() {
    let timeline = EventTimeline::new(vec![event("B", 3, 4), event("A", 1, 2)]);

    let now = base();
    assert!(timeline.current_event(now).is_none());
    assert_eq!(timeline.next_event(now).unwrap().summary(), Some("A"));

    let now = base() + Duration::minutes(90);
    assert_eq!(timeline.current_event(now).unwrap().summary(), Some("A"));
    assert_eq!(timeline.next_event(now).unwrap().summary(), Some("B"));

    let now = base() + Duration::hours(5);
    assert!(timeline.current_event(now).is_none());
    assert!(timeline.next_event(now).is_none());
}

#[test]
fn current_and_next_are_never_the_same_event() {
    let timeline = EventTimeline::new(vec![
        event("long", 0, 10),
        event("overlap", 2, 3),
        event("later", 5, 6),
        Event::new(base() + Duration::hours(7), None, Some("open".to_string()), None),
    ]);
    for minutes in (-60..=(26 * 60)).step_by(15) {
        let now = base() + Duration::minutes(minutes);
        let current = timeline.current_event(now);
        let next = timeline.next_event(now);
        if let Some(next) = &next {
            assert!(next.start() > now);
        }
        if let (Some(current), Some(next)) = (&current, &next) {
            assert_ne!(current.as_ref(), next.as_ref());
        }
    }
}

#[test]
fn earliest_overlapping_event_wins_and_ties_keep_feed_order() {
    let timeline = EventTimeline::new(vec![
        event("second", 1, 5),
        event("first-tie", 0, 5),
        event("second-tie", 0, 5),
    ]);
    let now = base() + Duration::hours(2);
    assert_eq!(timeline.current_event(now).unwrap().summary(), Some("first-tie"));
    let order: Vec<_> = timeline.iter().filter_map(Event::summary).collect();
    assert_eq!(order, vec!["first-tie", "second-tie", "second"]);
}

#[test]
fn parses_feed_and_normalizes_end_times() {
    let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:open-ended\r\n\
DTSTART:20240101T100000Z\r\n\
SUMMARY:No end\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:zero\r\n\
DTSTART:20240101T100000Z\r\n\
DTEND:20240101T100000Z\r\n\
SUMMARY:Zero length\r\n\
DESCRIPTION:send lamp ON\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let timeline = EventTimeline::from_ics(ics, Tz::UTC).expect("feed should parse");
    assert_eq!(timeline.len(), 2);

    let events: Vec<&Event> = timeline.iter().collect();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    assert_eq!(events[0].start(), start);
    assert_eq!(events[0].end(), Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
    assert_eq!(events[1].end(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap());
    assert_eq!(events[1].description(), Some("send lamp ON"));
}

#[test]
fn tzid_times_resolve_through_the_named_zone() {
    let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:ny\r\n\
DTSTART;TZID=America/New_York:20260701T090000\r\n\
DTEND;TZID=America/New_York:20260701T100000\r\n\
SUMMARY:Standup\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:floating\r\n\
DTSTART:20260701T090000\r\n\
SUMMARY:Floating\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";
    let timeline = EventTimeline::from_ics(ics, chrono_tz::Europe::Berlin).unwrap();
    let events: Vec<&Event> = timeline.iter().collect();
    // floating 09:00 Berlin (UTC+2) sorts before 09:00 New York (UTC-4)
    assert_eq!(events[0].summary(), Some("Floating"));
    assert_eq!(events[0].start(), Utc.with_ymd_and_hms(2026, 7, 1, 7, 0, 0).unwrap());
    assert_eq!(events[1].start(), Utc.with_ymd_and_hms(2026, 7, 1, 13, 0, 0).unwrap());
    assert_eq!(events[1].end(), Utc.with_ymd_and_hms(2026, 7, 1, 14, 0, 0).unwrap());
}

#[test]
fn empty_calendar_is_an_empty_timeline() {
    let timeline =
        EventTimeline::from_ics("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n", Tz::UTC)
            .expect("empty calendar is valid");
    assert!(timeline.is_empty());
    assert!(timeline.next_event(base()).is_none());
}

#[test]
fn undecodable_feed_is_a_parse_error() {
    let err = EventTimeline::from_ics("HTTP 502 Bad Gateway", Tz::UTC).unwrap_err();
    assert_eq!(err, ParseError::NotICalendar);
}
