use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One calendar occurrence. `end` is always strictly after `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    summary: Option<String>,
    description: Option<String>,
}

impl Event {
    /// Builds an event, defaulting a missing end to one day after start and
    /// pushing a non-positive duration out to one minute.
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        summary: Option<String>,
        description: Option<String>,
    ) -> Self {
        let end = match end {
            Some(end) if end > start => end,
            Some(_) => start + Duration::minutes(1),
            None => start + Duration::days(1),
        };
        Self {
            start,
            end,
            summary,
            description,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn notification_instant(&self, offset: Duration) -> DateTime<Utc> {
        self.start - offset
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        self.start > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_end_defaults_to_one_day() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let event = Event::new(start, None, None, None);
        assert_eq!(event.end(), Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
    }

    #[test]
    fn equal_or_inverted_end_becomes_one_minute() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let same = Event::new(start, Some(start), None, None);
        assert_eq!(same.end(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 1, 0).unwrap());

        let inverted = Event::new(start, Some(start - Duration::hours(2)), None, None);
        assert_eq!(inverted.end(), start + Duration::minutes(1));
    }

    #[test]
    fn explicit_end_is_kept() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let end = start + Duration::hours(3);
        let event = Event::new(start, Some(end), Some("standup".to_string()), None);
        assert_eq!(event.end(), end);
        assert_eq!(event.summary(), Some("standup"));
        assert!(event.is_active_at(start));
        assert!(!event.is_active_at(end));
    }
}
