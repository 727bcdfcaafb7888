use chrono::{DateTime, Duration, Utc};

use crate::error::ConfigError;
use crate::models::event::Event;

pub const ONE_DAY_IN_SECONDS: i64 = 24 * 60 * 60;
pub const MAX_OFFSET_SECONDS: i64 = 365 * ONE_DAY_IN_SECONDS;

/// How long before an event starts its notification becomes due.
/// Always within `0..=365 days`, checked when the config is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOffset(Duration);

impl NotificationOffset {
    pub fn from_seconds(seconds: i64) -> Result<Self, ConfigError> {
        if !(0..=MAX_OFFSET_SECONDS).contains(&seconds) {
            return Err(ConfigError::Invalid {
                key: "NOTIFICATION_OFFSET_SECONDS".to_string(),
                value: seconds.to_string(),
                reason: format!("must be between 0 and {}", MAX_OFFSET_SECONDS),
            });
        }
        Ok(Self(Duration::seconds(seconds)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn seconds(&self) -> i64 {
        self.0.num_seconds()
    }
}

impl Default for NotificationOffset {
    fn default() -> Self {
        Self(Duration::seconds(ONE_DAY_IN_SECONDS))
    }
}

pub fn notification_instant(event: &Event, offset: NotificationOffset) -> DateTime<Utc> {
    event.notification_instant(offset.as_duration())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offset_is_subtracted_from_start() {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let event = Event::new(start, None, None, None);
        let offset = NotificationOffset::from_seconds(3600).unwrap();
        assert_eq!(notification_instant(&event, offset), start - Duration::hours(1));
        assert_eq!(
            notification_instant(&event, NotificationOffset::default()),
            start - Duration::days(1)
        );
    }

    #[test]
    fn out_of_range_offsets_are_config_errors() {
        assert!(NotificationOffset::from_seconds(-1).is_err());
        assert!(NotificationOffset::from_seconds(MAX_OFFSET_SECONDS + 1).is_err());
        assert!(NotificationOffset::from_seconds(0).is_ok());
    }
}
