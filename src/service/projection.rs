use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::channel::{ChannelId, ChannelState};
use crate::models::event::Event;
use crate::models::timeline::EventTimeline;
use crate::service::notification_policy::{notification_instant, NotificationOffset};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Flags {
    /// Some event is running right now (`nextEventSwitch`).
    pub event_active: bool,
    /// No event is running and the next one's notification time has passed.
    pub notification_due: bool,
}

impl Flags {
    pub fn derive(
        current: Option<&Event>,
        next: Option<&Event>,
        offset: NotificationOffset,
        now: DateTime<Utc>,
    ) -> Self {
        // a running event takes precedence over a pending notification
        if current.is_some() {
            return Flags {
                event_active: true,
                notification_due: false,
            };
        }
        let notification_due = next.is_some_and(|e| now >= notification_instant(e, offset));
        Flags {
            event_active: false,
            notification_due,
        }
    }
}

/// Inputs to every channel value, as of the latest reconcile.
#[derive(Debug, Clone)]
pub struct Projection {
    pub current: Option<Arc<Event>>,
    pub next: Option<Arc<Event>>,
    pub last_fetch: Option<DateTime<Utc>>,
    pub offset: NotificationOffset,
    pub flags: Flags,
}

impl Projection {
    pub fn from_timeline(
        timeline: &EventTimeline,
        now: DateTime<Utc>,
        last_fetch: Option<DateTime<Utc>>,
        offset: NotificationOffset,
    ) -> Self {
        let current = timeline.current_event(now);
        let next = timeline.next_event(now);
        let flags = Flags::derive(current.as_deref(), next.as_deref(), offset, now);
        Self {
            current,
            next,
            last_fetch,
            offset,
            flags,
        }
    }

    pub fn channel(&self, id: ChannelId) -> ChannelState {
        let current = self.current.as_deref();
        let next = self.next.as_deref();
        match id {
            ChannelId::LastUpdate => ChannelState::date_time(self.last_fetch),
            ChannelId::CurrentEvent => ChannelState::text(current.and_then(Event::summary)),
            ChannelId::CurrentEventStart => ChannelState::date_time(current.map(Event::start)),
            ChannelId::CurrentEventEnd => ChannelState::date_time(current.map(Event::end)),
            ChannelId::CurrentEventDescription => {
                ChannelState::text(current.and_then(Event::description))
            }
            ChannelId::NextEvent => ChannelState::text(next.and_then(Event::summary)),
            ChannelId::NextEventSwitch => ChannelState::switch(self.flags.event_active),
            ChannelId::NextEventStart => ChannelState::date_time(next.map(Event::start)),
            ChannelId::NextEventEnd => ChannelState::date_time(next.map(Event::end)),
            ChannelId::NextEventDescription => ChannelState::text(next.and_then(Event::description)),
            ChannelId::NextEventNotificationDate => {
                ChannelState::date_time(next.map(|e| notification_instant(e, self.offset)))
            }
            ChannelId::NextEventNotificationSwitch => {
                ChannelState::switch(self.flags.notification_due)
            }
        }
    }

    pub fn channels(&self) -> Vec<(ChannelId, ChannelState)> {
        ChannelId::ALL
            .iter()
            .map(|id| (*id, self.channel(*id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::channel::ChannelValue;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, 0, 0).unwrap()
    }

    #[test]
    fn running_event_suppresses_notification_flag() {
        let current = Event::new(at(8), Some(at(10)), None, None);
        let next = Event::new(at(11), Some(at(12)), None, None);
        let flags = Flags::derive(Some(&current), Some(&next), NotificationOffset::default(), at(9));
        assert!(flags.event_active);
        assert!(!flags.notification_due);

        let flags = Flags::derive(None, Some(&next), NotificationOffset::default(), at(9));
        assert!(!flags.event_active);
        assert!(flags.notification_due);
    }

    #[test]
    fn every_channel_is_projected_even_when_empty() {
        let projection = Projection {
            current: None,
            next: Some(Arc::new(Event::new(at(11), None, Some("dentist".to_string()), None))),
            last_fetch: Some(at(7)),
            offset: NotificationOffset::from_seconds(3600).unwrap(),
            flags: Flags::default(),
        };
        let channels = projection.channels();
        assert_eq!(channels.len(), ChannelId::ALL.len());
        assert_eq!(projection.channel(ChannelId::CurrentEvent), ChannelState::Undefined);
        assert_eq!(projection.channel(ChannelId::NextEventDescription), ChannelState::Undefined);
        assert_eq!(
            projection.channel(ChannelId::NextEvent),
            ChannelState::Value(ChannelValue::Text("dentist".to_string()))
        );
        assert_eq!(
            projection.channel(ChannelId::NextEventNotificationDate),
            ChannelState::Value(ChannelValue::DateTime(at(11) - Duration::hours(1)))
        );
    }
}
