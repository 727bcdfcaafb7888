use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::clients::ics;
use crate::error::ParseError;
use crate::models::event::Event;

/// Events of one fetch, sorted by start. Ties keep feed order.
#[derive(Debug, Clone, Default)]
pub struct EventTimeline {
    events: Vec<Arc<Event>>,
}

impl EventTimeline {
    pub fn new(mut events: Vec<Event>) -> Self {
        // sort_by_key is stable, so equal starts stay in fetch order
        events.sort_by_key(Event::start);
        Self {
            events: events.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn from_ics(text: &str, default_tz: Tz) -> Result<Self, ParseError> {
        Ok(Self::new(ics::parse_events(text, default_tz)?))
    }

    /// Earliest-starting event with `start <= now < end`.
    pub fn current_event(&self, now: DateTime<Utc>) -> Option<Arc<Event>> {
        self.events.iter().find(|e| e.is_active_at(now)).cloned()
    }

    /// Earliest event with `start > now`.
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<Arc<Event>> {
        self.events.iter().find(|e| e.starts_after(now)).cloned()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(AsRef::as_ref)
    }
}
