use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelId {
    LastUpdate,
    CurrentEvent,
    CurrentEventStart,
    CurrentEventEnd,
    CurrentEventDescription,
    NextEvent,
    NextEventSwitch,
    NextEventStart,
    NextEventEnd,
    NextEventDescription,
    NextEventNotificationDate,
    NextEventNotificationSwitch,
}

impl ChannelId {
    pub const ALL: [ChannelId; 12] = [
        ChannelId::LastUpdate,
        ChannelId::CurrentEvent,
        ChannelId::CurrentEventStart,
        ChannelId::CurrentEventEnd,
        ChannelId::CurrentEventDescription,
        ChannelId::NextEvent,
        ChannelId::NextEventSwitch,
        ChannelId::NextEventStart,
        ChannelId::NextEventEnd,
        ChannelId::NextEventDescription,
        ChannelId::NextEventNotificationDate,
        ChannelId::NextEventNotificationSwitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::LastUpdate => "lastUpdate",
            ChannelId::CurrentEvent => "currentEvent",
            ChannelId::CurrentEventStart => "currentEventStart",
            ChannelId::CurrentEventEnd => "currentEventEnd",
            ChannelId::CurrentEventDescription => "currentEventDescription",
            ChannelId::NextEvent => "nextEvent",
            ChannelId::NextEventSwitch => "nextEventSwitch",
            ChannelId::NextEventStart => "nextEventStart",
            ChannelId::NextEventEnd => "nextEventEnd",
            ChannelId::NextEventDescription => "nextEventDescription",
            ChannelId::NextEventNotificationDate => "nextEventNotificationDate",
            ChannelId::NextEventNotificationSwitch => "nextEventNotificationSwitch",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown channel {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ChannelValue {
    Text(String),
    DateTime(DateTime<Utc>),
    Switch(bool),
}

/// What a channel holds after a reconcile. `Undefined` is a computed
/// "nothing here", distinct from a channel that was never published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "camelCase")]
pub enum ChannelState {
    Value(ChannelValue),
    Undefined,
}

impl ChannelState {
    pub fn text(value: Option<&str>) -> Self {
        value.map_or(ChannelState::Undefined, |v| {
            ChannelState::Value(ChannelValue::Text(v.to_string()))
        })
    }

    pub fn date_time(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(ChannelState::Undefined, |v| {
            ChannelState::Value(ChannelValue::DateTime(v))
        })
    }

    pub fn switch(on: bool) -> Self {
        ChannelState::Value(ChannelValue::Switch(on))
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, ChannelState::Value(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum BindingStatus {
    Unknown,
    Online,
    Offline(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_round_trip_through_names() {
        for id in ChannelId::ALL {
            assert_eq!(id.as_str().parse::<ChannelId>(), Ok(id));
        }
        assert!("nextEventColor".parse::<ChannelId>().is_err());
    }

    #[test]
    fn absent_values_are_undefined() {
        assert_eq!(ChannelState::text(None), ChannelState::Undefined);
        assert!(ChannelState::switch(false).is_defined());
    }
}
