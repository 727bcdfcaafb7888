use std::collections::HashMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Serialize;

use crate::error::ConfigError;
use crate::service::command_dispatcher::ItemKind;
use crate::service::notification_policy::{NotificationOffset, MAX_OFFSET_SECONDS, ONE_DAY_IN_SECONDS};

pub const KEY_URL: &str = "ICAL_URL";
pub const KEY_REFRESH_INTERVAL: &str = "REFRESH_INTERVAL_SECONDS";
pub const KEY_NOTIFICATION_OFFSET: &str = "NOTIFICATION_OFFSET_SECONDS";
pub const KEY_TIMEZONE: &str = "TIMEZONE";
pub const KEY_HTTP_BIND: &str = "HTTP_BIND";
pub const KEY_ITEMS: &str = "ITEMS";

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::File(format!("{}: {}", path, e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::File(format!("invalid config line {}: {}", idx + 1, line)));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File value first, then the process environment.
    pub fn get_or_env(&self, key: &str) -> Option<String> {
        self.get(key).or_else(|| env::var(key).ok())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingConfig {
    pub url: String,
    pub refresh_interval: Duration,
    #[serde(serialize_with = "serialize_offset")]
    pub notification_offset: NotificationOffset,
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    pub http_bind: SocketAddr,
    pub items: HashMap<String, ItemKind>,
}

impl BindingConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            refresh_interval: Duration::from_secs(ONE_DAY_IN_SECONDS as u64),
            notification_offset: NotificationOffset::default(),
            timezone: Tz::UTC,
            http_bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            items: HashMap::new(),
        }
    }

    /// Resolves every setting through `get_prop`, applying defaults and range checks.
    pub fn from_props(get_prop: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = get_prop(KEY_URL)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::Missing(KEY_URL.to_string()))?;

        let interval = seconds_or_default(KEY_REFRESH_INTERVAL, get_prop(KEY_REFRESH_INTERVAL));
        if !(1..=MAX_OFFSET_SECONDS).contains(&interval) {
            return Err(invalid(KEY_REFRESH_INTERVAL, interval, "must be between 1 second and 365 days"));
        }
        let offset = NotificationOffset::from_seconds(seconds_or_default(
            KEY_NOTIFICATION_OFFSET,
            get_prop(KEY_NOTIFICATION_OFFSET),
        ))?;

        let timezone = match get_prop(KEY_TIMEZONE) {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| invalid(KEY_TIMEZONE, &name, "not an IANA time zone"))?,
            None => Tz::UTC,
        };

        let bind = get_prop(KEY_HTTP_BIND).unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let http_bind = bind
            .parse::<SocketAddr>()
            .map_err(|_| invalid(KEY_HTTP_BIND, &bind, "expected host:port"))?;

        let items = match get_prop(KEY_ITEMS) {
            Some(raw) => parse_items(&raw)?,
            None => HashMap::new(),
        };

        Ok(Self {
            url,
            refresh_interval: Duration::from_secs(interval as u64),
            notification_offset: offset,
            timezone,
            http_bind,
            items,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing(KEY_URL.to_string()));
        }
        let interval = self.refresh_interval.as_secs();
        if interval == 0 || interval > MAX_OFFSET_SECONDS as u64 {
            return Err(invalid(KEY_REFRESH_INTERVAL, interval, "must be between 1 second and 365 days"));
        }
        Ok(())
    }
}

// Non-numeric values fall back to one day; range checks happen afterwards.
fn seconds_or_default(key: &str, raw: Option<String>) -> i64 {
    let Some(raw) = raw else {
        return ONE_DAY_IN_SECONDS;
    };
    match raw.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(_) => {
            tracing::warn!(key = %key, value = %raw, "not a number, using default of one day");
            ONE_DAY_IN_SECONDS
        }
    }
}

fn parse_items(raw: &str) -> Result<HashMap<String, ItemKind>, ConfigError> {
    let mut items = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, kind)) = entry.split_once(':') else {
            return Err(invalid(KEY_ITEMS, entry, "expected name:kind"));
        };
        let kind = kind
            .trim()
            .parse::<ItemKind>()
            .map_err(|reason| invalid(KEY_ITEMS, entry, &reason))?;
        items.insert(name.trim().to_string(), kind);
    }
    Ok(items)
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn serialize_offset<S: serde::Serializer>(offset: &NotificationOffset, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(offset.seconds())
}

fn serialize_tz<S: serde::Serializer>(tz: &Tz, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(tz.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset_or_not_numeric() {
        let config = BindingConfig::from_props(props(&[
            (KEY_URL, "https://example.com/cal.ics"),
            (KEY_NOTIFICATION_OFFSET, "soon"),
        ]))
        .unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(86400));
        assert_eq!(config.notification_offset.seconds(), 86400);
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.http_bind.to_string(), DEFAULT_HTTP_BIND);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = BindingConfig::from_props(props(&[
            (KEY_URL, "https://example.com/cal.ics"),
            (KEY_REFRESH_INTERVAL, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == KEY_REFRESH_INTERVAL));

        let err = BindingConfig::from_props(props(&[
            (KEY_URL, "https://example.com/cal.ics"),
            (KEY_NOTIFICATION_OFFSET, "-5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == KEY_NOTIFICATION_OFFSET));

        let err = BindingConfig::from_props(props(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(KEY_URL.to_string()));
    }

    #[test]
    fn parses_items_and_timezone() {
        let config = BindingConfig::from_props(props(&[
            (KEY_URL, "file:///tmp/cal.ics"),
            (KEY_TIMEZONE, "Europe/Berlin"),
            (KEY_ITEMS, "lamp:switch, blinds:Rollershutter"),
        ]))
        .unwrap();
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.items.get("lamp"), Some(&ItemKind::Switch));
        assert_eq!(config.items.get("blinds"), Some(&ItemKind::Rollershutter));
    }

    #[test]
    fn config_file_strips_quotes_and_exports() {
        let config = AppConfig::parse("# calendar\nexport ICAL_URL=\"https://example.com/a.ics\"\nTIMEZONE='UTC'\n").unwrap();
        assert_eq!(config.get(KEY_URL).as_deref(), Some("https://example.com/a.ics"));
        assert_eq!(config.get(KEY_TIMEZONE).as_deref(), Some("UTC"));
        assert!(AppConfig::parse("no equals sign").is_err());
    }
}
