use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::DispatchError;

/// `send <item> <value>`, the only command understood in event descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    pub item: String,
    pub value: String,
}

impl SendCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            ["send", item, value] => Some(SendCommand {
                item: item.to_string(),
                value: value.to_string(),
            }),
            _ => None,
        }
    }
}

#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, command: &SendCommand) -> Result<ItemCommand, DispatchError>;
}

/// Parses free text and hands it to the dispatcher. Never fails; problems are logged.
pub async fn dispatch_text(dispatcher: &dyn CommandDispatcher, text: &str) {
    let Some(command) = SendCommand::parse(text) else {
        tracing::debug!(text = %text, "description is not a send command, ignoring");
        return;
    };
    tracing::info!(item = %command.item, value = %command.value, "found send command");
    match dispatcher.dispatch(&command).await {
        Ok(accepted) => tracing::info!(item = %command.item, command = ?accepted, "command sent"),
        Err(e) => tracing::error!(error = %e, "command dispatch failed"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemKind {
    Color,
    DateTime,
    Dimmer,
    Location,
    Number,
    Player,
    Rollershutter,
    Switch,
    String,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "color" => Ok(ItemKind::Color),
            "datetime" => Ok(ItemKind::DateTime),
            "dimmer" => Ok(ItemKind::Dimmer),
            "location" => Ok(ItemKind::Location),
            "number" => Ok(ItemKind::Number),
            "player" => Ok(ItemKind::Player),
            "rollershutter" => Ok(ItemKind::Rollershutter),
            "switch" => Ok(ItemKind::Switch),
            "string" => Ok(ItemKind::String),
            other => Err(format!("unknown item kind {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coercion {
    Hsb,
    Percent,
    OnOff,
    Decimal,
    DateTime,
    Point,
    PlayPause,
    RewindFastforward,
    NextPrevious,
    UpDown,
    StopMove,
    Text,
}

impl ItemKind {
    /// Value types tried in order until one parses.
    pub fn coercions(&self) -> &'static [Coercion] {
        match self {
            ItemKind::Color => &[Coercion::Hsb, Coercion::Percent, Coercion::OnOff],
            ItemKind::DateTime => &[Coercion::DateTime],
            ItemKind::Dimmer => &[Coercion::Percent, Coercion::OnOff],
            ItemKind::Location => &[Coercion::Point],
            ItemKind::Number => &[Coercion::Decimal],
            ItemKind::Player => &[
                Coercion::PlayPause,
                Coercion::RewindFastforward,
                Coercion::NextPrevious,
            ],
            ItemKind::Rollershutter => &[Coercion::UpDown, Coercion::StopMove, Coercion::Percent],
            ItemKind::Switch => &[Coercion::OnOff],
            ItemKind::String => &[Coercion::Text],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ItemCommand {
    Hsb { hue: f64, saturation: f64, brightness: f64 },
    Percent(f64),
    OnOff(bool),
    Decimal(f64),
    DateTime(DateTime<FixedOffset>),
    Point { latitude: f64, longitude: f64, altitude: Option<f64> },
    PlayPause(bool),
    RewindFastforward(bool),
    NextPrevious(bool),
    UpDown(bool),
    StopMove(bool),
    Text(String),
}

impl Coercion {
    pub fn apply(&self, value: &str) -> Option<ItemCommand> {
        match self {
            Coercion::Hsb => {
                let parts = parse_floats(value)?;
                let [hue, saturation, brightness] = parts.as_slice() else {
                    return None;
                };
                let valid = (0.0..=360.0).contains(hue)
                    && (0.0..=100.0).contains(saturation)
                    && (0.0..=100.0).contains(brightness);
                valid.then_some(ItemCommand::Hsb {
                    hue: *hue,
                    saturation: *saturation,
                    brightness: *brightness,
                })
            }
            Coercion::Percent => value
                .parse::<f64>()
                .ok()
                .filter(|p| (0.0..=100.0).contains(p))
                .map(ItemCommand::Percent),
            Coercion::OnOff => keyword(value, "ON", "OFF").map(ItemCommand::OnOff),
            Coercion::Decimal => value
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(ItemCommand::Decimal),
            Coercion::DateTime => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(ItemCommand::DateTime),
            Coercion::Point => {
                let parts = parse_floats(value)?;
                match parts.as_slice() {
                    [latitude, longitude] => Some(ItemCommand::Point {
                        latitude: *latitude,
                        longitude: *longitude,
                        altitude: None,
                    }),
                    [latitude, longitude, altitude] => Some(ItemCommand::Point {
                        latitude: *latitude,
                        longitude: *longitude,
                        altitude: Some(*altitude),
                    }),
                    _ => None,
                }
            }
            Coercion::PlayPause => keyword(value, "PLAY", "PAUSE").map(ItemCommand::PlayPause),
            Coercion::RewindFastforward => {
                keyword(value, "FASTFORWARD", "REWIND").map(ItemCommand::RewindFastforward)
            }
            Coercion::NextPrevious => keyword(value, "NEXT", "PREVIOUS").map(ItemCommand::NextPrevious),
            Coercion::UpDown => keyword(value, "UP", "DOWN").map(ItemCommand::UpDown),
            Coercion::StopMove => keyword(value, "MOVE", "STOP").map(ItemCommand::StopMove),
            Coercion::Text => Some(ItemCommand::Text(value.to_string())),
        }
    }
}

fn keyword(value: &str, yes: &str, no: &str) -> Option<bool> {
    if value == yes {
        Some(true)
    } else if value == no {
        Some(false)
    } else {
        None
    }
}

fn parse_floats(value: &str) -> Option<Vec<f64>> {
    value
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect()
}

/// In-process receivers addressed by name. Remembers the last accepted command.
pub struct ItemRegistry {
    items: HashMap<String, ItemKind>,
    last_commands: RwLock<HashMap<String, ItemCommand>>,
}

impl ItemRegistry {
    pub fn new(items: HashMap<String, ItemKind>) -> Self {
        Self {
            items,
            last_commands: RwLock::new(HashMap::new()),
        }
    }

    pub fn last_command(&self, item: &str) -> Option<ItemCommand> {
        self.last_commands.read().get(item).cloned()
    }

    pub fn send(&self, item: &str, value: &str) -> Result<ItemCommand, DispatchError> {
        let kind = self
            .items
            .get(item)
            .ok_or_else(|| DispatchError::UnknownItem(item.to_string()))?;
        let command = kind
            .coercions()
            .iter()
            .find_map(|c| c.apply(value))
            .ok_or_else(|| DispatchError::Unparseable {
                item: item.to_string(),
                kind: kind.to_string(),
                value: value.to_string(),
            })?;
        self.last_commands
            .write()
            .insert(item.to_string(), command.clone());
        Ok(command)
    }
}

#[async_trait]
impl CommandDispatcher for ItemRegistry {
    async fn dispatch(&self, command: &SendCommand) -> Result<ItemCommand, DispatchError> {
        self.send(&command.item, &command.value)
    }
}
