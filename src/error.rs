use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("No valid URL: {0}")]
    InvalidUrl(String),
    #[error("Could not open connection to {0}")]
    Network(String),
    #[error("calendar server answered with status {0}")]
    Status(u16),
    #[error("Could not read calendar file: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("feed does not contain a VCALENDAR")]
    NotICalendar,
    #[error("malformed calendar: {0}")]
    Malformed(String),
}

/// Anything a refresh can fail with. Both variants leave the scheduler untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalendarError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Item {0} not found")]
    UnknownItem(String),
    #[error("value {value:?} is not accepted by {kind} item {item}")]
    Unparseable {
        item: String,
        kind: String,
        value: String,
    },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("could not read config file: {0}")]
    File(String),
}
