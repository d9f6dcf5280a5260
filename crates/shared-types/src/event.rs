//! # Event Messages
//!
//! The body carried over the event channel, plus the severity levels that
//! make up its routing keys (`log.INFO`, `log.WARNING`, `log.ERROR`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::envelope::LogPayload;

/// Wire body published to the topic exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub name: String,
    pub data: String,
}

impl EventMessage {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Serialize to the byte payload published on the channel.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a byte payload received from the channel.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl From<LogPayload> for EventMessage {
    fn from(payload: LogPayload) -> Self {
        Self {
            name: payload.name,
            data: payload.data,
        }
    }
}

impl From<EventMessage> for LogPayload {
    fn from(message: EventMessage) -> Self {
        Self {
            name: message.name,
            data: message.data,
        }
    }
}

/// Severity segment of a `log.<LEVEL>` routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// Routing key for this severity, e.g. `log.INFO`.
    pub fn routing_key(&self) -> String {
        format!("log.{}", self.as_str())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}
