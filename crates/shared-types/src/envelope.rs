//! # Action Envelope
//!
//! The inbound request object. On the wire the discriminant names the
//! payload field that carries the action's data:
//!
//! ```text
//! {"action":"auth","auth":{"email":"..","password":".."}}
//! {"action":"log","log":{"name":"..","data":".."}}
//! {"action":"mail","mail":{"from":"..","to":"..","subject":"..","message":".."}}
//! ```
//!
//! Decoding happens in two steps so the caller can tell an unknown
//! discriminant apart from a known action with a malformed payload.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;

/// Discriminant of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Auth,
    Log,
    Mail,
}

impl ActionKind {
    /// Every action understood by this version of the router.
    pub const ALL: [ActionKind; 3] = [ActionKind::Auth, ActionKind::Log, ActionKind::Mail];

    /// Wire name; also the name of the payload field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Auth => "auth",
            ActionKind::Log => "log",
            ActionKind::Mail => "mail",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownAction(s.to_string()))
    }
}

/// Credentials forwarded to the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub email: String,
    pub password: String,
}

/// A log entry forwarded to the log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    pub name: String,
    pub data: String,
}

/// A mail forwarded to the mail sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// A decoded, validated inbound action.
///
/// Immutable once built; scoped to a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Envelope {
    Auth { auth: AuthPayload },
    Log { log: LogPayload },
    Mail { mail: MailPayload },
}

impl Envelope {
    /// Decode and validate a raw JSON body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DispatchError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| DispatchError::ValidationFailed(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Decode and validate an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DispatchError> {
        let serde_json::Value::Object(mut fields) = value else {
            return Err(DispatchError::ValidationFailed(
                "envelope must be a JSON object".into(),
            ));
        };

        let kind = match fields.get("action") {
            Some(serde_json::Value::String(action)) => action.parse::<ActionKind>()?,
            Some(other) => return Err(DispatchError::UnknownAction(other.to_string())),
            None => return Err(DispatchError::UnknownAction(String::new())),
        };

        let payload = fields.remove(kind.as_str()).ok_or_else(|| {
            DispatchError::ValidationFailed(format!("missing '{kind}' payload"))
        })?;

        let envelope = match kind {
            ActionKind::Auth => Envelope::Auth {
                auth: decode_payload(kind, payload)?,
            },
            ActionKind::Log => Envelope::Log {
                log: decode_payload(kind, payload)?,
            },
            ActionKind::Mail => Envelope::Mail {
                mail: decode_payload(kind, payload)?,
            },
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// The discriminant of this envelope.
    pub fn kind(&self) -> ActionKind {
        match self {
            Envelope::Auth { .. } => ActionKind::Auth,
            Envelope::Log { .. } => ActionKind::Log,
            Envelope::Mail { .. } => ActionKind::Mail,
        }
    }

    /// Every payload field must be present and non-blank.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let kind = self.kind();
        let fields: Vec<(&str, &str)> = match self {
            Envelope::Auth { auth } => vec![
                ("email", auth.email.as_str()),
                ("password", auth.password.as_str()),
            ],
            Envelope::Log { log } => vec![("name", log.name.as_str()), ("data", log.data.as_str())],
            Envelope::Mail { mail } => vec![
                ("from", mail.from.as_str()),
                ("to", mail.to.as_str()),
                ("subject", mail.subject.as_str()),
                ("message", mail.message.as_str()),
            ],
        };

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(DispatchError::ValidationFailed(format!(
                "{kind}.{field} must not be empty"
            ))),
            None => Ok(()),
        }
    }
}

fn decode_payload<T: DeserializeOwned>(
    kind: ActionKind,
    payload: serde_json::Value,
) -> Result<T, DispatchError> {
    serde_json::from_value(payload)
        .map_err(|e| DispatchError::ValidationFailed(format!("invalid '{kind}' payload: {e}")))
}
