//! # Response Envelope
//!
//! `{"error":bool,"message":string,"data"?:object}`, returned to the caller
//! of the router and also spoken by the HTTP downstreams.

use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ResponseBody {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&DispatchError> for ResponseBody {
    fn from(err: &DispatchError) -> Self {
        ResponseBody::failure(err.to_string())
    }
}
