//! Cross-surface signals
//!
//! Closed tagged unions for the messages crossing the page boundary. Inbound
//! messages are validated explicitly; anything that is not a known shape is
//! rejected with a reason instead of being ignored silently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signals the page session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundSignal {
    /// Show or hide the annotation chrome
    #[serde(rename = "WA_TOGGLE_PANEL")]
    TogglePanel,
}

/// Signals the page session emits, fire-and-forget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundSignal {
    #[serde(rename = "WA_OPEN_OPTIONS")]
    OpenOptions,
    #[serde(rename = "WA_OPEN_REPO")]
    OpenRepository,
}

/// Why an inbound message was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("Signal must be a JSON object")]
    NotAnObject,

    #[error("Signal has no string `type` field")]
    MissingType,

    #[error("Unknown signal type: {0}")]
    UnknownType(String),
}

impl InboundSignal {
    pub const TOGGLE_PANEL: &'static str = "WA_TOGGLE_PANEL";

    /// Validate a raw message
    pub fn parse(message: &Value) -> Result<Self, SignalError> {
        let object = message.as_object().ok_or(SignalError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SignalError::MissingType)?;

        match kind {
            Self::TOGGLE_PANEL => Ok(InboundSignal::TogglePanel),
            other => Err(SignalError::UnknownType(other.to_string())),
        }
    }
}

impl OutboundSignal {
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundSignal::OpenOptions => "WA_OPEN_OPTIONS",
            OutboundSignal::OpenRepository => "WA_OPEN_REPO",
        }
    }
}
