//! Wire protocol for the runtime message channel.
//!
//! Requests are tagged by a `type` field; responses are a single envelope
//! with `ok` plus whichever payload the operation carries. Field names
//! follow the extension wire format (camelCase).

use serde::{Deserialize, Serialize};

use crate::storage::{FocusSession, Task};

/// Error text returned for a message whose `type` is not recognized.
pub const UNKNOWN_MESSAGE_ERROR: &str = "Unknown message type";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "START_FOCUS")]
    StartFocus { payload: StartFocusPayload },
    #[serde(rename = "STOP_FOCUS")]
    StopFocus,
    #[serde(rename = "GET_FOCUS_STATE")]
    GetFocusState,
    #[serde(rename = "REQUEST_TEMP_ACCESS")]
    RequestTempAccess { payload: TempAccessPayload },
    #[serde(rename = "GET_SANITIZER_STATE")]
    GetSanitizerState { payload: SanitizerStatePayload },
}

const KNOWN_TYPES: [&str; 5] = [
    "START_FOCUS",
    "STOP_FOCUS",
    "GET_FOCUS_STATE",
    "REQUEST_TEMP_ACCESS",
    "GET_SANITIZER_STATE",
];

impl Message {
    /// Parse a raw message, distinguishing an unknown `type` (the caller
    /// error from the protocol table) from a malformed payload for a known
    /// type (reported with the parser's own message).
    pub fn parse(value: &serde_json::Value) -> Result<Message, String> {
        let tag = value.get("type").and_then(|t| t.as_str());
        match tag {
            Some(t) if KNOWN_TYPES.contains(&t) => {
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())
            }
            _ => Err(UNKNOWN_MESSAGE_ERROR.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFocusPayload {
    pub selected_tasks: Vec<Task>,
    pub blacklist_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempAccessPayload {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizerStatePayload {
    pub domain: String,
}

/// Response envelope: `{ok: true, ...}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_session: Option<FocusSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitize_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            focus_session: None,
            sanitize_enabled: None,
            error: None,
        }
    }

    pub fn with_session(session: FocusSession) -> Self {
        Self {
            focus_session: Some(session),
            ..Self::ok()
        }
    }

    pub fn with_sanitizer(enabled: bool) -> Self {
        Self {
            sanitize_enabled: Some(enabled),
            ..Self::ok()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            focus_session: None,
            sanitize_enabled: None,
            error: Some(message.into()),
        }
    }
}
