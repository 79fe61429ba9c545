//! Command wire shape shared by both backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use synapse_core_types::{ContextRole, TabId};

use crate::errors::BridgeError;

/// A request carried across the bridge. Each send builds a fresh value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action")]
pub enum Command {
    #[serde(rename = "INJECT_TEXT")]
    InjectText { payload: String },
    #[serde(rename = "GET_PAGE_CONTENT")]
    GetPageContent,
    #[serde(rename = "SUBMIT_INPUT")]
    SubmitInput,
}

impl Command {
    pub fn inject(payload: impl Into<String>) -> Self {
        Command::InjectText {
            payload: payload.into(),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::InjectText { .. } => "INJECT_TEXT",
            Command::GetPageContent => "GET_PAGE_CONTENT",
            Command::SubmitInput => "SUBMIT_INPUT",
        }
    }

    pub fn to_wire(&self) -> Result<Value, BridgeError> {
        serde_json::to_value(self).map_err(|err| BridgeError::Encode(err.to_string()))
    }

    pub fn from_wire(value: Value) -> Result<Self, BridgeError> {
        serde_json::from_value(value).map_err(|err| BridgeError::Decode(err.to_string()))
    }
}

/// Answer a listener hands back through the acknowledgement callback.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandResponse {
    PageContent { content: String },
    Ack(InjectionAck),
}

impl CommandResponse {
    pub fn to_wire(&self) -> Result<Value, BridgeError> {
        serde_json::to_value(self).map_err(|err| BridgeError::Encode(err.to_string()))
    }

    pub fn from_wire(value: Value) -> Result<Self, BridgeError> {
        serde_json::from_value(value).map_err(|err| BridgeError::Decode(err.to_string()))
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            CommandResponse::PageContent { content } => Some(content),
            CommandResponse::Ack(_) => None,
        }
    }

    pub fn ack(&self) -> Option<&InjectionAck> {
        match self {
            CommandResponse::Ack(ack) => Some(ack),
            CommandResponse::PageContent { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjectionAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InjectionAck {
    pub fn success(selector: impl Into<String>) -> Self {
        Self {
            ok: true,
            selector: Some(selector.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            selector: None,
            error: Some(error.into()),
        }
    }
}

/// Identity of the context that issued a command.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SenderInfo {
    pub id: String,
    pub role: ContextRole,
}

impl SenderInfo {
    pub fn new(id: impl Into<String>, role: ContextRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub(crate) fn mock() -> Self {
        Self::new("mock-sender", ContextRole::Sidebar)
    }
}

/// Where a command should go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Whatever context currently has focus.
    ActiveTab,
    Tab(TabId),
}

/// Transport-level outcome of a send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered {
        response: Option<CommandResponse>,
    },
    /// The target could not be reached. Logged and dropped, never retried.
    Dropped { reason: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }

    pub fn response(&self) -> Option<&CommandResponse> {
        match self {
            Delivery::Delivered { response } => response.as_ref(),
            Delivery::Dropped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inject_text_matches_wire_shape() {
        let wire = Command::inject("hello").to_wire().unwrap();
        assert_eq!(wire, json!({"action": "INJECT_TEXT", "payload": "hello"}));
    }

    #[test]
    fn get_page_content_has_no_payload() {
        let wire = Command::GetPageContent.to_wire().unwrap();
        assert_eq!(wire, json!({"action": "GET_PAGE_CONTENT"}));
        let parsed = Command::from_wire(json!({"action": "GET_PAGE_CONTENT"})).unwrap();
        assert_eq!(parsed, Command::GetPageContent);
    }

    #[test]
    fn unknown_action_is_a_decode_error() {
        let err = Command::from_wire(json!({"action": "EXPLODE"})).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn responses_decode_by_shape() {
        let content = CommandResponse::from_wire(json!({"content": "transcript"})).unwrap();
        assert_eq!(content.content(), Some("transcript"));

        let ack = CommandResponse::from_wire(json!({"ok": false, "error": "no input"})).unwrap();
        assert_eq!(ack.ack().map(|a| a.ok), Some(false));
    }
}
