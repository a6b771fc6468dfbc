use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// A conversation message. Externally tagged, so the wire form is an object
/// with exactly one of the role keys set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessage {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMessage {
    pub tool_call_id: String,
    pub content: Vec<ContentPartText>,
}

/// One part of a user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Text(ContentPartText),
    ImageUrl(ContentPartImage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPartText {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPartImage {
    pub image_url: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserMessage {
            parts: vec![ContentPart::Text(ContentPartText {
                text: content.into(),
            })],
        })
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System(SystemMessage {
            content: content.into(),
        })
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage {
            content: Some(content.into()),
            ..AssistantMessage::default()
        })
    }

    pub fn tool(call_id: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Tool(ToolMessage {
            tool_call_id: call_id.into(),
            content: vec![ContentPartText {
                text: response.into(),
            }],
        })
    }
}
