//! Conversion between the provider-neutral message model and the OpenAI
//! chat wire format (role-discriminated messages, typed content parts).

use serde::{Deserialize, Serialize};

use crate::adapter::{ContentPart, Message, ToolCall, ToolCallFunction};

#[derive(Debug, Serialize)]
pub(super) struct ApiMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize)]
pub(super) struct ApiImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ApiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ApiToolCallKind,
    pub function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum ApiToolCallKind {
    Function,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

pub(super) fn to_api_message(message: &Message) -> ApiMessage {
    match message {
        Message::System(m) => ApiMessage {
            role: "system",
            content: Some(ApiContent::Text(m.content.clone())),
            tool_calls: Vec::new(),
            tool_call_id: None,
            refusal: None,
        },
        Message::User(m) => ApiMessage {
            role: "user",
            content: Some(ApiContent::Parts(
                m.parts.iter().map(to_api_content_part).collect(),
            )),
            tool_calls: Vec::new(),
            tool_call_id: None,
            refusal: None,
        },
        Message::Assistant(m) => ApiMessage {
            role: "assistant",
            content: m.content.clone().map(ApiContent::Text),
            tool_calls: m.tool_calls.iter().map(to_api_tool_call).collect(),
            tool_call_id: None,
            refusal: m.refusal.clone(),
        },
        Message::Tool(m) => ApiMessage {
            role: "tool",
            content: Some(ApiContent::Parts(
                m.content
                    .iter()
                    .map(|part| ApiContentPart::Text {
                        text: part.text.clone(),
                    })
                    .collect(),
            )),
            tool_calls: Vec::new(),
            tool_call_id: Some(m.tool_call_id.clone()),
            refusal: None,
        },
    }
}

fn to_api_content_part(part: &ContentPart) -> ApiContentPart {
    match part {
        ContentPart::Text(p) => ApiContentPart::Text {
            text: p.text.clone(),
        },
        ContentPart::ImageUrl(p) => ApiContentPart::ImageUrl {
            image_url: ApiImageUrl {
                url: p.image_url.clone(),
            },
        },
    }
}

fn to_api_tool_call(call: &ToolCall) -> ApiToolCall {
    ApiToolCall {
        id: call.id.clone(),
        kind: ApiToolCallKind::Function,
        function: ApiFunctionCall {
            name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        },
    }
}

pub(super) fn from_api_tool_call(call: ApiToolCall) -> ToolCall {
    ToolCall {
        id: call.id,
        function: ToolCallFunction {
            name: call.function.name,
            arguments: call.function.arguments,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_becomes_typed_parts() {
        let m = Message::user("hello");
        let api = to_api_message(&m);
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "hello");
    }

    #[test]
    fn tool_message_carries_call_id() {
        let m = Message::tool("call-7", "result");
        let api = to_api_message(&m);
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call-7");
        assert_eq!(json["content"][0]["text"], "result");
    }
}
