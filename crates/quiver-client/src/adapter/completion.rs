use serde::{Deserialize, Serialize};
use validator::Validate;

use super::message::AssistantMessage;
use super::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CompletionParams {
    /// Model to use. When empty, the client substitutes its configured
    /// default.
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -2.0, max = 2.0))]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -2.0, max = 2.0))]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = 4))]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub message: AssistantMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub completion_tokens: i64,
    pub prompt_tokens: i64,
}

/// Requested output shape. Exactly one variant, tagged by its key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text(ResponseFormatText),
    JsonSchema(ResponseFormatJsonSchema),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseFormatText {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormatJsonSchema {
    pub json_schema: JsonSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_validate_ranges() {
        let params = CompletionParams {
            temperature: Some(1.0),
            ..CompletionParams::default()
        };
        assert!(params.validate().is_ok());

        let params = CompletionParams {
            temperature: Some(3.0),
            ..CompletionParams::default()
        };
        assert!(params.validate().is_err());

        let params = CompletionParams {
            stop: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            ..CompletionParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn response_format_is_tagged_by_kind() {
        let f = ResponseFormat::Text(ResponseFormatText {});
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            serde_json::json!({"text": {}})
        );

        let f: ResponseFormat = serde_json::from_value(serde_json::json!({
            "json_schema": {"json_schema": {"name": "out", "schema": {}}}
        }))
        .unwrap();
        assert!(matches!(f, ResponseFormat::JsonSchema(_)));
    }
}
