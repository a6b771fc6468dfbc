use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::adapter::{
    AssistantMessage, Completion, CompletionParams, CompletionUsage, Message, ResponseFormat, Tool,
};

use super::message::{to_api_message, ApiMessage, ApiToolCall};
use super::OpenAiAdapter;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "<[ApiTool]>::is_empty")]
    tools: &'a [ApiTool],
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
}

pub(super) async fn get_completion(
    adapter: &OpenAiAdapter,
    messages: &[Message],
    params: &CompletionParams,
) -> anyhow::Result<Completion> {
    let tools: Vec<ApiTool> = params.tools.iter().map(to_api_tool).collect();

    let request = ChatRequest {
        model: &params.model,
        messages: messages.iter().map(to_api_message).collect(),
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        response_format: params.response_format.as_ref().map(to_api_response_format),
        stop: &params.stop,
        temperature: params.temperature,
        tools: &tools,
        top_p: params.top_p,
    };

    let response: ChatResponse = adapter
        .post("chat/completions")
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("failed to decode chat completion response")?;

    if response.choices.len() != 1 {
        return Err(anyhow!(
            "unexpected number of choices: {}",
            response.choices.len()
        ));
    }

    let choice = response.choices.into_iter().next().expect("one choice");

    // A non-empty refusal wins over content, mirroring the provider's own
    // precedence.
    let (content, refusal) = match (choice.message.content, choice.message.refusal) {
        (_, Some(refusal)) if !refusal.is_empty() => (None, Some(refusal)),
        (Some(content), _) if !content.is_empty() => (Some(content), None),
        _ => (None, None),
    };

    Ok(Completion {
        message: AssistantMessage {
            content,
            refusal,
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(super::message::from_api_tool_call)
                .collect(),
        },
        usage: response.usage.map(|u| CompletionUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

fn to_api_tool(tool: &Tool) -> ApiTool {
    ApiTool {
        kind: "function",
        function: serde_json::json!({
            "name": tool.function.name,
            "description": tool.function.description,
            "parameters": tool.function.parameters,
            "strict": tool.function.strict,
        }),
    }
}

fn to_api_response_format(format: &ResponseFormat) -> serde_json::Value {
    match format {
        ResponseFormat::Text(_) => serde_json::json!({"type": "text"}),
        ResponseFormat::JsonSchema(f) => serde_json::json!({
            "type": "json_schema",
            "json_schema": f.json_schema,
        }),
    }
}
