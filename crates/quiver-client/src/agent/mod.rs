//! ReAct-style agent loop. The model answers in tagged sections
//! (`<thought>`, `<action>`, `<action_input>`, `<answer>`); the loop parses
//! them, executes actions through a handler, and feeds observations back as
//! user messages.

use std::sync::OnceLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::adapter::{CompletionParams, Message, ResponseFormat, ToolCallFunction};
use crate::thread::Thread;
use crate::{msg, Client};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentParams {
    #[serde(flatten)]
    #[validate(nested)]
    pub completion: CompletionParams,

    /// What the agent is and does; becomes part of the system message.
    #[serde(default)]
    pub description: String,

    /// Upper bound on reasoning/acting rounds.
    #[validate(range(min = 1))]
    pub iterations: u32,

    /// Budget for responses that carry none of the expected tags. Shares
    /// the iterations budget when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub thread: Thread,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub answer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub done: bool,
}

/// Receives the agent's thoughts and executes its actions.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn call(&self, function: &ToolCallFunction) -> Result<String>;
    async fn thought(&self, content: &str) -> Result<()>;
}

impl Client {
    /// Drives the agent loop until it produces an answer or the iteration
    /// budget runs out. Without a handler, the loop stops at the first
    /// requested action and returns `done: false`.
    pub async fn get_agent_response(
        &self,
        thread: Thread,
        params: &AgentParams,
        handler: Option<&dyn AgentHandler>,
    ) -> Result<AgentResponse> {
        if matches!(
            params.completion.response_format,
            Some(ResponseFormat::JsonSchema(_))
        ) {
            bail!("cannot use structured output for agent");
        }

        let mut thread = set_system_message(thread, params);

        // Tool calling happens through the tagged protocol, not the
        // provider's native mechanism.
        let mut completion_params = params.completion.clone();
        completion_params.tools = Vec::new();

        let mut iterations = params.iterations;
        let mut retries = params.retries.unwrap_or(params.iterations);

        loop {
            iterations -= 1;

            let (next, response) = self
                .agent_iterate(thread, &completion_params, &mut retries, handler)
                .await?;
            thread = next;

            match response {
                Some(response) => return Ok(response),
                None if iterations == 0 => {
                    return Ok(AgentResponse {
                        thread,
                        answer: String::new(),
                        error: String::new(),
                        done: false,
                    })
                }
                None => {}
            }
        }
    }

    /// One round: obtain a tagged completion (retrying untagged output),
    /// emit thoughts, and either finish with an answer or execute the
    /// requested action and append the observation.
    async fn agent_iterate(
        &self,
        mut thread: Thread,
        completion_params: &CompletionParams,
        retries: &mut u32,
        handler: Option<&dyn AgentHandler>,
    ) -> Result<(Thread, Option<AgentResponse>)> {
        let mut attempt = thread.clone();
        let output = loop {
            let output = self
                .get_tagged_completion(&mut attempt, completion_params)
                .await?;

            if !output.thoughts.is_empty() || !output.action.is_empty() || output.done {
                thread = attempt;
                break output;
            }

            if *retries == 0 {
                // The futile retries are not part of the returned thread.
                return Ok((
                    thread.clone(),
                    Some(AgentResponse {
                        thread,
                        answer: String::new(),
                        error: msg::render_agent_fatal_error_message(),
                        done: true,
                    }),
                ));
            }
            *retries -= 1;

            let frame = attempt.frames.last_mut().expect("completion added a frame");
            frame
                .messages
                .push(Message::user(msg::render_agent_error_message()));
        };

        if let Some(handler) = handler {
            for thought in &output.thoughts {
                handler.thought(thought).await?;
            }
        }

        if output.done {
            return Ok((
                thread.clone(),
                Some(AgentResponse {
                    thread,
                    answer: output.answer,
                    error: String::new(),
                    done: true,
                }),
            ));
        }

        if !output.action.is_empty() {
            let Some(handler) = handler else {
                return Ok((
                    thread.clone(),
                    Some(AgentResponse {
                        thread,
                        answer: String::new(),
                        error: String::new(),
                        done: false,
                    }),
                ));
            };

            let observation = match handler
                .call(&ToolCallFunction {
                    name: output.action.clone(),
                    arguments: output.parameter.clone(),
                })
                .await
            {
                Ok(result) => result,
                Err(err) => msg::render_tool_error_message(&err.to_string()),
            };

            let frame = thread.frames.last_mut().expect("completion added a frame");
            frame.messages.push(Message::user(format!(
                "<observation>{observation}</observation>"
            )));
        }

        Ok((thread, None))
    }

    async fn get_tagged_completion(
        &self,
        thread: &mut Thread,
        params: &CompletionParams,
    ) -> Result<TaggedOutput> {
        let completion = self.get_thread_completion(thread.clone(), params).await?;

        let response = completion.thread.response()?;

        if response.refusal.is_some() || response.content.is_none() {
            return Ok(TaggedOutput {
                answer: response.refusal.clone().unwrap_or_default(),
                done: true,
                ..TaggedOutput::default()
            });
        }

        let content = response.content.clone().expect("checked above");
        *thread = completion.thread;

        Ok(parse_response(&content))
    }
}

fn set_system_message(mut thread: Thread, params: &AgentParams) -> Thread {
    let content = msg::render_agent_system_message(&params.description, &params.completion.tools);
    let system = Message::system(content);

    // Replace an existing leading system message, or prepend a fresh frame
    // carrying one.
    if let Some(frame) = thread.frames.first_mut() {
        if let Some(first @ Message::System(_)) = frame.messages.first_mut() {
            *first = system;
            frame.tokens = 0;
            frame.frame_tokens = 0;
            return thread;
        }
    }

    let mut frames = Vec::with_capacity(thread.frames.len() + 1);
    frames.push(crate::thread::MessagesFrame {
        messages: vec![system],
        frame_tokens: 0,
        tokens: 0,
    });
    frames.extend(thread.frames);
    thread.frames = frames;

    thread
}

#[derive(Debug, Default)]
struct TaggedOutput {
    thoughts: Vec<String>,
    action: String,
    parameter: String,
    observation: String,
    answer: String,
    done: bool,
}

fn response_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(r"<(thought|action|action_input|observation|answer)>").expect("valid regex")
    })
}

/// Splits a tagged response into its sections. Content runs from the end of
/// a tag to the start of the next; a matching closing tag is stripped when
/// present.
fn parse_response(response: &str) -> TaggedOutput {
    let mut output = TaggedOutput::default();

    let matches: Vec<_> = response_regex().captures_iter(response).collect();

    for (i, captures) in matches.iter().enumerate() {
        let whole = captures.get(0).expect("match");
        let tag = captures.get(1).expect("tag group").as_str();

        let start = whole.end();
        let end = matches
            .get(i + 1)
            .map_or(response.len(), |next| next.get(0).expect("match").start());

        let mut content = response[start..end].trim();

        let closing = format!("</{tag}>");
        if let Some(stripped) = content.strip_suffix(closing.as_str()) {
            content = stripped.trim_end();
        }

        match tag {
            "thought" => {
                if !content.is_empty() {
                    output.thoughts.push(content.to_string());
                }
            }
            "action" => output.action = content.to_string(),
            "action_input" => output.parameter = content.to_string(),
            "observation" => output.observation = content.to_string(),
            "answer" => {
                output.answer = content.to_string();
                output.done = true;
            }
            _ => unreachable!("regex only matches known tags"),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thoughts_and_action() {
        let output = parse_response(
            "<thought>need the weather</thought>\n\
             <action>get_weather</action>\n\
             <action_input>{\"city\": \"Oslo\"}</action_input>",
        );

        assert_eq!(output.thoughts, vec!["need the weather".to_string()]);
        assert_eq!(output.action, "get_weather");
        assert_eq!(output.parameter, "{\"city\": \"Oslo\"}");
        assert!(!output.done);
    }

    #[test]
    fn parses_answer_as_done() {
        let output = parse_response("<thought>done now</thought><answer>42</answer>");

        assert_eq!(output.answer, "42");
        assert!(output.done);
    }

    #[test]
    fn tolerates_missing_closing_tags() {
        let output = parse_response("<thought>half-open\n<answer>fine");

        assert_eq!(output.thoughts, vec!["half-open".to_string()]);
        assert_eq!(output.answer, "fine");
        assert!(output.done);
    }

    #[test]
    fn collects_multiple_thoughts() {
        let output = parse_response(
            "<thought>first</thought><thought>second</thought><action>go</action>",
        );

        assert_eq!(
            output.thoughts,
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(output.action, "go");
    }

    #[test]
    fn untagged_output_is_empty() {
        let output = parse_response("no tags here at all");

        assert!(output.thoughts.is_empty());
        assert!(output.action.is_empty());
        assert!(!output.done);
    }

    #[test]
    fn system_message_is_prepended_once() {
        let params = AgentParams {
            completion: CompletionParams::default(),
            description: "test agent".to_string(),
            iterations: 1,
            retries: None,
        };

        let thread = Thread {
            frames: vec![crate::thread::MessagesFrame {
                messages: vec![Message::user("hi")],
                frame_tokens: 0,
                tokens: 0,
            }],
        };

        let with_system = set_system_message(thread, &params);
        assert_eq!(with_system.frames.len(), 2);
        assert!(matches!(
            with_system.frames[0].messages[0],
            Message::System(_)
        ));

        // A second pass replaces rather than stacks.
        let again = set_system_message(with_system, &params);
        assert_eq!(again.frames.len(), 2);
    }
}
