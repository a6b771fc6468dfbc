use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::adapter::{CompletionParams, Message, ToolCallFunction};
use crate::{msg, Client};

use super::Thread;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResponseParams {
    #[serde(flatten)]
    #[validate(nested)]
    pub completion: CompletionParams,
    /// Upper bound on completion rounds.
    #[validate(range(min = 1))]
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub thread: Thread,
    /// False when the loop stopped with tool calls still pending, either
    /// because iterations ran out or because no handler was available to
    /// execute them.
    pub done: bool,
}

/// Executes tool calls requested by the model during a response loop.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn call(&self, function: &ToolCallFunction) -> Result<String>;
}

impl Client {
    /// Runs the iterative tool-calling loop: complete, execute requested
    /// tools, feed results back, repeat. Without a handler the loop stops
    /// at the first tool request and returns the thread with `done: false`
    /// so the caller can execute the tools and re-submit.
    pub async fn get_thread_response(
        &self,
        mut thread: Thread,
        params: &ResponseParams,
        handler: Option<&dyn ResponseHandler>,
    ) -> Result<ThreadResponse> {
        for _ in 0..params.iterations {
            let completion = self
                .get_thread_completion(thread, &params.completion)
                .await?;
            thread = completion.thread;

            let response = thread.response()?.clone();

            if response.tool_calls.is_empty() {
                return Ok(ThreadResponse { thread, done: true });
            }

            for call in &response.tool_calls {
                let known = params
                    .completion
                    .tools
                    .iter()
                    .any(|tool| tool.function.name == call.function.name);
                if !known {
                    bail!("calling not existing function: {}", call.function.name);
                }
            }

            let Some(handler) = handler else {
                return Ok(ThreadResponse {
                    thread,
                    done: false,
                });
            };

            let frame = thread.frames.last_mut().expect("completion added a frame");

            for (i, call) in response.tool_calls.iter().enumerate() {
                match handler.call(&call.function).await {
                    Ok(result) => {
                        frame.messages.push(Message::tool(call.id.clone(), result));
                    }
                    Err(err) => {
                        frame.messages.push(Message::tool(
                            call.id.clone(),
                            msg::render_tool_error_message(&err.to_string()),
                        ));
                        for skipped in &response.tool_calls[i + 1..] {
                            frame.messages.push(Message::tool(
                                skipped.id.clone(),
                                msg::render_tool_previous_error_message(),
                            ));
                        }
                        return Err(err);
                    }
                }
            }
        }

        Ok(ThreadResponse {
            thread,
            done: false,
        })
    }
}
