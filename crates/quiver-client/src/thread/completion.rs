use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::adapter::{CompletionParams, CompletionUsage, Message};
use crate::Client;

use super::{set_frame_tokens, Thread};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadCompletion {
    /// The thread passed in, with the assistant's reply appended to the
    /// last frame.
    pub thread: Thread,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

impl Client {
    /// Completes a thread: all frames are flattened into one message list,
    /// the assistant's reply lands in the last frame, and frame token
    /// counts are recomputed from the reported usage.
    pub async fn get_thread_completion(
        &self,
        mut thread: Thread,
        params: &CompletionParams,
    ) -> Result<ThreadCompletion> {
        if thread.frames.is_empty() {
            bail!("thread must have at least one frame");
        }

        let messages: Vec<Message> = thread
            .frames
            .iter()
            .flat_map(|frame| frame.messages.iter().cloned())
            .collect();

        let completion = self.get_completion(&messages, params).await?;

        let frame = thread.frames.last_mut().expect("at least one frame");
        frame.messages.push(Message::Assistant(completion.message));
        if let Some(usage) = &completion.usage {
            frame.tokens = usage.prompt_tokens + usage.completion_tokens;
        }

        // Token counts are assigned after the client stats were updated by
        // the completion above.
        set_frame_tokens(&mut thread, self.samples());

        Ok(ThreadCompletion {
            thread,
            usage: completion.usage,
        })
    }
}
