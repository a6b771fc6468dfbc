//! Conversation threads: ordered frames of messages with per-frame token
//! accounting derived from completion usage and byte-size estimates.

mod completion;
mod response;
mod summarizer;

pub use completion::ThreadCompletion;
pub use response::{ResponseHandler, ResponseParams, ThreadResponse};
pub use summarizer::Summarizer;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::adapter::{AssistantMessage, ContentPart, Message, UserMessage};
use crate::Samples;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Thread {
    pub frames: Vec<MessagesFrame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesFrame {
    pub messages: Vec<Message>,

    /// Tokens attributed to this frame alone, derived from the totals.
    #[serde(default, rename = "tokens")]
    pub frame_tokens: i64,

    /// Total tokens of this frame and all frames before it.
    #[serde(default, rename = "total_tokens")]
    pub tokens: i64,
}

impl MessagesFrame {
    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Thread {
    pub fn first(&self) -> Option<&Message> {
        self.frames.iter().find_map(MessagesFrame::first)
    }

    pub fn last(&self) -> Option<&Message> {
        self.frames.iter().rev().find_map(MessagesFrame::last)
    }

    /// The trailing user message, when the thread ends with one.
    pub fn request(&self) -> Result<&UserMessage> {
        if let Some(Message::User(m)) = self.last() {
            return Ok(m);
        }
        Err(anyhow!("frame doesn't contain a user message"))
    }

    /// The trailing assistant message, when the thread ends with one.
    pub fn response(&self) -> Result<&AssistantMessage> {
        if let Some(Message::Assistant(m)) = self.last() {
            return Ok(m);
        }
        Err(anyhow!("frame doesn't contain an assistant message"))
    }

    /// Estimates the total token count of the thread: the last recorded
    /// total plus a byte-derived estimate of everything after it.
    pub fn tokens(&self, samples: &Samples) -> i64 {
        let mut tokens = 0;

        let mut i = self.frames.len();
        while i > 0 {
            let frame = &self.frames[i - 1];
            if frame.tokens > 0 {
                tokens = frame.tokens;
                break;
            }
            i -= 1;
        }

        let mut size = 0;
        for frame in &self.frames[i..] {
            size += estimated_frame_size(frame);
        }

        tokens + (size as f32 / samples.bytes_per_tok()) as i64
    }
}

/// Assigns per-frame token counts across the thread: frames with a recorded
/// total get the delta from the previous total, frames without one get a
/// byte-size estimate.
pub fn set_frame_tokens(thread: &mut Thread, samples: &Samples) {
    let bytes_per_tok = samples.bytes_per_tok();

    let mut tokens = 0;
    for frame in &mut thread.frames {
        if frame.messages.is_empty() {
            continue;
        }
        if frame.tokens > 0 {
            frame.frame_tokens = (frame.tokens - tokens).max(0);
            tokens = frame.tokens;
        } else {
            let size = estimated_frame_size(frame);
            frame.frame_tokens = (size as f32 / bytes_per_tok) as i64;
            tokens += frame.frame_tokens;
        }
    }
}

fn estimated_frame_size(frame: &MessagesFrame) -> i64 {
    frame.messages.iter().map(estimated_message_size).sum()
}

fn estimated_message_size(message: &Message) -> i64 {
    let mut size = 0i64;

    match message {
        Message::System(m) => size += m.content.len() as i64,

        Message::User(m) => {
            for part in &m.parts {
                match part {
                    ContentPart::Text(p) => size += p.text.len() as i64,
                    ContentPart::ImageUrl(p) => size += p.image_url.len() as i64,
                }
            }
        }

        Message::Tool(m) => {
            size += m.tool_call_id.len() as i64;
            for part in &m.content {
                size += part.text.len() as i64;
            }
        }

        Message::Assistant(m) => {
            if let Some(content) = &m.content {
                size += content.len() as i64;
            } else if let Some(refusal) = &m.refusal {
                size += refusal.len() as i64;
            }

            for call in &m.tool_calls {
                size += call.id.len() as i64;
                size += call.function.name.len() as i64;
                size += call.function.arguments.len() as i64;
            }
        }
    }

    size
}
