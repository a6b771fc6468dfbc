use anyhow::{bail, Result};

use crate::adapter::{CompletionParams, Message};
use crate::{msg, Client};

use super::{MessagesFrame, Thread};

const FRACTION_MIN: f32 = 0.1;
const FRACTION_MAX: f32 = 1.0;

/// Replaces the oldest fraction of a thread with a generated summary once
/// the thread grows past the configured token or message limits.
pub struct Summarizer<'a> {
    client: &'a Client,

    /// Fraction of the history to fold into the summary.
    fraction: f32,

    max_tokens: Option<i64>,
    max_messages: Option<usize>,
}

impl<'a> Summarizer<'a> {
    pub fn new(client: &'a Client, fraction: f32) -> Self {
        Self {
            client,
            fraction: fraction.clamp(FRACTION_MIN, FRACTION_MAX),
            max_tokens: None,
            max_messages: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Summarizes the thread when one of the limits has been reached;
    /// otherwise the thread is returned unchanged. The leading system
    /// frame, when present, survives the fold.
    pub async fn summarize(&self, thread: Thread) -> Result<Thread> {
        if !self.should_summarize(&thread) {
            return Ok(thread);
        }

        let n = (thread.frames.len() as f32 * self.fraction) as usize;
        if n < 2 {
            return Ok(thread);
        }

        let summary = self.get_summary(&thread.frames[..n]).await?;
        let message = msg::render_summary_message(&summary);

        let mut folded = Thread::default();
        if let Some(system) = system_frame(&thread) {
            folded.frames.push(system);
        }
        folded.frames.push(MessagesFrame {
            messages: vec![Message::assistant(message)],
            frame_tokens: 0,
            tokens: 0,
        });
        folded.frames.extend_from_slice(&thread.frames[n..]);

        Ok(folded)
    }

    fn should_summarize(&self, thread: &Thread) -> bool {
        if let Some(max_tokens) = self.max_tokens {
            if thread.tokens(self.client.samples()) >= max_tokens {
                return true;
            }
        }

        if let Some(max_messages) = self.max_messages {
            let messages: usize = thread.frames.iter().map(|f| f.messages.len()).sum();
            if messages >= max_messages {
                return true;
            }
        }

        false
    }

    async fn get_summary(&self, frames: &[MessagesFrame]) -> Result<String> {
        let instruction = msg::render_summarize_message();

        let mut thread = Thread {
            frames: Vec::with_capacity(frames.len() + 1),
        };
        thread.frames.extend_from_slice(frames);
        thread.frames.push(MessagesFrame {
            messages: vec![Message::user(instruction)],
            frame_tokens: 0,
            tokens: 0,
        });

        let completion = self
            .client
            .get_thread_completion(thread, &CompletionParams::default())
            .await?;

        let response = completion.thread.response()?;

        if response.refusal.is_some() {
            bail!("generating summary was refused");
        }

        match &response.content {
            Some(content) => Ok(content.clone()),
            None => bail!("summary response has no content"),
        }
    }
}

/// Extracts the leading system message as its own frame, when the thread
/// starts with one.
fn system_frame(thread: &Thread) -> Option<MessagesFrame> {
    let frame = thread.frames.first()?;
    let message = frame.messages.first()?;

    if !matches!(message, Message::System(_)) {
        return None;
    }

    if frame.messages.len() == 1 {
        return Some(frame.clone());
    }

    Some(MessagesFrame {
        messages: vec![message.clone()],
        frame_tokens: 0,
        tokens: 0,
    })
}
