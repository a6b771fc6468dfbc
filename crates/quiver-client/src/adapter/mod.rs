//! Provider-neutral chat, embeddings and speech models, plus the adapter
//! trait implementations speak through.

pub mod openai;

mod audio;
mod completion;
mod embeddings;
mod message;
mod speech;
mod tool;

pub use audio::{Audio, AudioData, AudioMetadata};
pub use completion::{
    Completion, CompletionParams, CompletionUsage, JsonSchema, ResponseFormat,
    ResponseFormatJsonSchema, ResponseFormatText,
};
pub use embeddings::{Embeddings, EmbeddingsParams, EmbeddingsUsage};
pub use message::{
    AssistantMessage, ContentPart, ContentPartImage, ContentPartText, Message, SystemMessage,
    ToolMessage, UserMessage,
};
pub use speech::{Speech, SpeechMessage, SpeechParams};
pub use tool::{Tool, ToolCall, ToolCallFunction, ToolFunction};

use async_trait::async_trait;

/// A chat/embeddings/speech provider. All three operations are fallible and
/// cancellable by dropping the future.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn get_completion(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> anyhow::Result<Completion>;

    async fn get_embeddings(
        &self,
        input: &str,
        params: &EmbeddingsParams,
    ) -> anyhow::Result<Embeddings>;

    async fn get_speech(
        &self,
        message: &SpeechMessage,
        params: &SpeechParams,
    ) -> anyhow::Result<Speech>;
}
