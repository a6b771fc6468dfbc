//! Adapter for OpenAI-compatible REST endpoints (api.openai.com, Ollama and
//! anything else speaking the same chat/embeddings/speech API).

mod completion;
mod embeddings;
mod message;
mod speech;

use async_trait::async_trait;
use reqwest::RequestBuilder;

use super::{
    Adapter, Completion, CompletionParams, Embeddings, EmbeddingsParams, Message, Speech,
    SpeechMessage, SpeechParams,
};

pub struct OpenAiAdapter {
    http: reqwest::Client,
    base_url: String,
    key: String,
    audio_buf_size: usize,
}

impl OpenAiAdapter {
    pub fn new(base_url: &str, key: &str, audio_buf_size: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            audio_buf_size,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let mut req = self.http.post(format!("{}/{path}", self.base_url));
        if !self.key.is_empty() {
            req = req.bearer_auth(&self.key);
        }
        req
    }
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    async fn get_completion(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> anyhow::Result<Completion> {
        completion::get_completion(self, messages, params).await
    }

    async fn get_embeddings(
        &self,
        input: &str,
        params: &EmbeddingsParams,
    ) -> anyhow::Result<Embeddings> {
        embeddings::get_embeddings(self, input, params).await
    }

    async fn get_speech(
        &self,
        message: &SpeechMessage,
        params: &SpeechParams,
    ) -> anyhow::Result<Speech> {
        speech::get_speech(self, message, params).await
    }
}
