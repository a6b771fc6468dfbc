use tokio::sync::Semaphore;

use crate::adapter::openai::OpenAiAdapter;
use crate::adapter::{
    Adapter, Completion, CompletionParams, Embeddings, EmbeddingsParams, Message, Speech,
    SpeechMessage, SpeechParams,
};
use crate::config::{resolve_config, ResolvedConfig};
use crate::samples::Samples;
use crate::{ClientConfig, ConfigError};

const DEFAULT_BYTES_PER_TOK: f32 = 3.25;
const SAMPLES_COUNT: usize = 5;
pub(crate) const MIN_SAMPLE_SIZE: usize = 100;

/// Default preallocation for synthesised audio when the response carries no
/// content length.
pub const DEFAULT_AUDIO_BUF_SIZE: usize = 2 * 1024 * 1024;

/// A configured connection to one provider. Adapter calls are gated by a
/// semaphore sized to the configured concurrency; acquisition is cancelled
/// by dropping the call future.
pub struct Client {
    config: ResolvedConfig,
    adapter: Box<dyn Adapter>,
    semaphore: Semaphore,
    samples: Samples,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::with_audio_buf_size(config, DEFAULT_AUDIO_BUF_SIZE)
    }

    pub fn with_audio_buf_size(
        config: &ClientConfig,
        audio_buf_size: usize,
    ) -> Result<Self, ConfigError> {
        let config = resolve_config(config)?;

        let adapter = Box::new(OpenAiAdapter::new(
            &config.base_url,
            &config.key,
            audio_buf_size,
        ));

        Ok(Self {
            semaphore: Semaphore::new(config.concurrency),
            adapter,
            samples: Samples::new(SAMPLES_COUNT, DEFAULT_BYTES_PER_TOK),
            config,
        })
    }

    /// The configured default model, substituted into requests that leave
    /// the model unset.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub async fn get_completion(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> anyhow::Result<Completion> {
        let _permit = self.semaphore.acquire().await?;

        let params = self.with_default_model(params);
        let completion = self.adapter.get_completion(messages, &params).await?;

        self.put_completion_sample(&completion);

        Ok(completion)
    }

    pub async fn get_embeddings(
        &self,
        input: &str,
        params: &EmbeddingsParams,
    ) -> anyhow::Result<Embeddings> {
        let _permit = self.semaphore.acquire().await?;

        let mut params = params.clone();
        if params.model.is_empty() {
            params.model.clone_from(&self.config.model);
        }

        let embeddings = self.adapter.get_embeddings(input, &params).await?;

        self.put_embeddings_sample(input, &embeddings);

        Ok(embeddings)
    }

    pub async fn get_speech(
        &self,
        message: &SpeechMessage,
        params: &SpeechParams,
    ) -> anyhow::Result<Speech> {
        let _permit = self.semaphore.acquire().await?;

        let mut params = params.clone();
        if params.model.is_empty() {
            params.model.clone_from(&self.config.model);
        }

        self.adapter.get_speech(message, &params).await
    }

    pub(crate) fn with_default_model(&self, params: &CompletionParams) -> CompletionParams {
        let mut params = params.clone();
        if params.model.is_empty() {
            params.model.clone_from(&self.config.model);
        }
        params
    }

    /// Records a bytes-per-token sample from a plain text completion. Tool
    /// calls and refusals skew the ratio and are skipped, as are short
    /// messages.
    fn put_completion_sample(&self, completion: &Completion) {
        let Some(usage) = &completion.usage else {
            return;
        };
        if usage.completion_tokens == 0 {
            return;
        }

        let message = &completion.message;
        if !message.tool_calls.is_empty() || message.refusal.is_some() {
            return;
        }
        let Some(content) = &message.content else {
            return;
        };

        if content.len() >= MIN_SAMPLE_SIZE {
            self.samples
                .put(content.len() as f32 / usage.completion_tokens as f32);
        }
    }

    fn put_embeddings_sample(&self, input: &str, embeddings: &Embeddings) {
        let Some(usage) = &embeddings.usage else {
            return;
        };
        if usage.prompt_tokens == 0 {
            return;
        }

        if input.len() >= MIN_SAMPLE_SIZE {
            self.samples
                .put(input.len() as f32 / usage.prompt_tokens as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AssistantMessage;

    fn client() -> Client {
        Client::new(&ClientConfig::default()).unwrap()
    }

    fn completion(content: Option<String>, tokens: i64) -> Completion {
        Completion {
            message: AssistantMessage {
                content,
                ..AssistantMessage::default()
            },
            usage: Some(crate::adapter::CompletionUsage {
                completion_tokens: tokens,
                prompt_tokens: 10,
            }),
        }
    }

    #[test]
    fn completion_sample_requires_minimum_size() {
        let c = client();

        c.put_completion_sample(&completion(Some("short".to_string()), 10));
        assert!((c.samples.bytes_per_tok() - DEFAULT_BYTES_PER_TOK).abs() < f32::EPSILON);

        c.put_completion_sample(&completion(Some("x".repeat(200)), 10));
        assert!((c.samples.bytes_per_tok() - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn refusals_and_empty_usage_are_skipped() {
        let c = client();

        c.put_completion_sample(&completion(Some("x".repeat(200)), 0));

        let mut refused = completion(Some("x".repeat(200)), 10);
        refused.message.refusal = Some("no".to_string());
        c.put_completion_sample(&refused);

        assert!((c.samples.bytes_per_tok() - DEFAULT_BYTES_PER_TOK).abs() < f32::EPSILON);
    }
}
