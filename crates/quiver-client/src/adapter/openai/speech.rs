use anyhow::anyhow;
use serde::Serialize;

use crate::adapter::{Speech, SpeechMessage, SpeechParams};

use super::OpenAiAdapter;

// Responses past this size are refused outright.
const MAX_AUDIO_SIZE: u64 = 1 << 30;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    input: &'a str,
    model: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    response_format: &'static str,
}

pub(super) async fn get_speech(
    adapter: &OpenAiAdapter,
    message: &SpeechMessage,
    params: &SpeechParams,
) -> anyhow::Result<Speech> {
    let request = SpeechRequest {
        input: &message.content,
        model: &params.model,
        voice: &params.voice,
        instructions: message.instructions.as_deref(),
        speed: params.speed,
        response_format: "pcm",
    };

    let mut response = adapter
        .post("audio/speech")
        .json(&request)
        .send()
        .await?
        .error_for_status()?;

    let capacity = match response.content_length() {
        Some(n) if n > MAX_AUDIO_SIZE => {
            return Err(anyhow!("response too large: {n} bytes"));
        }
        Some(n) => n as usize,
        None => adapter.audio_buf_size,
    };

    let mut audio = Vec::with_capacity(capacity);
    while let Some(chunk) = response.chunk().await? {
        audio.extend_from_slice(&chunk);
        if audio.len() as u64 > MAX_AUDIO_SIZE {
            return Err(anyhow!("response too large: {} bytes", audio.len()));
        }
    }

    Ok(Speech { audio })
}
