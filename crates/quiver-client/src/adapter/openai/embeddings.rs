use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::adapter::{Embeddings, EmbeddingsParams, EmbeddingsUsage};

use super::OpenAiAdapter;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: i64,
}

pub(super) async fn get_embeddings(
    adapter: &OpenAiAdapter,
    input: &str,
    params: &EmbeddingsParams,
) -> anyhow::Result<Embeddings> {
    let request = EmbeddingsRequest {
        input,
        model: &params.model,
        dimensions: params.dimensions,
    };

    let response: EmbeddingsResponse = adapter
        .post("embeddings")
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("failed to decode embeddings response")?;

    if response.data.len() != 1 {
        return Err(anyhow!(
            "unexpected number of embeddings: {}",
            response.data.len()
        ));
    }

    Ok(Embeddings {
        data: response.data.into_iter().next().expect("one embedding").embedding,
        usage: response.usage.map(|u| EmbeddingsUsage {
            prompt_tokens: u.prompt_tokens,
        }),
    })
}
