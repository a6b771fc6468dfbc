use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use quiver_client::adapter::{
    Completion, CompletionParams, Embeddings, EmbeddingsParams, Message, Speech, SpeechMessage,
    SpeechParams,
};
use quiver_client::{Client, ClientConfig};
use quiver_rpc::{HandlerResult, RpcContext};

use crate::state::ServiceState;

use super::{completion_error, config_error, embeddings_error, speech_error};

/*** Set client ***/

#[derive(Debug, Deserialize, Validate)]
struct SetClientRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[serde(default)]
    #[validate(nested)]
    config: ClientConfig,
}

#[derive(Debug, Serialize, Validate)]
struct SetClientResponse {}

pub async fn set_client(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: SetClientRequest = ctx.request()?;

    let client = Client::with_audio_buf_size(&req.config, state.app.config.audio_buf_size)
        .map_err(config_error)?;

    state.set_client(req.client_id, Arc::new(client));

    ctx.response(SetClientResponse {})
}

/*** Get completion ***/

#[derive(Debug, Deserialize, Validate)]
struct GetCompletionRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[validate(length(min = 1))]
    messages: Vec<Message>,
    #[serde(default)]
    #[validate(nested)]
    params: CompletionParams,
}

#[derive(Debug, Serialize, Validate)]
struct GetCompletionResponse {
    #[serde(flatten)]
    completion: Completion,
}

pub async fn get_completion(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetCompletionRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    let completion = client
        .get_completion(&req.messages, &req.params)
        .await
        .map_err(completion_error)?;

    ctx.response(GetCompletionResponse { completion })
}

/*** Get embeddings ***/

#[derive(Debug, Deserialize, Validate)]
struct GetEmbeddingsRequest {
    #[validate(length(min = 1))]
    input: String,
    #[serde(default)]
    #[validate(nested)]
    params: EmbeddingsParams,
    #[validate(length(min = 1))]
    client_id: String,
}

#[derive(Debug, Serialize, Validate)]
struct GetEmbeddingsResponse {
    #[serde(flatten)]
    embeddings: Embeddings,
}

pub async fn get_embeddings(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetEmbeddingsRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    let embeddings = client
        .get_embeddings(&req.input, &req.params)
        .await
        .map_err(embeddings_error)?;

    ctx.response(GetEmbeddingsResponse { embeddings })
}

/*** Get speech ***/

#[derive(Debug, Deserialize, Validate)]
struct GetSpeechRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[serde(default)]
    message: SpeechMessage,
    #[serde(default)]
    params: SpeechParams,
}

#[derive(Debug, Serialize, Validate)]
struct GetSpeechResponse {
    #[serde(flatten)]
    speech: Speech,
}

pub async fn get_speech(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetSpeechRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    let speech = client
        .get_speech(&req.message, &req.params)
        .await
        .map_err(speech_error)?;

    ctx.response(GetSpeechResponse { speech })
}

/*** Get statistics ***/

#[derive(Debug, Deserialize, Validate)]
struct GetStatisticsRequest {
    #[validate(length(min = 1))]
    client_id: String,
}

#[derive(Debug, Serialize, Validate)]
struct GetStatisticsResponse {
    bytes_per_tok: f32,
}

pub async fn get_statistics(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetStatisticsRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    ctx.response(GetStatisticsResponse {
        bytes_per_tok: client.samples().bytes_per_tok(),
    })
}
