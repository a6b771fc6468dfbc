use serde::{Deserialize, Serialize};
use validator::Validate;

use quiver_client::adapter::CompletionParams;
use quiver_client::thread::{
    set_frame_tokens, ResponseParams, Summarizer, Thread, ThreadCompletion, ThreadResponse,
};
use quiver_rpc::{HandlerResult, RpcContext};

use crate::state::ServiceState;

use super::{completion_error, response_error, summarizer_error, summarizer_params_error};

/*** Get thread completion ***/

#[derive(Debug, Deserialize, Validate)]
struct GetThreadCompletionRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[serde(default)]
    thread: Thread,
    #[serde(default)]
    #[validate(nested)]
    params: CompletionParams,
}

#[derive(Debug, Serialize, Validate)]
struct GetThreadCompletionResponse {
    #[serde(flatten)]
    completion: ThreadCompletion,
}

pub async fn get_thread_completion(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetThreadCompletionRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    let completion = client
        .get_thread_completion(req.thread, &req.params)
        .await
        .map_err(completion_error)?;

    ctx.response(GetThreadCompletionResponse { completion })
}

/*** Get thread response ***/

#[derive(Debug, Deserialize, Validate)]
struct GetThreadResponseRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[serde(default)]
    thread: Thread,
    #[validate(nested)]
    params: ResponseParams,
}

#[derive(Debug, Serialize, Validate)]
struct GetThreadResponseResponse {
    #[serde(flatten)]
    response: ThreadResponse,
}

pub async fn get_thread_response(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetThreadResponseRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    // Tool calls cannot be executed over this transport; the loop hands
    // them back to the caller with done = false.
    let response = client
        .get_thread_response(req.thread, &req.params, None)
        .await
        .map_err(response_error)?;

    ctx.response(GetThreadResponseResponse { response })
}

/*** Get thread summary ***/

#[derive(Debug, Deserialize, Validate)]
struct GetThreadSummaryRequest {
    /// Client that generates the summary.
    #[validate(length(min = 1))]
    client_id: String,
    /// Client that generated the thread completions; defaults to the
    /// summarizer client.
    #[serde(default)]
    gen_client_id: Option<String>,
    #[serde(default)]
    thread: Thread,
    #[serde(default)]
    fraction: f32,
    #[serde(default)]
    #[validate(range(min = 1))]
    max_messages: Option<usize>,
    #[serde(default)]
    #[validate(range(min = 1))]
    max_tokens: Option<i64>,
}

#[derive(Debug, Serialize, Validate)]
struct GetThreadSummaryResponse {
    thread: Thread,
}

pub async fn get_thread_summary(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetThreadSummaryRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;
    let generator = match &req.gen_client_id {
        Some(id) => state.client(id)?,
        None => state.client(&req.client_id)?,
    };

    if req.max_messages.is_none() && req.max_tokens.is_none() {
        return Err(summarizer_params_error());
    }

    let mut thread = req.thread;
    set_frame_tokens(&mut thread, generator.samples());

    let mut summarizer = Summarizer::new(&client, req.fraction);
    if let Some(max_messages) = req.max_messages {
        summarizer = summarizer.with_max_messages(max_messages);
    }
    if let Some(max_tokens) = req.max_tokens {
        summarizer = summarizer.with_max_tokens(max_tokens);
    }

    let mut thread = summarizer
        .summarize(thread)
        .await
        .map_err(summarizer_error)?;

    set_frame_tokens(&mut thread, generator.samples());

    ctx.response(GetThreadSummaryResponse { thread })
}
