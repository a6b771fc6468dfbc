use serde::{Deserialize, Serialize};
use validator::Validate;

use quiver_client::agent::{AgentParams, AgentResponse};
use quiver_client::thread::Thread;
use quiver_rpc::{HandlerResult, RpcContext};

use crate::state::ServiceState;

use super::response_error;

/*** Get agent response ***/

#[derive(Debug, Deserialize, Validate)]
struct GetAgentResponseRequest {
    #[validate(length(min = 1))]
    client_id: String,
    #[serde(default)]
    thread: Thread,
    #[validate(nested)]
    params: AgentParams,
}

#[derive(Debug, Serialize, Validate)]
struct GetAgentResponseResponse {
    #[serde(flatten)]
    response: AgentResponse,
}

pub async fn get_agent_response(state: ServiceState, ctx: RpcContext) -> HandlerResult {
    let req: GetAgentResponseRequest = ctx.request()?;

    let client = state.client(&req.client_id)?;

    // Actions cannot be executed over this transport; the loop stops at the
    // first one and hands the thread back with done = false.
    let response = client
        .get_agent_response(req.thread, &req.params, None)
        .await
        .map_err(response_error)?;

    ctx.response(GetAgentResponseResponse { response })
}
