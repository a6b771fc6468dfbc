use std::collections::HashMap;
use std::future::Future;

use futures::future::BoxFuture;

use crate::code;
use crate::context::RpcContext;
use crate::error::{HandlerResult, RpcError};
use crate::models::{Request, Response};

type HandlerFn<S> = Box<dyn Fn(S, RpcContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// The method table: maps JSON-RPC method names to async handler functions
/// over a shared state value.
pub struct Handler<S> {
    funcs: HashMap<&'static str, HandlerFn<S>>,
}

impl<S> Default for Handler<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Handler<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// Registers a method handler, replacing any previous registration.
    pub fn register<F, Fut>(&mut self, method: &'static str, f: F)
    where
        F: Fn(S, RpcContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.funcs
            .insert(method, Box::new(move |state, ctx| Box::pin(f(state, ctx))));
    }

    /// Processes one raw request line and returns the serialised response,
    /// or `None` for notifications, which never produce output. A request
    /// that cannot be parsed at all is answered with a parse error even
    /// though its id is unknown.
    pub async fn handle(&self, state: S, data: &[u8]) -> Option<Vec<u8>> {
        let request: Request = match serde_json::from_slice(data) {
            Ok(request) => request,
            Err(_) => {
                let response = Response::error(
                    RpcError::new(code::PARSE_ERROR, "Parse error"),
                    None,
                );
                return serialize(&response);
            }
        };

        let notification = request.id.is_none();
        let response = self.dispatch(state, request).await;

        if notification {
            if let Some(error) = &response.error {
                tracing::warn!(code = error.code, message = %error.message, "notification handler failed");
            }
            return None;
        }

        serialize(&response)
    }

    async fn dispatch(&self, state: S, request: Request) -> Response {
        if request.jsonrpc != "2.0" || request.method.is_empty() {
            return Response::error(
                RpcError::new(code::INVALID_REQUEST, "Invalid request"),
                request.id,
            );
        }

        let Some(func) = self.funcs.get(request.method.as_str()) else {
            return Response::error(
                RpcError::new(code::METHOD_NOT_FOUND, "Method not found"),
                request.id,
            );
        };

        let ctx = RpcContext::new(request.params);

        match func(state, ctx).await {
            Ok(result) => Response::result(result, request.id),
            Err(err) => Response::error(err.into_rpc_error(), request.id),
        }
    }
}

fn serialize(response: &Response) -> Option<Vec<u8>> {
    match serde_json::to_vec(response) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!("failed to serialize response: {e}");
            None
        }
    }
}
