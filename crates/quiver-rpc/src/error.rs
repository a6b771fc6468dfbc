use serde::Serialize;
use thiserror::Error;

use crate::code;

/// An application-level JSON-RPC error with a custom code and optional data.
/// Handler errors of this type propagate to the wire verbatim; any other
/// error surfaces as a generic internal error.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The error side of a handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A typed JSON-RPC error; forwarded to the client as-is.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Anything else; masked as `-32603 Internal error` on the wire.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type HandlerResult = Result<serde_json::Value, HandlerError>;

impl HandlerError {
    pub(crate) fn into_rpc_error(self) -> RpcError {
        match self {
            Self::Rpc(err) => err,
            Self::Internal(_) => RpcError::new(code::INTERNAL_ERROR, "Internal error"),
        }
    }
}
