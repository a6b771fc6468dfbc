use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::RpcError;

/// A JSON-RPC 2.0 request object. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub(crate) struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    pub params: Option<Box<RawValue>>,
    pub id: Option<Box<RawValue>>,
}

/// A JSON-RPC 2.0 response object carrying exactly one of `result` or
/// `error`.
#[derive(Debug, Serialize)]
pub(crate) struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Box<RawValue>>,
}

impl Response {
    pub(crate) fn result(result: serde_json::Value, id: Option<Box<RawValue>>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub(crate) fn error(error: RpcError, id: Option<Box<RawValue>>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}
