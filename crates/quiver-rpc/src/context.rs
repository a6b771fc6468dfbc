use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use validator::Validate;

use crate::error::{HandlerError, RpcError};
use crate::code;

/// Per-request accessor handed to method handlers: decodes the raw params
/// into a typed request and validates typed responses before they are
/// serialised.
pub struct RpcContext {
    params: Option<Box<RawValue>>,
}

impl RpcContext {
    pub(crate) fn new(params: Option<Box<RawValue>>) -> Self {
        Self { params }
    }

    /// Decodes the request params into `T` and runs structural validation.
    /// Any failure maps to `-32602 Invalid params` with the underlying
    /// message.
    pub fn request<T>(&self) -> Result<T, HandlerError>
    where
        T: DeserializeOwned + Validate,
    {
        let raw = self.params.as_deref().map_or("null", RawValue::get);

        let value: T = serde_json::from_str(raw).map_err(|e| invalid_params(&e))?;
        value.validate().map_err(|e| invalid_params(&e))?;

        Ok(value)
    }

    /// Validates and serialises a typed response. Validation failures are
    /// reported without leaking internals.
    pub fn response<T>(&self, value: T) -> Result<serde_json::Value, HandlerError>
    where
        T: Serialize + Validate,
    {
        if value.validate().is_err() {
            return Err(HandlerError::Internal(anyhow::anyhow!(
                "invalid response from server"
            )));
        }

        serde_json::to_value(value).map_err(|e| HandlerError::Internal(e.into()))
    }
}

fn invalid_params(err: &dyn std::fmt::Display) -> HandlerError {
    HandlerError::Rpc(RpcError::new(code::INVALID_PARAMS, err.to_string()))
}
