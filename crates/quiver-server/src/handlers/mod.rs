//! JSON-RPC method handlers and the application error constructors they
//! share. Application errors all use code -32000 with a short message and,
//! where an upstream error exists, its text under `data.error`.

pub mod agent;
pub mod client;
pub mod thread;
pub mod vectors;

use quiver_rpc::{code, HandlerError, RpcError};

pub(crate) fn client_not_found() -> HandlerError {
    RpcError::new(code::APPLICATION_ERROR, "Client not found").into()
}

pub(crate) fn database_not_found() -> HandlerError {
    RpcError::new(code::APPLICATION_ERROR, "Database not found").into()
}

pub(crate) fn database_already_exists() -> HandlerError {
    RpcError::new(code::APPLICATION_ERROR, "Database already exists").into()
}

pub(crate) fn vectors_length_mismatch() -> HandlerError {
    RpcError::new(code::APPLICATION_ERROR, "Vectors must have the same length").into()
}

pub(crate) fn summarizer_params_error() -> HandlerError {
    RpcError::new(
        code::APPLICATION_ERROR,
        "Must specify either the max tokens or max messages",
    )
    .into()
}

fn wrapped(message: &str, err: &dyn std::fmt::Display) -> HandlerError {
    RpcError::new(code::APPLICATION_ERROR, message)
        .with_data(serde_json::json!({"error": err.to_string()}))
        .into()
}

pub(crate) fn config_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Config error", &err)
}

pub(crate) fn completion_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Completion error", &err)
}

pub(crate) fn embeddings_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Embeddings error", &err)
}

pub(crate) fn speech_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Speech error", &err)
}

pub(crate) fn response_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Response error", &err)
}

pub(crate) fn summarizer_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Summarizer error", &err)
}

pub(crate) fn database_error(err: impl std::fmt::Display) -> HandlerError {
    wrapped("Database error", &err)
}
