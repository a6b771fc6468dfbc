#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod context;
mod error;
mod handler;
mod models;
mod server;

pub use context::RpcContext;
pub use error::{HandlerError, HandlerResult, RpcError};
pub use handler::Handler;
pub use server::{Server, ServerOptions};

/// JSON-RPC 2.0 error codes used by the dispatcher.
pub mod code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Application-defined errors.
    pub const APPLICATION_ERROR: i64 = -32000;
}
