//! # Localized JSON-RPC 2.0 Server Core
//!
//! A transport-agnostic JSON-RPC 2.0 method registry and request processor.
//! Transports hand each complete inbound message to a [`RequestProcessor`]
//! and send back the [`JsonRpcReply`] it produces.
//!
//! ## Features
//! - Single and batch requests, ids echoed verbatim
//! - Thread-safe [`MethodRegistry`] shared by any number of connections
//! - Error text localized per request through an [`ErrorCatalog`]
//! - Handler failures and panics converted to JSON-RPC errors, never propagated

pub mod catalog;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod processor;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use catalog::{DEFAULT_LANGUAGE, ErrorCatalog, UNKNOWN_ERROR_MESSAGE};
pub use error::{HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, RpcError};
pub use handler::{HandlerResult, MethodHandler, async_handler_fn, handler_fn};
pub use processor::RequestProcessor;
pub use registry::{MethodDescriptor, MethodRegistry, RegistryError};
pub use request::{JsonRpcRequest, RequestShapeError};
pub use response::{JsonRpcMessage, JsonRpcReply, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
