//! # JSON-RPC Server Prelude
//!
//! Convenient re-exports for code that registers methods.
//!
//! ```rust
//! use lingua_json_rpc_server::prelude::*;
//! ```

pub use crate::catalog::{DEFAULT_LANGUAGE, ErrorCatalog};
pub use crate::error::{HandlerError, JsonRpcErrorCode, RpcError};
pub use crate::handler::{HandlerResult, MethodHandler, async_handler_fn, handler_fn};
pub use crate::processor::RequestProcessor;
pub use crate::registry::{MethodDescriptor, MethodRegistry};
pub use crate::response::{JsonRpcMessage, JsonRpcReply};
pub use crate::types::RequestId;

// Standard error codes
pub use crate::error_codes::*;
