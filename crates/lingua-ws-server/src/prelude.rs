//! # WebSocket JSON-RPC Server Prelude
//!
//! ```rust
//! use lingua_ws_server::prelude::*;
//! ```

pub use crate::server::{
    BoundListener, ServerConfig, SessionConfig, WsRpcServer, WsRpcServerBuilder,
};
pub use crate::session::{Session, SessionError, SessionState, SessionStats};
pub use crate::transport::{MemoryTransport, MessageTransport, TransportError};
pub use crate::websocket::WebSocketTransport;

pub use lingua_json_rpc_server::prelude::*;

pub use crate::{Result, ServerError};
