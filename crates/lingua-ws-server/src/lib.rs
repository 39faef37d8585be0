//! # WebSocket JSON-RPC Server
//!
//! Serves a shared [`MethodRegistry`] over WebSocket. Each accepted
//! connection runs its own [`Session`], which reads one message, hands it to
//! the [`RequestProcessor`] and writes the reply before reading the next.
//!
//! ## Features
//! - Multiple concurrent clients, independent per-connection sessions
//! - Text and binary frames both accepted as JSON-RPC payloads
//! - Transport abstraction with an in-memory implementation for embedding
//! - Graceful stop of the accept loop

pub mod prelude;
pub mod server;
pub mod session;
pub mod transport;
pub mod websocket;

// Re-export main types
pub use server::{
    BoundListener, SERVER_PRODUCT, ServerConfig, SessionConfig, WsRpcServer, WsRpcServerBuilder,
};
pub use session::{Session, SessionError, SessionState, SessionStats};
pub use transport::{
    MemoryPeer, MemoryPeerSender, MemoryTransport, MessageTransport, TransportError,
};
pub use websocket::WebSocketTransport;

// Re-export foundational types
pub use lingua_json_rpc_server::{
    HandlerError, MethodDescriptor, MethodHandler, MethodRegistry, RequestProcessor, RpcError,
};

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server level errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
