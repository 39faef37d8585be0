//! Per-connection read, dispatch and write loop.
//!
//! A session owns its transport and handles one message at a time: the reply
//! to a message is fully written before the next message is read, so replies
//! leave in request order.

use std::fmt;
use std::time::Duration;

use lingua_json_rpc_server::{JsonRpcError, JsonRpcMessage, JsonRpcReply, RequestProcessor};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::server::SessionConfig;
use crate::transport::{MessageTransport, TransportError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no message received within {0:?}")]
    IdleTimeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake not finished yet.
    Accepting,
    Reading,
    Dispatching,
    Writing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Accepting => "accepting",
            SessionState::Reading => "reading",
            SessionState::Dispatching => "dispatching",
            SessionState::Writing => "writing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub messages_received: u64,
    pub replies_sent: u64,
}

pub struct Session<T> {
    transport: T,
    processor: RequestProcessor,
    config: SessionConfig,
    state: SessionState,
    write_buf: Vec<u8>,
    stats: SessionStats,
}

impl<T: MessageTransport> Session<T> {
    /// Wrap an established transport. The session starts in
    /// [`SessionState::Accepting`] until [`Session::run`] is called.
    pub fn new(transport: T, processor: RequestProcessor, config: SessionConfig) -> Self {
        Self {
            transport,
            processor,
            config,
            state: SessionState::Accepting,
            write_buf: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Serve the connection until the peer closes it or the transport fails.
    ///
    /// A clean close returns the final counters. Any error leaves the session
    /// in [`SessionState::Closed`] with the transport closed.
    pub async fn run(&mut self) -> Result<SessionStats, SessionError> {
        match self.serve().await {
            Ok(()) => {
                self.state = SessionState::Closed;
                info!(
                    messages = self.stats.messages_received,
                    replies = self.stats.replies_sent,
                    "session closed"
                );
                Ok(self.stats)
            }
            Err(err) => {
                warn!(error = %err, state = %self.state, "session ended with error");
                self.state = SessionState::Closed;
                if let Err(close_err) = self.transport.close().await {
                    debug!(error = %close_err, "close after failure");
                }
                Err(err)
            }
        }
    }

    async fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            self.state = SessionState::Reading;
            let Some(payload) = self.read_message().await? else {
                debug!("peer closed connection");
                return Ok(());
            };
            self.stats.messages_received += 1;

            self.state = SessionState::Dispatching;
            let reply = self.processor.handle_message(&payload).await;

            self.state = SessionState::Writing;
            self.encode_reply(&reply);
            self.transport.send(&self.write_buf).await?;
            self.stats.replies_sent += 1;
        }
    }

    async fn read_message(&mut self) -> Result<Option<bytes::Bytes>, SessionError> {
        match self.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.recv())
                .await
                .map_err(|_| SessionError::IdleTimeout(limit))?
                .map_err(SessionError::from),
            None => Ok(self.transport.recv().await?),
        }
    }

    /// Serialize `reply` into the reused write buffer. If that fails the
    /// buffer holds an `InternalError` reply carrying the serializer's text.
    fn encode_reply(&mut self, reply: &JsonRpcReply) {
        self.write_buf.clear();
        if let Err(err) = serde_json::to_writer(&mut self.write_buf, reply) {
            warn!(error = %err, "failed to serialize reply");
            let id = match reply {
                JsonRpcReply::Single(message) => message.id().cloned(),
                JsonRpcReply::Batch(_) => None,
            };
            let fallback = JsonRpcMessage::Error(JsonRpcError::internal_error(id, err.to_string()));
            self.write_buf.clear();
            // A plain error object always serializes.
            if serde_json::to_writer(&mut self.write_buf, &fallback).is_err() {
                self.write_buf.clear();
            }
        }
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
