//! Message-framed duplex transport seen by a session.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

/// Transport-level failures. Any of these ends the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("outbound message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("transport closed")]
    Closed,
}

/// One long-lived connection carrying discrete messages.
///
/// Implementations deliver each inbound message whole and keep outbound
/// messages in the order they are sent.
#[async_trait]
pub trait MessageTransport: Send {
    /// Wait for the next complete message. `Ok(None)` means the peer closed
    /// the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Send `payload` as one text message and wait until it is written.
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Close the connection. Errors from an already-closed peer are ignored.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// In-process transport backed by channels, for embedding a session without
/// a socket. The other end is a [`MemoryPeer`].
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Client side of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryPeer {
    outbound: mpsc::UnboundedSender<io::Result<Bytes>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (to_session, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_session) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                inbound: from_peer,
                outbound: to_peer,
            },
            MemoryPeer {
                outbound: to_session,
                inbound: from_session,
            },
        )
    }
}

#[async_trait]
impl MessageTransport for MemoryTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(err)) => Err(TransportError::Io(err)),
            None => Ok(None),
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let text = std::str::from_utf8(payload)?;
        self.outbound
            .send(text.to_owned())
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inbound.close();
        Ok(())
    }
}

impl MemoryPeer {
    /// Queue a message for the session. Returns `false` once the session is gone.
    pub fn send(&self, payload: impl Into<Bytes>) -> bool {
        self.outbound.send(Ok(payload.into())).is_ok()
    }

    /// Make the session's next read fail with an I/O error.
    pub fn fail(&self, reason: &str) -> bool {
        self.outbound.send(Err(io::Error::other(reason.to_string()))).is_ok()
    }

    /// Next reply written by the session, `None` once it has stopped.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Split into a sender that can be dropped to signal a clean close and a
    /// receiver that keeps collecting replies.
    pub fn split(self) -> (MemoryPeerSender, mpsc::UnboundedReceiver<String>) {
        (
            MemoryPeerSender {
                outbound: self.outbound,
            },
            self.inbound,
        )
    }
}

/// Sending half of a split [`MemoryPeer`].
#[derive(Debug, Clone)]
pub struct MemoryPeerSender {
    outbound: mpsc::UnboundedSender<io::Result<Bytes>>,
}

impl MemoryPeerSender {
    pub fn send(&self, payload: impl Into<Bytes>) -> bool {
        self.outbound.send(Ok(payload.into())).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_roundtrip() {
        let (mut transport, mut peer) = MemoryTransport::pair();

        assert!(peer.send("hello"));
        assert_eq!(transport.recv().await.unwrap(), Some(Bytes::from("hello")));

        transport.send(b"world").await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_dropping_peer_is_clean_close() {
        let (mut transport, peer) = MemoryTransport::pair();
        drop(peer);

        assert!(transport.recv().await.unwrap().is_none());
        assert!(matches!(
            transport.send(b"late").await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.fail("connection reset");

        let err = transport.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_rejects_non_utf8_outbound() {
        let (mut transport, _peer) = MemoryTransport::pair();
        assert!(matches!(
            transport.send(&[0xff, 0xfe]).await,
            Err(TransportError::InvalidUtf8(_))
        ));
    }
}
