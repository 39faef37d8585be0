//! WebSocket implementation of [`MessageTransport`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SERVER;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async_with_config};
use tracing::{debug, trace};

use crate::server::SessionConfig;
use crate::transport::{MessageTransport, TransportError};

/// A server-side WebSocket connection after a completed handshake.
pub struct WebSocketTransport {
    stream: WebSocketStream<TcpStream>,
}

impl WebSocketTransport {
    /// Run the server handshake on `stream`, advertising `server_header` in
    /// the upgrade response.
    pub async fn accept(
        stream: TcpStream,
        config: &SessionConfig,
        server_header: &str,
    ) -> Result<Self, TransportError> {
        let header = HeaderValue::from_str(server_header).ok();
        let callback =
            move |_request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                if let Some(value) = header {
                    response.headers_mut().insert(SERVER, value);
                }
                Ok(response)
            };

        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(config.max_message_size))
            .max_frame_size(Some(config.max_message_size));

        let handshake = accept_hdr_async_with_config(stream, callback, Some(ws_config));
        let stream = tokio::time::timeout(config.handshake_timeout, handshake)
            .await
            .map_err(|_| TransportError::HandshakeTimeout(config.handshake_timeout))??;

        debug!("WebSocket handshake completed");
        Ok(Self { stream })
    }

    /// Keep polling after a peer close so tungstenite flushes its close reply
    /// and the stream ends with a completed handshake.
    async fn finish_close(&mut self) {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(other) => trace!(?other, "frame after close"),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    break;
                }
                Err(err) => {
                    debug!(error = %err, "error while completing close handshake");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MessageTransport for WebSocketTransport {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                    return Ok(Some(message.into_data()));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer sent close frame");
                    self.finish_close().await;
                    return Ok(None);
                }
                // Pings are answered by tungstenite on the next read or write.
                Ok(other) => trace!(?other, "ignoring control frame"),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let text = std::str::from_utf8(payload)?;
        self.stream.send(Message::text(text.to_owned())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport").finish_non_exhaustive()
    }
}
