//! WebSocket JSON-RPC server: configuration, builder and accept loop.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lingua_json_rpc_server::{MethodDescriptor, MethodRegistry, RequestProcessor};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::Result;
use crate::session::Session;
use crate::websocket::WebSocketTransport;

/// Product token sent in the `Server` header of every handshake response.
pub const SERVER_PRODUCT: &str = "lingua-rpc";

/// Per-connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed for the WebSocket upgrade to complete
    pub handshake_timeout: Duration,
    /// Close a session that receives nothing for this long; `None` never times out
    pub idle_timeout: Option<Duration>,
    /// Largest inbound message accepted, in bytes
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            max_message_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Configuration for the WebSocket JSON-RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Version string advertised in the handshake `Server` header
    pub server_version: String,
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Value of the `Server` header sent during the handshake.
    pub fn server_header(&self) -> String {
        format!("{SERVER_PRODUCT}/{} JSON-RPC 2.0 WebSocket Server", self.server_version)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            server_version: "v1".to_string(),
            session: SessionConfig::default(),
        }
    }
}

/// Builder for [`WsRpcServer`]
pub struct WsRpcServerBuilder {
    config: ServerConfig,
    registry: Arc<MethodRegistry>,
}

impl WsRpcServerBuilder {
    /// Create a new builder with an empty registry
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: Arc::new(MethodRegistry::new()),
        }
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn server_version(mut self, version: impl Into<String>) -> Self {
        self.config.server_version = version.into();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.session.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.session.idle_timeout = timeout;
        self
    }

    /// Set maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.session.max_message_size = size;
        self
    }

    /// Serve methods from an existing, possibly shared, registry
    pub fn registry(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register a method on the server's registry
    pub fn register_method(self, descriptor: MethodDescriptor) -> Self {
        self.registry.register(descriptor);
        self
    }

    pub fn build(self) -> WsRpcServer {
        WsRpcServer {
            config: Arc::new(self.config),
            registry: self.registry,
        }
    }
}

impl Default for WsRpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket JSON-RPC server. Every connection gets its own session; all
/// sessions share one registry.
#[derive(Debug, Clone)]
pub struct WsRpcServer {
    config: Arc<ServerConfig>,
    registry: Arc<MethodRegistry>,
}

impl WsRpcServer {
    pub fn builder() -> WsRpcServerBuilder {
        WsRpcServerBuilder::new()
    }

    /// Registry shared by all sessions. Methods registered here while the
    /// server runs are visible to new requests immediately.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listening socket without accepting yet.
    pub async fn bind(&self) -> Result<BoundListener> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!("WebSocket JSON-RPC server listening on {}", local_addr);
        Ok(BoundListener {
            listener,
            local_addr,
            server: self.clone(),
        })
    }

    /// Bind and accept connections until the process ends.
    pub async fn run(&self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

/// A bound server socket ready to accept connections.
#[derive(Debug)]
pub struct BoundListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    server: WsRpcServer,
}

impl BoundListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Sessions already running
    /// are left to finish on their own.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let processor = RequestProcessor::new(Arc::clone(&self.server.registry));

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }

                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            error!("accept error: {}", err);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    debug!("New connection from {}", peer);

                    let config = Arc::clone(&self.server.config);
                    let processor = processor.clone();
                    tokio::spawn(
                        serve_connection(stream, config, processor)
                            .instrument(info_span!("session", %peer)),
                    );
                }
            }
        }

        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    processor: RequestProcessor,
) {
    if let Err(err) = stream.set_nodelay(true) {
        debug!("set_nodelay failed: {}", err);
    }

    let transport =
        match WebSocketTransport::accept(stream, &config.session, &config.server_header()).await {
            Ok(transport) => transport,
            Err(err) => {
                warn!("handshake failed: {}", err);
                return;
            }
        };
    info!("connection accepted");

    // Session::run logs how the session ended.
    let mut session = Session::new(transport, processor, config.session.clone());
    let _ = session.run().await;
}
