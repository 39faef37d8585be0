//! End-to-end tests over a real WebSocket connection.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lingua_json_rpc_server::{
    MethodDescriptor, MethodRegistry, RpcError, async_handler_fn, handler_fn,
};
use lingua_ws_server::{WsRpcServer, WsRpcServerBuilder};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    registry: Arc<MethodRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn test_builder() -> WsRpcServerBuilder {
    WsRpcServer::builder()
        .bind_address(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .server_version("test-1.0")
        .register_method(MethodDescriptor::new("ping", handler_fn(|_, _| Ok(json!("pong")))))
        .register_method(MethodDescriptor::new(
            "slowEcho",
            async_handler_fn(|params: Value, _language: String| async move {
                let delay = params["delayMs"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, lingua_json_rpc_server::HandlerError>(params["value"].clone())
            }),
        ))
        .register_method(
            MethodDescriptor::new(
                "deny",
                handler_fn(|_, _| Err(RpcError::new(100, "Access denied").into())),
            )
            .with_allowed_errors([100]),
        )
}

async fn start_server() -> TestServer {
    spawn_server(test_builder()).await
}

async fn spawn_server(builder: WsRpcServerBuilder) -> TestServer {
    let server = builder.build();

    let registry = Arc::clone(server.registry());
    registry.set_error_message(100, "en-US", "Access denied");
    registry.set_error_message(100, "ru-RU", "Доступ запрещен");

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(listener.serve_with_shutdown(async {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        registry,
        shutdown: Some(tx),
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}")).await.unwrap();
    client
}

async fn next_reply(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("reply within timeout")
            .expect("connection open")
            .unwrap();
        match message {
            Message::Text(_) | Message::Binary(_) => {
                return serde_json::from_slice(&message.into_data()).unwrap();
            }
            _ => continue,
        }
    }
}

async fn call(client: &mut Client, text: &str) -> Value {
    client.send(Message::text(text.to_string())).await.unwrap();
    next_reply(client).await
}

#[tokio::test]
async fn test_ping_over_websocket() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": "pong", "id": 1}));
}

#[tokio::test]
async fn test_error_scenarios_over_websocket() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"missing","id":2}"#).await;
    assert_eq!(
        reply,
        json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": 2})
    );

    // A malformed message gets an error reply and the session stays open.
    let reply = call(&mut client, "not json").await;
    assert_eq!(
        reply,
        json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error"}, "id": null})
    );

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":3}"#).await;
    assert_eq!(reply["result"], json!("pong"));
}

#[tokio::test]
async fn test_batch_over_websocket() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(
        &mut client,
        r#"[{"jsonrpc":"2.0","method":"ping","id":1},{"jsonrpc":"2.0","method":"missing","id":2}]"#,
    )
    .await;
    assert_eq!(
        reply,
        json!([
            {"jsonrpc": "2.0", "result": "pong", "id": 1},
            {"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": 2}
        ])
    );
}

#[tokio::test]
async fn test_binary_frames_are_accepted() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    client
        .send(Message::binary(br#"{"jsonrpc":"2.0","method":"ping","id":"bin"}"#.to_vec()))
        .await
        .unwrap();
    let reply = next_reply(&mut client).await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": "pong", "id": "bin"}));
}

#[tokio::test]
async fn test_localized_application_error() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(
        &mut client,
        r#"{"jsonrpc":"2.0","method":"deny","params":{"language":"ru-RU"},"id":7}"#,
    )
    .await;
    assert_eq!(
        reply,
        json!({"jsonrpc": "2.0", "error": {"code": 100, "message": "Доступ запрещен"}, "id": 7})
    );
}

#[tokio::test]
async fn test_handshake_advertises_server_header() {
    let server = start_server().await;
    let (_client, response) = connect_async(format!("ws://{}", server.addr)).await.unwrap();

    let header = response
        .headers()
        .get("server")
        .and_then(|value| value.to_str().ok());
    assert_eq!(header, Some("lingua-rpc/test-1.0 JSON-RPC 2.0 WebSocket Server"));
}

#[tokio::test]
async fn test_replies_follow_request_order() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    // The first request is slower, but its reply must still come first.
    client
        .send(Message::text(
            r#"{"jsonrpc":"2.0","method":"slowEcho","params":{"delayMs":100,"value":"first"},"id":1}"#,
        ))
        .await
        .unwrap();
    client
        .send(Message::text(
            r#"{"jsonrpc":"2.0","method":"slowEcho","params":{"delayMs":0,"value":"second"},"id":2}"#,
        ))
        .await
        .unwrap();

    assert_eq!(next_reply(&mut client).await["result"], json!("first"));
    assert_eq!(next_reply(&mut client).await["result"], json!("second"));
}

#[tokio::test]
async fn test_sessions_do_not_block_each_other() {
    let server = start_server().await;
    let mut slow = connect(server.addr).await;
    let mut fast = connect(server.addr).await;

    slow.send(Message::text(
        r#"{"jsonrpc":"2.0","method":"slowEcho","params":{"delayMs":500,"value":"slow"},"id":1}"#,
    ))
    .await
    .unwrap();

    let started = tokio::time::Instant::now();
    let reply = call(&mut fast, r#"{"jsonrpc":"2.0","method":"ping","id":2}"#).await;
    assert_eq!(reply["result"], json!("pong"));
    assert!(started.elapsed() < Duration::from_millis(500));

    assert_eq!(next_reply(&mut slow).await["result"], json!("slow"));
}

#[tokio::test]
async fn test_many_concurrent_clients() {
    let server = start_server().await;

    let clients: Vec<_> = (0..8)
        .map(|n| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = connect(addr).await;
                for i in 0..5 {
                    let id = n * 100 + i;
                    let request = json!({"jsonrpc": "2.0", "method": "ping", "id": id}).to_string();
                    let reply = call(&mut client, &request).await;
                    assert_eq!(reply["id"], json!(id));
                }
            })
        })
        .collect();

    for client in clients {
        client.await.unwrap();
    }
}

#[tokio::test]
async fn test_methods_registered_while_running() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"version","id":1}"#).await;
    assert_eq!(reply["error"]["code"], json!(-32601));

    server
        .registry
        .register(MethodDescriptor::new("version", handler_fn(|_, _| Ok(json!("1.0")))));

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"version","id":2}"#).await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": "1.0", "id": 2}));
}

#[tokio::test]
async fn test_client_close_ends_session_cleanly() {
    let server = start_server().await;
    let mut client = connect(server.addr).await;
    let _ = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).await;

    client.close(None).await.unwrap();

    // The server answers the close frame before dropping the connection.
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("close handshake within timeout");
        match frame {
            Some(Ok(_)) => continue,
            Some(Err(err)) => panic!("connection ended abnormally: {err}"),
            None => break,
        }
    }

    // The server keeps accepting new connections afterwards.
    let mut other = connect(server.addr).await;
    let reply = call(&mut other, r#"{"jsonrpc":"2.0","method":"ping","id":2}"#).await;
    assert_eq!(reply["result"], json!("pong"));
}

#[tokio::test]
async fn test_failed_handshake_does_not_stop_accepting() {
    let server = start_server().await;

    let mut raw = TcpStream::connect(server.addr).await.unwrap();
    raw.write_all(b"this is not a websocket upgrade\r\n\r\n")
        .await
        .unwrap();
    let mut discarded = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), raw.read_to_end(&mut discarded)).await;
    assert!(read.is_ok(), "server should drop the connection");
    drop(raw);

    let mut client = connect(server.addr).await;
    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).await;
    assert_eq!(reply["result"], json!("pong"));
}

#[tokio::test]
async fn test_silent_connection_hits_handshake_timeout() {
    let server =
        spawn_server(test_builder().handshake_timeout(Duration::from_millis(200))).await;

    let mut silent = TcpStream::connect(server.addr).await.unwrap();

    // Other clients are served while the silent one is still pending.
    let mut client = connect(server.addr).await;
    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).await;
    assert_eq!(reply["result"], json!("pong"));

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), silent.read_to_end(&mut received))
        .await
        .expect("server should close the silent connection");
    assert_eq!(read.unwrap(), 0);
    assert!(received.is_empty());

    let reply = call(&mut client, r#"{"jsonrpc":"2.0","method":"ping","id":2}"#).await;
    assert_eq!(reply["result"], json!("pong"));
}
