//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use flate2::{write::GzEncoder, Compression};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use ingress_gateway::config::{loader::load_config_str, ConfigFormat};
use ingress_gateway::observability::{AccessLog, AccessRecord};
use ingress_gateway::{HttpServer, Shutdown};

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const JWT_SECRET: &str = "integration-secret";

/// A loopback address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Counts requests that reached an upstream.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Start an upstream that echoes the request it received as JSON.
///
/// Paths ending in these segments behave differently:
/// - `/register`: `400 {"msg":"User already exists"}`
/// - `/redirect`: `302` to `/elsewhere`
/// - `/gzip`: gzip-encoded body
/// - `/unavailable`: `503`
/// - `/slow`: echo after 500 ms
/// - `/hang`: echo after 30 s
pub async fn start_echo_upstream() -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let app = Router::new().fallback(echo).with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, hits)
}

async fn echo(State(hits): State<Hits>, request: Request) -> Response {
    hits.0.fetch_add(1, Ordering::SeqCst);

    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    if path.ends_with("/register") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "msg": "User already exists" })),
        )
            .into_response();
    }
    if path.ends_with("/redirect") {
        return (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response();
    }
    if path.ends_with("/unavailable") {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    if path.ends_with("/gzip") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"compressed hello").unwrap();
        let compressed = encoder.finish().unwrap();
        return (
            [
                (header::CONTENT_ENCODING, "gzip"),
                (header::CONTENT_TYPE, "text/plain"),
            ],
            compressed,
        )
            .into_response();
    }
    if path.ends_with("/slow") {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    if path.ends_with("/hang") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in parts.headers.iter() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap_or_default().to_string());
    }
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    Json(json!({
        "method": parts.method.as_str(),
        "path": path,
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
    .into_response()
}

/// Start a raw backend that answers every connection with `response` verbatim.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that answers with a chunked body: `first`, then `second` after `pause`.
pub async fn start_chunked_backend(
    first: &'static str,
    pause: Duration,
    second: &'static str,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
                            Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
                let _ = socket
                    .write_all(format!("{head}{:x}\r\n{first}\r\n", first.len()).as_bytes())
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
                let _ = socket
                    .write_all(format!("{:x}\r\n{second}\r\n0\r\n\r\n", second.len()).as_bytes())
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Gateway configuration with `auth` (open) and `bd` (protected) on `upstream`,
/// and `media` on an address nobody listens on.
pub fn gateway_config(upstream: SocketAddr) -> String {
    format!(
        r#"
        [server]
        host = "127.0.0.1"
        port = 0
        shutdown_grace_secs = 5

        [cors]
        origins = ["{ALLOWED_ORIGIN}"]

        [services]
        auth = "http://{upstream}"
        media = "http://{dead}"

        [services.bd]
        url = "http://{upstream}"
        protected = true

        [upstream]
        connect_timeout_secs = 1
        read_timeout_secs = 2

        [jwt]
        secret = "{JWT_SECRET}"
        "#,
        dead = unused_addr(),
    )
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub records: UnboundedReceiver<AccessRecord>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Next access record, failing the test after 5 s.
    pub async fn next_record(&mut self) -> AccessRecord {
        tokio::time::timeout(Duration::from_secs(5), self.records.recv())
            .await
            .expect("no access record within 5s")
            .expect("access log closed")
    }
}

/// Start a gateway from TOML on an ephemeral port.
pub async fn spawn_gateway(toml: &str) -> TestGateway {
    let config = load_config_str(toml, ConfigFormat::Toml).unwrap();
    let (log, records) = AccessLog::channel();
    let server = HttpServer::new(config, log).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        records,
        shutdown,
        task,
    }
}

/// Client that never follows redirects and never uses a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// HS256 token for the test secret.
pub fn token(claims: serde_json::Value) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}
