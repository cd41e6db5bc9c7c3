//! In-process HTTP server for exercising network collaborators
//!
//! Provides a [`FakeHttpServer`] that serves scripted responses per
//! `(method, path)` route and records every request it receives. Used to
//! stand in for both the provider under test and the mock-server admin API
//! without touching live endpoints.
//!
//! # Example
//! ```ignore
//! let server = FakeHttpServer::builder()
//!     .route("GET", "/users/1", FakeResponse::json(200, r#"{"id":1}"#))
//!     .with_latency(20)
//!     .build()
//!     .await?;
//! let url = server.url(); // e.g. "http://127.0.0.1:12345"
//! // ... point a client at `url` ...
//! let calls = server.requests().await;
//! server.stop().await;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

const MAX_HEADER_BYTES: usize = 64 * 1024;

/// A scripted HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct FakeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Extra delay for this response only (milliseconds)
    pub delay_ms: u64,
}

impl FakeResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay_ms: 0,
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).with_header("Content-Type", "application/json")
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, "")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

/// A request as seen by the fake server
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: String,
    path: String,
    /// Served in order; the last one repeats once the rest are used.
    responses: Vec<FakeResponse>,
    served: usize,
}

#[derive(Debug, Default)]
struct ServerState {
    routes: Vec<Route>,
    fallback: Option<FakeResponse>,
    latency_ms: u64,
    received: Vec<ReceivedRequest>,
}

/// Handle to a running fake server
pub struct FakeHttpServer {
    url: String,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeHttpServer {
    pub fn builder() -> FakeHttpServerBuilder {
        FakeHttpServerBuilder::default()
    }

    /// Bind to `127.0.0.1:0` and spawn the accept loop.
    async fn start(state: ServerState) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}", addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(Mutex::new(state));
        let handle = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Ok(Self {
            url,
            state,
            shutdown_tx,
            handle,
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:54321`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every request received so far, in arrival order
    pub async fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.lock().await.received.clone()
    }

    /// Number of requests received for `method` + `path`
    pub async fn hits(&self, method: &str, path: &str) -> usize {
        self.state
            .lock()
            .await
            .received
            .iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method) && r.path == path)
            .count()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Fluent configuration for [`FakeHttpServer`]
#[derive(Default)]
pub struct FakeHttpServerBuilder {
    state: ServerState,
}

impl FakeHttpServerBuilder {
    /// Add a response for `method` + `path` (query string ignored). Calling
    /// this repeatedly for one route queues responses in order.
    pub fn route(mut self, method: &str, path: &str, response: FakeResponse) -> Self {
        let method = method.to_ascii_uppercase();
        match self
            .state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push(response),
            None => self.state.routes.push(Route {
                method,
                path: path.to_string(),
                responses: vec![response],
                served: 0,
            }),
        }
        self
    }

    /// Response for requests matching no route (default: empty 404)
    pub fn fallback(mut self, response: FakeResponse) -> Self {
        self.state.fallback = Some(response);
        self
    }

    /// Latency added before every response
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.state.latency_ms = ms;
        self
    }

    pub async fn build(self) -> std::io::Result<FakeHttpServer> {
        FakeHttpServer::start(self.state).await
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<Mutex<ServerState>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                tracing::debug!("fake server connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::debug!("fake server accept error: {}", e),
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    state: Arc<Mutex<ServerState>>,
) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };

    let (response, latency_ms) = {
        let mut state = state.lock().await;
        state.received.push(request.clone());
        let latency = state.latency_ms;
        let scripted = state
            .routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == request.path)
            .map(|route| {
                let index = route.served.min(route.responses.len() - 1);
                route.served += 1;
                route.responses[index].clone()
            });
        let response = scripted
            .or_else(|| state.fallback.clone())
            .unwrap_or_else(|| FakeResponse::empty(404));
        (response, latency)
    };

    let delay = latency_ms + response.delay_ms;
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
    write_http_response(&mut stream, &response).await
}

/// Read one HTTP/1.1 request, honouring `Content-Length` for the body.
async fn read_request(stream: &mut tokio::net::TcpStream) -> std::io::Result<Option<ReceivedRequest>> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Ok(None);
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("").to_ascii_uppercase();
    let target = request_line.next().unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (target.to_string(), None),
    };

    let headers: BTreeMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(Some(ReceivedRequest {
        method,
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    }))
}

async fn write_http_response(
    stream: &mut tokio::net::TcpStream,
    response: &FakeResponse,
) -> std::io::Result<()> {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");

    let mut raw = format!("HTTP/1.1 {} {}\r\n", response.status, reason);
    for (name, value) in &response.headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.body.len(),
        response.body
    ));

    stream.write_all(raw.as_bytes()).await?;
    stream.shutdown().await
}
