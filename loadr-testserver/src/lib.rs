//! In-process HTTP target for integration tests and local demos.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

pub const PATH_HELLO: &str = "/hello";
pub const PATH_DELAY: &str = "/delay";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_ECHO: &str = "/echo";

/// Request counters, updated once per handled request.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    inner: Arc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    requests: AtomicU64,
    non_2xx: AtomicU64,
}

impl TestServerStats {
    fn record(&self, status: StatusCode) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        if !status.is_success() {
            self.inner.non_2xx.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    pub fn non_2xx_total(&self) -> u64 {
        self.inner.non_2xx.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub hello: String,
    pub echo: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            hello: format!("{base_url}{PATH_HELLO}"),
            echo: format!("{base_url}{PATH_ECHO}"),
            base_url,
        }
    }

    /// Responds with `code` and an empty body.
    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }

    /// Responds 200 after sleeping for `delay`.
    pub fn delay(&self, delay: Duration) -> String {
        format!("{}{PATH_DELAY}?ms={}", self.base_url, delay.as_millis())
    }
}

async fn count_requests(State(stats): State<TestServerStats>, req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    stats.record(res.status());
    res
}

async fn hello() -> &'static str {
    "Hello World!"
}

#[derive(Debug, Deserialize)]
struct DelayQuery {
    #[serde(default)]
    ms: u64,
}

async fn delay(Query(q): Query<DelayQuery>) -> &'static str {
    sleep(Duration::from_millis(q.ms)).await;
    "delayed"
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn echo(body: Bytes) -> Bytes {
    body
}

/// `/` and `/hello` answer like a minimal web app; the rest shape latency and status.
pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route("/", get(hello))
        .route(PATH_HELLO, get(hello))
        .route(PATH_DELAY, get(delay))
        .route(PATH_STATUS, get(status))
        .route(PATH_ECHO, post(echo))
        .layer(middleware::from_fn_with_state(stats, count_requests))
}

/// Test target bound to an ephemeral loopback port. Dropping it stops the server.
pub struct TestServer {
    urls: TestServerUrls,
    addr: SocketAddr,
    stats: TestServerStats,
    shutdown: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Ok(Self {
            urls: TestServerUrls::new(format!("http://{addr}")),
            addr,
            stats,
            shutdown: Some((tx, task)),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.urls.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some((tx, task)) = self.shutdown.take() {
            let _ = tx.send(());
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some((_, task)) = self.shutdown.take() {
            task.abort();
        }
    }
}
