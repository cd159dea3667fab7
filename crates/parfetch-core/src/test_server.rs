//! In-process HTTP server for engine tests
//!
//! Serves one in-memory body under any path, with switches for range
//! support and for misbehaving parts.

use axum::extract::State;
use axum::http::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    body: Arc<Vec<u8>>,
    ranges: bool,
    reject_head: bool,
    fail_part_at: Option<u64>,
    truncate_part_at: Option<u64>,
    stall_part_at: Option<u64>,
    fail_whole_body: bool,
    truncate_whole_body: bool,
}

impl ServerOptions {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            ranges: true,
            reject_head: false,
            fail_part_at: None,
            truncate_part_at: None,
            stall_part_at: None,
            fail_whole_body: false,
            truncate_whole_body: false,
        }
    }

    /// Ignore `Range` and never advertise `Accept-Ranges`
    pub fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    /// Answer HEAD with 405
    pub fn reject_head(mut self) -> Self {
        self.reject_head = true;
        self
    }

    /// Answer 500 to the ranged GET starting at `start`
    pub fn fail_part_at(mut self, start: u64) -> Self {
        self.fail_part_at = Some(start);
        self
    }

    /// Send only half of the range starting at `start`
    pub fn truncate_part_at(mut self, start: u64) -> Self {
        self.truncate_part_at = Some(start);
        self
    }

    /// Answer 500 to every GET served without a range
    pub fn fail_whole_body(mut self) -> Self {
        self.fail_whole_body = true;
        self
    }

    /// Send only half of the body to every GET served without a range
    pub fn truncate_whole_body(mut self) -> Self {
        self.truncate_whole_body = true;
        self
    }

    /// Never answer the ranged GET starting at `start`
    pub fn stall_part_at(mut self, start: u64) -> Self {
        self.stall_part_at = Some(start);
        self
    }
}

struct ServerState {
    options: ServerOptions,
    get_count: AtomicUsize,
    ranges: Mutex<Vec<Option<String>>>,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(options: ServerOptions) -> Self {
        let state = Arc::new(ServerState {
            options,
            get_count: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/moved", get(|| async { Redirect::temporary("/file.bin") }))
            .route("/:name", get(serve))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    /// Number of GET requests served (HEAD is not counted)
    pub fn get_count(&self) -> usize {
        self.state.get_count.load(Ordering::SeqCst)
    }

    /// `Range` header of every GET, in arrival order
    pub fn recorded_ranges(&self) -> Vec<Option<String>> {
        self.state.ranges.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    State(state): State<Arc<ServerState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let options = &state.options;
    if method == Method::HEAD && options.reject_head {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let body = options.body.as_slice();
    let total = body.len() as u64;

    if method == Method::GET {
        state.get_count.fetch_add(1, Ordering::SeqCst);
        let range = headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        state.ranges.lock().unwrap().push(range.clone());

        if let Some((start, end)) = range.as_deref().and_then(|r| parse_range(r, total)) {
            if options.ranges {
                if options.stall_part_at == Some(start) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if options.fail_part_at == Some(start) {
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }

                let mut slice = body[start as usize..=end as usize].to_vec();
                if options.truncate_part_at == Some(start) {
                    slice.truncate(slice.len() / 2);
                }
                return (
                    StatusCode::PARTIAL_CONTENT,
                    [
                        (CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total)),
                        (ACCEPT_RANGES, "bytes".to_string()),
                        (CONTENT_TYPE, "application/octet-stream".to_string()),
                    ],
                    slice,
                )
                    .into_response();
            }
        }
    }

    let mut full = body.to_vec();
    if method == Method::GET {
        if options.fail_whole_body {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        if options.truncate_whole_body {
            full.truncate(full.len() / 2);
        }
    }

    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/octet-stream")],
        full,
    )
        .into_response();
    if options.ranges {
        response
            .headers_mut()
            .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    response
}

/// Parse `bytes=<start>-<end>` into an inclusive pair within `total`
fn parse_range(value: &str, total: u64) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = match end.trim() {
        "" => total.checked_sub(1)?,
        end => end.parse::<u64>().ok()?.min(total.checked_sub(1)?),
    };
    (start <= end).then_some((start, end))
}
