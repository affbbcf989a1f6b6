//! In-memory HTTP transport for tests and offline tooling.
//!
//! Serves stored objects (honouring `Range`), accepts PUT uploads, replays
//! scripted faults, and records every request it sees.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, SessionFactory};

const PIECE_SIZE: usize = 64 * 1024;

/// A scripted failure returned instead of the normal response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Status(u16),
    ConnectionReset,
    /// Answer ranged GETs with the whole object and a 200.
    IgnoreRange,
}

/// A request as observed by the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub range: Option<String>,
    pub headers: HeaderMap,
    pub body_len: usize,
}

/// A fixed response produced by a route handler.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CannedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(value: &impl ToString) -> Self {
        Self::new(200, value.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Handler = Arc<dyn Fn(&HttpRequest) -> CannedResponse + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    objects: Mutex<HashMap<String, Bytes>>,
    faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    handlers: Mutex<HashMap<String, Handler>>,
    log: Mutex<Vec<RecordedRequest>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    sessions_created: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.state.latency) = Some(latency);
        self
    }

    pub fn insert_object(&self, url: &str, data: Bytes) {
        lock(&self.state.objects).insert(url.to_string(), data);
    }

    /// Bytes stored at `url`, including anything uploaded with PUT.
    pub fn object(&self, url: &str) -> Option<Bytes> {
        lock(&self.state.objects).get(url).cloned()
    }

    /// Fail the next `times` requests to `url` with `fault`.
    pub fn inject_fault(&self, url: &str, fault: Fault, times: usize) {
        let mut faults = lock(&self.state.faults);
        let queue = faults.entry(url.to_string()).or_default();
        queue.extend(std::iter::repeat(fault).take(times));
    }

    /// Route every request whose URL, minus its query string, equals `path_url`.
    pub fn route<F>(&self, path_url: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> CannedResponse + Send + Sync + 'static,
    {
        lock(&self.state.handlers).insert(path_url.to_string(), Arc::new(handler));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.log).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state.log).len()
    }

    pub fn range_request_count(&self) -> usize {
        lock(&self.state.log)
            .iter()
            .filter(|r| r.range.is_some())
            .count()
    }

    pub fn clear_requests(&self) {
        lock(&self.state.log).clear();
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> usize {
        self.state.sessions_created.load(Ordering::SeqCst)
    }

    fn next_fault(&self, url: &str) -> Option<Fault> {
        lock(&self.state.faults).get_mut(url)?.pop_front()
    }

    fn respond(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let fault = self.next_fault(&request.url);
        match fault {
            Some(Fault::Status(code)) => return Ok(empty(code)),
            Some(Fault::ConnectionReset) => {
                return Err(TransportError::Connection(format!(
                    "connection reset by peer: {}",
                    request.url
                )))
            }
            _ => {}
        }

        let path = request.url.split('?').next().unwrap_or_default();
        let handler = lock(&self.state.handlers).get(path).cloned();
        if let Some(handler) = handler {
            return Ok(canned(handler(request)));
        }

        if request.method == Method::PUT {
            let body = request.body.clone().unwrap_or_default();
            self.insert_object(&request.url, body);
            return Ok(empty(200));
        }
        if request.method != Method::GET {
            return Ok(empty(405));
        }

        let Some(data) = self.object(&request.url) else {
            return Ok(empty(404));
        };
        let range = request.header_str("range");
        match range {
            Some(_) if fault == Some(Fault::IgnoreRange) => Ok(full(data)),
            Some(range) => match parse_range(range, data.len() as u64) {
                Some((start, end)) => {
                    let mut headers = HeaderMap::new();
                    if let Ok(v) = HeaderValue::from_str(&format!("bytes {start}-{end}/{}", data.len())) {
                        headers.insert("content-range", v);
                    }
                    let slice = data.slice(start as usize..=end as usize);
                    Ok(HttpResponse::from_bytes(StatusCode::PARTIAL_CONTENT, headers, slice, PIECE_SIZE))
                }
                None => Ok(empty(416)),
            },
            None => Ok(full(data)),
        }
    }
}

fn empty(code: u16) -> HttpResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::from_bytes(status, HeaderMap::new(), Bytes::new(), PIECE_SIZE)
}

fn full(data: Bytes) -> HttpResponse {
    HttpResponse::from_bytes(StatusCode::OK, HeaderMap::new(), data, PIECE_SIZE)
}

fn canned(resp: CannedResponse) -> HttpResponse {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &resp.headers {
        if let (Ok(n), Ok(v)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(n, v);
        }
    }
    HttpResponse::from_bytes(status, headers, resp.body, PIECE_SIZE)
}

/// Parse `bytes=<start>-<end>` (end optional) into an inclusive range within `len`.
fn parse_range(header: &str, len: u64) -> Option<(u64, u64)> {
    let (start, end) = header.strip_prefix("bytes=")?.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = match end.trim() {
        "" => len.checked_sub(1)?,
        e => e.parse::<u64>().ok()?.min(len.checked_sub(1)?),
    };
    (start <= end).then_some((start, end))
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpTransport for MemoryTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.state.in_flight);

        lock(&self.state.log).push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            range: request.header_str("range").map(str::to_string),
            headers: request.headers.clone(),
            body_len: request.body.as_ref().map_or(0, |b| b.len()),
        });

        let latency = *lock(&self.state.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.respond(&request)
    }
}

impl SessionFactory for MemoryTransport {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, TransportError> {
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}
