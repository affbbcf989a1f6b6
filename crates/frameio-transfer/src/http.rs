use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use crate::error::TransportError;

/// A single HTTP exchange as seen by the transfer engine.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn put(url: impl Into<String>, body: Bytes) -> Self {
        Self::new(Method::PUT, url).body(body)
    }

    /// Add a header, rejecting names or values that are not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let invalid = |reason: String| TransportError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        self.headers.insert(key, value);
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Incrementally readable response body.
#[async_trait]
pub trait ResponseBody: Send {
    /// Next piece of the body, `None` once it is exhausted.
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Box<dyn ResponseBody>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Box<dyn ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response backed by an in-memory buffer, delivered in `piece_size` slices.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, data: Bytes, piece_size: usize) -> Self {
        Self::new(status, headers, Box::new(BufferedBody::new(data, piece_size)))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.body.chunk().await
    }

    /// Drain the whole body into memory.
    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        let mut out = BytesMut::new();
        while let Some(piece) = self.body.chunk().await? {
            out.extend_from_slice(&piece);
        }
        Ok(out.freeze())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

struct BufferedBody {
    pieces: VecDeque<Bytes>,
}

impl BufferedBody {
    fn new(mut data: Bytes, piece_size: usize) -> Self {
        let piece_size = piece_size.max(1);
        let mut pieces = VecDeque::new();
        while !data.is_empty() {
            let n = piece_size.min(data.len());
            pieces.push_back(data.split_to(n));
        }
        Self { pieces }
    }
}

#[async_trait]
impl ResponseBody for BufferedBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.pieces.pop_front())
    }
}

/// The request primitive the engine is built on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Creates independent sessions; each one owns its own connection pool.
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, TransportError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

struct ReqwestBody(reqwest::Response);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.0.chunk().await?)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        Ok(HttpResponse::new(status, headers, Box::new(ReqwestBody(resp))))
    }
}

/// Builds one `reqwest::Client` per session so every worker keeps its own
/// keep-alive connections.
#[derive(Debug, Clone, Default)]
pub struct ReqwestSessionFactory {
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ReqwestSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.default_headers.insert(name, value);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl SessionFactory for ReqwestSessionFactory {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, TransportError> {
        let mut builder = reqwest::Client::builder().default_headers(self.default_headers.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Arc::new(ReqwestTransport::new(builder.build()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_body_yields_slices() {
        let mut resp = HttpResponse::from_bytes(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"abcdefghij"),
            4,
        );
        assert_eq!(resp.chunk().await.unwrap().unwrap(), "abcd");
        assert_eq!(resp.chunk().await.unwrap().unwrap(), "efgh");
        assert_eq!(resp.chunk().await.unwrap().unwrap(), "ij");
        assert!(resp.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bytes_drains_body() {
        let resp = HttpResponse::from_bytes(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"hello world"),
            3,
        );
        assert_eq!(resp.bytes().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn request_headers() {
        let req = HttpRequest::get("https://example.test/file")
            .header("Range", "bytes=0-9")
            .unwrap();
        assert_eq!(req.header_str("range"), Some("bytes=0-9"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn invalid_headers_are_errors() {
        let err = HttpRequest::get("https://example.test/file")
            .header("bad header", "x")
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { ref name, .. } if name == "bad header"));

        let err = HttpRequest::get("https://example.test/file")
            .header("content-type", "video/mp4\r\nx-injected: 1")
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { ref name, .. } if name == "content-type"));
    }

    #[test]
    fn factory_builds_sessions() {
        let factory = ReqwestSessionFactory::new()
            .with_default_header("x-frameio-client", "rust/test")
            .with_timeout(Duration::from_secs(30));
        assert!(factory.create().is_ok());
    }
}
