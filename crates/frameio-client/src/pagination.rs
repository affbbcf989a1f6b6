//! Lazy iteration over page-numbered list endpoints.
//!
//! The service reports paging through the `page-number`, `per-page`,
//! `total-pages` and `total` response headers. A response without them is a
//! complete, single-page result.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A list call to be walked page by page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub method: Method,
    /// Path below the API root, e.g. `/assets/<id>/children`.
    pub endpoint: String,
    /// JSON body for non-GET calls.
    pub payload: Option<Value>,
    pub page_size: Option<u32>,
    /// Stop after yielding this many items.
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            endpoint: endpoint.into(),
            payload: None,
            page_size: None,
            limit: None,
        }
    }

    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: Method::POST,
            endpoint: endpoint.into(),
            payload: Some(payload),
            page_size: None,
            limit: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Full URL for `page` given the endpoint's absolute URL.
    ///
    /// GET requests carry paging in the query string. Page 1 is the plain
    /// endpoint.
    pub fn url_for_page(&self, endpoint_url: &str, page: u64) -> String {
        if self.method != Method::GET {
            return endpoint_url.to_string();
        }
        let mut params = Vec::new();
        if page > 1 {
            params.push(format!("page={page}"));
        }
        if let Some(size) = self.page_size {
            params.push(format!("page_size={size}"));
        }
        if params.is_empty() {
            return endpoint_url.to_string();
        }
        let sep = if endpoint_url.contains('?') { '&' } else { '?' };
        format!("{endpoint_url}{sep}{}", params.join("&"))
    }

    /// JSON body for `page`. Non-GET requests carry paging in the body.
    pub fn payload_for_page(&self, page: u64) -> Option<Value> {
        if self.method == Method::GET {
            return self.payload.clone();
        }
        let mut body = match self.payload.clone() {
            Some(Value::Object(map)) => map,
            Some(other) => return Some(other),
            None => Map::new(),
        };
        if page > 1 {
            body.insert("page".into(), Value::from(page));
        }
        if let Some(size) = self.page_size {
            body.insert("page_size".into(), Value::from(size));
        }
        Some(Value::Object(body))
    }
}

/// Paging metadata of one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub page_number: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub total: Option<u64>,
}

impl PageMeta {
    /// `None` unless `page-number` is present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };
        let page_number = number("page-number")?;
        Some(Self {
            page_number,
            per_page: number("per-page").unwrap_or(0),
            total_pages: number("total-pages").unwrap_or(1).max(1),
            total: number("total"),
        })
    }
}

/// One fetched page before item deserialization.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub items: Vec<Value>,
    pub meta: Option<PageMeta>,
}

/// Something that can fetch a numbered page of a [`PageRequest`].
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest, page: u64) -> Result<RawPage, ClientError>;
}

/// Position of a [`Paginator`] within the result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
    /// Items consumed from the current page.
    pub position: usize,
    /// Items yielded so far.
    pub returned: usize,
}

enum State {
    Start,
    Ready(Vec<Value>),
    Exhausted,
}

/// Forward-only iterator over every item of a paged list.
///
/// Totals are taken from the first page and never refreshed. An empty page
/// before `total` is reached ends iteration.
pub struct Paginator<T> {
    source: Arc<dyn PageSource>,
    request: PageRequest,
    state: State,
    cursor: PageCursor,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Paginator<T> {
    pub fn new(source: Arc<dyn PageSource>, request: PageRequest) -> Self {
        Self {
            source,
            request,
            state: State::Start,
            cursor: PageCursor::default(),
            _item: PhantomData,
        }
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// Number of items iteration will yield: `min(total, limit)`. An upper
    /// bound when the service sent no `total` header.
    ///
    /// Fetches the first page if iteration has not started.
    pub async fn size_hint(&mut self) -> Result<usize, ClientError> {
        if matches!(self.state, State::Start) {
            self.start().await?;
        }
        Ok(self.capacity())
    }

    /// Next item, or `None` once the list is exhausted.
    pub async fn next(&mut self) -> Result<Option<T>, ClientError> {
        loop {
            let capacity = self.capacity();
            match &mut self.state {
                State::Exhausted => return Ok(None),
                State::Start => self.start().await?,
                State::Ready(buffer) => {
                    if self.cursor.returned >= capacity {
                        self.state = State::Exhausted;
                        return Ok(None);
                    }

                    if let Some(slot) = buffer.get_mut(self.cursor.position) {
                        let value = slot.take();
                        self.cursor.position += 1;
                        self.cursor.returned += 1;
                        return Ok(Some(serde_json::from_value(value)?));
                    }

                    if self.cursor.current_page >= self.cursor.total_pages {
                        self.state = State::Exhausted;
                        return Ok(None);
                    }
                    self.advance().await?;
                }
            }
        }
    }

    /// Drain the remaining items into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        let page = self.source.fetch_page(&self.request, 1).await?;
        self.cursor = match page.meta {
            Some(meta) => PageCursor {
                current_page: meta.page_number.max(1),
                page_size: meta.per_page,
                total: meta
                    .total
                    .unwrap_or_else(|| estimated_total(&meta, page.items.len())),
                total_pages: meta.total_pages,
                position: 0,
                returned: 0,
            },
            None => PageCursor {
                current_page: 1,
                page_size: page.items.len() as u64,
                total: page.items.len() as u64,
                total_pages: 1,
                position: 0,
                returned: 0,
            },
        };
        tracing::debug!(
            "{} {}: {} items over {} pages",
            self.request.method,
            self.request.endpoint,
            self.cursor.total,
            self.cursor.total_pages
        );
        self.state = State::Ready(page.items);
        Ok(())
    }

    async fn advance(&mut self) -> Result<(), ClientError> {
        let next_page = self.cursor.current_page + 1;
        let page = self.source.fetch_page(&self.request, next_page).await?;
        if page.items.is_empty() {
            tracing::warn!(
                "{} returned an empty page {} after {} of {} items",
                self.request.endpoint,
                next_page,
                self.cursor.returned,
                self.cursor.total
            );
            self.state = State::Exhausted;
            return Ok(());
        }
        self.cursor.current_page = next_page;
        self.cursor.position = 0;
        self.state = State::Ready(page.items);
        Ok(())
    }

    fn capacity(&self) -> usize {
        let total = usize::try_from(self.cursor.total).unwrap_or(usize::MAX);
        match self.request.limit {
            Some(limit) => total.min(limit),
            None => total,
        }
    }
}

/// Upper bound on the item count when the service omits `total`: full pages
/// of `per-page` (or of the first page's length) across `total-pages`.
fn estimated_total(meta: &PageMeta, first_page_len: usize) -> u64 {
    let per_page = if meta.per_page > 0 {
        meta.per_page
    } else {
        first_page_len as u64
    };
    per_page.saturating_mul(meta.total_pages)
}
