use std::sync::Arc;

use frameio_client::{ApiClient, PageRequest};
use frameio_core::Asset;
use frameio_transfer::{CannedResponse, HttpRequest, MemoryTransport, RetryPolicy, TransferClient};
use serde_json::{json, Value};

const HOST: &str = "https://api.test";

fn client(memory: &MemoryTransport) -> ApiClient {
    let transfers = TransferClient::new(Arc::new(memory.clone())).with_retry_policy(RetryPolicy::none());
    ApiClient::from_parts(HOST, "token", Arc::new(memory.clone()), transfers)
}

fn query_page(req: &HttpRequest) -> u64 {
    req.url
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

fn body_page(req: &HttpRequest) -> u64 {
    req.body
        .as_deref()
        .and_then(|b| serde_json::from_slice::<Value>(b).ok())
        .and_then(|v| v["page"].as_u64())
        .unwrap_or(1)
}

/// Serve `total` assets in pages of `per_page`, numbered by `page_of`.
fn serve_assets(memory: &MemoryTransport, path: &str, total: u64, per_page: u64, page_of: fn(&HttpRequest) -> u64) {
    let total_pages = total.div_ceil(per_page);
    memory.route(&format!("{HOST}/v2{path}"), move |req| {
        let page = page_of(req);
        let start = (page - 1) * per_page;
        let end = (start + per_page).min(total);
        let items: Vec<Value> = (start..end)
            .map(|i| json!({ "id": format!("asset-{i:03}"), "name": format!("clip {i}.mov"), "_type": "file" }))
            .collect();
        CannedResponse::json(&Value::Array(items))
            .with_header("page-number", page)
            .with_header("per-page", per_page)
            .with_header("total-pages", total_pages)
            .with_header("total", total)
    });
}

// === Test 1: 97 items over 10 pages are yielded once each in 10 fetches ===
#[tokio::test]
async fn test_ninety_seven_items_over_ten_pages() {
    let memory = MemoryTransport::new();
    serve_assets(&memory, "/assets/root/children", 97, 10, query_page);

    let assets = client(&memory).children("root").collect_all().await.unwrap();

    assert_eq!(assets.len(), 97);
    let ids: Vec<String> = assets.into_iter().map(|a| a.id).collect();
    let expected: Vec<String> = (0..97).map(|i| format!("asset-{i:03}")).collect();
    assert_eq!(ids, expected);
    assert_eq!(memory.request_count(), 10);
}

// === Test 2: a limit stops iteration and further fetches ===
#[tokio::test]
async fn test_limit_stops_early() {
    let memory = MemoryTransport::new();
    serve_assets(&memory, "/assets/root/children", 97, 10, query_page);

    let request = ApiClient::children_request("root").with_limit(15);
    let mut pages = client(&memory).paginate::<Asset>(request);
    assert_eq!(pages.size_hint().await.unwrap(), 15);

    let mut count = 0;
    while pages.next().await.unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 15);
    assert_eq!(memory.request_count(), 2);
}

// === Test 3: POST listings carry the page number in the body ===
#[tokio::test]
async fn test_post_pagination_uses_body() {
    let memory = MemoryTransport::new();
    serve_assets(&memory, "/search/library", 25, 10, body_page);

    let request = PageRequest::post("/search/library", json!({ "account_id": "acc", "q": "clip" }));
    let assets: Vec<Asset> = client(&memory).paginate(request).collect_all().await.unwrap();
    assert_eq!(assets.len(), 25);

    let requests = memory.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.url == "https://api.test/v2/search/library"));
}

// === Test 4: a list without paging headers is a single page ===
#[tokio::test]
async fn test_unpaged_list() {
    let memory = MemoryTransport::new();
    memory.route("https://api.test/v2/assets/small/children", |_| {
        CannedResponse::json(&json!([{ "id": "x" }, { "id": "y" }]))
    });

    let mut pages = client(&memory).children("small");
    assert_eq!(pages.size_hint().await.unwrap(), 2);
    let assets = pages.collect_all().await.unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(memory.request_count(), 1);
}
