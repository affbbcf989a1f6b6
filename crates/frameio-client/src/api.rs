use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use frameio_core::{Asset, TransferOptions};
use frameio_transfer::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestSessionFactory, RetryPolicy, RetryingTransport,
    SessionFactory, TransferClient, TransferResult,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;
use crate::files::{file_name, read_dir_sorted, NewAsset};
use crate::pagination::{PageMeta, PageRequest, PageSource, Paginator, RawPage};

pub const DEFAULT_HOST: &str = "https://api.frame.io";

/// Header identifying this library to the service.
pub const CLIENT_HEADER: &str = "x-frameio-client";

const API_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 512;

pub fn client_version() -> String {
    format!("rust/{}", env!("CARGO_PKG_VERSION"))
}

/// Credentialed client for the v2 REST API.
///
/// API calls carry the bearer token; byte transfers go through
/// [`TransferClient`] and never do.
#[derive(Clone)]
pub struct ApiClient {
    host: String,
    token: String,
    http: Arc<dyn HttpTransport>,
    transfers: TransferClient,
}

impl ApiClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        let api = ReqwestSessionFactory::new()
            .with_timeout(API_TIMEOUT)
            .with_connect_timeout(CONNECT_TIMEOUT)
            .create()?;
        let transfers = TransferClient::new(Arc::new(
            ReqwestSessionFactory::new().with_connect_timeout(CONNECT_TIMEOUT),
        ));
        Ok(Self::from_parts(
            DEFAULT_HOST,
            token,
            Arc::new(RetryingTransport::new(api, RetryPolicy::default())),
            transfers,
        ))
    }

    pub fn from_parts(
        host: impl Into<String>,
        token: impl Into<String>,
        http: Arc<dyn HttpTransport>,
        transfers: TransferClient,
    ) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            token: token.into(),
            http,
            transfers,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host: String = host.into();
        self.host = host.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transfer_client(mut self, transfers: TransferClient) -> Self {
        self.transfers = transfers;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn transfers(&self) -> &TransferClient {
        &self.transfers
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v2{}", self.host, endpoint)
    }

    fn request(&self, method: Method, url: String, payload: Option<&Value>) -> Result<HttpRequest, ClientError> {
        let mut request = HttpRequest::new(method, url)
            .header("authorization", &format!("Bearer {}", self.token))?
            .header(CLIENT_HEADER, &client_version())?;
        if let Some(payload) = payload {
            request = request
                .header("content-type", "application/json")?
                .body(Bytes::from(serde_json::to_vec(payload)?));
        }
        Ok(request)
    }

    async fn execute(&self, method: Method, url: String, payload: Option<&Value>) -> Result<HttpResponse, ClientError> {
        let request = self.request(method.clone(), url.clone(), payload)?;
        let resp = self.http.send(request).await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.bytes().await.unwrap_or_default();
        let mut body = String::from_utf8_lossy(&body).into_owned();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        tracing::debug!("{method} {url} -> {status}");
        Err(ClientError::Api {
            method: method.to_string(),
            url,
            status,
            body,
        })
    }

    /// Call `endpoint` and return the decoded JSON body (`null` when empty).
    pub async fn api_call(&self, method: Method, endpoint: &str, payload: Option<&Value>) -> Result<Value, ClientError> {
        let resp = self.execute(method, self.url(endpoint), payload).await?;
        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<T, ClientError> {
        let value = self.api_call(method, endpoint, payload).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_asset(&self, asset_id: &str) -> Result<Asset, ClientError> {
        let endpoint = format!("/assets/{}", urlencoding::encode(asset_id));
        self.call_json(Method::GET, &endpoint, None).await
    }

    pub async fn create_asset(&self, parent_id: &str, asset: &NewAsset) -> Result<Asset, ClientError> {
        let endpoint = format!("/assets/{}/children", urlencoding::encode(parent_id));
        let payload = serde_json::to_value(asset)?;
        let created: Asset = self.call_json(Method::POST, &endpoint, Some(&payload)).await?;
        tracing::debug!("created {} {} ({})", asset.kind, created.name, created.id);
        Ok(created)
    }

    /// Lazily list the children of a folder asset.
    pub fn children(&self, asset_id: &str) -> Paginator<Asset> {
        self.paginate(Self::children_request(asset_id))
    }

    /// Page request behind [`ApiClient::children`], for callers that set a limit or page size.
    pub fn children_request(asset_id: &str) -> PageRequest {
        PageRequest::get(format!("/assets/{}/children", urlencoding::encode(asset_id)))
    }

    pub fn paginate<T: DeserializeOwned>(&self, request: PageRequest) -> Paginator<T> {
        Paginator::new(Arc::new(self.clone()), request)
    }

    /// Create a file asset under `parent_id` and upload `path` into it.
    pub async fn upload_file(
        &self,
        parent_id: &str,
        path: &Path,
        options: &TransferOptions,
    ) -> Result<Asset, ClientError> {
        let new_asset = NewAsset::from_path(path)?;
        let asset = self.create_asset(parent_id, &new_asset).await?;
        Ok(self.transfers.upload(&asset, path, options).await?)
    }

    /// Mirror the local directory `dir` as a folder under `parent_id`.
    ///
    /// Returns the uploaded file assets in the order they were uploaded:
    /// breadth first, files before subfolders, names sorted.
    pub async fn upload_folder(
        &self,
        parent_id: &str,
        dir: &Path,
        options: &TransferOptions,
    ) -> Result<Vec<Asset>, ClientError> {
        if !dir.is_dir() {
            return Err(ClientError::InvalidPath(dir.to_path_buf()));
        }
        let root = self
            .create_asset(parent_id, &NewAsset::folder(file_name(dir)?))
            .await?;

        let mut queue = VecDeque::from([(dir.to_path_buf(), root.id)]);
        let mut uploaded = Vec::new();
        while let Some((local, remote_id)) = queue.pop_front() {
            let (dirs, files) = read_dir_sorted(&local)?;
            for file in files {
                tracing::info!("uploading {}", file.display());
                uploaded.push(self.upload_file(&remote_id, &file, options).await?);
            }
            for sub in dirs {
                let folder = self
                    .create_asset(&remote_id, &NewAsset::folder(file_name(&sub)?))
                    .await?;
                queue.push_back((sub, folder.id));
            }
        }
        Ok(uploaded)
    }

    /// Fetch the asset's metadata, then download it into `dir`.
    pub async fn download_asset(
        &self,
        asset_id: &str,
        dir: &Path,
        options: &TransferOptions,
    ) -> Result<TransferResult, ClientError> {
        let asset = self.get_asset(asset_id).await?;
        Ok(self.transfers.download(&asset, dir, options).await?)
    }
}

#[async_trait]
impl PageSource for ApiClient {
    async fn fetch_page(&self, request: &PageRequest, page: u64) -> Result<RawPage, ClientError> {
        let url = request.url_for_page(&self.url(&request.endpoint), page);
        let payload = request.payload_for_page(page);
        let resp = self
            .execute(request.method.clone(), url.clone(), payload.as_ref())
            .await?;
        let meta = PageMeta::from_headers(resp.headers());
        let body = resp.bytes().await?;

        match serde_json::from_slice(&body)? {
            Value::Array(items) => Ok(RawPage { items, meta }),
            other => Err(ClientError::InvalidResponse {
                url,
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
