//! # HTTP Remote Client
//!
//! `RemoteClient` over the product REST API, built on reqwest.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /api/products[?since=<ms>]      list (tolerant parsing)         │
//! │  GET    /api/products/barcode/{code}    lookup, 404 → None              │
//! │  POST   /api/products                   create                          │
//! │  PUT    /api/products/{id}              update                          │
//! │  DELETE /api/products/{id}              delete, 404 → RemoteNotFound    │
//! │  POST   /api/auth/login                 { token } kept as Bearer        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When credentials are configured the client logs in lazily before the
//! first request. A 401 drops the token so the next request logs in again.

use async_trait::async_trait;
use catalog_core::{ProductDto, ProductPayload};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteClient;

/// Timeout for the connectivity probe, independent of the request timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// reqwest-backed product API client.
pub struct HttpRemoteClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
    credentials: Option<(String, String)>,
    token: RwLock<Option<String>>,
}

impl HttpRemoteClient {
    /// Builds a client from the `[api]` settings.
    pub fn new(settings: &ApiSettings) -> SyncResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| SyncError::Internal(e.to_string()))?;

        Ok(HttpRemoteClient {
            client,
            base_url,
            timeout_secs: settings.timeout_secs,
            credentials: settings
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges the configured credentials for a token.
    ///
    /// Does nothing when no credentials are configured.
    pub async fn login(&self) -> SyncResult<()> {
        let Some((username, password)) = &self.credentials else {
            return Ok(());
        };

        let url = self.endpoint(&["api", "auth", "login"])?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = self.check_status(response).await?;
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Deserialization(e.to_string()))?;

        match body.token {
            Some(token) => {
                info!(user = %username, "Authenticated with product API");
                *self.token.write().await = Some(token);
                Ok(())
            }
            None => Err(SyncError::RemoteStatus {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: "login response carried no token".into(),
            }),
        }
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> SyncResult<RequestBuilder> {
        if self.credentials.is_some() && self.token.read().await.is_none() {
            self.login().await?;
        }

        Ok(match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.token.write().await.take();
        }

        Ok(response)
    }

    /// Passes 2xx responses through and turns everything else into an error.
    async fn check_status(&self, response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();
        let message = response.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::RemoteNotFound(path));
        }

        Err(SyncError::RemoteStatus {
            status: status.as_u16(),
            message,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout_secs)
        } else {
            SyncError::from(err)
        }
    }

    async fn read_product(&self, response: Response) -> SyncResult<ProductDto> {
        response
            .json::<ProductDto>()
            .await
            .map_err(|e| SyncError::Deserialization(e.to_string()))
    }
}

/// Reads a list body leniently: anything but a JSON array is "no updates",
/// and array items that don't look like products are skipped.
fn parse_product_list(body: &[u8]) -> Vec<ProductDto> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Product list is not valid JSON, treating as empty");
            return Vec::new();
        }
    };

    let Value::Array(items) = value else {
        debug!("Product list is not an array, treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ProductDto>(item) {
            Ok(dto) => Some(dto),
            Err(e) => {
                warn!(error = %e, "Skipping malformed product in list");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_products(&self, since_millis: Option<i64>) -> SyncResult<Vec<ProductDto>> {
        let mut url = self.endpoint(&["api", "products"])?;
        if let Some(since) = since_millis {
            url.query_pairs_mut().append_pair("since", &since.to_string());
        }

        debug!(%url, "Fetching product list");
        let response = self.send(self.client.get(url)).await?;
        let response = self.check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        let products = parse_product_list(&body);
        debug!(count = products.len(), "Fetched product list");
        Ok(products)
    }

    async fn get_product_by_barcode(&self, barcode: &str) -> SyncResult<Option<ProductDto>> {
        let url = self.endpoint(&["api", "products", "barcode", barcode])?;
        let response = self.send(self.client.get(url)).await?;

        match self.check_status(response).await {
            Ok(response) => self.read_product(response).await.map(Some),
            Err(SyncError::RemoteNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_product(&self, payload: &ProductPayload) -> SyncResult<ProductDto> {
        let url = self.endpoint(&["api", "products"])?;
        let response = self.send(self.client.post(url).json(payload)).await?;
        let response = self.check_status(response).await?;
        self.read_product(response).await
    }

    async fn update_product(&self, id: i64, payload: &ProductPayload) -> SyncResult<ProductDto> {
        let url = self.endpoint(&["api", "products", &id.to_string()])?;
        let response = self.send(self.client.put(url).json(payload)).await?;
        let response = self.check_status(response).await?;
        self.read_product(response).await
    }

    async fn delete_product(&self, id: i64) -> SyncResult<()> {
        let url = self.endpoint(&["api", "products", &id.to_string()])?;
        let response = self.send(self.client.delete(url)).await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn check_connectivity(&self) -> bool {
        let Ok(mut url) = self.endpoint(&["api", "products"]) else {
            return false;
        };
        url.query_pairs_mut().append_pair("limit", "1");

        let request = self.client.get(url).timeout(PROBE_TIMEOUT);
        match self.send(request).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Connectivity check failed");
                false
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
