pub mod description;
pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;

use crate::config::CatalogueConfig;
use dto::{ProductBody, ProductPayload, ProductResponse};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("listing {0} does not exist")]
    NotFound(String),

    #[error("storefront returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl CatalogueError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogueError::Transport(_) => true,
            CatalogueError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Write-only view of the storefront. Listings are never deleted from here;
/// a course leaving sale is pushed as a draft.
#[async_trait]
pub trait CatalogueClient: Send + Sync {
    async fn create_product(&self, payload: &ProductPayload)
        -> Result<ProductResponse, CatalogueError>;

    async fn update_product(
        &self,
        external_id: &str,
        payload: &ProductPayload,
    ) -> Result<ProductResponse, CatalogueError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct HttpCatalogueClient {
    client: Client,
    config: CatalogueConfig,
}

impl HttpCatalogueClient {
    pub fn new(config: CatalogueConfig) -> Result<Self, CatalogueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogueError::Setup(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.config.base_url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        payload: &ProductPayload,
        missing_id: Option<&str>,
    ) -> Result<ProductResponse, CatalogueError> {
        let response = request
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .json(payload)
            .send()
            .await
            .map_err(|e| CatalogueError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogueError::Transport(e.to_string()))?;
        tracing::debug!(status = %status, "storefront response");

        if let (StatusCode::NOT_FOUND, Some(id)) = (status, missing_id) {
            return Err(CatalogueError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(CatalogueError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProductBody = serde_json::from_str(&body)
            .map_err(|e| CatalogueError::Decode(format!("Failed to parse product: {}", e)))?;
        let id = match parsed.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            other => return Err(CatalogueError::Decode(format!("product id missing: {}", other))),
        };

        Ok(ProductResponse { id, body })
    }
}

#[async_trait]
impl CatalogueClient for HttpCatalogueClient {
    async fn create_product(
        &self,
        payload: &ProductPayload,
    ) -> Result<ProductResponse, CatalogueError> {
        let request = self.client.post(self.products_url());
        self.send(request, payload, None).await
    }

    async fn update_product(
        &self,
        external_id: &str,
        payload: &ProductPayload,
    ) -> Result<ProductResponse, CatalogueError> {
        let url = format!("{}/{}", self.products_url(), external_id);
        let request = self.client.put(url);
        self.send(request, payload, Some(external_id)).await
    }
}

/// Used when no storefront is configured. Sync is skipped entirely.
pub struct NoopCatalogueClient;

#[async_trait]
impl CatalogueClient for NoopCatalogueClient {
    async fn create_product(
        &self,
        _payload: &ProductPayload,
    ) -> Result<ProductResponse, CatalogueError> {
        Err(CatalogueError::Setup("storefront is not configured".to_string()))
    }

    async fn update_product(
        &self,
        _external_id: &str,
        _payload: &ProductPayload,
    ) -> Result<ProductResponse, CatalogueError> {
        Err(CatalogueError::Setup("storefront is not configured".to_string()))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
