//! HTTP client for the catalog API, used by the dashboard and detail flows.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{Cart, ProductPatch};

/// Server-side product update endpoint (`PUT /api/products/{id}`).
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn put_product(&self, id: &str, patch: &ProductPatch) -> Result<()>;
}

/// External cart endpoint (`POST /api/cart`).
#[async_trait]
pub trait CartService: Send + Sync {
    async fn add_to_cart(&self, product_id: &str, id_token: &str) -> Result<Cart>;
}

#[derive(Deserialize)]
struct CartResponse {
    cart: Cart,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

// Non-2xx responses carry `{ "error": ... }` or `{ "message": ... }`.
async fn upstream_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let message = match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .or_else(|| body.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Something went wrong")
            .to_string(),
    };
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthenticated(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    async fn put_product(&self, id: &str, patch: &ProductPatch) -> Result<()> {
        let response = self
            .authorize(self.http.put(self.url(&format!("/api/products/{}", id))))
            .json(patch)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl CartService for ApiClient {
    async fn add_to_cart(&self, product_id: &str, id_token: &str) -> Result<Cart> {
        let response = self
            .http
            .post(self.url("/api/cart"))
            .json(&json!({ "productId": product_id, "idToken": id_token }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        let body: CartResponse = response.json().await?;
        Ok(body.cart)
    }
}
