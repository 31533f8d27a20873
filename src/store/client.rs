//! HTTP client for the backend REST endpoints
//!
//! Wraps reqwest::Client with optional bearer-token injection and maps
//! non-success responses into `ServiceError::Backend`.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::TokenSource;
use crate::error::{ServiceError, ServiceResult};

/// Error envelope returned by the backend's REST APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// REST client shared by the identity and document-store bindings.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl RestClient {
    /// Client for unauthenticated endpoints (API-key only).
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: None,
        }
    }

    /// Client that sends `Authorization: Bearer {id_token}` on every request.
    pub fn with_tokens(tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: Some(tokens),
        }
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> ServiceResult<reqwest::RequestBuilder> {
        match self.tokens {
            Some(ref tokens) => Ok(req.bearer_auth(tokens.id_token().await?)),
            None => Ok(req),
        }
    }

    pub async fn get(&self, url: &str) -> ServiceResult<reqwest::Response> {
        tracing::debug!("GET {}", url);
        let req = self.authorize(self.http.get(url)).await?;
        check_response(req.send().await?).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> ServiceResult<reqwest::Response> {
        tracing::debug!("POST {}", url);
        let req = self.authorize(self.http.post(url).json(body)).await?;
        check_response(req.send().await?).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> ServiceResult<reqwest::Response> {
        tracing::debug!("POST (form) {}", url);
        let req = self.authorize(self.http.post(url).form(form)).await?;
        check_response(req.send().await?).await
    }

    pub async fn patch_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &serde_json::Value,
    ) -> ServiceResult<reqwest::Response> {
        tracing::debug!("PATCH {}", url);
        let req = self
            .authorize(self.http.patch(url).query(query).json(body))
            .await?;
        check_response(req.send().await?).await
    }

    pub async fn delete(&self, url: &str) -> ServiceResult<reqwest::Response> {
        tracing::debug!("DELETE {}", url);
        let req = self.authorize(self.http.delete(url)).await?;
        check_response(req.send().await?).await
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Check HTTP response status code and return a `Backend` error on failure.
async fn check_response(resp: reqwest::Response) -> ServiceResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(backend_error(status.as_u16(), &body))
}

/// Build a `Backend` error from a status code and raw response body.
pub(crate) fn backend_error(status: u16, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => ServiceError::Backend {
            status,
            code: env
                .error
                .status
                .unwrap_or_else(|| env.error.message.clone()),
            message: env.error.message,
        },
        Err(_) => ServiceError::Backend {
            status,
            code: format!("HTTP_{}", status),
            message: body.to_string(),
        },
    }
}
