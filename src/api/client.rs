//! Authenticated HTTP client for the homes API
//!
//! Wraps reqwest::Client with bearer auth and typed error mapping. The token
//! is supplied per call; refreshing it is the caller's job.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Resource API failure
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("401 Unauthorized; the access token was not accepted")]
    Unauthorized,
    #[error("403 Forbidden")]
    Forbidden,
    #[error("404 Not Found")]
    NotFound,
    #[error("server returned HTTP {0}")]
    ServerError(u16),
    #[error("network error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("failed to decode response: {0}")]
    DecodingError(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            other => Self::ServerError(other.as_u16()),
        }
    }

    /// Transport failures are always worth another attempt; server errors
    /// may be retried with backoff by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::ServerError(_))
    }
}

/// Client for the homes API. Each operation performs exactly one request.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ResourceClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL {} cannot carry a path", base_url);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL joined with percent-encoded path segments.
    pub(super) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        tracing::debug!("API {} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
    }

    /// GET and decode a JSON body.
    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
    ) -> Result<T, ApiError> {
        let resp = self
            .request(Method::GET, url, token)
            .send()
            .await
            .map_err(ApiError::NetworkError)?;

        let resp = check_response(resp)?;
        let body = resp.bytes().await.map_err(ApiError::NetworkError)?;
        serde_json::from_slice(&body).map_err(|e| ApiError::DecodingError(e.to_string()))
    }

    /// PATCH a JSON body; any response body is ignored.
    pub(super) async fn patch_json<B: Serialize>(
        &self,
        url: Url,
        body: &B,
        token: &str,
    ) -> Result<(), ApiError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| ApiError::DecodingError(e.to_string()))?;

        let resp = self
            .request(Method::PATCH, url, token)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(ApiError::NetworkError)?;

        check_response(resp)?;
        Ok(())
    }
}

/// Map non-2xx statuses onto the typed error taxonomy.
fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    tracing::debug!("HTTP {} for {}", status.as_u16(), resp.url());
    Err(ApiError::from_status(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN),
            ApiError::Forbidden
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY),
            ApiError::ServerError(502)
        ));
        assert!(ApiError::ServerError(500).is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = ResourceClient::new(
            "https://api.example.com/v8/",
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(
            client.endpoint(&["homes"]).as_str(),
            "https://api.example.com/v8/homes"
        );
        assert_eq!(
            client.endpoint(&["homes", "a b/c", "alarm"]).as_str(),
            "https://api.example.com/v8/homes/a%20b%2Fc/alarm"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let timeout = Duration::from_secs(1);
        assert!(ResourceClient::new("mailto:ops@example.com", timeout, timeout).is_err());
        assert!(ResourceClient::new("not a url", timeout, timeout).is_err());
    }
}
