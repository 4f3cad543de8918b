//! OAuth2 authorization-code flow and token endpoint exchange

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest,
    HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use url::Url;

use super::{AuthConfig, AuthError};

/// Length of the generated `state` value (24 random bytes, base64url).
pub const STATE_LEN: usize = 32;
const STATE_BYTES: u32 = 24;

/// Grant presented to the token endpoint
#[derive(Clone)]
pub enum TokenGrant {
    AuthorizationCode(String),
    RefreshToken(String),
}

impl TokenGrant {
    fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenGrant({})", self.kind())
    }
}

/// Successful token endpoint response
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrantResponse {
    pub access_token: String,
    /// Absent when the provider keeps the previous refresh token valid
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl fmt::Debug for TokenGrantResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrantResponse")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Token endpoint failure, classified by HTTP outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// HTTP 400/401: the grant itself is invalid
    #[error("token endpoint rejected the grant (HTTP {status})")]
    Rejected { status: u16 },
    #[error("token endpoint returned HTTP {status}")]
    Server { status: u16 },
    #[error("token endpoint unreachable: {0}")]
    Network(String),
    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl ExchangeError {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 401 => Self::Rejected { status },
            _ => Self::Server { status },
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// The provider's token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange(&self, grant: TokenGrant) -> Result<TokenGrantResponse, ExchangeError>;
}

/// Token endpoint backed by the `oauth2` client over `reqwest`.
pub struct OAuthTokenEndpoint {
    client: BasicClient,
    http: reqwest::Client,
}

impl OAuthTokenEndpoint {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.client_id.trim().is_empty() || config.client_secret.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "client_id and client_secret must be set in config.toml".to_string(),
            ));
        }

        let invalid = |what: &str, e: &dyn fmt::Display| {
            AuthError::InvalidConfiguration(format!("{}: {}", what, e))
        };
        let auth_url =
            AuthUrl::new(config.authorize_url.clone()).map_err(|e| invalid("authorize url", &e))?;
        let token_url =
            TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token url", &e))?;
        let redirect_url =
            RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| invalid("redirect uri", &e))?;

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        // Following redirects from the token endpoint is unsafe
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| invalid("http client", &e))?;

        Ok(Self { client, http })
    }

    /// Authorize URL for a new sign-in attempt, plus the `state` to expect
    /// on the callback.
    pub fn authorize_url(&self) -> (Url, String) {
        let (url, state) = self
            .client
            .authorize_url(|| CsrfToken::new_random_len(STATE_BYTES))
            .url();
        (url, state.secret().clone())
    }

    /// Send one token request, recording the HTTP status so failures can be
    /// classified after `oauth2` has folded them into its own error type.
    async fn send(
        &self,
        request: HttpRequest,
        last_status: &AtomicU16,
    ) -> Result<HttpResponse, reqwest::Error> {
        tracing::debug!("Token endpoint {} {}", request.method, request.url);

        let response = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status_code = response.status();
        last_status.store(status_code.as_u16(), Ordering::Relaxed);
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

#[async_trait]
impl TokenEndpoint for OAuthTokenEndpoint {
    async fn exchange(&self, grant: TokenGrant) -> Result<TokenGrantResponse, ExchangeError> {
        let last_status = AtomicU16::new(0);

        let result = match &grant {
            TokenGrant::AuthorizationCode(code) => {
                self.client
                    .exchange_code(AuthorizationCode::new(code.clone()))
                    .request_async(|request| self.send(request, &last_status))
                    .await
            }
            TokenGrant::RefreshToken(token) => {
                let token = RefreshToken::new(token.clone());
                self.client
                    .exchange_refresh_token(&token)
                    .request_async(|request| self.send(request, &last_status))
                    .await
            }
        };

        let response: BasicTokenResponse = result.map_err(|e| {
            let err = classify(e, last_status.load(Ordering::Relaxed));
            tracing::debug!("{} grant failed: {}", grant.kind(), err);
            err
        })?;

        let expires_in = response
            .expires_in()
            .ok_or_else(|| ExchangeError::Malformed("token response has no expires_in".into()))?
            .as_secs();

        Ok(TokenGrantResponse {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expires_in,
        })
    }
}

fn classify(err: RequestTokenError<reqwest::Error, BasicErrorResponse>, status: u16) -> ExchangeError {
    match err {
        RequestTokenError::Request(e) => ExchangeError::Network(e.to_string()),
        other if (200..300).contains(&status) => ExchangeError::Malformed(other.to_string()),
        RequestTokenError::ServerResponse(body) => {
            tracing::debug!("Token endpoint error: {}", body);
            ExchangeError::from_status(status)
        }
        _ => ExchangeError::from_status(status),
    }
}

/// Extract the authorization code from a redirect callback URL such as
/// `homewatch://callback?code=...&state=...`.
///
/// The `state` must match the value issued with the authorize URL.
pub fn parse_callback(callback: &str, expected_state: &str) -> Result<String, AuthError> {
    let url = Url::parse(callback.trim())
        .map_err(|e| AuthError::AuthorizationFailed(format!("invalid callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let reason = match description {
            Some(d) => format!("{}: {}", error, d),
            None => error,
        };
        return Err(AuthError::AuthorizationFailed(reason));
    }

    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::AuthorizationFailed("state mismatch".to_string()));
    }

    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        AuthError::AuthorizationFailed("callback is missing the authorization code".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn config(base: &str) -> AuthConfig {
        AuthConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            authorize_url: format!("{}/oauth/authorize", base),
            token_url: format!("{}/oauth/token", base),
            redirect_uri: "homewatch://callback".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    fn token_body(access: &str, refresh: &str, expires_in: u64) -> String {
        serde_json::json!({
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "refresh_token": refresh,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_refresh_posts_form_and_parses_tokens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "R1".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("A2", "R2", 3600))
            .expect(1)
            .create_async()
            .await;

        let endpoint = OAuthTokenEndpoint::new(&config(&server.url())).unwrap();
        let response = endpoint
            .exchange(TokenGrant::RefreshToken("R1".to_string()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            response,
            TokenGrantResponse {
                access_token: "A2".to_string(),
                refresh_token: Some("R2".to_string()),
                expires_in: 3600,
            }
        );
    }

    #[tokio::test]
    async fn test_code_exchange_sends_redirect_uri() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "code-123".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "homewatch://callback".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("A1", "R1", 7200))
            .create_async()
            .await;

        let endpoint = OAuthTokenEndpoint::new(&config(&server.url())).unwrap();
        let response = endpoint
            .exchange(TokenGrant::AuthorizationCode("code-123".to_string()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.access_token, "A1");
        assert_eq!(response.expires_in, 7200);
    }

    #[tokio::test]
    async fn test_rejection_statuses() {
        let mut server = Server::new_async().await;
        let endpoint = OAuthTokenEndpoint::new(&config(&server.url())).unwrap();

        let _bad_grant = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::UrlEncoded("refresh_token".into(), "stale".into()))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        let _unauthorized = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::UrlEncoded("refresh_token".into(), "revoked".into()))
            .with_status(401)
            .create_async()
            .await;

        let err = endpoint
            .exchange(TokenGrant::RefreshToken("stale".into()))
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Rejected { status: 400 });

        let err = endpoint
            .exchange(TokenGrant::RefreshToken("revoked".into()))
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Rejected { status: 401 });
    }

    #[tokio::test]
    async fn test_server_error_is_not_a_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let endpoint = OAuthTokenEndpoint::new(&config(&server.url())).unwrap();
        let err = endpoint
            .exchange(TokenGrant::RefreshToken("R1".into()))
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Server { status: 503 });
        assert!(!err.is_rejection());
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let endpoint = OAuthTokenEndpoint::new(&config(&server.url())).unwrap();
        let err = endpoint
            .exchange(TokenGrant::RefreshToken("R1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let endpoint = OAuthTokenEndpoint::new(&config("http://127.0.0.1:9")).unwrap();
        let err = endpoint
            .exchange(TokenGrant::RefreshToken("R1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Network(_)));
    }

    #[test]
    fn test_missing_client_credentials_is_invalid_configuration() {
        let mut cfg = config("https://auth.example.com");
        cfg.client_secret = " ".to_string();
        assert!(matches!(
            OAuthTokenEndpoint::new(&cfg),
            Err(AuthError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_authorize_url_carries_fresh_state() {
        let endpoint = OAuthTokenEndpoint::new(&config("https://auth.example.com")).unwrap();
        let (url, state) = endpoint.authorize_url();
        let (_, second_state) = endpoint.authorize_url();

        assert_eq!(state.len(), STATE_LEN);
        assert_ne!(state, second_state);
        assert_eq!(url.path(), "/oauth/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some("client-1"));
        assert_eq!(get("redirect_uri"), Some("homewatch://callback"));
        assert_eq!(get("state"), Some(state.as_str()));
    }

    #[test]
    fn test_parse_callback() {
        let code = parse_callback("homewatch://callback?code=abc&state=s1", "s1").unwrap();
        assert_eq!(code, "abc");

        let err = parse_callback("homewatch://callback?code=abc&state=evil", "s1").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(ref r) if r == "state mismatch"));

        let err = parse_callback("homewatch://callback?code=abc", "s1").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(_)));

        let err = parse_callback("homewatch://callback?state=s1", "s1").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(_)));

        let err = parse_callback(
            "homewatch://callback?error=access_denied&error_description=user%20cancelled&state=s1",
            "s1",
        )
        .unwrap_err();
        assert!(
            matches!(err, AuthError::AuthorizationFailed(ref r) if r == "access_denied: user cancelled")
        );

        assert!(parse_callback("not a url", "s1").is_err());
    }
}
