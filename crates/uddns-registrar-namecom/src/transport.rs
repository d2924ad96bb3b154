//! HTTP transport for registrar requests
//!
//! The client speaks to the registrar through [`Transport`] so the wire
//! exchange can be scripted in tests. [`ReqwestTransport`] is the production
//! implementation.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uddns_core::{Error, Result};
use zeroize::Zeroizing;

/// Header carrying the session token once authenticated
pub const SESSION_HEADER: &str = "Api-Session-Token";

/// Default HTTP timeout for API requests (10 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request
pub struct ApiRequest {
    /// GET or POST
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// JSON body; may carry the API token, so it is scrubbed on drop unless
    /// moved into the outgoing HTTP request
    pub body: Option<Zeroizing<Vec<u8>>>,
    /// Session token header value, if authenticated
    pub session_token: Option<String>,
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body.as_ref().map(|b| format!("<{} bytes>", b.len())))
            .field("session_token", &self.session_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and returns the raw response
///
/// Implementations report network failures as `Error::Transport` (with
/// `timed_out` set for timeouts) and return `Error::Cancelled` as soon as
/// `cancel` fires. HTTP status handling is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<RawResponse>;
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Build a transport with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("uddns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport {
                url: String::new(),
                details: format!("Failed to build HTTP client: {}", e),
                timed_out: false,
            })?;

        Ok(Self { client })
    }
}

impl ReqwestTransport {
    /// Turn an [`ApiRequest`] into a reqwest request
    ///
    /// The body buffer is moved into the request rather than copied.
    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Zeroizing<Vec<u8>>>,
        session_token: Option<&str>,
    ) -> reqwest::Result<reqwest::Request> {
        let mut builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        builder = builder.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = session_token {
            builder = builder.header(SESSION_HEADER, token);
        }
        if let Some(mut body) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(std::mem::take(&mut *body));
        }
        builder.build()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<RawResponse> {
        let ApiRequest {
            method,
            url,
            body,
            session_token,
        } = request;

        let http_request = self
            .build_request(method, &url, body, session_token.as_deref())
            .map_err(|e| Error::Transport {
                url: url.clone(),
                details: format!("Failed to build request: {}", e),
                timed_out: false,
            })?;

        let exchange = async {
            let response = self.client.execute(http_request).await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(url = %url, "Request abandoned on cancellation");
                Err(Error::Cancelled)
            }
            result = exchange => result.map_err(|e| Error::Transport {
                timed_out: e.is_timeout(),
                details: e.to_string(),
                url,
            }),
        }
    }
}
