use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::Config;

/// Anything that can GET a URL and hand back the body.
///
/// Extractors only talk to this trait so the fetch layer can be swapped
/// (and counted) in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// HTTP client for making web requests
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_duration: Option<Duration>,
    user_agent: String,
    max_content_size: usize,
}

impl HttpClient {
    /// Create a client with no request timeout
    pub fn new(user_agent: String) -> Result<Self, FetchError> {
        Self::with_options(user_agent, None, Config::MAX_CONTENT_SIZE)
    }

    /// Create a client with an optional overall timeout and a body size limit
    pub fn with_options(
        user_agent: String,
        timeout_duration: Option<Duration>,
        max_content_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&user_agent)
            .pool_max_idle_per_host(Config::POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(Config::POOL_IDLE_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_duration,
            user_agent,
            max_content_size,
        })
    }

    /// Get the user agent string used by this client
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchResult, FetchError> {
        let request = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            )
            .send();

        let response = match self.timeout_duration {
            Some(limit) => timeout(limit, request)
                .await
                .map_err(|_| FetchError::Timeout)?,
            None => request.await,
        }
        .map_err(Self::classify_error)?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(
                    length as usize,
                    self.max_content_size,
                ));
            }
        }

        let content = response
            .text()
            .await
            .map_err(|e| FetchError::BodyError(e.to_string()))?;

        if content.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(
                content.len(),
                self.max_content_size,
            ));
        }

        // Status is recorded, not enforced: error pages go on to the parser.
        if status_code >= 400 {
            tracing::debug!(url, status_code, "non-success status, parsing anyway");
        }

        Ok(FetchResult {
            content,
            status_code,
            content_type,
        })
    }

    /// Classify reqwest errors into our FetchError types
    fn classify_error(error: reqwest::Error) -> FetchError {
        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }

        if error_msg.contains("dns") || error_msg.contains("name resolution") {
            return FetchError::DnsError;
        }

        if error_msg.contains("ssl") || error_msg.contains("tls") || error_msg.contains("certificate") {
            return FetchError::SslError;
        }

        if error.is_timeout() {
            return FetchError::Timeout;
        }

        FetchError::NetworkError(error.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    /// Single attempt, no retry
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        tracing::debug!(url, "fetching");
        self.fetch_once(url).await
    }
}

/// Result of a successful HTTP fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub content: String,
    pub status_code: u16,
    pub content_type: Option<String>,
}

impl FetchResult {
    /// A 200 response with the given body
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status_code: 200,
            content_type: None,
        }
    }
}

/// Errors that can occur during HTTP fetching
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("DNS resolution failed")]
    DnsError,

    #[error("SSL/TLS error - certificate or encryption issue")]
    SslError,

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),
}
