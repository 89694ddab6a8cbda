use crate::feed::parser::{parse_document, FetchedDocument, FormatError};
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while retrieving a feed document.
///
/// There is no retry here: a failed feed waits for its next turn in the
/// poll rotation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the client-side timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body is not a well-formed RSS document
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl FetchError {
    /// True for failures reaching the source, false for an undecodable body.
    pub fn is_network(&self) -> bool {
        !matches!(self, FetchError::Format(_))
    }
}

/// Retrieves and decodes feed documents with a fixed timeout budget.
#[derive(Clone, Debug)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        let client = Self::build_client(DEFAULT_TIMEOUT).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to build HTTP client, using reqwest defaults");
            reqwest::Client::new()
        });
        Self::new(client, DEFAULT_TIMEOUT)
    }
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            max_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }

    /// Build the HTTP client used for feed downloads.
    pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetch `url` and parse it into a [`FetchedDocument`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - source unreachable
    ///   or slower than the timeout (which covers the whole body download)
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - body over the size limit
    /// - [`FetchError::Format`] - body is not RSS
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let document = parse_document(&bytes)?;
        tracing::debug!(
            url = %url,
            bytes = bytes.len(),
            entries = document.entries.len(),
            "Feed document parsed"
        );
        Ok(document)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("Too many redirects (max {MAX_REDIRECTS})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
