//! External fetch capability.

use std::time::Duration;
use tally_core::{CoreError, CoreResult};

/// Fetch failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("Unexpected status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Response body could not be read as text
    #[error("Unreadable body: {0}")]
    Body(String),
}

impl FetchError {
    /// Attach the resource being fetched
    #[must_use]
    pub fn into_core(self, resource: &str) -> CoreError {
        CoreError::Fetch {
            resource: resource.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Something that can turn a resource identifier into content
pub trait Fetcher {
    /// Fetch the current content of `resource`
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the content cannot be obtained
    fn fetch(&self, resource: &str) -> Result<String, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<String, FetchError>,
{
    fn fetch(&self, resource: &str) -> Result<String, FetchError> {
        self(resource)
    }
}

/// Blocking HTTP GET fetcher
///
/// No retries: a failed request surfaces immediately.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a request timeout
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Internal` if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, resource: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(resource)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        response.text().map_err(|e| FetchError::Body(e.to_string()))
    }
}
