use thiserror::Error;

use domain::services::IdentityError;

/// Failure of a single backend request.
///
/// Never escapes the API client: each public operation degrades it to a
/// negative result after logging and counting it.
#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Invalid response body: {0}")]
    Parse(String),
}

impl ApiClientError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiClientError::Network(_) => "network",
            ApiClientError::Http { .. } => "http",
            ApiClientError::Parse(_) => "parse",
        }
    }
}

/// Errors that stop the agent from being assembled.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Failed to start metrics exporter: {0}")]
    Metrics(String),
}
