//! Error types shared across the crate.

/// Failure of the point provider for a single SSID.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("fetch aborted: {0}")]
    Aborted(String),
    /// The outcome of a fetch another caller started and this one waited on.
    #[error(transparent)]
    Shared(std::sync::Arc<ProviderError>),
}

impl ProviderError {
    /// The underlying error, looking through [`ProviderError::Shared`].
    pub fn root(&self) -> &ProviderError {
        match self {
            ProviderError::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

/// Configuration load / validation failure. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
