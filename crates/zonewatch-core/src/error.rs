//! Error types for zonewatch
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for zonewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonewatch
#[derive(Error, Debug)]
pub enum Error {
    /// IP oracle errors (network, status, malformed body)
    #[error("IP oracle error: {0}")]
    IpOracle(String),

    /// DNS backend errors
    #[error("DNS backend error: {0}")]
    DnsBackend(String),

    /// Record cache read/write errors
    #[error("Record cache error: {0}")]
    Cache(String),

    /// The cache file exists but could not be parsed
    #[error("Malformed record cache {path}: {message}")]
    MalformedCache {
        /// Path of the offending file
        path: String,
        /// Parser message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A supervised task ended abnormally
    #[error("Task {task} failed: {message}")]
    Task {
        /// Task name
        task: &'static str,
        /// Failure description
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IP oracle error
    pub fn ip_oracle(msg: impl Into<String>) -> Self {
        Self::IpOracle(msg.into())
    }

    /// Create a DNS backend error
    pub fn dns_backend(msg: impl Into<String>) -> Self {
        Self::DnsBackend(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a malformed cache error
    pub fn malformed_cache(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedCache {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a task failure error
    pub fn task(task: &'static str, message: impl Into<String>) -> Self {
        Self::Task {
            task,
            message: message.into(),
        }
    }

    /// Whether this error means the cache file exists but cannot be parsed
    pub fn is_malformed_cache(&self) -> bool {
        matches!(self, Self::MalformedCache { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_cache_is_distinguished() {
        let err = Error::malformed_cache("/tmp/cache.json", "expected value at line 1");
        assert!(err.is_malformed_cache());
        assert!(err.to_string().contains("/tmp/cache.json"));

        assert!(!Error::cache("permission denied").is_malformed_cache());
    }

    #[test]
    fn provider_error_formats_provider_name() {
        let err = Error::provider("cloudflare", "zone locked");
        assert_eq!(err.to_string(), "Provider error (cloudflare): zone locked");
    }
}
