//! Typed errors for the curation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. The taxonomy drives the
//! retry controller: transient variants are retried, challenge variants
//! are waited out or skipped, everything else propagates.

use thiserror::Error;

/// Errors that can occur while fetching pages from a source site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source returned a block/verification page instead of content.
    #[error("challenge page detected: {url}")]
    Challenge { url: String },

    /// Connection reset, closed, or otherwise transient network failure.
    #[error("transient network error: {0}")]
    TransientNetwork(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request exceeded its time budget.
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// URL failed security validation (SSRF protection).
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// URL could not be parsed or is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Contract violation in the extractor; never retried.
    #[error("fetch failed: {0}")]
    Fatal(String),
}

impl FetchError {
    /// True if the retry controller should retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::Timeout { .. })
    }

    /// True if this failure is a challenge page.
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Challenge { .. })
    }
}

/// Errors that can occur during ingestion and curation operations.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetch operation failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Storage hiccup that is expected to clear on retry
    /// (connection pool exhaustion, lock timeout, etc).
    #[error("transient storage error: {0}")]
    TransientStorage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed permanently.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A required field is missing; the unit of work is skipped, not retried.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Interactive challenge resolution did not complete within the budget.
    #[error("challenge not resolved after {waited_secs}s: {context}")]
    ChallengeTimeout { context: String, waited_secs: u64 },

    /// Programming/contract violation; aborts the current unit of work only.
    #[error("{0}")]
    Fatal(String),
}

impl IngestError {
    /// True if the retry controller should retry this failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_transient(),
            Self::TransientStorage(_) => true,
            _ => false,
        }
    }

    /// True if this failure is a challenge page.
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_challenge())
    }
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let net = IngestError::Fetch(FetchError::TransientNetwork("reset".into()));
        assert!(net.is_transient());
        assert!(!net.is_challenge());

        let storage = IngestError::TransientStorage("pool exhausted".into());
        assert!(storage.is_transient());

        let fatal = IngestError::Fatal("bug".into());
        assert!(!fatal.is_transient());

        let validation = IngestError::Validation {
            reason: "no contact".into(),
        };
        assert!(!validation.is_transient());
    }

    #[test]
    fn test_challenge_classification() {
        let challenge = IngestError::Fetch(FetchError::Challenge {
            url: "https://example.com".into(),
        });
        assert!(challenge.is_challenge());
        assert!(!challenge.is_transient());
    }
}
