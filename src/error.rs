//! # Error Handling
//!
//! Error types for the proxy. Every failure a request can hit — a malformed
//! URL, an unknown module, an upstream outage, a local filesystem problem, an
//! alias entry that cannot be republished — is folded into [`ProxyError`] and
//! surfaced to the client the way the download protocol expects: status `404`
//! with the plain error text as the body. Clients treat any non-200 as "not
//! available here" and re-request on their own schedule, so no other status
//! codes are used.
//!
//! [`ProxyResult<T>`] is the convenience alias used throughout the crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Application error covering the full request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request path did not match any protocol endpoint shape.
    #[error("malformed request path: {0}")]
    MalformedUrl(String),

    /// The module or version does not exist upstream (or locally).
    #[error("{0}")]
    NotFound(String),

    /// The upstream resolver failed for a reason other than "no such module".
    #[error("upstream fetch failed: {0}")]
    UpstreamFailure(String),

    /// Local filesystem failure during read/write/copy/zip.
    #[error("cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    /// Alias table entry unusable for zip republishing.
    #[error("invalid module path {0}")]
    InvalidAlias(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// Machine-readable kind label, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedUrl(_) => "malformed_url",
            ProxyError::NotFound(_) => "not_found",
            ProxyError::UpstreamFailure(_) => "upstream_failure",
            ProxyError::CacheIo(_) => "cache_io",
            ProxyError::InvalidAlias(_) => "invalid_alias",
            ProxyError::Json(_) => "json",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.kind(), error = %self, "request failed");

        // The protocol surfaces every error as 404 with the message as a
        // plain-text body. Content types are intentionally not set.
        (StatusCode::NOT_FOUND, self.to_string()).into_response()
    }
}

/// Convenient result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(
            ProxyError::MalformedUrl("x".to_string()).kind(),
            "malformed_url"
        );
        assert_eq!(ProxyError::NotFound("x".to_string()).kind(), "not_found");
        assert_eq!(
            ProxyError::InvalidAlias("foo".to_string()).kind(),
            "invalid_alias"
        );
    }

    #[test]
    fn invalid_alias_message_matches_protocol() {
        let err = ProxyError::InvalidAlias("foo".to_string());
        assert_eq!(err.to_string(), "invalid module path foo");
    }
}
