//! Error types for the Discogs provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Discogs provider errors
#[derive(Error, Debug)]
pub enum DiscogsError {
    /// 429 responses outlasted the retry budget
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    /// Any other non-200 response
    #[error("Discogs API error (status {status_code}): {body}")]
    Api { status_code: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Transport failure, including timeouts
    #[error("Network error: {0}")]
    Network(String),

    /// A request could not be built from the given input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DiscogsError {
    /// Whether a later attempt at the same call could succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, DiscogsError::InvalidRequest(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DiscogsError::Api { status_code, .. } => Some(*status_code),
            DiscogsError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<BridgeError> for DiscogsError {
    fn from(error: BridgeError) -> Self {
        DiscogsError::Network(error.to_string())
    }
}

/// Result type for Discogs operations
pub type Result<T> = std::result::Result<T, DiscogsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DiscogsError::Api {
            status_code: 404,
            body: "{\"message\": \"Release not found.\"}".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Discogs API error (status 404): {\"message\": \"Release not found.\"}"
        );
        assert_eq!(error.status_code(), Some(404));
    }

    #[test]
    fn test_bridge_timeout_is_transient_network_error() {
        let error: DiscogsError = BridgeError::Timeout("30s elapsed".to_string()).into();

        assert!(matches!(error, DiscogsError::Network(_)));
        assert!(error.is_transient());
        assert!(!DiscogsError::InvalidRequest("empty url".to_string()).is_transient());
    }
}
