// Error taxonomy for the discovery session.
// Nothing here is fatal to the screen: callers decide whether to surface,
// degrade, or just log each variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    // Transport or HTTP status failure, safe to retry
    #[error("network error: {0}")]
    Network(String),
    // Response arrived but the body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),
    // Rejected client-side before any request was issued
    #[error("validation failed: {0}")]
    Validation(String),
    // Durable key-value storage could not be read or written
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("not found: {0}")]
    NotFound(String),
}

impl DiscoveryError {
    /// Whether the UI should offer a retry affordance for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiscoveryError::Network(_) | DiscoveryError::Decode(_))
    }
}

// Conversions so `?` works across the HTTP and storage adapters
impl From<reqwest::Error> for DiscoveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            DiscoveryError::Decode(error.to_string())
        } else if error.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            DiscoveryError::Unauthenticated
        } else {
            DiscoveryError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(error: serde_json::Error) -> Self {
        DiscoveryError::Decode(error.to_string())
    }
}

impl From<std::io::Error> for DiscoveryError {
    fn from(error: std::io::Error) -> Self {
        DiscoveryError::Storage(error.to_string())
    }
}

// Define a custom Result type using our error
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
