use thiserror::Error;

/// Errors raised while building a connector.
///
/// Request-time failures are reported through the collaborator error types
/// of the `fulfillment` crate instead.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// A configured base URL is not usable.
    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Result type for connector construction.
pub type Result<T> = std::result::Result<T, ConnectorError>;
