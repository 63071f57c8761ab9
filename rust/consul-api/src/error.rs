use thiserror::Error;

/// Errors produced by a [crate::Transport] while moving bytes to and from
/// the agent. Client layers never retry these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The agent could not be reached
    #[error("Failed to connect to agent: {0}")]
    Connect(String),

    /// The request did not complete within the configured timeout
    #[error("Request to agent timed out: {0}")]
    Timeout(String),

    /// The request could not be built or sent
    #[error("Failed to send request: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The target URL could not be assembled from the configuration and path
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else if error.is_body() || error.is_decode() {
            TransportError::Body(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(error: url::ParseError) -> Self {
        TransportError::InvalidUrl(error.to_string())
    }
}

/// The common error type returned by every API client operation
#[derive(Error, Debug)]
pub enum ApiError {
    /// The caller passed a malformed key, prefix or identifier. Raised before
    /// any request is made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport failed; propagated unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The agent answered with a status the operation does not accept
    #[error("Request failed with status {status}: {body}")]
    RequestFailed {
        /// HTTP status code returned by the agent
        status: u16,
        /// Response body, decoded lossily as UTF-8
        body: String,
    },

    /// The response body did not have the expected JSON shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Configuration or environment values could not be used
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ApiError {
    /// The HTTP status carried by a [ApiError::RequestFailed], if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Decode(error.to_string())
    }
}
