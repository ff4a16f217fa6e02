//! Shared error type across modelserve crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Predictor or drift detector failed at runtime.
    InferenceFailed,
    /// Invalid or unreadable configuration.
    Config,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InferenceFailed => "INFERENCE_FAILED",
            ClientCode::Config => "CONFIG",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ModelServeError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum ModelServeError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl ModelServeError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            ModelServeError::BadRequest(_) => ClientCode::BadRequest,
            ModelServeError::Inference(_) => ClientCode::InferenceFailed,
            ModelServeError::Config(_) => ClientCode::Config,
            ModelServeError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            ModelServeError::Internal(_) => ClientCode::Internal,
        }
    }
}
