//! Error type of the training job.
//!
//! Nothing here is recovered locally: every variant propagates out of the
//! job and terminates the process with a non-zero exit code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainError>;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset: {0}")]
    Dataset(String),

    #[error("model: {0}")]
    Model(String),

    #[error("registry: {0}")]
    Registry(String),

    #[error("config: {0}")]
    Config(String),
}

impl TrainError {
    /// MLflow `error_code` of an API failure, if any.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            TrainError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
