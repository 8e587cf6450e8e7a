use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// True for failures of the request itself (network, status, decoding),
    /// as opposed to bad local input.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Http(_) | AppError::Server { .. } | AppError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
