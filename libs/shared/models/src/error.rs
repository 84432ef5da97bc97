use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP-equivalent status for callers that map errors onto a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::BadRequest(_) => 400,
            AppError::Conflict(_) => 409,
            AppError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg,
        }
    }

    /// Error body in the shape the clinic API returns.
    pub fn to_body(&self) -> Value {
        let status = self.status_code();
        if status >= 500 {
            tracing::error!("Error: {}: {}", status, self.message());
        } else {
            tracing::debug!("Error: {}: {}", status, self.message());
        }

        json!({
            "error": self.message(),
            "status": status,
        })
    }
}
